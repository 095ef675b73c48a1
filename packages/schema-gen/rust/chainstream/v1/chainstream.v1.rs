// @generated
// This file is @generated by prost-build.
/// Subscription filters. Empty or "*" means all.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamRequest {
    #[prost(string, repeated, tag = "1")]
    pub market_ids: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "2")]
    pub subaccount_ids: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamResponse {
    #[prost(uint64, tag = "1")]
    pub block_height: u64,
    #[prost(message, repeated, tag = "2")]
    pub subaccount_deposits: ::prost::alloc::vec::Vec<SubaccountDeposits>,
    #[prost(message, repeated, tag = "3")]
    pub spot_orders: ::prost::alloc::vec::Vec<SpotOrderUpdate>,
    #[prost(message, repeated, tag = "4")]
    pub derivative_orders: ::prost::alloc::vec::Vec<DerivativeOrderUpdate>,
    #[prost(message, repeated, tag = "5")]
    pub spot_trades: ::prost::alloc::vec::Vec<SpotTrade>,
    #[prost(message, repeated, tag = "6")]
    pub derivative_trades: ::prost::alloc::vec::Vec<DerivativeTrade>,
    #[prost(message, repeated, tag = "7")]
    pub positions: ::prost::alloc::vec::Vec<Position>,
    #[prost(message, repeated, tag = "8")]
    pub oracle_prices: ::prost::alloc::vec::Vec<OraclePrice>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Deposit {
    #[prost(string, tag = "1")]
    pub available_balance: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub total_balance: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubaccountDeposit {
    #[prost(string, tag = "1")]
    pub denom: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub deposit: ::core::option::Option<Deposit>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubaccountDeposits {
    #[prost(string, tag = "1")]
    pub subaccount_id: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub deposits: ::prost::alloc::vec::Vec<SubaccountDeposit>,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum OrderUpdateStatus {
    Unspecified = 0,
    Booked = 1,
    Matched = 2,
    Cancelled = 3,
}
impl OrderUpdateStatus {
    /// String value of the enum field names used in the ProtoBuf definition.
    ///
    /// The values are not transformed in any way and thus are considered stable
    /// (if the ProtoBuf definition does not change) and safe for programmatic use.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::Unspecified => "ORDER_UPDATE_STATUS_UNSPECIFIED",
            Self::Booked => "ORDER_UPDATE_STATUS_BOOKED",
            Self::Matched => "ORDER_UPDATE_STATUS_MATCHED",
            Self::Cancelled => "ORDER_UPDATE_STATUS_CANCELLED",
        }
    }
    /// Creates an enum from field names used in the ProtoBuf definition.
    pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
        match value {
            "ORDER_UPDATE_STATUS_UNSPECIFIED" => Some(Self::Unspecified),
            "ORDER_UPDATE_STATUS_BOOKED" => Some(Self::Booked),
            "ORDER_UPDATE_STATUS_MATCHED" => Some(Self::Matched),
            "ORDER_UPDATE_STATUS_CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OrderInfo {
    #[prost(string, tag = "1")]
    pub subaccount_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub fee_recipient: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub price: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub quantity: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub cid: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpotOrder {
    #[prost(string, tag = "1")]
    pub market_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub order_info: ::core::option::Option<OrderInfo>,
    #[prost(string, tag = "3")]
    pub order_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub fillable: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "5")]
    pub trigger_price: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, tag = "6")]
    pub order_hash: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpotOrderUpdate {
    #[prost(enumeration = "OrderUpdateStatus", tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub order_hash: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub cid: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    pub order: ::core::option::Option<SpotOrder>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DerivativeOrder {
    #[prost(string, tag = "1")]
    pub market_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub order_info: ::core::option::Option<OrderInfo>,
    #[prost(string, tag = "3")]
    pub order_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub margin: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub fillable: ::prost::alloc::string::String,
    #[prost(string, optional, tag = "6")]
    pub trigger_price: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, tag = "7")]
    pub order_hash: ::prost::alloc::string::String,
    #[prost(bool, tag = "8")]
    pub is_market: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DerivativeOrderUpdate {
    #[prost(enumeration = "OrderUpdateStatus", tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub order_hash: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub cid: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    pub order: ::core::option::Option<DerivativeOrder>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpotTrade {
    #[prost(string, tag = "1")]
    pub market_id: ::prost::alloc::string::String,
    #[prost(bool, tag = "2")]
    pub is_buy: bool,
    #[prost(string, tag = "3")]
    pub execution_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub quantity: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub price: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub subaccount_id: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub fee: ::prost::alloc::string::String,
    #[prost(string, tag = "8")]
    pub order_hash: ::prost::alloc::string::String,
    #[prost(string, tag = "9")]
    pub fee_recipient_address: ::prost::alloc::string::String,
    #[prost(string, tag = "10")]
    pub cid: ::prost::alloc::string::String,
    #[prost(string, tag = "11")]
    pub trade_id: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PositionDelta {
    #[prost(bool, tag = "1")]
    pub is_long: bool,
    #[prost(string, tag = "2")]
    pub execution_quantity: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub execution_margin: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub execution_price: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DerivativeTrade {
    #[prost(string, tag = "1")]
    pub market_id: ::prost::alloc::string::String,
    #[prost(bool, tag = "2")]
    pub is_buy: bool,
    #[prost(string, tag = "3")]
    pub execution_type: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub subaccount_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "5")]
    pub position_delta: ::core::option::Option<PositionDelta>,
    #[prost(string, tag = "6")]
    pub payout: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub fee: ::prost::alloc::string::String,
    #[prost(string, tag = "8")]
    pub order_hash: ::prost::alloc::string::String,
    #[prost(string, tag = "9")]
    pub fee_recipient_address: ::prost::alloc::string::String,
    #[prost(string, tag = "10")]
    pub cid: ::prost::alloc::string::String,
    #[prost(string, tag = "11")]
    pub trade_id: ::prost::alloc::string::String,
    #[prost(bool, tag = "12")]
    pub is_liquidation: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Position {
    #[prost(string, tag = "1")]
    pub market_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub subaccount_id: ::prost::alloc::string::String,
    #[prost(bool, tag = "3")]
    pub is_long: bool,
    #[prost(string, tag = "4")]
    pub quantity: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub entry_price: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub margin: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub cumulative_funding_entry: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OraclePrice {
    #[prost(string, tag = "1")]
    pub symbol: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub price: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub r#type: ::prost::alloc::string::String,
}
include!("chainstream.v1.tonic.rs");
// @@protoc_insertion_point(module)
