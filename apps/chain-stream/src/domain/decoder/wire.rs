//! Attribute Payload Wire Types
//!
//! Serde shapes of the JSON documents embedded in event attributes, and the
//! field-level deserializers that canonicalize identifiers on the way in:
//!
//! - `subaccount`: base64 bytes or `0x`-hex, rendered as a [`SubaccountId`]
//! - `hash_b64`: base64 bytes rendered as `0x`-hex
//! - `bech32_b64`: base64 account bytes rendered as an `inj1...` address
//! - `exact_decimal`: decimal strings parsed without rounding

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bech32::{Bech32, Hrp};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::domain::records::{
    ChainDecimal, Deposit, DerivativeLimitOrder, OrderInfo, OrderType, Position, PositionDelta,
    SpotLimitOrder, SubaccountId,
};

/// Human-readable part of account addresses.
pub const ACCOUNT_HRP: Hrp = Hrp::parse_unchecked("inj");

// =============================================================================
// Field Deserializers
// =============================================================================

/// Parse a decimal string exactly, keeping its scale.
pub fn parse_decimal(text: &str) -> Result<ChainDecimal, String> {
    text.parse::<ChainDecimal>().map_err(|e| e.to_string())
}

fn exact_decimal<'de, D>(deserializer: D) -> Result<ChainDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_decimal(&text).map_err(D::Error::custom)
}

fn optional_exact_decimal<'de, D>(deserializer: D) -> Result<Option<ChainDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| parse_decimal(&text).map_err(D::Error::custom))
        .transpose()
}

fn b64_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    STANDARD
        .decode(text.as_bytes())
        .map_err(|e| D::Error::custom(format!("invalid base64 {text:?}: {e}")))
}

fn subaccount<'de, D>(deserializer: D) -> Result<SubaccountId, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    if text.len() == 2 + SubaccountId::LEN * 2 && text.starts_with("0x") {
        return SubaccountId::from_hex(&text).map_err(D::Error::custom);
    }
    let bytes = STANDARD
        .decode(text.as_bytes())
        .map_err(|e| D::Error::custom(format!("invalid subaccount id {text:?}: {e}")))?;
    SubaccountId::from_slice(&bytes).map_err(D::Error::custom)
}

fn hash_b64<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let bytes = b64_bytes(deserializer)?;
    if bytes.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

fn bech32_b64<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let bytes = b64_bytes(deserializer)?;
    if bytes.is_empty() {
        return Ok(String::new());
    }
    bech32::encode::<Bech32>(ACCOUNT_HRP, &bytes).map_err(D::Error::custom)
}

fn order_type<'de, D>(deserializer: D) -> Result<OrderType, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Name(String),
        Number(i64),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Name(name) => OrderType::from_name(&name)
            .ok_or_else(|| D::Error::custom(format!("unknown order type {name:?}"))),
        Repr::Number(number) => OrderType::from_number(number)
            .ok_or_else(|| D::Error::custom(format!("unknown order type {number}"))),
    }
}

// =============================================================================
// Deposits
// =============================================================================

/// One denom's balance changes across subaccounts.
#[derive(Debug, Deserialize)]
pub struct DepositUpdateWire {
    pub denom: String,
    #[serde(default)]
    pub deposits: Vec<DepositEntryWire>,
}

#[derive(Debug, Deserialize)]
pub struct DepositEntryWire {
    #[serde(deserialize_with = "subaccount")]
    pub subaccount_id: SubaccountId,
    pub deposit: DepositWire,
}

#[derive(Debug, Deserialize)]
pub struct DepositWire {
    #[serde(deserialize_with = "exact_decimal")]
    available_balance: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    total_balance: ChainDecimal,
}

impl From<DepositWire> for Deposit {
    fn from(wire: DepositWire) -> Self {
        Self {
            available_balance: wire.available_balance,
            total_balance: wire.total_balance,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderInfoWire {
    #[serde(deserialize_with = "subaccount")]
    subaccount_id: SubaccountId,
    #[serde(default)]
    fee_recipient: String,
    #[serde(deserialize_with = "exact_decimal")]
    price: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    quantity: ChainDecimal,
    #[serde(default)]
    cid: String,
}

impl From<OrderInfoWire> for OrderInfo {
    fn from(wire: OrderInfoWire) -> Self {
        Self {
            subaccount_id: wire.subaccount_id,
            fee_recipient: wire.fee_recipient,
            price: wire.price,
            quantity: wire.quantity,
            cid: wire.cid,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SpotOrderWire {
    order_info: OrderInfoWire,
    #[serde(deserialize_with = "order_type")]
    order_type: OrderType,
    #[serde(deserialize_with = "exact_decimal")]
    fillable: ChainDecimal,
    #[serde(default, deserialize_with = "optional_exact_decimal")]
    trigger_price: Option<ChainDecimal>,
    #[serde(default, deserialize_with = "hash_b64")]
    order_hash: String,
}

impl From<SpotOrderWire> for SpotLimitOrder {
    fn from(wire: SpotOrderWire) -> Self {
        Self {
            order_info: wire.order_info.into(),
            order_type: wire.order_type,
            fillable: wire.fillable,
            trigger_price: wire.trigger_price,
            order_hash: wire.order_hash,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DerivativeOrderWire {
    order_info: OrderInfoWire,
    #[serde(deserialize_with = "order_type")]
    order_type: OrderType,
    #[serde(deserialize_with = "exact_decimal")]
    margin: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    fillable: ChainDecimal,
    #[serde(default, deserialize_with = "optional_exact_decimal")]
    trigger_price: Option<ChainDecimal>,
    #[serde(default, deserialize_with = "hash_b64")]
    order_hash: String,
}

impl From<DerivativeOrderWire> for DerivativeLimitOrder {
    fn from(wire: DerivativeOrderWire) -> Self {
        Self {
            order_info: wire.order_info.into(),
            order_type: wire.order_type,
            margin: wire.margin,
            fillable: wire.fillable,
            trigger_price: wire.trigger_price,
            order_hash: wire.order_hash,
        }
    }
}

/// A market order that has no `fillable` of its own.
#[derive(Debug, Deserialize)]
pub struct DerivativeMarketOrderWire {
    order_info: OrderInfoWire,
    #[serde(deserialize_with = "order_type")]
    order_type: OrderType,
    #[serde(deserialize_with = "exact_decimal")]
    margin: ChainDecimal,
    #[serde(default, deserialize_with = "optional_exact_decimal")]
    trigger_price: Option<ChainDecimal>,
    #[serde(default, deserialize_with = "hash_b64")]
    order_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct MarketOrderCancelWire {
    market_order: DerivativeMarketOrderWire,
    #[serde(deserialize_with = "exact_decimal")]
    cancel_quantity: ChainDecimal,
}

impl From<MarketOrderCancelWire> for DerivativeLimitOrder {
    fn from(wire: MarketOrderCancelWire) -> Self {
        let order = wire.market_order;
        Self {
            order_info: order.order_info.into(),
            order_type: order.order_type,
            margin: order.margin,
            fillable: wire.cancel_quantity,
            trigger_price: order.trigger_price,
            order_hash: order.order_hash,
        }
    }
}

// =============================================================================
// Trades
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TradeLogWire {
    #[serde(deserialize_with = "exact_decimal")]
    pub quantity: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    pub price: ChainDecimal,
    #[serde(deserialize_with = "subaccount")]
    pub subaccount_id: SubaccountId,
    #[serde(deserialize_with = "exact_decimal")]
    pub fee: ChainDecimal,
    #[serde(default, deserialize_with = "hash_b64")]
    pub order_hash: String,
    #[serde(default, deserialize_with = "bech32_b64")]
    pub fee_recipient_address: String,
    #[serde(default)]
    pub cid: String,
}

#[derive(Debug, Deserialize)]
pub struct PositionDeltaWire {
    #[serde(default)]
    is_long: bool,
    #[serde(deserialize_with = "exact_decimal")]
    execution_quantity: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    execution_margin: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    execution_price: ChainDecimal,
}

impl From<PositionDeltaWire> for PositionDelta {
    fn from(wire: PositionDeltaWire) -> Self {
        Self {
            is_long: wire.is_long,
            execution_quantity: wire.execution_quantity,
            execution_margin: wire.execution_margin,
            execution_price: wire.execution_price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DerivativeTradeLogWire {
    #[serde(deserialize_with = "subaccount")]
    pub subaccount_id: SubaccountId,
    #[serde(default)]
    pub position_delta: Option<PositionDeltaWire>,
    #[serde(deserialize_with = "exact_decimal")]
    pub payout: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    pub fee: ChainDecimal,
    #[serde(default, deserialize_with = "hash_b64")]
    pub order_hash: String,
    #[serde(default, deserialize_with = "bech32_b64")]
    pub fee_recipient_address: String,
    #[serde(default)]
    pub cid: String,
}

// =============================================================================
// Positions
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SubaccountPositionWire {
    position: PositionWire,
    #[serde(deserialize_with = "subaccount")]
    subaccount_id: SubaccountId,
}

#[derive(Debug, Deserialize)]
struct PositionWire {
    #[serde(default, alias = "isLong")]
    is_long: bool,
    #[serde(deserialize_with = "exact_decimal")]
    quantity: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    entry_price: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    margin: ChainDecimal,
    #[serde(deserialize_with = "exact_decimal")]
    cumulative_funding_entry: ChainDecimal,
}

impl SubaccountPositionWire {
    pub fn into_position(self, market_id: &str) -> Position {
        Position {
            market_id: market_id.to_owned(),
            subaccount_id: self.subaccount_id,
            is_long: self.position.is_long,
            quantity: self.position.quantity,
            entry_price: self.position.entry_price,
            margin: self.position.margin,
            cumulative_funding_entry: self.position.cumulative_funding_entry,
        }
    }
}

// =============================================================================
// Oracle
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PythPriceWire {
    pub price_id: String,
    #[serde(deserialize_with = "exact_decimal")]
    pub ema_price: ChainDecimal,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_keeps_scale() {
        let value = parse_decimal("100.0").unwrap();
        assert_eq!(value.to_string(), "100.0");
        let value = parse_decimal("0.000000334588000000").unwrap();
        assert_eq!(value.to_string(), "0.000000334588000000");
    }

    #[test]
    fn decimal_holds_base_unit_amounts() {
        let json = r#"{
            "available_balance": "1000000000000000000000.000000000000000000",
            "total_balance": "235702260395515841.466948120701616346"
        }"#;
        let deposit: Deposit = serde_json::from_str::<DepositWire>(json).unwrap().into();
        assert_eq!(
            deposit.available_balance.to_string(),
            "1000000000000000000000.000000000000000000"
        );
        assert_eq!(
            deposit.total_balance.to_string(),
            "235702260395515841.466948120701616346"
        );
    }

    #[test]
    fn decimal_rejects_garbage() {
        assert!(parse_decimal("1.2.3").is_err());
        assert!(parse_decimal("").is_err());
    }

    #[test]
    fn deposit_entry_decodes_base64_subaccount() {
        let json = r#"{
            "subaccount_id": "Gg0k57Eis+m9IxUgT5DzoLn+oJEAAAAAAAAAAAAAAAA=",
            "deposit": {"available_balance": "100.0", "total_balance": "200.0"}
        }"#;
        let entry: DepositEntryWire = serde_json::from_str(json).unwrap();
        assert_eq!(
            entry.subaccount_id.to_string(),
            "0x1a0d24e7b122b3e9bd2315204f90f3a0b9fea091000000000000000000000000"
        );
    }

    #[test]
    fn trade_log_renders_hash_and_address() {
        let json = r#"{
            "quantity": "1.000000000000000000",
            "price": "200.000000000000000000",
            "subaccount_id": "64z4i3Of4S4wPjH7iPw3dR4Xzz0AAAAAAAAAAAAAAAA=",
            "fee": "0.010000000000000000",
            "order_hash": "XPkPkCZpWlZQA1+KbJLFKUeHsYAy8IzkVGDum2vGOYk=",
            "fee_recipient_address": "va7eyV1WP7BSQNbgGCEAhFTCTDY=",
            "cid": "cid_order_1"
        }"#;
        let trade: TradeLogWire = serde_json::from_str(json).unwrap();
        assert_eq!(
            trade.order_hash,
            "0x5cf90f9026695a5650035f8a6c92c5294787b18032f08ce45460ee9b6bc63989"
        );
        assert_eq!(
            trade.fee_recipient_address,
            "inj1hkhdaj2a2clmq5jq6mspsggqs32vynpk228q3r"
        );
        assert_eq!(
            trade.subaccount_id.to_string(),
            "0xeb8cf88b739fe12e303e31fb88fc37751e17cf3d000000000000000000000000"
        );
    }

    #[test]
    fn oversized_subaccount_is_rejected() {
        let long = STANDARD.encode([7_u8; 40]);
        let json = format!(
            r#"{{"subaccount_id": "{long}", "deposit": {{"available_balance": "1", "total_balance": "1"}}}}"#
        );
        let err = serde_json::from_str::<DepositEntryWire>(&json).unwrap_err();
        assert!(err.to_string().contains("40 bytes"));
    }

    #[test]
    fn order_type_accepts_name_or_number() {
        let named: SpotOrderWire = serde_json::from_str(
            r#"{"order_info":{"subaccount_id":"0xb31629e5789a69ba6e613369ec965e8ec19e57cf000000000000000000000001","fee_recipient":"inj1kvtznetcnf5m5mnpxd57e9j73mqeu470k7lj6w","price":"0.147","quantity":"1"},"order_type":"SELL_PO","fillable":"1","trigger_price":null,"order_hash":null}"#,
        )
        .unwrap();
        assert_eq!(named.order_type, OrderType::SellPo);
        assert!(named.trigger_price.is_none());
        assert!(named.order_hash.is_empty());

        let numbered: SpotOrderWire = serde_json::from_str(
            r#"{"order_info":{"subaccount_id":"0xb31629e5789a69ba6e613369ec965e8ec19e57cf000000000000000000000001","price":"0.147","quantity":"1"},"order_type":2,"fillable":"1"}"#,
        )
        .unwrap();
        assert_eq!(numbered.order_type, OrderType::Sell);
    }

    #[test]
    fn unknown_order_type_is_an_error() {
        let result = serde_json::from_str::<SpotOrderWire>(
            r#"{"order_info":{"subaccount_id":"0xb31629e5789a69ba6e613369ec965e8ec19e57cf000000000000000000000001","price":"1","quantity":"1"},"order_type":"SIDEWAYS","fillable":"1"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn position_accepts_camel_case_direction() {
        let json = r#"{
            "position": {
                "isLong": true,
                "quantity": "2.5",
                "entry_price": "100.0",
                "margin": "50.0",
                "cumulative_funding_entry": "0.0001"
            },
            "subaccount_id": "ERERERERERERERERERERERERERERERERERERERERERE="
        }"#;
        let wire: SubaccountPositionWire = serde_json::from_str(json).unwrap();
        let position = wire.into_position("0xmarket");
        assert!(position.is_long);
        assert_eq!(position.market_id, "0xmarket");
        assert_eq!(position.quantity.to_string(), "2.5");
    }
}
