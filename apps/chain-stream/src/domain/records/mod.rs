//! Decoded Records
//!
//! Strict domain records produced by the event decoder. Every record is
//! immutable once created and carries canonical identifiers:
//!
//! - **Subaccount IDs**: 32-byte identifiers rendered as `0x` + 64 lowercase hex digits
//! - **Order hashes**: `0x`-prefixed lowercase hex
//! - **Prices and quantities**: exact [`ChainDecimal`] values (scale preserved)
//!
//! [`DecodedRecord`] is the closed set of everything one raw event can decode into.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The input is not valid hexadecimal.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A hex identifier with the wrong number of digits.
    #[error("expected 64 hex digits, got {0}")]
    WrongLength(usize),

    /// A byte identifier longer than 32 bytes.
    #[error("identifier is {0} bytes, expected at most 32")]
    TooLong(usize),
}

/// A 32-byte subaccount identifier.
///
/// Displays as `0x` followed by 64 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubaccountId([u8; 32]);

impl SubaccountId {
    /// Identifier width in bytes.
    pub const LEN: usize = 32;

    /// Wrap raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build from a byte slice, left-padding shorter inputs with zeros.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::TooLong`] if the slice exceeds 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentifierError> {
        if bytes.len() > Self::LEN {
            return Err(IdentifierError::TooLong(bytes.len()));
        }
        let mut out = [0_u8; 32];
        out[Self::LEN - bytes.len()..].copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Parse a hex identifier, with or without the `0x` prefix.
    ///
    /// Exactly 64 hex digits are required. Case is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the digit count is wrong or a digit is not hex.
    pub fn from_hex(text: &str) -> Result<Self, IdentifierError> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        if digits.len() != Self::LEN * 2 {
            return Err(IdentifierError::WrongLength(digits.len()));
        }
        let mut out = [0_u8; 32];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|e| IdentifierError::InvalidHex(e.to_string()))?;
        Ok(Self(out))
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for SubaccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SubaccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubaccountId({self})")
    }
}

impl FromStr for SubaccountId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// =============================================================================
// Decimals
// =============================================================================

/// A decimal string that is not a number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal {input:?}: {reason}")]
pub struct DecimalError {
    input: String,
    reason: String,
}

/// An exact chain decimal.
///
/// Chain amounts are 18-place fixed-point values with an unbounded integer
/// part, so base-unit balances routinely exceed 28 significant digits. The
/// parsed scale is kept: `"1.500"` displays as `"1.500"`. Equality is
/// numeric.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainDecimal(BigDecimal);

impl ChainDecimal {
    /// Digits after the decimal point.
    #[must_use]
    pub fn scale(&self) -> i64 {
        self.0.as_bigint_and_exponent().1
    }

    /// Underlying arbitrary-precision value.
    #[must_use]
    pub const fn as_big_decimal(&self) -> &BigDecimal {
        &self.0
    }
}

impl FromStr for ChainDecimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let error = |reason: String| DecimalError {
            input: s.to_owned(),
            reason,
        };
        if text.is_empty() {
            return Err(error("empty".to_owned()));
        }
        if text.contains(['e', 'E']) {
            return Err(error("exponent notation".to_owned()));
        }
        BigDecimal::from_str(text)
            .map(Self)
            .map_err(|e| error(e.to_string()))
    }
}

impl fmt::Display for ChainDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_plain_string())
    }
}

impl fmt::Debug for ChainDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainDecimal({self})")
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Exchange order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    /// Unspecified.
    Unspecified,
    /// Limit buy.
    Buy,
    /// Limit sell.
    Sell,
    /// Stop-loss buy.
    StopBuy,
    /// Stop-loss sell.
    StopSell,
    /// Take-profit buy.
    TakeBuy,
    /// Take-profit sell.
    TakeSell,
    /// Post-only buy.
    BuyPo,
    /// Post-only sell.
    SellPo,
    /// Atomic buy.
    BuyAtomic,
    /// Atomic sell.
    SellAtomic,
}

impl OrderType {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::StopBuy => "STOP_BUY",
            Self::StopSell => "STOP_SELL",
            Self::TakeBuy => "TAKE_BUY",
            Self::TakeSell => "TAKE_SELL",
            Self::BuyPo => "BUY_PO",
            Self::SellPo => "SELL_PO",
            Self::BuyAtomic => "BUY_ATOMIC",
            Self::SellAtomic => "SELL_ATOMIC",
        }
    }

    /// Look up by canonical name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let order_type = match name {
            "UNSPECIFIED" => Self::Unspecified,
            "BUY" => Self::Buy,
            "SELL" => Self::Sell,
            "STOP_BUY" => Self::StopBuy,
            "STOP_SELL" => Self::StopSell,
            "TAKE_BUY" => Self::TakeBuy,
            "TAKE_SELL" => Self::TakeSell,
            "BUY_PO" => Self::BuyPo,
            "SELL_PO" => Self::SellPo,
            "BUY_ATOMIC" => Self::BuyAtomic,
            "SELL_ATOMIC" => Self::SellAtomic,
            _ => return None,
        };
        Some(order_type)
    }

    /// Look up by protobuf enum number.
    #[must_use]
    pub const fn from_number(number: i64) -> Option<Self> {
        let order_type = match number {
            0 => Self::Unspecified,
            1 => Self::Buy,
            2 => Self::Sell,
            3 => Self::StopBuy,
            4 => Self::StopSell,
            5 => Self::TakeBuy,
            6 => Self::TakeSell,
            7 => Self::BuyPo,
            8 => Self::SellPo,
            9 => Self::BuyAtomic,
            10 => Self::SellAtomic,
            _ => return None,
        };
        Some(order_type)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status carried by an order update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderUpdateStatus {
    /// Order rested on the book.
    Booked,
    /// Order matched (fully or partially).
    Matched,
    /// Order cancelled.
    Cancelled,
}

/// Common order fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderInfo {
    /// Owning subaccount.
    pub subaccount_id: SubaccountId,
    /// Fee recipient address (bech32).
    pub fee_recipient: String,
    /// Limit price.
    pub price: ChainDecimal,
    /// Order quantity.
    pub quantity: ChainDecimal,
    /// Client order ID.
    pub cid: String,
}

/// A spot limit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotLimitOrder {
    /// Common order fields.
    pub order_info: OrderInfo,
    /// Order type.
    pub order_type: OrderType,
    /// Remaining fillable quantity.
    pub fillable: ChainDecimal,
    /// Trigger price for conditional orders. `None` when absent.
    pub trigger_price: Option<ChainDecimal>,
    /// Order hash.
    pub order_hash: String,
}

/// A spot order state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotOrderUpdate {
    /// New status.
    pub status: OrderUpdateStatus,
    /// Order hash.
    pub order_hash: String,
    /// Client order ID.
    pub cid: String,
    /// Market the order belongs to.
    pub market_id: String,
    /// Order snapshot.
    pub order: SpotLimitOrder,
}

/// A derivative limit (or market) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeLimitOrder {
    /// Common order fields.
    pub order_info: OrderInfo,
    /// Order type.
    pub order_type: OrderType,
    /// Posted margin.
    pub margin: ChainDecimal,
    /// Remaining fillable quantity.
    pub fillable: ChainDecimal,
    /// Trigger price for conditional orders. `None` when absent.
    pub trigger_price: Option<ChainDecimal>,
    /// Order hash.
    pub order_hash: String,
}

/// A derivative order state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeOrderUpdate {
    /// New status.
    pub status: OrderUpdateStatus,
    /// Order hash.
    pub order_hash: String,
    /// Client order ID.
    pub cid: String,
    /// Market the order belongs to.
    pub market_id: String,
    /// Order snapshot.
    pub order: DerivativeLimitOrder,
    /// True for market orders.
    pub is_market: bool,
}

// =============================================================================
// Trades and Positions
// =============================================================================

/// One spot fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotTrade {
    /// Market.
    pub market_id: String,
    /// Buy side.
    pub is_buy: bool,
    /// Execution type label, e.g. `LimitFill`.
    pub execution_type: String,
    /// Filled quantity.
    pub quantity: ChainDecimal,
    /// Fill price.
    pub price: ChainDecimal,
    /// Trading subaccount.
    pub subaccount_id: SubaccountId,
    /// Fee paid.
    pub fee: ChainDecimal,
    /// Order hash.
    pub order_hash: String,
    /// Fee recipient address (bech32).
    pub fee_recipient_address: String,
    /// Client order ID.
    pub cid: String,
    /// `"{height}_{index}"`, assigned during aggregation. Empty before.
    pub trade_id: String,
}

/// Position change caused by a derivative fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionDelta {
    /// Long side.
    pub is_long: bool,
    /// Executed quantity.
    pub execution_quantity: ChainDecimal,
    /// Margin committed.
    pub execution_margin: ChainDecimal,
    /// Execution price.
    pub execution_price: ChainDecimal,
}

/// One derivative fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeTrade {
    /// Market.
    pub market_id: String,
    /// Buy side.
    pub is_buy: bool,
    /// Execution type label.
    pub execution_type: String,
    /// Trading subaccount.
    pub subaccount_id: SubaccountId,
    /// Position change, when reported.
    pub position_delta: Option<PositionDelta>,
    /// Payout.
    pub payout: ChainDecimal,
    /// Fee paid.
    pub fee: ChainDecimal,
    /// Order hash.
    pub order_hash: String,
    /// Fee recipient address (bech32).
    pub fee_recipient_address: String,
    /// Client order ID.
    pub cid: String,
    /// `"{height}_{index}"`, assigned during aggregation. Empty before.
    pub trade_id: String,
    /// Fill came from a liquidation.
    pub is_liquidation: bool,
    /// Market cumulative funding at execution. `None` when not reported.
    pub cumulative_funding: Option<ChainDecimal>,
}

/// Derivative position snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Market.
    pub market_id: String,
    /// Holder.
    pub subaccount_id: SubaccountId,
    /// Long side.
    pub is_long: bool,
    /// Position size.
    pub quantity: ChainDecimal,
    /// Average entry price.
    pub entry_price: ChainDecimal,
    /// Posted margin.
    pub margin: ChainDecimal,
    /// Cumulative funding at entry.
    pub cumulative_funding_entry: ChainDecimal,
}

// =============================================================================
// Balances and Prices
// =============================================================================

/// Balance pair for one denom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    /// Balance not locked in orders.
    pub available_balance: ChainDecimal,
    /// Total balance.
    pub total_balance: ChainDecimal,
}

/// Balance of one denom inside a subaccount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubaccountDeposit {
    /// Asset denomination.
    pub denom: String,
    /// Balances.
    pub deposit: Deposit,
}

/// All balance changes of one subaccount within one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubaccountDeposits {
    /// Subaccount.
    pub subaccount_id: SubaccountId,
    /// Per-denom balances in first-appearance order.
    pub deposits: Vec<SubaccountDeposit>,
}

/// Oracle source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleType {
    /// Pyth network.
    Pyth,
    /// Band protocol over IBC.
    BandIbc,
    /// Registered price provider.
    Provider,
    /// Price feeder.
    PriceFeed,
}

impl OracleType {
    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pyth => "pyth",
            Self::BandIbc => "bandibc",
            Self::Provider => "provider",
            Self::PriceFeed => "pricefeed",
        }
    }
}

impl fmt::Display for OracleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A price published by an oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OraclePrice {
    /// Symbol or price feed ID.
    pub symbol: String,
    /// Price.
    pub price: ChainDecimal,
    /// Source.
    pub oracle_type: OracleType,
}

// =============================================================================
// Decoded Record
// =============================================================================

/// Typed result of decoding one raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedRecord {
    /// Balance changes of one subaccount.
    SubaccountDepositUpdate(SubaccountDeposits),
    /// Spot order booked or cancelled.
    SpotOrderUpdate(SpotOrderUpdate),
    /// Derivative order booked or cancelled.
    DerivativeOrderUpdate(DerivativeOrderUpdate),
    /// Spot fill.
    SpotTrade(SpotTrade),
    /// Derivative fill.
    DerivativeTrade(DerivativeTrade),
    /// Derivative position snapshot.
    Position(Position),
    /// Oracle price.
    OraclePrice(OraclePrice),
}

impl DecodedRecord {
    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SubaccountDepositUpdate(_) => "subaccount_deposit",
            Self::SpotOrderUpdate(_) => "spot_order",
            Self::DerivativeOrderUpdate(_) => "derivative_order",
            Self::SpotTrade(_) => "spot_trade",
            Self::DerivativeTrade(_) => "derivative_trade",
            Self::Position(_) => "position",
            Self::OraclePrice(_) => "oracle_price",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
