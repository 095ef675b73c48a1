//! Event Decoder
//!
//! Stateless conversion of raw block events into [`DecodedRecord`]s.
//!
//! Each entry point checks the event's type tag first and fails with
//! [`DecodeError::UnexpectedTopic`] on a mismatch. Attribute payloads are
//! parsed completely; any malformed attribute fails the whole event with
//! [`DecodeError::DecodeFailure`] naming the attribute, so a partial record
//! is never produced.
//!
//! [`decode_event`] dispatches on the tag and is what the publisher uses.

mod wire;

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::domain::events::{EventTopic, RawEvent};
use crate::domain::records::{
    ChainDecimal, DecodedRecord, DerivativeLimitOrder, DerivativeOrderUpdate, DerivativeTrade,
    OraclePrice, OracleType, OrderUpdateStatus, Position, SpotLimitOrder, SpotOrderUpdate,
    SpotTrade, SubaccountDeposit, SubaccountDeposits, SubaccountId,
};

use self::wire::{
    DepositUpdateWire, DerivativeOrderWire, DerivativeTradeLogWire, MarketOrderCancelWire,
    PythPriceWire, SpotOrderWire, SubaccountPositionWire, TradeLogWire, parse_decimal,
};

/// Decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The event tag is not the one the entry point decodes.
    #[error("unexpected topic: {0}")]
    UnexpectedTopic(String),

    /// An attribute is missing or malformed.
    #[error("failed to decode {field}: {cause}")]
    DecodeFailure {
        /// Attribute name.
        field: String,
        /// Underlying parse error.
        cause: String,
    },
}

impl DecodeError {
    fn failure(field: &str, cause: impl ToString) -> Self {
        Self::DecodeFailure {
            field: field.to_owned(),
            cause: cause.to_string(),
        }
    }
}

// =============================================================================
// Attribute Access
// =============================================================================

fn expect_topic(event: &RawEvent, topic: EventTopic) -> Result<(), DecodeError> {
    if event.kind == topic.tag() {
        Ok(())
    } else {
        Err(DecodeError::UnexpectedTopic(event.kind.clone()))
    }
}

fn required<T: DeserializeOwned>(event: &RawEvent, key: &str) -> Result<T, DecodeError> {
    let raw = event
        .attribute(key)
        .ok_or_else(|| DecodeError::failure(key, "missing attribute"))?;
    serde_json::from_str(raw).map_err(|e| DecodeError::failure(key, e))
}

/// Absent attributes and JSON `null` both decode to `None`.
fn optional<T: DeserializeOwned>(event: &RawEvent, key: &str) -> Result<Option<T>, DecodeError> {
    event.attribute(key).map_or(Ok(None), |raw| {
        serde_json::from_str::<Option<T>>(raw).map_err(|e| DecodeError::failure(key, e))
    })
}

fn required_decimal(event: &RawEvent, key: &str) -> Result<ChainDecimal, DecodeError> {
    let text: String = required(event, key)?;
    parse_decimal(&text).map_err(|e| DecodeError::failure(key, e))
}

/// A nullable decimal, sent either as a JSON string or a bare number.
fn optional_decimal(event: &RawEvent, key: &str) -> Result<Option<ChainDecimal>, DecodeError> {
    let text = match optional::<serde_json::Value>(event, key)? {
        None => return Ok(None),
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Number(number)) => number.to_string(),
        Some(other) => {
            return Err(DecodeError::failure(key, format!("expected a decimal, got {other}")));
        }
    };
    parse_decimal(&text)
        .map(Some)
        .map_err(|e| DecodeError::failure(key, e))
}

// =============================================================================
// Deposits
// =============================================================================

/// Decode a batched deposit update, regrouped per subaccount.
///
/// Subaccounts appear in first-appearance order, each carrying its denoms in
/// the order they were listed. A missing `deposit_updates` attribute yields
/// an empty list.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_subaccount_deposits(event: &RawEvent) -> Result<Vec<SubaccountDeposits>, DecodeError> {
    expect_topic(event, EventTopic::SubaccountDeposit)?;

    let updates: Vec<DepositUpdateWire> = optional(event, "deposit_updates")?.unwrap_or_default();

    let mut grouped: Vec<SubaccountDeposits> = Vec::new();
    let mut positions: HashMap<SubaccountId, usize> = HashMap::new();

    for update in updates {
        for entry in update.deposits {
            let slot = *positions.entry(entry.subaccount_id).or_insert_with(|| {
                grouped.push(SubaccountDeposits {
                    subaccount_id: entry.subaccount_id,
                    deposits: Vec::new(),
                });
                grouped.len() - 1
            });
            grouped[slot].deposits.push(SubaccountDeposit {
                denom: update.denom.clone(),
                deposit: entry.deposit.into(),
            });
        }
    }

    Ok(grouped)
}

// =============================================================================
// Orders
// =============================================================================

fn spot_update(
    status: OrderUpdateStatus,
    market_id: &str,
    order: SpotLimitOrder,
) -> SpotOrderUpdate {
    SpotOrderUpdate {
        status,
        order_hash: order.order_hash.clone(),
        cid: order.order_info.cid.clone(),
        market_id: market_id.to_owned(),
        order,
    }
}

fn derivative_update(
    status: OrderUpdateStatus,
    market_id: &str,
    order: DerivativeLimitOrder,
    is_market: bool,
) -> DerivativeOrderUpdate {
    DerivativeOrderUpdate {
        status,
        order_hash: order.order_hash.clone(),
        cid: order.order_info.cid.clone(),
        market_id: market_id.to_owned(),
        order,
        is_market,
    }
}

/// Decode newly booked spot orders, buys first then sells.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_new_spot_orders(event: &RawEvent) -> Result<Vec<SpotOrderUpdate>, DecodeError> {
    expect_topic(event, EventTopic::SpotOrders)?;

    let market_id: String = required(event, "market_id")?;
    let buys: Vec<SpotOrderWire> = optional(event, "buy_orders")?.unwrap_or_default();
    let sells: Vec<SpotOrderWire> = optional(event, "sell_orders")?.unwrap_or_default();

    Ok(buys
        .into_iter()
        .chain(sells)
        .map(|order| spot_update(OrderUpdateStatus::Booked, &market_id, order.into()))
        .collect())
}

/// Decode a cancelled spot order.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_cancel_spot_order(event: &RawEvent) -> Result<SpotOrderUpdate, DecodeError> {
    expect_topic(event, EventTopic::CancelSpotOrder)?;

    let market_id: String = required(event, "market_id")?;
    let order: SpotOrderWire = required(event, "order")?;

    Ok(spot_update(
        OrderUpdateStatus::Cancelled,
        &market_id,
        order.into(),
    ))
}

/// Decode newly booked derivative orders, buys first then sells.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_new_derivative_orders(
    event: &RawEvent,
) -> Result<Vec<DerivativeOrderUpdate>, DecodeError> {
    expect_topic(event, EventTopic::DerivativeOrders)?;

    let market_id: String = required(event, "market_id")?;
    let buys: Vec<DerivativeOrderWire> = optional(event, "buy_orders")?.unwrap_or_default();
    let sells: Vec<DerivativeOrderWire> = optional(event, "sell_orders")?.unwrap_or_default();

    Ok(buys
        .into_iter()
        .chain(sells)
        .map(|order| {
            derivative_update(OrderUpdateStatus::Booked, &market_id, order.into(), false)
        })
        .collect())
}

/// Decode a cancelled derivative order.
///
/// Limit cancels carry the order in `limit_order`. Market cancels carry it in
/// `market_order_cancel`, with the cancelled quantity reported as `fillable`.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_cancel_derivative_order(
    event: &RawEvent,
) -> Result<DerivativeOrderUpdate, DecodeError> {
    expect_topic(event, EventTopic::CancelDerivativeOrder)?;

    let market_id: String = required(event, "market_id")?;
    let is_limit_cancel: bool = optional(event, "isLimitCancel")?.unwrap_or(false);

    if is_limit_cancel {
        let order: DerivativeOrderWire = required(event, "limit_order")?;
        Ok(derivative_update(
            OrderUpdateStatus::Cancelled,
            &market_id,
            order.into(),
            false,
        ))
    } else {
        let cancel: MarketOrderCancelWire = required(event, "market_order_cancel")?;
        Ok(derivative_update(
            OrderUpdateStatus::Cancelled,
            &market_id,
            cancel.into(),
            true,
        ))
    }
}

// =============================================================================
// Trades and Positions
// =============================================================================

/// Decode spot fills. Trade IDs are left empty for the aggregator.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_spot_trades(event: &RawEvent) -> Result<Vec<SpotTrade>, DecodeError> {
    expect_topic(event, EventTopic::BatchSpotExecution)?;

    let market_id: String = required(event, "market_id")?;
    let is_buy: bool = optional(event, "is_buy")?.unwrap_or(false);
    let execution_type: String = optional(event, "executionType")?.unwrap_or_default();
    let trades: Vec<TradeLogWire> = optional(event, "trades")?.unwrap_or_default();

    Ok(trades
        .into_iter()
        .map(|trade| SpotTrade {
            market_id: market_id.clone(),
            is_buy,
            execution_type: execution_type.clone(),
            quantity: trade.quantity,
            price: trade.price,
            subaccount_id: trade.subaccount_id,
            fee: trade.fee,
            order_hash: trade.order_hash,
            fee_recipient_address: trade.fee_recipient_address,
            cid: trade.cid,
            trade_id: String::new(),
        })
        .collect())
}

/// Decode derivative fills. Trade IDs are left empty for the aggregator.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_derivative_trades(event: &RawEvent) -> Result<Vec<DerivativeTrade>, DecodeError> {
    expect_topic(event, EventTopic::BatchDerivativeExecution)?;

    let market_id: String = required(event, "market_id")?;
    let is_buy: bool = optional(event, "is_buy")?.unwrap_or(false);
    let is_liquidation: bool = optional(event, "is_liquidation")?.unwrap_or(false);
    let cumulative_funding = optional_decimal(event, "cumulative_funding")?;
    let execution_type: String = optional(event, "executionType")?.unwrap_or_default();
    let trades: Vec<DerivativeTradeLogWire> = optional(event, "trades")?.unwrap_or_default();

    Ok(trades
        .into_iter()
        .map(|trade| DerivativeTrade {
            market_id: market_id.clone(),
            is_buy,
            execution_type: execution_type.clone(),
            subaccount_id: trade.subaccount_id,
            position_delta: trade.position_delta.map(Into::into),
            payout: trade.payout,
            fee: trade.fee,
            order_hash: trade.order_hash,
            fee_recipient_address: trade.fee_recipient_address,
            cid: trade.cid,
            trade_id: String::new(),
            is_liquidation,
            cumulative_funding: cumulative_funding.clone(),
        })
        .collect())
}

/// Decode derivative position snapshots.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_positions(event: &RawEvent) -> Result<Vec<Position>, DecodeError> {
    expect_topic(event, EventTopic::BatchDerivativePosition)?;

    let market_id: String = required(event, "market_id")?;
    let positions: Vec<SubaccountPositionWire> = optional(event, "positions")?.unwrap_or_default();

    Ok(positions
        .into_iter()
        .map(|wire| wire.into_position(&market_id))
        .collect())
}

// =============================================================================
// Oracle Prices
// =============================================================================

/// Decode Pyth prices. The symbol is the price feed ID, the price its EMA.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_pyth_prices(event: &RawEvent) -> Result<Vec<OraclePrice>, DecodeError> {
    expect_topic(event, EventTopic::PythPrices)?;

    let prices: Vec<PythPriceWire> = optional(event, "prices")?.unwrap_or_default();

    Ok(prices
        .into_iter()
        .map(|price| OraclePrice {
            symbol: price.price_id,
            price: price.ema_price,
            oracle_type: OracleType::Pyth,
        })
        .collect())
}

/// Decode Band IBC prices from the parallel `symbols` and `prices` lists.
///
/// # Errors
///
/// Returns an error on a tag mismatch, a malformed payload, or lists of
/// different lengths.
pub fn decode_band_ibc_prices(event: &RawEvent) -> Result<Vec<OraclePrice>, DecodeError> {
    expect_topic(event, EventTopic::BandIbcPrices)?;

    let symbols: Vec<String> = optional(event, "symbols")?.unwrap_or_default();
    let prices: Vec<String> = optional(event, "prices")?.unwrap_or_default();

    if symbols.len() != prices.len() {
        return Err(DecodeError::failure(
            "prices",
            format!("{} prices for {} symbols", prices.len(), symbols.len()),
        ));
    }

    symbols
        .into_iter()
        .zip(prices)
        .map(|(symbol, price)| {
            Ok(OraclePrice {
                symbol,
                price: parse_decimal(&price).map_err(|e| DecodeError::failure("prices", e))?,
                oracle_type: OracleType::BandIbc,
            })
        })
        .collect()
}

/// Decode a provider price.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_provider_price(event: &RawEvent) -> Result<OraclePrice, DecodeError> {
    expect_topic(event, EventTopic::ProviderPrice)?;

    Ok(OraclePrice {
        symbol: required(event, "symbol")?,
        price: required_decimal(event, "price")?,
        oracle_type: OracleType::Provider,
    })
}

/// Decode a price feeder price. The symbol is the base asset.
///
/// # Errors
///
/// Returns an error on a tag mismatch or a malformed payload.
pub fn decode_price_feed_price(event: &RawEvent) -> Result<OraclePrice, DecodeError> {
    expect_topic(event, EventTopic::PriceFeedPrice)?;

    Ok(OraclePrice {
        symbol: required(event, "base")?,
        price: required_decimal(event, "price")?,
        oracle_type: OracleType::PriceFeed,
    })
}

// =============================================================================
// Dispatch
// =============================================================================

/// Decode any supported event into its records, in payload order.
///
/// # Errors
///
/// Returns [`DecodeError::UnexpectedTopic`] for unknown tags and
/// [`DecodeError::DecodeFailure`] for malformed payloads.
pub fn decode_event(event: &RawEvent) -> Result<Vec<DecodedRecord>, DecodeError> {
    let topic = EventTopic::from_tag(&event.kind)
        .ok_or_else(|| DecodeError::UnexpectedTopic(event.kind.clone()))?;

    let records = match topic {
        EventTopic::SubaccountDeposit => decode_subaccount_deposits(event)?
            .into_iter()
            .map(DecodedRecord::SubaccountDepositUpdate)
            .collect(),
        EventTopic::SpotOrders => decode_new_spot_orders(event)?
            .into_iter()
            .map(DecodedRecord::SpotOrderUpdate)
            .collect(),
        EventTopic::DerivativeOrders => decode_new_derivative_orders(event)?
            .into_iter()
            .map(DecodedRecord::DerivativeOrderUpdate)
            .collect(),
        EventTopic::CancelSpotOrder => {
            vec![DecodedRecord::SpotOrderUpdate(decode_cancel_spot_order(event)?)]
        }
        EventTopic::CancelDerivativeOrder => vec![DecodedRecord::DerivativeOrderUpdate(
            decode_cancel_derivative_order(event)?,
        )],
        EventTopic::BatchSpotExecution => decode_spot_trades(event)?
            .into_iter()
            .map(DecodedRecord::SpotTrade)
            .collect(),
        EventTopic::BatchDerivativeExecution => decode_derivative_trades(event)?
            .into_iter()
            .map(DecodedRecord::DerivativeTrade)
            .collect(),
        EventTopic::BatchDerivativePosition => decode_positions(event)?
            .into_iter()
            .map(DecodedRecord::Position)
            .collect(),
        EventTopic::PythPrices => decode_pyth_prices(event)?
            .into_iter()
            .map(DecodedRecord::OraclePrice)
            .collect(),
        EventTopic::BandIbcPrices => decode_band_ibc_prices(event)?
            .into_iter()
            .map(DecodedRecord::OraclePrice)
            .collect(),
        EventTopic::ProviderPrice => {
            vec![DecodedRecord::OraclePrice(decode_provider_price(event)?)]
        }
        EventTopic::PriceFeedPrice => {
            vec![DecodedRecord::OraclePrice(decode_price_feed_price(event)?)]
        }
    };

    Ok(records)
}

// =============================================================================
// Tests
// =============================================================================
