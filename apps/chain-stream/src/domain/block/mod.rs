//! Block Aggregation
//!
//! Folds the decoded records of one block into a single [`BlockResponse`].
//!
//! # Layout
//!
//! Trades, order updates and positions are kept twice, by market ID and by
//! canonical subaccount ID, as shared [`Arc`] values. The two indices are the
//! two dimensions [`filter_multi`] selects over. Deposits and oracle prices
//! are flat lists.
//!
//! # Trade IDs
//!
//! A single counter per block numbers every spot and derivative trade in
//! decode order, giving IDs `"{height}_{index}"`. Aggregating the same batch
//! twice yields equal responses.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::filter::{FilterError, filter_multi};
use crate::domain::records::{
    DecodedRecord, DerivativeOrderUpdate, DerivativeTrade, OraclePrice, Position, SpotOrderUpdate,
    SpotTrade, SubaccountDeposits, SubaccountId,
};
use crate::domain::subscription::StreamFilter;

// =============================================================================
// Keyed Records
// =============================================================================

/// A record addressable by market and subaccount.
pub trait Keyed {
    /// Market the record belongs to.
    fn market_id(&self) -> &str;
    /// Subaccount the record belongs to.
    fn subaccount_id(&self) -> SubaccountId;
}

impl Keyed for SpotTrade {
    fn market_id(&self) -> &str {
        &self.market_id
    }
    fn subaccount_id(&self) -> SubaccountId {
        self.subaccount_id
    }
}

impl Keyed for DerivativeTrade {
    fn market_id(&self) -> &str {
        &self.market_id
    }
    fn subaccount_id(&self) -> SubaccountId {
        self.subaccount_id
    }
}

impl Keyed for SpotOrderUpdate {
    fn market_id(&self) -> &str {
        &self.market_id
    }
    fn subaccount_id(&self) -> SubaccountId {
        self.order.order_info.subaccount_id
    }
}

impl Keyed for DerivativeOrderUpdate {
    fn market_id(&self) -> &str {
        &self.market_id
    }
    fn subaccount_id(&self) -> SubaccountId {
        self.order.order_info.subaccount_id
    }
}

impl Keyed for Position {
    fn market_id(&self) -> &str {
        &self.market_id
    }
    fn subaccount_id(&self) -> SubaccountId {
        self.subaccount_id
    }
}

/// One record set indexed by market and by subaccount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedRecords<T> {
    by_market: BTreeMap<String, Vec<Arc<T>>>,
    by_subaccount: BTreeMap<String, Vec<Arc<T>>>,
    len: usize,
}

impl<T> Default for KeyedRecords<T> {
    fn default() -> Self {
        Self {
            by_market: BTreeMap::new(),
            by_subaccount: BTreeMap::new(),
            len: 0,
        }
    }
}

impl<T: Keyed> KeyedRecords<T> {
    /// Append a record to both indices.
    pub fn push(&mut self, record: T) {
        let record = Arc::new(record);
        self.by_market
            .entry(record.market_id().to_owned())
            .or_default()
            .push(Arc::clone(&record));
        self.by_subaccount
            .entry(record.subaccount_id().to_string())
            .or_default()
            .push(record);
        self.len += 1;
    }
}

impl<T> KeyedRecords<T> {
    /// Records by market ID, each list in decode order.
    #[must_use]
    pub const fn by_market(&self) -> &BTreeMap<String, Vec<Arc<T>>> {
        &self.by_market
    }

    /// Records by canonical subaccount ID, each list in decode order.
    #[must_use]
    pub const fn by_subaccount(&self) -> &BTreeMap<String, Vec<Arc<T>>> {
        &self.by_subaccount
    }

    /// Records of one market.
    #[must_use]
    pub fn market(&self, market_id: &str) -> &[Arc<T>] {
        self.by_market
            .get(market_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when there are no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Records matching both dimensions of `filter`.
    ///
    /// # Errors
    ///
    /// Propagates [`FilterError`] from [`filter_multi`].
    pub fn select(&self, filter: &StreamFilter) -> Result<Vec<Arc<T>>, FilterError> {
        filter_multi(
            &self.by_market,
            &self.by_subaccount,
            filter.market_ids(),
            filter.subaccount_ids(),
        )
    }
}

// =============================================================================
// Block Response
// =============================================================================

/// Aggregate of every record decoded from one block.
///
/// Immutable once handed to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResponse {
    height: u64,
    subaccount_deposits: Vec<SubaccountDeposits>,
    spot_orders: KeyedRecords<SpotOrderUpdate>,
    derivative_orders: KeyedRecords<DerivativeOrderUpdate>,
    spot_trades: KeyedRecords<SpotTrade>,
    derivative_trades: KeyedRecords<DerivativeTrade>,
    positions: KeyedRecords<Position>,
    oracle_prices: Vec<OraclePrice>,
    next_trade_index: u64,
}

impl BlockResponse {
    /// Empty response for `height`.
    #[must_use]
    pub fn new(height: u64) -> Self {
        Self {
            height,
            subaccount_deposits: Vec::new(),
            spot_orders: KeyedRecords::default(),
            derivative_orders: KeyedRecords::default(),
            spot_trades: KeyedRecords::default(),
            derivative_trades: KeyedRecords::default(),
            positions: KeyedRecords::default(),
            oracle_prices: Vec::new(),
            next_trade_index: 0,
        }
    }

    /// Aggregate `records` in order.
    #[must_use]
    pub fn aggregate(height: u64, records: impl IntoIterator<Item = DecodedRecord>) -> Self {
        let mut response = Self::new(height);
        for record in records {
            response.push(record);
        }
        response
    }

    /// Aggregate per-event decode results, aborting on the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error in `results`. No partial response escapes.
    pub fn try_aggregate<I, R, E>(height: u64, results: I) -> Result<Self, E>
    where
        I: IntoIterator<Item = Result<R, E>>,
        R: IntoIterator<Item = DecodedRecord>,
    {
        let mut response = Self::new(height);
        for records in results {
            for record in records? {
                response.push(record);
            }
        }
        Ok(response)
    }

    /// Add one record, numbering trades.
    pub fn push(&mut self, record: DecodedRecord) {
        match record {
            DecodedRecord::SubaccountDepositUpdate(deposits) => {
                self.subaccount_deposits.push(deposits);
            }
            DecodedRecord::SpotOrderUpdate(update) => self.spot_orders.push(update),
            DecodedRecord::DerivativeOrderUpdate(update) => self.derivative_orders.push(update),
            DecodedRecord::SpotTrade(mut trade) => {
                trade.trade_id = self.next_trade_id();
                self.spot_trades.push(trade);
            }
            DecodedRecord::DerivativeTrade(mut trade) => {
                trade.trade_id = self.next_trade_id();
                self.derivative_trades.push(trade);
            }
            DecodedRecord::Position(position) => self.positions.push(position),
            DecodedRecord::OraclePrice(price) => self.oracle_prices.push(price),
        }
    }

    fn next_trade_id(&mut self) -> String {
        let id = format!("{}_{}", self.height, self.next_trade_index);
        self.next_trade_index += 1;
        id
    }

    /// Block height.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }

    /// Deposit updates in decode order.
    #[must_use]
    pub fn subaccount_deposits(&self) -> &[SubaccountDeposits] {
        &self.subaccount_deposits
    }

    /// Spot order updates.
    #[must_use]
    pub const fn spot_orders(&self) -> &KeyedRecords<SpotOrderUpdate> {
        &self.spot_orders
    }

    /// Derivative order updates.
    #[must_use]
    pub const fn derivative_orders(&self) -> &KeyedRecords<DerivativeOrderUpdate> {
        &self.derivative_orders
    }

    /// Spot trades.
    #[must_use]
    pub const fn spot_trades(&self) -> &KeyedRecords<SpotTrade> {
        &self.spot_trades
    }

    /// Derivative trades.
    #[must_use]
    pub const fn derivative_trades(&self) -> &KeyedRecords<DerivativeTrade> {
        &self.derivative_trades
    }

    /// Position snapshots.
    #[must_use]
    pub const fn positions(&self) -> &KeyedRecords<Position> {
        &self.positions
    }

    /// Oracle prices in decode order.
    #[must_use]
    pub fn oracle_prices(&self) -> &[OraclePrice] {
        &self.oracle_prices
    }

    /// Total number of records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.subaccount_deposits.len()
            + self.spot_orders.len()
            + self.derivative_orders.len()
            + self.spot_trades.len()
            + self.derivative_trades.len()
            + self.positions.len()
            + self.oracle_prices.len()
    }

    /// Project the records one subscriber is entitled to.
    ///
    /// Deposits are matched on subaccount only. Oracle prices always pass.
    ///
    /// # Errors
    ///
    /// Propagates [`FilterError`] from the keyed selections.
    pub fn select(&self, filter: &StreamFilter) -> Result<BlockSelection<'_>, FilterError> {
        Ok(BlockSelection {
            height: self.height,
            subaccount_deposits: self
                .subaccount_deposits
                .iter()
                .filter(|deposits| filter.matches_subaccount(&deposits.subaccount_id))
                .collect(),
            spot_orders: self.spot_orders.select(filter)?,
            derivative_orders: self.derivative_orders.select(filter)?,
            spot_trades: self.spot_trades.select(filter)?,
            derivative_trades: self.derivative_trades.select(filter)?,
            positions: self.positions.select(filter)?,
            oracle_prices: &self.oracle_prices,
        })
    }
}

/// A filtered view of one [`BlockResponse`].
#[derive(Debug, Clone)]
pub struct BlockSelection<'a> {
    /// Block height.
    pub height: u64,
    /// Matching deposit updates.
    pub subaccount_deposits: Vec<&'a SubaccountDeposits>,
    /// Matching spot order updates.
    pub spot_orders: Vec<Arc<SpotOrderUpdate>>,
    /// Matching derivative order updates.
    pub derivative_orders: Vec<Arc<DerivativeOrderUpdate>>,
    /// Matching spot trades.
    pub spot_trades: Vec<Arc<SpotTrade>>,
    /// Matching derivative trades.
    pub derivative_trades: Vec<Arc<DerivativeTrade>>,
    /// Matching positions.
    pub positions: Vec<Arc<Position>>,
    /// All oracle prices.
    pub oracle_prices: &'a [OraclePrice],
}

// =============================================================================
// Tests
// =============================================================================
