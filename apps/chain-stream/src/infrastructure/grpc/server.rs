//! gRPC Streaming Server Implementation
//!
//! Implements the `ChainStreamService` gRPC service and the server lifecycle
//! around it.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::{Code, Request, Response, Status};
use tonic_types::{ErrorDetails, StatusExt};
use tracing::{debug, error, info, warn};

use super::proto::chainstream::v1::{
    self as proto, StreamRequest, StreamResponse,
    chain_stream_service_server::{ChainStreamService, ChainStreamServiceServer},
};
use crate::application::ports::FeedMessage;
use crate::domain::block::BlockSelection;
use crate::domain::records::{
    DerivativeOrderUpdate, DerivativeTrade, OraclePrice, OrderInfo, OrderUpdateStatus, Position,
    SpotOrderUpdate, SpotTrade, SubaccountDeposits,
};
use crate::domain::subscription::{StreamFilter, SubscriptionError};
use crate::infrastructure::broadcast::{CloseReason, SharedSubscriptionBus, Subscription};
use crate::infrastructure::metrics::{self, DropReason};

// =============================================================================
// Type Aliases
// =============================================================================

type StreamResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Status message sent to every client on graceful shutdown.
pub const SHUTDOWN_MESSAGE: &str = "chain stream server is shutting down";

/// Status message sent to an evicted slow client.
pub const SLOW_CONSUMER_MESSAGE: &str = "subscriber fell behind the chain stream";

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the gRPC streaming server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStreamServerConfig {
    /// Outbound responses buffered per client.
    pub client_buffer: usize,
}

impl Default for ChainStreamServerConfig {
    fn default() -> Self {
        Self { client_buffer: 64 }
    }
}

/// Server lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind gRPC listener on {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `serve` was called on a server that is already serving.
    #[error("gRPC server is already serving on {0}")]
    AlreadyServing(SocketAddr),

    /// `serve` was called after `stop`.
    #[error("gRPC server has been stopped")]
    Stopped,
}

// =============================================================================
// Service
// =============================================================================

/// The `ChainStreamService` RPC handler.
#[derive(Debug, Clone)]
pub struct StreamService {
    config: ChainStreamServerConfig,
    bus: SharedSubscriptionBus,
    active_streams: Arc<AtomicUsize>,
}

impl StreamService {
    /// Create a handler over `bus`.
    #[must_use]
    pub fn new(config: ChainStreamServerConfig, bus: SharedSubscriptionBus) -> Self {
        Self {
            config: ChainStreamServerConfig {
                client_buffer: config.client_buffer.max(1),
            },
            bus,
            active_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of open client streams.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::Relaxed)
    }
}

#[tonic::async_trait]
impl ChainStreamService for StreamService {
    type StreamStream = BoxedStream<StreamResponse>;

    async fn stream(&self, request: Request<StreamRequest>) -> StreamResult<Self::StreamStream> {
        let req = request.into_inner();
        let filter =
            StreamFilter::new(req.market_ids, req.subaccount_ids).map_err(invalid_filter)?;

        let subscription = self.bus.subscribe().map_err(|e| {
            debug!(error = %e, "Rejected subscription");
            Status::unavailable(SHUTDOWN_MESSAGE)
        })?;

        info!(
            subscription_id = %subscription.id(),
            markets = filter.market_ids().len(),
            subaccounts = filter.subaccount_ids().len(),
            "Client subscribed"
        );

        let (tx, rx) = mpsc::channel(self.config.client_buffer);
        let active = Arc::clone(&self.active_streams);
        metrics::set_grpc_streams(active.fetch_add(1, Ordering::Relaxed) + 1);

        tokio::spawn(async move {
            deliver(subscription, filter, tx).await;
            metrics::set_grpc_streams(active.fetch_sub(1, Ordering::Relaxed) - 1);
        });

        let stream = ReceiverStream::new(rx);
        Ok(Response::new(Box::pin(stream) as Self::StreamStream))
    }
}

fn invalid_filter(error: SubscriptionError) -> Status {
    let details = ErrorDetails::with_bad_request_violation(error.field(), error.to_string());
    Status::with_error_details(Code::InvalidArgument, error.to_string(), details)
}

/// Per-client delivery loop.
async fn deliver(
    mut subscription: Subscription,
    filter: StreamFilter,
    tx: mpsc::Sender<Result<StreamResponse, Status>>,
) {
    let id = subscription.id();
    let mut sent = 0_u64;

    let end = loop {
        let message = tokio::select! {
            () = tx.closed() => break None,
            message = subscription.recv() => message,
        };

        match message {
            Some(FeedMessage::Block(block)) => {
                let response = match block.select(&filter) {
                    Ok(selection) => selection_to_proto(&selection),
                    Err(e) => {
                        warn!(subscription_id = %id, height = block.height(), error = %e, "Filter failed");
                        break Some(Status::internal(e.to_string()));
                    }
                };
                if tx.send(Ok(response)).await.is_err() {
                    break None;
                }
                sent += 1;
                metrics::record_messages_sent(1);
            }
            Some(FeedMessage::Terminal(e)) => break Some(Status::internal(e.to_string())),
            None => {
                break Some(match subscription.close_reason() {
                    CloseReason::SlowConsumer => Status::resource_exhausted(SLOW_CONSUMER_MESSAGE),
                    CloseReason::Shutdown => Status::unavailable(SHUTDOWN_MESSAGE),
                });
            }
        }
    };

    match end {
        Some(status) => {
            debug!(subscription_id = %id, code = ?status.code(), sent, "Closing client stream");
            // The client may already be gone.
            let _ = tx.send(Err(status)).await;
        }
        None => {
            metrics::record_subscription_dropped(DropReason::ClientGone);
            info!(subscription_id = %id, sent, "Client disconnected");
        }
    }
}

// =============================================================================
// Server Lifecycle
// =============================================================================

/// gRPC server for the chain stream.
pub struct ChainStreamServer {
    service: StreamService,
    shutdown: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
    handle: Mutex<Option<JoinHandle<Result<(), tonic::transport::Error>>>>,
}

impl ChainStreamServer {
    /// Create a server over `bus`.
    #[must_use]
    pub fn new(config: ChainStreamServerConfig, bus: SharedSubscriptionBus) -> Self {
        Self {
            service: StreamService::new(config, bus),
            shutdown: CancellationToken::new(),
            local_addr: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// Bind `addr` (port 0 picks a free port) and serve in the background.
    ///
    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Fails if the server is already serving, has been stopped, or the
    /// address cannot be bound.
    pub async fn serve(&self, addr: SocketAddr) -> Result<SocketAddr, ServerError> {
        if self.shutdown.is_cancelled() {
            return Err(ServerError::Stopped);
        }
        if let Some(bound) = *self.local_addr.lock() {
            return Err(ServerError::AlreadyServing(bound));
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let bound = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let service = ChainStreamServiceServer::new(self.service.clone());
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(service)
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                    shutdown.cancelled().await;
                })
                .await
        });

        *self.local_addr.lock() = Some(bound);
        *self.handle.lock() = Some(handle);
        info!(addr = %bound, "gRPC server listening");
        Ok(bound)
    }

    /// Bound address, once serving.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Bound port, once serving.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    /// The RPC handler, for mounting on another router.
    #[must_use]
    pub const fn service(&self) -> &StreamService {
        &self.service
    }

    /// Number of open client streams.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.service.active_streams()
    }

    /// Graceful shutdown.
    ///
    /// Refuses new subscriptions, lets every client drain what is already
    /// queued for it, ends each stream with `UNAVAILABLE`, then waits for
    /// the transport to close. Idempotent.
    pub async fn stop(&self) {
        self.service.bus.close();
        self.shutdown.cancel();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            match handle.await {
                Ok(Ok(())) => info!("gRPC server stopped"),
                Ok(Err(e)) => error!(error = %e, "gRPC server error"),
                Err(e) => error!(error = %e, "gRPC server task failed"),
            }
        }
    }
}

impl std::fmt::Debug for ChainStreamServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainStreamServer")
            .field("local_addr", &self.local_addr())
            .field("active_streams", &self.active_streams())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Conversion Functions
// =============================================================================

fn selection_to_proto(selection: &BlockSelection<'_>) -> StreamResponse {
    StreamResponse {
        block_height: selection.height,
        subaccount_deposits: selection
            .subaccount_deposits
            .iter()
            .map(|deposits| deposits_to_proto(deposits))
            .collect(),
        spot_orders: selection
            .spot_orders
            .iter()
            .map(|update| spot_order_to_proto(update))
            .collect(),
        derivative_orders: selection
            .derivative_orders
            .iter()
            .map(|update| derivative_order_to_proto(update))
            .collect(),
        spot_trades: selection
            .spot_trades
            .iter()
            .map(|trade| spot_trade_to_proto(trade))
            .collect(),
        derivative_trades: selection
            .derivative_trades
            .iter()
            .map(|trade| derivative_trade_to_proto(trade))
            .collect(),
        positions: selection
            .positions
            .iter()
            .map(|position| position_to_proto(position))
            .collect(),
        oracle_prices: selection.oracle_prices.iter().map(oracle_price_to_proto).collect(),
    }
}

fn status_to_proto(status: OrderUpdateStatus) -> i32 {
    match status {
        OrderUpdateStatus::Booked => proto::OrderUpdateStatus::Booked.into(),
        OrderUpdateStatus::Matched => proto::OrderUpdateStatus::Matched.into(),
        OrderUpdateStatus::Cancelled => proto::OrderUpdateStatus::Cancelled.into(),
    }
}

fn deposits_to_proto(deposits: &SubaccountDeposits) -> proto::SubaccountDeposits {
    proto::SubaccountDeposits {
        subaccount_id: deposits.subaccount_id.to_string(),
        deposits: deposits
            .deposits
            .iter()
            .map(|entry| proto::SubaccountDeposit {
                denom: entry.denom.clone(),
                deposit: Some(proto::Deposit {
                    available_balance: entry.deposit.available_balance.to_string(),
                    total_balance: entry.deposit.total_balance.to_string(),
                }),
            })
            .collect(),
    }
}

fn order_info_to_proto(info: &OrderInfo) -> proto::OrderInfo {
    proto::OrderInfo {
        subaccount_id: info.subaccount_id.to_string(),
        fee_recipient: info.fee_recipient.clone(),
        price: info.price.to_string(),
        quantity: info.quantity.to_string(),
        cid: info.cid.clone(),
    }
}

fn spot_order_to_proto(update: &SpotOrderUpdate) -> proto::SpotOrderUpdate {
    let order = &update.order;
    proto::SpotOrderUpdate {
        status: status_to_proto(update.status),
        order_hash: update.order_hash.clone(),
        cid: update.cid.clone(),
        order: Some(proto::SpotOrder {
            market_id: update.market_id.clone(),
            order_info: Some(order_info_to_proto(&order.order_info)),
            order_type: order.order_type.to_string(),
            fillable: order.fillable.to_string(),
            trigger_price: order.trigger_price.as_ref().map(ToString::to_string),
            order_hash: order.order_hash.clone(),
        }),
    }
}

fn derivative_order_to_proto(update: &DerivativeOrderUpdate) -> proto::DerivativeOrderUpdate {
    let order = &update.order;
    proto::DerivativeOrderUpdate {
        status: status_to_proto(update.status),
        order_hash: update.order_hash.clone(),
        cid: update.cid.clone(),
        order: Some(proto::DerivativeOrder {
            market_id: update.market_id.clone(),
            order_info: Some(order_info_to_proto(&order.order_info)),
            order_type: order.order_type.to_string(),
            margin: order.margin.to_string(),
            fillable: order.fillable.to_string(),
            trigger_price: order.trigger_price.as_ref().map(ToString::to_string),
            order_hash: order.order_hash.clone(),
            is_market: update.is_market,
        }),
    }
}

fn spot_trade_to_proto(trade: &SpotTrade) -> proto::SpotTrade {
    proto::SpotTrade {
        market_id: trade.market_id.clone(),
        is_buy: trade.is_buy,
        execution_type: trade.execution_type.clone(),
        quantity: trade.quantity.to_string(),
        price: trade.price.to_string(),
        subaccount_id: trade.subaccount_id.to_string(),
        fee: trade.fee.to_string(),
        order_hash: trade.order_hash.clone(),
        fee_recipient_address: trade.fee_recipient_address.clone(),
        cid: trade.cid.clone(),
        trade_id: trade.trade_id.clone(),
    }
}

fn derivative_trade_to_proto(trade: &DerivativeTrade) -> proto::DerivativeTrade {
    proto::DerivativeTrade {
        market_id: trade.market_id.clone(),
        is_buy: trade.is_buy,
        execution_type: trade.execution_type.clone(),
        subaccount_id: trade.subaccount_id.to_string(),
        position_delta: trade
            .position_delta
            .as_ref()
            .map(|delta| proto::PositionDelta {
                is_long: delta.is_long,
                execution_quantity: delta.execution_quantity.to_string(),
                execution_margin: delta.execution_margin.to_string(),
                execution_price: delta.execution_price.to_string(),
            }),
        payout: trade.payout.to_string(),
        fee: trade.fee.to_string(),
        order_hash: trade.order_hash.clone(),
        fee_recipient_address: trade.fee_recipient_address.clone(),
        cid: trade.cid.clone(),
        trade_id: trade.trade_id.clone(),
        is_liquidation: trade.is_liquidation,
    }
}

fn position_to_proto(position: &Position) -> proto::Position {
    proto::Position {
        market_id: position.market_id.clone(),
        subaccount_id: position.subaccount_id.to_string(),
        is_long: position.is_long,
        quantity: position.quantity.to_string(),
        entry_price: position.entry_price.to_string(),
        margin: position.margin.to_string(),
        cumulative_funding_entry: position.cumulative_funding_entry.to_string(),
    }
}

fn oracle_price_to_proto(price: &OraclePrice) -> proto::OraclePrice {
    proto::OraclePrice {
        symbol: price.symbol.clone(),
        price: price.price.to_string(),
        r#type: price.oracle_type.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
