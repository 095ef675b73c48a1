//! Subscription Bus
//!
//! Fans published blocks out to every registered subscription.
//!
//! # Architecture
//!
//! The bus is a registry of subscription ID to a bounded per-subscription
//! queue. The publisher is the only writer, so every queue receives the same
//! blocks in the same order. A queue that is full when a block arrives is
//! evicted rather than skipped: its subscriber sees the end of the stream,
//! never a gap.
//!
//! When the publisher halts, the terminal [`StreamError`] is queued to every
//! subscriber and remembered, so later subscribers receive it immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::application::ports::{FeedBus, FeedMessage, StreamError};
use crate::domain::block::BlockResponse;
use crate::domain::subscription::{SubscriptionId, new_subscription_id};
use crate::infrastructure::metrics::{self, DropReason};

/// Default per-subscription queue capacity.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1024;

// =============================================================================
// Configuration and Errors
// =============================================================================

/// Bus configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Capacity of each subscription queue.
    pub subscriber_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

/// Bus errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The bus has been closed for shutdown.
    #[error("subscription bus is closed")]
    Closed,
}

/// Why a subscription's queue ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Evicted for falling behind.
    SlowConsumer,
    /// The bus closed or the feed ended.
    Shutdown,
}

// =============================================================================
// Subscription Bus
// =============================================================================

struct Subscriber {
    sender: mpsc::Sender<FeedMessage>,
    evicted: Arc<AtomicBool>,
}

#[derive(Default)]
struct BusState {
    subscribers: HashMap<SubscriptionId, Subscriber>,
    terminal: Option<StreamError>,
    closed: bool,
}

/// Registry of live subscriptions.
pub struct SubscriptionBus {
    config: BusConfig,
    state: Mutex<BusState>,
}

/// Shared bus reference.
pub type SharedSubscriptionBus = Arc<SubscriptionBus>;

impl SubscriptionBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            config: BusConfig {
                subscriber_capacity: config.subscriber_capacity.max(1),
            },
            state: Mutex::new(BusState::default()),
        }
    }

    /// Create a bus with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BusConfig::default())
    }

    /// Register a new subscription.
    ///
    /// After the feed has halted, the returned subscription yields the
    /// terminal error and then ends.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] once [`Self::close`] has been called.
    pub fn subscribe(self: &Arc<Self>) -> Result<Subscription, BusError> {
        let (sender, receiver) = mpsc::channel(self.config.subscriber_capacity);
        let id = new_subscription_id();
        let evicted = Arc::new(AtomicBool::new(false));

        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::Closed);
        }
        let terminal = state.terminal.clone();
        if let Some(error) = terminal {
            drop(state);
            // Capacity is at least one, so this cannot fail.
            let _ = sender.try_send(FeedMessage::Terminal(error));
            debug!(subscription_id = %id, "Subscribed after feed halted");
        } else {
            state.subscribers.insert(
                id,
                Subscriber {
                    sender,
                    evicted: Arc::clone(&evicted),
                },
            );
            let count = state.subscribers.len();
            drop(state);
            metrics::set_active_subscriptions(count);
            debug!(subscription_id = %id, subscribers = count, "Subscribed");
        }

        Ok(Subscription {
            id,
            receiver,
            evicted,
            bus: Arc::clone(self),
            seen_terminal: false,
        })
    }

    /// Remove a subscription. Unknown IDs are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.state.lock();
        if state.subscribers.remove(&id).is_some() {
            let count = state.subscribers.len();
            drop(state);
            metrics::set_active_subscriptions(count);
            debug!(subscription_id = %id, subscribers = count, "Unsubscribed");
        }
    }

    /// Stop accepting subscriptions and end every queue.
    ///
    /// Messages already queued stay readable. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let ended = state.subscribers.len();
        state.subscribers.clear();
        drop(state);

        metrics::set_active_subscriptions(0);
        for _ in 0..ended {
            metrics::record_subscription_dropped(DropReason::Shutdown);
        }
        info!(subscribers = ended, "Subscription bus closed");
    }

    /// Whether [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// The terminal error, once the feed has halted.
    #[must_use]
    pub fn terminal(&self) -> Option<StreamError> {
        self.state.lock().terminal.clone()
    }

    /// Snapshot of bus statistics.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        let state = self.state.lock();
        BusStats {
            subscribers: state.subscribers.len(),
            subscriber_capacity: self.config.subscriber_capacity,
            halted: state.terminal.is_some(),
            closed: state.closed,
        }
    }
}

impl FeedBus for SubscriptionBus {
    fn publish(&self, block: Arc<BlockResponse>) -> usize {
        let height = block.height();
        let mut evicted = Vec::new();

        let mut state = self.state.lock();
        if state.closed || state.terminal.is_some() {
            return 0;
        }
        state.subscribers.retain(|id, subscriber| {
            match subscriber
                .sender
                .try_send(FeedMessage::Block(Arc::clone(&block)))
            {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    subscriber.evicted.store(true, Ordering::Release);
                    evicted.push(*id);
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
        let delivered = state.subscribers.len();
        drop(state);

        for id in &evicted {
            metrics::record_subscription_dropped(DropReason::SlowConsumer);
            warn!(subscription_id = %id, height, "Evicted slow subscriber");
        }
        if !evicted.is_empty() {
            metrics::set_active_subscriptions(delivered);
        }
        delivered
    }

    fn fail(&self, error: StreamError) -> usize {
        let mut state = self.state.lock();
        if state.terminal.is_some() {
            return 0;
        }
        state.terminal = Some(error.clone());
        let mut notified = 0;
        for subscriber in state.subscribers.values() {
            // A full queue gets the terminal error from the bus once the
            // receiver has drained it.
            match subscriber
                .sender
                .try_send(FeedMessage::Terminal(error.clone()))
            {
                Ok(()) | Err(TrySendError::Full(_)) => notified += 1,
                Err(TrySendError::Closed(_)) => {}
            }
        }
        let ended = state.subscribers.len();
        state.subscribers.clear();
        drop(state);

        metrics::set_active_subscriptions(0);
        for _ in 0..ended {
            metrics::record_subscription_dropped(DropReason::Terminal);
        }
        warn!(error = %error, subscribers = notified, "Feed halted");
        notified
    }
}

impl std::fmt::Debug for SubscriptionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionBus")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Statistics about the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Registered subscriptions.
    pub subscribers: usize,
    /// Capacity of each subscription queue.
    pub subscriber_capacity: usize,
    /// Whether the feed has halted.
    pub halted: bool,
    /// Whether the bus is closed.
    pub closed: bool,
}

// =============================================================================
// Subscription
// =============================================================================

/// Receiving end of one registration. Unregisters on drop.
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::Receiver<FeedMessage>,
    evicted: Arc<AtomicBool>,
    bus: Arc<SubscriptionBus>,
    seen_terminal: bool,
}

impl Subscription {
    /// Subscription ID.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next message, or `None` once the queue has ended.
    ///
    /// A queue ended by the feed halting always yields the terminal error
    /// before `None`, unless the subscription was evicted earlier for
    /// falling behind.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        if let Some(message) = self.receiver.recv().await {
            if matches!(message, FeedMessage::Terminal(_)) {
                self.seen_terminal = true;
            }
            return Some(message);
        }
        if self.seen_terminal || self.evicted.load(Ordering::Acquire) {
            return None;
        }
        let terminal = self.bus.terminal()?;
        self.seen_terminal = true;
        Some(FeedMessage::Terminal(terminal))
    }

    /// Why the queue ended. Meaningful after [`Self::recv`] returns `None`.
    #[must_use]
    pub fn close_reason(&self) -> CloseReason {
        if self.evicted.load(Ordering::Acquire) {
            CloseReason::SlowConsumer
        } else {
            CloseReason::Shutdown
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("evicted", &self.evicted.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
