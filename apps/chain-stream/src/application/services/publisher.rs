//! Event Publisher
//!
//! Turns raw per-block event batches into [`BlockResponse`]s and hands them
//! to the [`FeedBus`], one block at a time, in arrival order.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──run()──► Running ──stop()──► Stopping ──drained──► Stopped
//!   │                │
//!   └──stop()────────┴──overflow / decode error─────────────► Stopped
//! ```
//!
//! Batches enter through a bounded FIFO. A full FIFO is fatal: the terminal
//! [`StreamError::BufferOverflow`] is broadcast to every subscriber and
//! nothing is published afterwards. A block that fails to decode halts the
//! publisher the same way.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::application::ports::{FeedBus, StreamError};
use crate::domain::block::BlockResponse;
use crate::domain::decoder::decode_event;
use crate::domain::events::{EventTopic, RawEventBatch};
use crate::infrastructure::metrics;

/// Default capacity of the inbound FIFO.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

// =============================================================================
// State and Errors
// =============================================================================

/// Publisher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    /// Constructed, not yet running.
    Idle,
    /// Delivery loop active.
    Running,
    /// Stop requested, draining queued batches.
    Stopping,
    /// Terminal.
    Stopped,
}

impl PublisherState {
    /// Lowercase label for logs and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for PublisherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publisher control errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PublisherError {
    /// `run` was called twice.
    #[error("publisher already started")]
    AlreadyStarted,

    /// The publisher no longer accepts work.
    #[error("publisher is stopped")]
    Stopped,

    /// The inbound FIFO was full. The publisher has halted.
    #[error("chain stream event buffer overflow")]
    BufferOverflow,
}

// =============================================================================
// Shared State
// =============================================================================

struct Shared {
    bus: Arc<dyn FeedBus>,
    state: Mutex<PublisherState>,
    last_error: Mutex<Option<StreamError>>,
    cancel: CancellationToken,
    finished: CancellationToken,
    latest_height: AtomicU64,
    capacity: usize,
}

impl Shared {
    fn is_halted(&self) -> bool {
        *self.state.lock() == PublisherState::Stopped
    }

    fn accepts_batches(&self) -> bool {
        matches!(
            *self.state.lock(),
            PublisherState::Idle | PublisherState::Running
        )
    }

    /// Broadcast `error` and stop for good. Only the first call has effect.
    fn halt(&self, error: StreamError) {
        let mut state = self.state.lock();
        let previous = *state;
        if previous == PublisherState::Stopped {
            return;
        }
        *state = PublisherState::Stopped;
        *self.last_error.lock() = Some(error.clone());

        let notified = self.bus.fail(error.clone());
        drop(state);

        error!(
            error = %error,
            subscribers = notified,
            latest_height = self.latest_height.load(Ordering::Acquire),
            "Event publisher halted"
        );
        self.cancel.cancel();
        if previous == PublisherState::Idle {
            self.finished.cancel();
        }
    }

    /// Hand `block` to the bus unless the publisher has halted.
    fn publish(&self, block: BlockResponse) {
        let height = block.height();
        let records = block.record_count();

        let state = self.state.lock();
        if !matches!(*state, PublisherState::Running | PublisherState::Stopping) {
            return;
        }
        let delivered = self.bus.publish(Arc::new(block));
        self.latest_height.store(height, Ordering::Release);
        drop(state);

        metrics::record_block_published(height);
        debug!(height, records, subscribers = delivered, "Published block");
    }

    fn process(&self, batch: RawEventBatch) {
        let started = Instant::now();
        let RawEventBatch { height, events } = batch;

        let decoded = events.iter().map(|event| {
            let topic = EventTopic::from_tag(&event.kind).map_or("unknown", EventTopic::as_str);
            let result = decode_event(event);
            if result.is_ok() {
                metrics::record_event_decoded(topic);
            } else {
                metrics::record_decode_error(topic);
            }
            result
        });

        match BlockResponse::try_aggregate(height, decoded) {
            Ok(block) => self.publish(block),
            Err(source) => self.halt(StreamError::Decode { height, source }),
        }
        metrics::record_processing_duration(started.elapsed());
    }

    async fn deliver(self: Arc<Self>, mut receiver: mpsc::Receiver<RawEventBatch>) {
        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                batch = receiver.recv() => match batch {
                    Some(batch) => {
                        metrics::set_queue_depth(receiver.len());
                        self.process(batch);
                    }
                    None => break,
                },
            }
        }

        // Stop, not halt: everything already queued still goes out.
        if !self.is_halted() {
            receiver.close();
            while let Some(batch) = receiver.recv().await {
                self.process(batch);
                if self.is_halted() {
                    break;
                }
            }
        }

        *self.state.lock() = PublisherState::Stopped;
        metrics::set_queue_depth(0);
        info!(
            latest_height = self.latest_height.load(Ordering::Acquire),
            "Event publisher stopped"
        );
        self.finished.cancel();
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Single serialization point between the execution layer and the bus.
pub struct EventPublisher {
    shared: Arc<Shared>,
    sender: mpsc::Sender<RawEventBatch>,
    receiver: Mutex<Option<mpsc::Receiver<RawEventBatch>>>,
}

impl EventPublisher {
    /// Create an idle publisher with [`DEFAULT_BUFFER_CAPACITY`].
    #[must_use]
    pub fn new(bus: Arc<dyn FeedBus>) -> Self {
        let (sender, receiver) = mpsc::channel(DEFAULT_BUFFER_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                bus,
                state: Mutex::new(PublisherState::Idle),
                last_error: Mutex::new(None),
                cancel: CancellationToken::new(),
                finished: CancellationToken::new(),
                latest_height: AtomicU64::new(0),
                capacity: DEFAULT_BUFFER_CAPACITY,
            }),
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Replace the inbound FIFO with one of `capacity` slots (at least one).
    ///
    /// Submitters obtained earlier keep feeding the old FIFO, so call this
    /// before [`Self::submitter`].
    #[must_use]
    pub fn with_buffer_capacity(self, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let shared = Arc::new(Shared {
            bus: Arc::clone(&self.shared.bus),
            state: Mutex::new(PublisherState::Idle),
            last_error: Mutex::new(None),
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            latest_height: AtomicU64::new(0),
            capacity,
        });
        Self {
            shared,
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Start the delivery task. Requires a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`PublisherError::AlreadyStarted`] if running, [`PublisherError::Stopped`]
    /// once stopped.
    pub fn run(&self) -> Result<(), PublisherError> {
        let mut state = self.shared.state.lock();
        match *state {
            PublisherState::Idle => {}
            PublisherState::Running | PublisherState::Stopping => {
                return Err(PublisherError::AlreadyStarted);
            }
            PublisherState::Stopped => return Err(PublisherError::Stopped),
        }
        let Some(receiver) = self.receiver.lock().take() else {
            return Err(PublisherError::AlreadyStarted);
        };
        *state = PublisherState::Running;
        drop(state);

        tokio::spawn(Arc::clone(&self.shared).deliver(receiver));
        info!(capacity = self.shared.capacity, "Event publisher running");
        Ok(())
    }

    /// Stop accepting batches, publish what is already queued, and wait for
    /// the delivery task to finish. Safe to call repeatedly or concurrently.
    pub async fn stop(&self) {
        let previous = {
            let mut state = self.shared.state.lock();
            let previous = *state;
            match previous {
                PublisherState::Idle => *state = PublisherState::Stopped,
                PublisherState::Running => *state = PublisherState::Stopping,
                PublisherState::Stopping | PublisherState::Stopped => {}
            }
            previous
        };

        match previous {
            PublisherState::Idle => {
                info!("Event publisher stopped before start");
                self.shared.finished.cancel();
            }
            PublisherState::Running => {
                info!("Stopping event publisher");
                self.shared.cancel.cancel();
            }
            PublisherState::Stopping | PublisherState::Stopped => {}
        }

        self.shared.finished.cancelled().await;
    }

    /// Handle for feeding batches in.
    #[must_use]
    pub fn submitter(&self) -> BatchSubmitter {
        BatchSubmitter {
            shared: Arc::clone(&self.shared),
            sender: self.sender.clone(),
        }
    }

    /// Submit one batch. See [`BatchSubmitter::submit`].
    ///
    /// # Errors
    ///
    /// See [`BatchSubmitter::submit`].
    pub fn submit(&self, batch: RawEventBatch) -> Result<(), PublisherError> {
        submit(&self.shared, &self.sender, batch)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PublisherState {
        *self.shared.state.lock()
    }

    /// Height of the last published block, 0 before the first.
    #[must_use]
    pub fn latest_height(&self) -> u64 {
        self.shared.latest_height.load(Ordering::Acquire)
    }

    /// The error that halted the publisher, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<StreamError> {
        self.shared.last_error.lock().clone()
    }

    /// Capacity of the inbound FIFO.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Batches waiting in the inbound FIFO.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("state", &self.state())
            .field("capacity", &self.shared.capacity)
            .field("latest_height", &self.latest_height())
            .finish_non_exhaustive()
    }
}

/// Cloneable producer side of the publisher's inbound FIFO.
#[derive(Clone)]
pub struct BatchSubmitter {
    shared: Arc<Shared>,
    sender: mpsc::Sender<RawEventBatch>,
}

impl BatchSubmitter {
    /// Enqueue one batch without waiting.
    ///
    /// # Errors
    ///
    /// [`PublisherError::BufferOverflow`] when the FIFO is full, which also
    /// halts the publisher and broadcasts the overflow to every subscriber.
    /// [`PublisherError::Stopped`] once the publisher is stopping or stopped.
    pub fn submit(&self, batch: RawEventBatch) -> Result<(), PublisherError> {
        submit(&self.shared, &self.sender, batch)
    }

    /// Enqueue one batch, waiting for a free slot instead of overflowing.
    ///
    /// For sources that can be paced, such as a replay file. Batches from
    /// the chain go through [`Self::submit`].
    ///
    /// # Errors
    ///
    /// [`PublisherError::Stopped`] once the publisher is stopping or stopped,
    /// including while waiting for a slot.
    pub async fn submit_wait(&self, batch: RawEventBatch) -> Result<(), PublisherError> {
        if !self.shared.accepts_batches() {
            return Err(PublisherError::Stopped);
        }

        let permit = tokio::select! {
            biased;
            () = self.shared.cancel.cancelled() => return Err(PublisherError::Stopped),
            () = self.shared.finished.cancelled() => return Err(PublisherError::Stopped),
            permit = self.sender.reserve() => permit.map_err(|_| PublisherError::Stopped)?,
        };

        // Re-checked under the lock so nothing slips in behind a stop.
        let state = self.shared.state.lock();
        if !matches!(*state, PublisherState::Idle | PublisherState::Running) {
            return Err(PublisherError::Stopped);
        }
        permit.send(batch);
        drop(state);
        Ok(())
    }
}

impl std::fmt::Debug for BatchSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSubmitter").finish_non_exhaustive()
    }
}

fn submit(
    shared: &Shared,
    sender: &mpsc::Sender<RawEventBatch>,
    batch: RawEventBatch,
) -> Result<(), PublisherError> {
    if !shared.accepts_batches() {
        return Err(PublisherError::Stopped);
    }

    let height = batch.height;
    match sender.try_send(batch) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
            metrics::record_buffer_overflow();
            error!(height, capacity = shared.capacity, "Publisher inbound buffer full");
            shared.halt(StreamError::BufferOverflow);
            Err(PublisherError::BufferOverflow)
        }
        Err(TrySendError::Closed(_)) => Err(PublisherError::Stopped),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockFeedBus;
    use crate::domain::decoder::DecodeError;
    use crate::domain::events::{EventAttribute, RawEvent};

    #[derive(Default)]
    struct RecordingBus {
        heights: Mutex<Vec<u64>>,
        errors: Mutex<Vec<StreamError>>,
    }

    impl FeedBus for RecordingBus {
        fn publish(&self, block: Arc<BlockResponse>) -> usize {
            self.heights.lock().push(block.height());
            1
        }

        fn fail(&self, error: StreamError) -> usize {
            self.errors.lock().push(error);
            1
        }
    }

    fn empty(height: u64) -> RawEventBatch {
        RawEventBatch::new(height, Vec::new())
    }

    fn provider_price(height: u64) -> RawEventBatch {
        RawEventBatch::new(
            height,
            vec![RawEvent::new(
                EventTopic::ProviderPrice.tag(),
                vec![
                    EventAttribute::new("symbol", "\"INJ\""),
                    EventAttribute::new("price", "\"25.125\""),
                ],
            )],
        )
    }

    fn broken(height: u64) -> RawEventBatch {
        RawEventBatch::new(
            height,
            vec![RawEvent::new("injective.exchange.v1beta1.WrongType", vec![])],
        )
    }

    #[test]
    fn state_labels() {
        assert_eq!(PublisherState::Idle.to_string(), "idle");
        assert_eq!(PublisherState::Stopping.as_str(), "stopping");
        assert_eq!(
            PublisherError::BufferOverflow.to_string(),
            "chain stream event buffer overflow"
        );
    }

    #[test]
    fn capacity_is_at_least_one() {
        let publisher =
            EventPublisher::new(Arc::new(RecordingBus::default())).with_buffer_capacity(0);
        assert_eq!(publisher.buffer_capacity(), 1);
        assert_eq!(
            EventPublisher::new(Arc::new(RecordingBus::default())).buffer_capacity(),
            DEFAULT_BUFFER_CAPACITY
        );
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let publisher = EventPublisher::new(Arc::new(RecordingBus::default()));
        assert_eq!(publisher.state(), PublisherState::Idle);

        publisher.run().unwrap();
        assert_eq!(publisher.state(), PublisherState::Running);
        assert_eq!(publisher.run(), Err(PublisherError::AlreadyStarted));

        publisher.stop().await;
        assert_eq!(publisher.state(), PublisherState::Stopped);
        assert_eq!(publisher.run(), Err(PublisherError::Stopped));

        publisher.stop().await;
        assert_eq!(publisher.state(), PublisherState::Stopped);
    }

    #[tokio::test]
    async fn stop_before_run_is_terminal() {
        let publisher = EventPublisher::new(Arc::new(RecordingBus::default()));
        publisher.stop().await;
        assert_eq!(publisher.state(), PublisherState::Stopped);
        assert_eq!(publisher.submit(empty(1)), Err(PublisherError::Stopped));
    }

    #[tokio::test]
    async fn publishes_in_submission_order() {
        let bus = Arc::new(RecordingBus::default());
        let publisher = EventPublisher::new(bus.clone());
        publisher.run().unwrap();

        let submitter = publisher.submitter();
        for height in 1..=10 {
            submitter.submit(provider_price(height)).unwrap();
        }
        publisher.stop().await;

        assert_eq!(*bus.heights.lock(), (1..=10).collect::<Vec<_>>());
        assert!(bus.errors.lock().is_empty());
        assert_eq!(publisher.latest_height(), 10);
        assert_eq!(publisher.last_error(), None);
    }

    #[tokio::test]
    async fn stop_drains_queued_batches() {
        let bus = Arc::new(RecordingBus::default());
        let publisher = EventPublisher::new(bus.clone());
        publisher.run().unwrap();

        for height in 1..=5 {
            publisher.submit(empty(height)).unwrap();
        }
        assert_eq!(publisher.queue_depth(), 5);

        publisher.stop().await;

        assert_eq!(*bus.heights.lock(), [1, 2, 3, 4, 5]);
        assert_eq!(publisher.queue_depth(), 0);
        assert_eq!(publisher.submit(empty(6)), Err(PublisherError::Stopped));
    }

    #[tokio::test]
    async fn submit_wait_holds_back_instead_of_overflowing() {
        let bus = Arc::new(RecordingBus::default());
        let publisher = EventPublisher::new(bus.clone()).with_buffer_capacity(2);
        publisher.run().unwrap();
        let submitter = publisher.submitter();

        for height in 1..=50 {
            submitter.submit_wait(empty(height)).await.unwrap();
        }
        publisher.stop().await;

        assert_eq!(*bus.heights.lock(), (1..=50).collect::<Vec<_>>());
        assert!(bus.errors.lock().is_empty());
        assert_eq!(publisher.state(), PublisherState::Stopped);
    }

    #[tokio::test]
    async fn stop_releases_a_waiting_submitter() {
        let publisher =
            EventPublisher::new(Arc::new(RecordingBus::default())).with_buffer_capacity(1);
        let submitter = publisher.submitter();
        submitter.submit_wait(empty(1)).await.unwrap();

        let mut waiting = tokio_test::task::spawn(submitter.submit_wait(empty(2)));
        tokio_test::assert_pending!(waiting.poll());

        publisher.stop().await;

        assert!(waiting.is_woken());
        assert_eq!(
            tokio_test::assert_ready!(waiting.poll()),
            Err(PublisherError::Stopped)
        );
        assert_eq!(publisher.last_error(), None);
    }

    #[tokio::test]
    async fn overflow_halts_and_notifies_once() {
        let mut bus = MockFeedBus::new();
        bus.expect_publish().never();
        bus.expect_fail()
            .withf(|error| *error == StreamError::BufferOverflow)
            .times(1)
            .return_const(3_usize);

        let publisher = EventPublisher::new(Arc::new(bus)).with_buffer_capacity(1);
        publisher.run().unwrap();
        let submitter = publisher.submitter();

        // The delivery task has not been polled yet on this thread.
        submitter.submit(empty(1)).unwrap();
        assert_eq!(submitter.submit(empty(2)), Err(PublisherError::BufferOverflow));
        assert_eq!(publisher.state(), PublisherState::Stopped);
        assert_eq!(submitter.submit(empty(3)), Err(PublisherError::Stopped));

        publisher.stop().await;
        assert_eq!(publisher.last_error(), Some(StreamError::BufferOverflow));
        assert_eq!(publisher.latest_height(), 0);
    }

    #[tokio::test]
    async fn decode_error_halts_after_earlier_blocks() {
        let bus = Arc::new(RecordingBus::default());
        let publisher = EventPublisher::new(bus.clone());
        publisher.run().unwrap();

        publisher.submit(provider_price(1)).unwrap();
        publisher.submit(broken(2)).unwrap();
        publisher.submit(provider_price(3)).unwrap();
        publisher.stop().await;

        let expected = StreamError::Decode {
            height: 2,
            source: DecodeError::UnexpectedTopic("injective.exchange.v1beta1.WrongType".into()),
        };
        assert_eq!(*bus.heights.lock(), [1]);
        assert_eq!(*bus.errors.lock(), [expected.clone()]);
        assert_eq!(publisher.last_error(), Some(expected));
    }

    #[tokio::test]
    async fn empty_batches_are_published() {
        let mut bus = MockFeedBus::new();
        bus.expect_publish()
            .withf(|block| block.height() == 42 && block.record_count() == 0)
            .times(1)
            .return_const(0_usize);
        bus.expect_fail().never();

        let publisher = EventPublisher::new(Arc::new(bus));
        publisher.run().unwrap();
        publisher.submit(empty(42)).unwrap();
        publisher.stop().await;

        assert_eq!(publisher.latest_height(), 42);
    }
}
