//! Size- and time-bounded batch accumulation.
//!
//! A [`Batcher`] collects items until either its capacity is reached or a timeout
//! measured from the first item of the current batch elapses, whichever comes
//! first, and then emits exactly the accumulated items to its subscribers.
//!
//! The consumer only depends on the [`Batcher`] trait, so any implementation
//! that emits its flushes through [`Batcher::subscribe`] can replace the default
//! [`TimedBatcher`].

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[cfg(test)]
#[path = "batcher_tests.rs"]
mod tests;

/// Receiving end of a batcher's flushes
pub type FlushReceiver<T> = mpsc::UnboundedReceiver<Vec<T>>;

/// Capability interface for batch accumulators
pub trait Batcher<T>: Send + Sync {
    /// Append items in order. May emit one or more flushes before returning.
    fn add(&self, items: Vec<T>);

    /// Append a single item
    fn add_one(&self, item: T) {
        self.add(vec![item]);
    }

    /// Register a subscriber; every later flush is delivered to it in order
    fn subscribe(&self) -> FlushReceiver<T>;

    /// Number of items waiting for the next flush
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Construction options for [`TimedBatcher`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherOptions {
    /// Flush-size threshold
    pub capacity: Option<usize>,
    /// Deferred-flush delay in milliseconds, measured from the first item
    pub timeout_ms: Option<u64>,
}

impl BatcherOptions {
    pub fn new(capacity: usize, timeout_ms: u64) -> Self {
        Self {
            capacity: Some(capacity),
            timeout_ms: Some(timeout_ms),
        }
    }
}

/// Default [`Batcher`] flushing on capacity or on a timer.
///
/// Invariants:
/// - no flush ever carries more than `capacity` items
/// - flushes are emitted in the order items were added
/// - a deferred-flush timer is live only while `0 < len < capacity`, and it is
///   never restarted by later additions
///
/// The timer runs as a Tokio task, so items must be added from within a Tokio
/// runtime. Flushes emitted while nobody is subscribed are dropped.
pub struct TimedBatcher<T> {
    inner: Arc<BatcherInner<T>>,
}

struct BatcherInner<T> {
    capacity: usize,
    timeout: Duration,
    state: Mutex<BatcherState<T>>,
}

struct BatcherState<T> {
    items: Vec<T>,
    timer: Option<JoinHandle<()>>,
    /// Incremented on every flush so a stale timer never flushes a newer batch
    generation: u64,
    subscribers: Vec<mpsc::UnboundedSender<Vec<T>>>,
}

impl<T> TimedBatcher<T>
where
    T: Clone + Send + 'static,
{
    /// Create a batcher from options.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] naming `capacity` or `timeout_ms` when
    /// either is missing or zero.
    pub fn new(options: BatcherOptions) -> Result<Self, ConfigurationError> {
        let capacity = options
            .capacity
            .ok_or_else(|| ConfigurationError::missing("capacity"))?;
        let timeout_ms = options
            .timeout_ms
            .ok_or_else(|| ConfigurationError::missing("timeout_ms"))?;

        if capacity == 0 {
            return Err(ConfigurationError::invalid("capacity", "must be positive"));
        }
        if timeout_ms == 0 {
            return Err(ConfigurationError::invalid(
                "timeout_ms",
                "must be positive",
            ));
        }

        Ok(Self {
            inner: Arc::new(BatcherInner {
                capacity,
                timeout: Duration::from_millis(timeout_ms),
                state: Mutex::new(BatcherState {
                    items: Vec::new(),
                    timer: None,
                    generation: 0,
                    subscribers: Vec::new(),
                }),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Whether a deferred flush is pending
    pub fn has_pending_timer(&self) -> bool {
        self.inner.lock().timer.is_some()
    }
}

impl<T> BatcherInner<T>
where
    T: Clone + Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, BatcherState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(self: &Arc<Self>, items: Vec<T>) {
        if items.is_empty() {
            return;
        }

        let mut state = self.lock();
        let mut incoming = items.into_iter().peekable();

        // Fill up to capacity, flush, and carry the remainder into the empty buffer
        while incoming.peek().is_some() {
            let room = self.capacity - state.items.len();
            state.items.extend(incoming.by_ref().take(room));

            if state.items.len() == self.capacity {
                Self::flush_locked(&mut state);
            } else {
                self.start_timer(&mut state);
            }
        }
    }

    /// Start the deferred flush unless one is already running
    fn start_timer(self: &Arc<Self>, state: &mut BatcherState<T>) {
        if state.timer.is_some() {
            return;
        }

        let batcher: Weak<Self> = Arc::downgrade(self);
        let generation = state.generation;
        // Deadline is fixed at the first add, not when the task first runs
        let deadline = Instant::now() + self.timeout;

        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(batcher) = batcher.upgrade() {
                batcher.flush_expired(generation);
            }
        }));
    }

    fn flush_expired(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || state.items.is_empty() {
            return;
        }

        // This task is the timer; drop its handle instead of aborting it
        state.timer = None;
        debug!(size = state.items.len(), "Batch timeout elapsed");
        Self::flush_locked(&mut state);
    }

    /// Emit the accumulated items and reset the buffer.
    ///
    /// Runs under the state lock so concurrent flushes are emitted in order.
    fn flush_locked(state: &mut BatcherState<T>) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation = state.generation.wrapping_add(1);

        let batch = std::mem::take(&mut state.items);
        debug!(size = batch.len(), "Flushing batch");

        state.subscribers.retain(|subscriber| !subscriber.is_closed());
        if let Some((last, others)) = state.subscribers.split_last() {
            for subscriber in others {
                let _ = subscriber.send(batch.clone());
            }
            let _ = last.send(batch);
        }
    }
}

impl<T> Batcher<T> for TimedBatcher<T>
where
    T: Clone + Send + 'static,
{
    fn add(&self, items: Vec<T>) {
        self.inner.add(items);
    }

    fn subscribe(&self) -> FlushReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().subscribers.push(tx);
        rx
    }

    fn len(&self) -> usize {
        self.inner.lock().items.len()
    }
}

impl<T> Drop for BatcherInner<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }
}
