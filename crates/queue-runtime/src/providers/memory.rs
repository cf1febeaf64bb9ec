//! In-memory queue provider implementation for testing and development.
//!
//! This module provides an in-memory queue that behaves like SQS where consumers
//! can observe it:
//! - Visibility timeouts: received messages stay hidden until deleted or until the
//!   timeout elapses, after which they are redelivered with a new receipt handle
//! - Long polling: receives wait up to `wait_time_seconds` for a message to arrive
//! - Batch limits: delete and send batches are capped at ten entries
//! - Per-entry batch failures for stale or rejected receipt handles
//!
//! Time is measured with [`tokio::time::Instant`], so tests running on a paused
//! clock control visibility timeouts and long polls deterministically.
//!
//! For tests the provider also records call statistics and supports fault
//! injection (`fail_next_receive`, `fail_next_delete`, `reject_receipt`).

use crate::client::{check_batch_size, QueueClient};
use crate::error::QueueError;
use crate::message::{
    BatchEntryFailure, BatchOutcome, DeleteBatchEntry, MessageId, OutboundMessage, QueueUrl,
    ReceiptHandle, ReceiveRequest, ReceivedMessage, Timestamp,
};
use crate::provider::{InMemoryConfig, ProviderType};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Error code reported for receipt handles that are unknown, stale or rejected
pub const INVALID_RECEIPT_CODE: &str = "ReceiptHandleIsInvalid";

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for all queues
#[derive(Default)]
struct QueueStorage {
    queues: HashMap<QueueUrl, InMemoryQueue>,
    faults: FaultPlan,
    stats: CallStats,
}

impl QueueStorage {
    /// Get or create a queue
    fn queue_mut(&mut self, queue: &QueueUrl) -> &mut InMemoryQueue {
        self.queues.entry(queue.clone()).or_default()
    }
}

/// Internal queue state for a single queue
#[derive(Default)]
struct InMemoryQueue {
    /// Messages waiting for delivery (FIFO order)
    messages: VecDeque<StoredMessage>,
    /// Delivered messages keyed by receipt handle
    in_flight: HashMap<String, InFlightMessage>,
}

impl InMemoryQueue {
    fn len(&self) -> usize {
        self.messages.len() + self.in_flight.len()
    }

    /// Return messages whose visibility timeout elapsed to the ready queue
    fn release_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, m)| m.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(in_flight) = self.in_flight.remove(&receipt) {
                self.messages.push_back(in_flight.message);
            }
        }
    }

    /// Earliest instant at which a hidden or delayed message becomes receivable
    fn next_wake(&self) -> Option<Instant> {
        let in_flight = self.in_flight.values().map(|m| m.visible_at);
        let delayed = self.messages.iter().map(|m| m.available_at);
        in_flight.chain(delayed).min()
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: String,
    message_attributes: HashMap<String, String>,
    sent_at: Timestamp,
    receive_count: u32,
    available_at: Instant,
}

/// A delivered message that has not been deleted yet
struct InFlightMessage {
    message: StoredMessage,
    visible_at: Instant,
}

/// Failures queued up by tests, consumed one per call
#[derive(Default)]
struct FaultPlan {
    receive: VecDeque<QueueError>,
    delete: VecDeque<QueueError>,
    send: VecDeque<QueueError>,
    rejected_receipts: HashSet<String>,
}

/// Call counters recorded by the in-memory provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStats {
    pub receive_calls: usize,
    pub delete_calls: usize,
    pub delete_batch_calls: usize,
    /// Number of entries of every delete-batch call, in call order
    pub delete_batch_sizes: Vec<usize>,
    pub send_batch_calls: usize,
    /// Messages removed by successful deletes
    pub deleted_messages: usize,
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue provider
///
/// Cloning the provider yields another handle to the same queues, so a test can
/// keep one handle for inspection while the consumer owns another.
#[derive(Clone)]
pub struct InMemoryProvider {
    storage: Arc<Mutex<QueueStorage>>,
    arrivals: Arc<Notify>,
    config: InMemoryConfig,
}

impl InMemoryProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(QueueStorage::default())),
            arrivals: Arc::new(Notify::new()),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a message on the queue directly, bypassing batch limits
    pub fn enqueue(&self, queue: &QueueUrl, body: impl Into<String>) -> MessageId {
        let message_id = MessageId::new();
        {
            let mut storage = self.lock();
            storage.queue_mut(queue).messages.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: body.into(),
                message_attributes: HashMap::new(),
                sent_at: Timestamp::now(),
                receive_count: 0,
                available_at: Instant::now(),
            });
        }
        self.arrivals.notify_waiters();
        message_id
    }

    /// Messages waiting for delivery, including delayed ones
    pub fn message_count(&self, queue: &QueueUrl) -> usize {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Delivered messages that have been neither deleted nor released
    pub fn in_flight_count(&self, queue: &QueueUrl) -> usize {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.in_flight.len())
            .unwrap_or(0)
    }

    /// Snapshot of the call counters
    pub fn stats(&self) -> CallStats {
        self.lock().stats.clone()
    }

    /// Make the next receive call fail with `error`
    pub fn fail_next_receive(&self, error: QueueError) {
        self.lock().faults.receive.push_back(error);
    }

    /// Make the next delete or delete-batch call fail with `error`
    pub fn fail_next_delete(&self, error: QueueError) {
        self.lock().faults.delete.push_back(error);
    }

    /// Make the next send-batch call fail with `error`
    pub fn fail_next_send(&self, error: QueueError) {
        self.lock().faults.send.push_back(error);
    }

    /// Treat `receipt` as invalid for every later delete
    pub fn reject_receipt(&self, receipt: &ReceiptHandle) {
        self.lock()
            .faults
            .rejected_receipts
            .insert(receipt.as_str().to_string());
    }

    /// Take up to `request.max_messages` receivable messages and mark them in flight
    fn take_visible(&self, request: &ReceiveRequest) -> (Vec<ReceivedMessage>, Option<Instant>) {
        let now = Instant::now();
        let visibility = Duration::from_secs(u64::from(
            request
                .visibility_timeout_seconds
                .unwrap_or(self.config.default_visibility_timeout_seconds),
        ));

        let mut storage = self.lock();
        let queue = storage.queue_mut(&request.queue_url);
        queue.release_expired(now);

        let mut delivered = Vec::new();
        let mut remaining = VecDeque::with_capacity(queue.messages.len());
        while let Some(mut message) = queue.messages.pop_front() {
            if delivered.len() >= request.max_messages as usize || message.available_at > now {
                remaining.push_back(message);
                continue;
            }

            message.receive_count += 1;
            let receipt = uuid::Uuid::new_v4().to_string();
            delivered.push(to_received(&message, &receipt, request));
            queue.in_flight.insert(
                receipt,
                InFlightMessage {
                    message,
                    visible_at: now + visibility,
                },
            );
        }
        queue.messages = remaining;

        (delivered, queue.next_wake())
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

/// Whether a requested name list selects `name`
fn selects(requested: &[String], name: &str) -> bool {
    requested
        .iter()
        .any(|r| r == name || r == "All" || r == ".*")
}

fn to_received(
    message: &StoredMessage,
    receipt: &str,
    request: &ReceiveRequest,
) -> ReceivedMessage {
    let mut attributes = HashMap::new();
    if selects(&request.attribute_names, "ApproximateReceiveCount") {
        attributes.insert(
            "ApproximateReceiveCount".to_string(),
            message.receive_count.to_string(),
        );
    }
    if selects(&request.attribute_names, "SentTimestamp") {
        attributes.insert(
            "SentTimestamp".to_string(),
            message.sent_at.as_datetime().timestamp_millis().to_string(),
        );
    }

    let message_attributes = message
        .message_attributes
        .iter()
        .filter(|(name, _)| selects(&request.message_attribute_names, name))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    ReceivedMessage {
        message_id: message.message_id.clone(),
        receipt_handle: ReceiptHandle::new(receipt),
        body: message.body.clone(),
        attributes,
        message_attributes,
    }
}

#[async_trait]
impl QueueClient for InMemoryProvider {
    async fn receive_messages(
        &self,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        request.validate()?;

        // Every call suspends at least once so a tight polling loop cannot starve the runtime
        tokio::task::yield_now().await;

        {
            let mut storage = self.lock();
            storage.stats.receive_calls += 1;
            if let Some(error) = storage.faults.receive.pop_front() {
                return Err(error);
            }
        }

        let wait = Duration::from_secs(u64::from(request.wait_time_seconds.unwrap_or(0)));
        let deadline = Instant::now() + wait;

        loop {
            // Register for arrivals before looking, so a send in between is not missed
            let notified = self.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (messages, next_wake) = self.take_visible(request);
            if !messages.is_empty() || Instant::now() >= deadline {
                return Ok(messages);
            }

            let wake_at = next_wake.map_or(deadline, |at| at.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        tokio::task::yield_now().await;

        let mut storage = self.lock();
        storage.stats.delete_calls += 1;
        if let Some(error) = storage.faults.delete.pop_front() {
            return Err(error);
        }

        if storage.faults.rejected_receipts.contains(receipt.as_str()) {
            return Err(QueueError::InvalidReceipt {
                receipt: receipt.to_string(),
            });
        }

        let removed = storage
            .queues
            .get_mut(queue)
            .and_then(|q| q.in_flight.remove(receipt.as_str()));

        match removed {
            Some(_) => {
                storage.stats.deleted_messages += 1;
                Ok(())
            }
            None => Err(QueueError::InvalidReceipt {
                receipt: receipt.to_string(),
            }),
        }
    }

    async fn delete_message_batch(
        &self,
        queue: &QueueUrl,
        entries: &[DeleteBatchEntry],
    ) -> Result<BatchOutcome, QueueError> {
        check_batch_size(entries.len())?;
        tokio::task::yield_now().await;

        let mut storage = self.lock();
        storage.stats.delete_batch_calls += 1;
        storage.stats.delete_batch_sizes.push(entries.len());
        if let Some(error) = storage.faults.delete.pop_front() {
            return Err(error);
        }

        let mut outcome = BatchOutcome::default();
        for entry in entries {
            let receipt = entry.receipt_handle.as_str();
            let removed = if storage.faults.rejected_receipts.contains(receipt) {
                None
            } else {
                storage
                    .queues
                    .get_mut(queue)
                    .and_then(|q| q.in_flight.remove(receipt))
            };

            match removed {
                Some(_) => {
                    storage.stats.deleted_messages += 1;
                    outcome.successful.push(entry.id.clone());
                }
                None => outcome.failed.push(BatchEntryFailure {
                    id: entry.id.clone(),
                    code: INVALID_RECEIPT_CODE.to_string(),
                    message: Some(format!("The receipt handle '{}' is not valid", receipt)),
                    sender_fault: true,
                }),
            }
        }

        Ok(outcome)
    }

    async fn send_message_batch(
        &self,
        queue: &QueueUrl,
        messages: &[OutboundMessage],
    ) -> Result<BatchOutcome, QueueError> {
        check_batch_size(messages.len())?;

        let max_size = ProviderType::InMemory.max_message_size();
        if let Some(message) = messages.iter().find(|m| m.body.len() > max_size) {
            return Err(QueueError::MessageTooLarge {
                size: message.body.len(),
                max_size,
            });
        }

        let mut ids = HashSet::new();
        if !messages.iter().all(|m| ids.insert(m.id.as_str())) {
            return Err(QueueError::ProviderError {
                provider: ProviderType::InMemory.to_string(),
                code: "AWS.SimpleQueueService.BatchEntryIdsNotDistinct".to_string(),
                message: "Two or more batch entries have the same Id".to_string(),
            });
        }

        tokio::task::yield_now().await;

        let outcome = {
            let mut storage = self.lock();
            storage.stats.send_batch_calls += 1;
            if let Some(error) = storage.faults.send.pop_front() {
                return Err(error);
            }

            let max_queue_size = self.config.max_queue_size;
            let now = Instant::now();
            let target = storage.queue_mut(queue);
            let mut outcome = BatchOutcome::default();

            for message in messages {
                if target.len() >= max_queue_size {
                    outcome.failed.push(BatchEntryFailure {
                        id: message.id.clone(),
                        code: "QueueFull".to_string(),
                        message: Some(format!("Queue is at capacity ({})", max_queue_size)),
                        sender_fault: false,
                    });
                    continue;
                }

                let delay = Duration::from_secs(u64::from(message.delay_seconds.unwrap_or(0)));
                target.messages.push_back(StoredMessage {
                    message_id: MessageId::new(),
                    body: message.body.clone(),
                    message_attributes: message.attributes.clone(),
                    sent_at: Timestamp::now(),
                    receive_count: 0,
                    available_at: now + delay,
                });
                outcome.successful.push(message.id.clone());
            }

            outcome
        };

        if !outcome.successful.is_empty() {
            self.arrivals.notify_waiters();
        }

        Ok(outcome)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
