//! Acknowledgement of processed messages.
//!
//! An acknowledgement turns the application's "done" signal into delete calls.
//! A single message is deleted with one delete call; larger sets are split into
//! chunks of [`MAX_BATCH_ENTRIES`] in arrival order and deleted with concurrent
//! delete-batch calls. The acknowledgement succeeds only if every chunk deletes
//! every one of its entries; no partial re-delete is attempted, undeleted
//! messages come back after their visibility timeout.
//!
//! Acknowledgement never stops the consumer: the outcome is reported as a
//! `MessageProcessed` or `ProcessingError` event and returned to the caller.

use crate::classifier::ErrorClassifier;
use crate::error::{ConsumerError, ProcessingFailure};
use crate::events::{ConsumerEvent, EventBus};
use futures::future::join_all;
use queue_runtime::{
    DeleteBatchEntry, QueueClient, QueueUrl, ReceivedMessage, MAX_BATCH_ENTRIES,
};
use std::sync::Arc;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "ack_tests.rs"]
mod tests;

/// What an application hands back when it is done with a batch
#[derive(Debug, Clone)]
pub enum AckPayload {
    /// Nothing to acknowledge; reported as a malformed acknowledgement
    Empty,
    /// Processing failed; nothing is deleted
    Failed(ProcessingFailure),
    /// Delete these messages
    Messages(Vec<ReceivedMessage>),
}

impl From<Vec<ReceivedMessage>> for AckPayload {
    fn from(messages: Vec<ReceivedMessage>) -> Self {
        Self::Messages(messages)
    }
}

impl From<ReceivedMessage> for AckPayload {
    fn from(message: ReceivedMessage) -> Self {
        Self::Messages(vec![message])
    }
}

impl From<Option<Vec<ReceivedMessage>>> for AckPayload {
    fn from(messages: Option<Vec<ReceivedMessage>>) -> Self {
        messages.map_or(Self::Empty, Self::Messages)
    }
}

/// Converts acknowledgements into delete calls against one queue
#[derive(Clone)]
pub struct AckCoordinator {
    client: Arc<dyn QueueClient>,
    queue_url: QueueUrl,
    events: EventBus,
}

impl AckCoordinator {
    pub(crate) fn new(client: Arc<dyn QueueClient>, queue_url: QueueUrl, events: EventBus) -> Self {
        Self {
            client,
            queue_url,
            events,
        }
    }

    /// Acknowledge a payload and report the outcome.
    ///
    /// Emits exactly one `MessageProcessed` on success or one `ProcessingError`
    /// on failure. The returned error mirrors the emitted one.
    pub async fn acknowledge(&self, payload: AckPayload) -> Result<(), ConsumerError> {
        let outcome = match payload {
            AckPayload::Empty => Err(ConsumerError::MalformedAcknowledgement {
                message: "acknowledgement carried no messages".to_string(),
            }),
            AckPayload::Messages(messages) if messages.is_empty() => {
                Err(ConsumerError::MalformedAcknowledgement {
                    message: "acknowledgement carried an empty message set".to_string(),
                })
            }
            AckPayload::Failed(error) => Err(ConsumerError::Processing(error)),
            AckPayload::Messages(messages) => {
                let deleted = self.delete(&messages).await;
                deleted.map(|()| messages)
            }
        };

        match outcome {
            Ok(messages) => {
                debug!(
                    queue = %self.queue_url,
                    count = messages.len(),
                    "Messages acknowledged"
                );
                self.events.emit(ConsumerEvent::MessageProcessed(messages));
                Ok(())
            }
            Err(error) => {
                warn!(
                    queue = %self.queue_url,
                    kind = ?error.kind(),
                    transient = error.is_transient(),
                    error = %error,
                    "Acknowledgement did not delete messages"
                );
                self.events
                    .emit(ConsumerEvent::ProcessingError(error.clone()));
                Err(error)
            }
        }
    }

    async fn delete(&self, messages: &[ReceivedMessage]) -> Result<(), ConsumerError> {
        if let [message] = messages {
            return self
                .client
                .delete_message(&self.queue_url, &message.receipt_handle)
                .await
                .map_err(ErrorClassifier::classify_delete);
        }

        let chunks: Vec<Vec<DeleteBatchEntry>> = messages
            .chunks(MAX_BATCH_ENTRIES)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .map(|(idx, m)| DeleteBatchEntry::new(idx.to_string(), m.receipt_handle.clone()))
                    .collect()
            })
            .collect();

        debug!(
            queue = %self.queue_url,
            messages = messages.len(),
            chunks = chunks.len(),
            "Deleting acknowledged messages"
        );

        let outcomes = join_all(
            chunks
                .iter()
                .map(|entries| self.client.delete_message_batch(&self.queue_url, entries)),
        )
        .await;

        let mut failed = Vec::new();
        let mut call_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(outcome) => failed.extend(outcome.failed),
                Err(error) => {
                    call_error.get_or_insert(error);
                }
            }
        }

        if let Some(error) = call_error {
            return Err(ErrorClassifier::classify_delete(error));
        }
        if !failed.is_empty() {
            return Err(ConsumerError::AckRejected {
                failed,
                total: messages.len(),
            });
        }

        Ok(())
    }
}

/// Acknowledgement handle passed to the application with every batch
///
/// Cloneable; any clone may acknowledge, and may do so more than once.
#[derive(Clone)]
pub struct Acknowledgement {
    coordinator: AckCoordinator,
    delivered: Arc<Vec<ReceivedMessage>>,
}

impl Acknowledgement {
    pub(crate) fn new(coordinator: AckCoordinator, delivered: Vec<ReceivedMessage>) -> Self {
        Self {
            coordinator,
            delivered: Arc::new(delivered),
        }
    }

    /// Messages of the batch this handle was issued for
    pub fn messages(&self) -> &[ReceivedMessage] {
        &self.delivered
    }

    /// Delete every message of the delivered batch
    pub async fn complete(&self) -> Result<(), ConsumerError> {
        self.acknowledge(AckPayload::Messages(self.delivered.to_vec()))
            .await
    }

    /// Delete a subset (or any set) of messages
    pub async fn complete_messages(
        &self,
        messages: Vec<ReceivedMessage>,
    ) -> Result<(), ConsumerError> {
        self.acknowledge(AckPayload::Messages(messages)).await
    }

    /// Report a processing failure; nothing is deleted
    pub async fn fail<E>(&self, error: E) -> Result<(), ConsumerError>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.acknowledge(AckPayload::Failed(Arc::new(error))).await
    }

    pub async fn acknowledge(&self, payload: AckPayload) -> Result<(), ConsumerError> {
        self.coordinator.acknowledge(payload).await
    }
}
