//! Client trait and factory for queue operations.

use crate::error::QueueError;
use crate::message::{
    BatchOutcome, DeleteBatchEntry, OutboundMessage, QueueUrl, ReceiptHandle, ReceiveRequest,
    ReceivedMessage,
};
use crate::provider::{InMemoryConfig, ProviderConfig, ProviderType};
use crate::providers::{AwsSqsProvider, InMemoryProvider};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Maximum number of entries a single receive, delete-batch or send-batch call accepts
pub const MAX_BATCH_ENTRIES: usize = 10;

/// Main interface for queue operations across all providers
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive up to `request.max_messages` messages, long-polling for
    /// `request.wait_time_seconds` when the queue is empty
    async fn receive_messages(
        &self,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Delete a single delivered message
    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError>;

    /// Delete up to [`MAX_BATCH_ENTRIES`] delivered messages in one call.
    ///
    /// A returned outcome with failed entries means the call reached the service
    /// but some entries were rejected.
    async fn delete_message_batch(
        &self,
        queue: &QueueUrl,
        entries: &[DeleteBatchEntry],
    ) -> Result<BatchOutcome, QueueError>;

    /// Send up to [`MAX_BATCH_ENTRIES`] messages in one call
    async fn send_message_batch(
        &self,
        queue: &QueueUrl,
        messages: &[OutboundMessage],
    ) -> Result<BatchOutcome, QueueError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;
}

/// Reject batches the service would refuse
pub(crate) fn check_batch_size(len: usize) -> Result<(), QueueError> {
    if len > MAX_BATCH_ENTRIES {
        return Err(QueueError::BatchTooLarge {
            size: len,
            max_size: MAX_BATCH_ENTRIES,
        });
    }
    Ok(())
}

/// Factory for creating queue clients with appropriate providers
pub struct QueueClientFactory;

impl QueueClientFactory {
    /// Create queue client from configuration
    pub async fn create_client(config: ProviderConfig) -> Result<Arc<dyn QueueClient>, QueueError> {
        let client: Arc<dyn QueueClient> = match config {
            ProviderConfig::InMemory(in_memory_config) => {
                Arc::new(InMemoryProvider::new(in_memory_config))
            }
            ProviderConfig::AwsSqs(aws_config) => Arc::new(
                AwsSqsProvider::new(aws_config)
                    .await
                    .map_err(|e| e.to_queue_error())?,
            ),
        };

        Ok(client)
    }

    /// Create test client with in-memory provider
    pub fn create_test_client() -> Arc<dyn QueueClient> {
        Arc::new(InMemoryProvider::new(InMemoryConfig::default()))
    }
}
