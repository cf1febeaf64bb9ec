//! Outbound message sending in service-sized chunks.

use futures::future::join_all;
use queue_runtime::{
    BatchOutcome, OutboundMessage, QueueClient, QueueError, QueueUrl, MAX_BATCH_ENTRIES,
};
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;

/// Sends any number of messages to one queue using send-batch calls
#[derive(Clone)]
pub struct BatchSender {
    client: Arc<dyn QueueClient>,
    queue_url: QueueUrl,
}

impl BatchSender {
    pub fn new(client: Arc<dyn QueueClient>, queue_url: QueueUrl) -> Self {
        Self { client, queue_url }
    }

    pub fn queue_url(&self) -> &QueueUrl {
        &self.queue_url
    }

    /// Send messages in chunks of ten, concurrently.
    ///
    /// Entry ids only need to be unique within a chunk. Per-entry rejections
    /// are merged into the returned outcome.
    ///
    /// # Errors
    ///
    /// Returns the first error of any send-batch call that failed outright;
    /// other chunks may have been sent.
    pub async fn send(&self, messages: &[OutboundMessage]) -> Result<BatchOutcome, QueueError> {
        if messages.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let chunks: Vec<&[OutboundMessage]> = messages.chunks(MAX_BATCH_ENTRIES).collect();
        debug!(
            queue = %self.queue_url,
            messages = messages.len(),
            chunks = chunks.len(),
            "Sending messages"
        );

        let results = join_all(
            chunks
                .iter()
                .map(|chunk| self.client.send_message_batch(&self.queue_url, chunk)),
        )
        .await;

        let mut outcome = BatchOutcome::default();
        for result in results {
            outcome.merge(result?);
        }

        Ok(outcome)
    }

    /// Send plain bodies; entry ids are the bodies' positions in `bodies`
    pub async fn send_bodies<I, S>(&self, bodies: I) -> Result<BatchOutcome, QueueError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages: Vec<OutboundMessage> = bodies
            .into_iter()
            .enumerate()
            .map(|(idx, body)| OutboundMessage::new(idx.to_string(), body))
            .collect();

        self.send(&messages).await
    }
}
