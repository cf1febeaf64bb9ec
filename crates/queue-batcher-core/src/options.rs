//! Consumer configuration options.

use crate::batcher::BatcherOptions;
use crate::error::ConfigurationError;
use queue_runtime::{QueueUrl, ReceiveRequest, MAX_BATCH_ENTRIES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;

/// Longest long-poll wait the service accepts
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

/// Longest visibility timeout the service accepts (12 hours)
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: u32 = 43_200;

/// Options recognized by the consumer.
///
/// Every field has a default, so options can be loaded from partial
/// configuration files. Call [`ConsumerOptions::validate`] (the consumer
/// builder does) before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerOptions {
    /// Queue to consume from (required)
    pub queue_url: Option<String>,

    /// Messages requested per receive call (1-10)
    pub batch_size: u32,

    /// Long-poll wait per receive call; `None` uses the queue default
    pub wait_time_seconds: Option<u32>,

    /// Visibility timeout applied to received messages; `None` uses the queue default
    pub visibility_timeout_seconds: Option<u32>,

    /// System attributes to request, e.g. `ApproximateReceiveCount` or `All`
    pub attribute_names: Vec<String>,

    /// Message attributes to request, e.g. `All`
    pub message_attribute_names: Vec<String>,

    /// Delay before polling again after an authentication failure
    pub auth_error_backoff_ms: u64,

    /// Batch capacity; buffering is enabled when set and non-zero
    pub buffer_size: Option<usize>,

    /// Deferred-flush delay of the buffer, measured from its first message
    pub buffer_timeout_ms: u64,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            queue_url: None,
            batch_size: 1,
            wait_time_seconds: None,
            visibility_timeout_seconds: None,
            attribute_names: Vec::new(),
            message_attribute_names: Vec::new(),
            auth_error_backoff_ms: 10_000,
            buffer_size: None,
            buffer_timeout_ms: 10_000,
        }
    }
}

impl ConsumerOptions {
    /// Options for a queue with every other setting at its default
    pub fn for_queue(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: Some(queue_url.into()),
            ..Self::default()
        }
    }

    /// Whether received messages go through a batcher
    pub fn buffering_enabled(&self) -> bool {
        matches!(self.buffer_size, Some(size) if size > 0)
    }

    pub fn auth_error_backoff(&self) -> Duration {
        Duration::from_millis(self.auth_error_backoff_ms)
    }

    /// Parse and validate the queue URL
    pub fn parsed_queue_url(&self) -> Result<QueueUrl, ConfigurationError> {
        let url = self
            .queue_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigurationError::missing("queue_url"))?;

        QueueUrl::new(url.to_string())
            .map_err(|e| ConfigurationError::invalid("queue_url", e.to_string()))
    }

    /// Options for the default batcher, when buffering is enabled
    pub fn batcher_options(&self) -> Option<BatcherOptions> {
        self.buffer_size
            .filter(|size| *size > 0)
            .map(|size| BatcherOptions::new(size, self.buffer_timeout_ms))
    }

    /// Build the receive request every poll issues
    pub fn receive_request(&self, queue_url: QueueUrl) -> ReceiveRequest {
        let mut request = ReceiveRequest::new(queue_url)
            .with_max_messages(self.batch_size)
            .with_attribute_names(self.attribute_names.clone())
            .with_message_attribute_names(self.message_attribute_names.clone());
        request.wait_time_seconds = self.wait_time_seconds;
        request.visibility_timeout_seconds = self.visibility_timeout_seconds;
        request
    }

    /// Validate option constraints
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] naming the first offending option.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.parsed_queue_url()?;

        if !(1..=MAX_BATCH_ENTRIES as u32).contains(&self.batch_size) {
            return Err(ConfigurationError::invalid(
                "batch_size",
                format!(
                    "must be between 1 and {}, got {}",
                    MAX_BATCH_ENTRIES, self.batch_size
                ),
            ));
        }

        if let Some(wait) = self.wait_time_seconds {
            if wait > MAX_WAIT_TIME_SECONDS {
                return Err(ConfigurationError::invalid(
                    "wait_time_seconds",
                    format!("must be at most {}, got {}", MAX_WAIT_TIME_SECONDS, wait),
                ));
            }
        }

        if let Some(visibility) = self.visibility_timeout_seconds {
            if visibility > MAX_VISIBILITY_TIMEOUT_SECONDS {
                return Err(ConfigurationError::invalid(
                    "visibility_timeout_seconds",
                    format!(
                        "must be at most {}, got {}",
                        MAX_VISIBILITY_TIMEOUT_SECONDS, visibility
                    ),
                ));
            }
        }

        if let Some(buffer_size) = self.buffer_size.filter(|size| *size > 0) {
            if buffer_size <= self.batch_size as usize {
                return Err(ConfigurationError::invalid(
                    "buffer_size",
                    format!(
                        "must be greater than batch_size ({}), got {}",
                        self.batch_size, buffer_size
                    ),
                ));
            }

            if self.buffer_timeout_ms == 0 {
                return Err(ConfigurationError::invalid(
                    "buffer_timeout_ms",
                    "must be positive when buffering is enabled",
                ));
            }
        }

        Ok(())
    }
}
