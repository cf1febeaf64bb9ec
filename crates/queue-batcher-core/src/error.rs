//! Error types for the consumer core.

use queue_runtime::{BatchEntryFailure, QueueError};
use std::sync::Arc;
use thiserror::Error;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

/// Failure value an application hands back through its acknowledgement
pub type ProcessingFailure = Arc<dyn std::error::Error + Send + Sync>;

/// Invalid or missing construction options
///
/// Raised synchronously by constructors and never converted into an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Missing required option '{field}'")]
    Missing { field: String },

    #[error("Invalid value for option '{field}': {message}")]
    Invalid { field: String, message: String },
}

impl ConfigurationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending option
    pub fn field(&self) -> &str {
        match self {
            Self::Missing { field } | Self::Invalid { field, .. } => field,
        }
    }
}

/// Runtime failures of the poll/process/acknowledge cycle.
///
/// These are reported as consumer events; the loop keeps running after every one
/// of them. The variants are cheap to clone so one failure can reach every
/// subscriber.
#[derive(Debug, Clone, Error)]
pub enum ConsumerError {
    /// The service rejected the consumer's credentials; polling backs off
    #[error("Queue authentication failed: {0}")]
    Authentication(Arc<QueueError>),

    /// Any other receive failure; polling retries immediately
    #[error("Receive failed: {0}")]
    Receive(Arc<QueueError>),

    /// The application reported that it could not process a batch
    #[error("Message processing failed: {0}")]
    Processing(ProcessingFailure),

    /// The acknowledgement carried nothing to delete
    #[error("Malformed acknowledgement: {message}")]
    MalformedAcknowledgement { message: String },

    /// A delete call failed outright
    #[error("Acknowledgement failed: {0}")]
    Ack(Arc<QueueError>),

    /// Delete calls went through but the service rejected some entries
    #[error("Acknowledgement rejected for {} of {total} messages", .failed.len())]
    AckRejected {
        failed: Vec<BatchEntryFailure>,
        total: usize,
    },
}

impl ConsumerError {
    /// Wrap an application error as a processing failure
    pub fn processing<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Processing(Arc::new(error))
    }

    /// Underlying queue error, for failures that came from the service
    pub fn queue_error(&self) -> Option<&QueueError> {
        match self {
            Self::Authentication(e) | Self::Receive(e) | Self::Ack(e) => Some(&**e),
            _ => None,
        }
    }

    /// Whether the underlying service failure may clear on its own
    pub fn is_transient(&self) -> bool {
        self.queue_error().is_some_and(QueueError::is_transient)
    }
}
