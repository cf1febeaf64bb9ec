//! Error taxonomy of the queue client layer.
//!
//! Every provider maps its failures onto [`QueueError`]. Callers decide how to
//! react through [`QueueError::is_transient`] and
//! [`QueueError::is_authentication`] instead of matching provider error codes.

use thiserror::Error;

/// Failure of a queue operation
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue does not exist: {queue_url}")]
    QueueNotFound { queue_url: String },

    /// The receipt belongs to an earlier delivery or was never issued
    #[error("Receipt handle is invalid or expired: {receipt}")]
    InvalidReceipt { receipt: String },

    /// Network failure, including a request that timed out
    #[error("Could not reach the queue service: {message}")]
    ConnectionFailed { message: String },

    #[error("Queue service rejected the credentials: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not authorized to {operation}")]
    PermissionDenied { operation: String },

    #[error("Message of {size} bytes exceeds the limit of {max_size} bytes")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("{size} batch entries exceed the per-call limit of {max_size}")]
    BatchTooLarge { size: usize, max_size: usize },

    /// Service error with no dedicated variant
    #[error("{provider} error {code}: {message}")]
    ProviderError {
        provider: String,
        code: String,
        message: String,
    },

    #[error("Invalid message data: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Invalid client configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
}

impl QueueError {
    /// Whether repeating the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::ProviderError { .. }
        )
    }

    /// True when the service rejected the caller's credentials or authorization
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::PermissionDenied { .. }
        )
    }

    /// Service error code, when the provider reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::ProviderError { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

/// Message bodies or service responses that could not be converted
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed service response: {message}")]
    MalformedResponse { message: String },
}

/// Provider settings that cannot be used to build a client
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{message}")]
    Invalid { message: String },
}

/// Request values rejected before any call is made
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} is malformed: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("{field} is out of range: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
