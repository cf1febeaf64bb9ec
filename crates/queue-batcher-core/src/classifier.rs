//! Mapping of raw queue failures onto the consumer's error taxonomy.
//!
//! The classification decides which event channel a failure is reported on
//! and whether the next poll is delayed.

use crate::error::ConsumerError;
use queue_runtime::QueueError;
use std::sync::Arc;

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;

/// Service error codes that signal missing, invalid or expired credentials
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "CredentialsError",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "MissingAuthenticationToken",
    "AccessDenied",
    "AccessDeniedException",
];

/// Coarse category of a consumer failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credentials or authorization problem during receive
    Authentication,
    /// Any other service failure during receive
    Receive,
    /// Application-level failure or malformed acknowledgement
    Processing,
    /// A delete call failed or rejected entries
    Ack,
}

impl ErrorKind {
    /// Whether the next poll waits for the authentication back-off
    pub fn backs_off(&self) -> bool {
        matches!(self, Self::Authentication)
    }
}

/// Classifies queue failures for the consumer loop and the acknowledgement path
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// True for failures where the service reported a credentials or
    /// authorization condition
    pub fn is_authentication(error: &QueueError) -> bool {
        error.is_authentication()
            || error
                .code()
                .is_some_and(|code| CREDENTIAL_ERROR_CODES.contains(&code))
    }

    /// Classify a failed receive call
    pub fn classify_receive(error: QueueError) -> ConsumerError {
        if Self::is_authentication(&error) {
            ConsumerError::Authentication(Arc::new(error))
        } else {
            ConsumerError::Receive(Arc::new(error))
        }
    }

    /// Classify a failed delete or delete-batch call
    pub fn classify_delete(error: QueueError) -> ConsumerError {
        ConsumerError::Ack(Arc::new(error))
    }

    /// Category of an already classified failure
    pub fn kind(error: &ConsumerError) -> ErrorKind {
        match error {
            ConsumerError::Authentication(_) => ErrorKind::Authentication,
            ConsumerError::Receive(_) => ErrorKind::Receive,
            ConsumerError::Processing(_) | ConsumerError::MalformedAcknowledgement { .. } => {
                ErrorKind::Processing
            }
            ConsumerError::Ack(_) | ConsumerError::AckRejected { .. } => ErrorKind::Ack,
        }
    }
}

impl ConsumerError {
    /// Category of this failure
    pub fn kind(&self) -> ErrorKind {
        ErrorClassifier::kind(self)
    }
}
