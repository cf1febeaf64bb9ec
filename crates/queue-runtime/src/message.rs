//! Message types for queue operations including core domain identifiers.

use crate::error::{SerializationError, ValidationError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue URL, the identifier every queue operation is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueUrl(String);

impl QueueUrl {
    /// Create new queue URL with validation
    pub fn new(url: String) -> Result<Self, ValidationError> {
        if url.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "queue_url".to_string(),
            });
        }

        let parsed = url::Url::parse(&url).map_err(|e| ValidationError::InvalidFormat {
            field: "queue_url".to_string(),
            message: e.to_string(),
        })?;

        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(ValidationError::InvalidFormat {
                field: "queue_url".to_string(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        if parsed.host_str().is_none() {
            return Err(ValidationError::InvalidFormat {
                field: "queue_url".to_string(),
                message: "missing host".to_string(),
            });
        }

        Ok(Self(url))
    }

    /// Queue name, the last non-empty path segment of the URL
    pub fn queue_name(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(self.0.as_str())
    }

    /// Get queue URL as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueUrl {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueUrl {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueUrl> for String {
    fn from(value: QueueUrl) -> Self {
        value.0
    }
}

/// Service-assigned identifier of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Opaque token identifying one delivery of a message.
///
/// Required to delete the message. It goes stale once the message becomes
/// visible again and is redelivered with a new handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    /// Create new receipt handle
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get handle string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Create timestamp from milliseconds since the Unix epoch
    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_millis(millis).map(Self)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message received from the queue with delivery metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub receipt_handle: ReceiptHandle,
    pub body: String,
    /// System attributes requested through `attribute_names`
    pub attributes: HashMap<String, String>,
    /// String-valued message attributes requested through `message_attribute_names`
    pub message_attributes: HashMap<String, String>,
}

impl ReceivedMessage {
    /// Look up a system attribute such as `ApproximateReceiveCount`
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Number of times the service has delivered this message, when requested
    pub fn receive_count(&self) -> Option<u32> {
        self.attribute("ApproximateReceiveCount")
            .and_then(|count| count.parse().ok())
    }

    /// Time the message was originally sent, when requested
    pub fn sent_at(&self) -> Option<Timestamp> {
        self.attribute("SentTimestamp")
            .and_then(|millis| millis.parse().ok())
            .and_then(Timestamp::from_epoch_millis)
    }

    /// Deserialize the body as JSON
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, SerializationError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// A message to be sent as one entry of a send-batch call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Entry identifier, unique within one batch call
    pub id: String,
    pub body: String,
    pub delay_seconds: Option<u32>,
    pub attributes: HashMap<String, String>,
}

impl OutboundMessage {
    /// Create new outbound message with body
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            delay_seconds: None,
            attributes: HashMap::new(),
        }
    }

    /// Create an outbound message whose body is the JSON encoding of `value`
    pub fn json<T: Serialize>(id: impl Into<String>, value: &T) -> Result<Self, SerializationError> {
        let body = serde_json::to_string(value)?;
        Ok(Self::new(id, body))
    }

    /// Delay delivery of this message
    pub fn with_delay(mut self, seconds: u32) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }

    /// Add a string message attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// One entry of a delete-batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBatchEntry {
    pub id: String,
    pub receipt_handle: ReceiptHandle,
}

impl DeleteBatchEntry {
    pub fn new(id: impl Into<String>, receipt_handle: ReceiptHandle) -> Self {
        Self {
            id: id.into(),
            receipt_handle,
        }
    }
}

/// An entry the service rejected inside an otherwise successful batch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntryFailure {
    pub id: String,
    pub code: String,
    pub message: Option<String>,
    pub sender_fault: bool,
}

/// Result of a batch call: which entries succeeded and which were rejected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<BatchEntryFailure>,
}

impl BatchOutcome {
    /// True when no entry of the batch was rejected
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold the outcome of another chunk into this one
    pub fn merge(&mut self, other: BatchOutcome) {
        self.successful.extend(other.successful);
        self.failed.extend(other.failed);
    }
}

// ============================================================================
// Receive Request
// ============================================================================

/// Parameters of a single receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub queue_url: QueueUrl,
    /// Maximum number of messages to return (1-10)
    pub max_messages: u32,
    /// Long-poll wait time (0-20 seconds); `None` uses the queue default
    pub wait_time_seconds: Option<u32>,
    /// Visibility timeout applied to returned messages; `None` uses the queue default
    pub visibility_timeout_seconds: Option<u32>,
    pub attribute_names: Vec<String>,
    pub message_attribute_names: Vec<String>,
}

impl ReceiveRequest {
    /// Create a request for a single message with queue defaults
    pub fn new(queue_url: QueueUrl) -> Self {
        Self {
            queue_url,
            max_messages: 1,
            wait_time_seconds: None,
            visibility_timeout_seconds: None,
            attribute_names: Vec::new(),
            message_attribute_names: Vec::new(),
        }
    }

    /// Set maximum number of messages to receive
    pub fn with_max_messages(mut self, max: u32) -> Self {
        self.max_messages = max;
        self
    }

    /// Set long-poll wait time
    pub fn with_wait_time_seconds(mut self, seconds: u32) -> Self {
        self.wait_time_seconds = Some(seconds);
        self
    }

    /// Set visibility timeout for returned messages
    pub fn with_visibility_timeout_seconds(mut self, seconds: u32) -> Self {
        self.visibility_timeout_seconds = Some(seconds);
        self
    }

    /// Set the system attribute names to return
    pub fn with_attribute_names(mut self, names: Vec<String>) -> Self {
        self.attribute_names = names;
        self
    }

    /// Set the message attribute names to return
    pub fn with_message_attribute_names(mut self, names: Vec<String>) -> Self {
        self.message_attribute_names = names;
        self
    }

    /// Check the request against the service limits
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=10).contains(&self.max_messages) {
            return Err(ValidationError::OutOfRange {
                field: "max_messages".to_string(),
                message: format!("must be between 1 and 10, got {}", self.max_messages),
            });
        }

        if let Some(wait) = self.wait_time_seconds {
            if wait > 20 {
                return Err(ValidationError::OutOfRange {
                    field: "wait_time_seconds".to_string(),
                    message: format!("must be at most 20, got {}", wait),
                });
            }
        }

        if let Some(visibility) = self.visibility_timeout_seconds {
            if visibility > 43_200 {
                return Err(ValidationError::OutOfRange {
                    field: "visibility_timeout_seconds".to_string(),
                    message: format!("must be at most 43200, got {}", visibility),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
