//! # Queue Runtime
//!
//! Queue client layer used by the queue-batcher consumer. It talks to services that
//! cap every receive, delete and send call at ten entries (AWS SQS semantics).
//!
//! This library provides:
//! - A provider-agnostic [`QueueClient`] trait (receive, delete, delete-batch, send-batch)
//! - An AWS SQS provider speaking the HTTP query API with Signature V4 signing
//! - An in-memory provider with visibility timeouts and fault injection for tests
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Queue URLs, received messages, receipt handles and batch entries
//! - [`provider`] - Provider types and configuration
//! - [`client`] - The client trait and factory
//! - [`providers`] - Concrete provider implementations

// Module declarations
pub mod client;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use client::{QueueClient, QueueClientFactory, MAX_BATCH_ENTRIES};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    BatchEntryFailure, BatchOutcome, DeleteBatchEntry, MessageId, OutboundMessage, QueueUrl,
    ReceiptHandle, ReceiveRequest, ReceivedMessage, Timestamp,
};
pub use provider::{AwsSqsConfig, InMemoryConfig, ProviderConfig, ProviderType};
pub use providers::{AwsSqsProvider, CallStats, InMemoryProvider};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
