//! # Queue Batcher Core
//!
//! A queue consumer that polls a service capped at ten messages per receive and
//! delete call, while letting applications process and acknowledge messages in
//! much larger batches.
//!
//! Three concerns are coordinated without losing a message:
//! - continuous polling of the queue ([`Consumer`])
//! - accumulation of polled messages into application-sized batches, flushed on
//!   a size threshold or a timeout ([`Batcher`], [`TimedBatcher`])
//! - deletion of acknowledged messages in service-sized chunks
//!   ([`Acknowledgement`], [`AckCoordinator`])
//!
//! Delivery is at-least-once: a message is only gone once an acknowledgement
//! for it succeeded. Runtime failures are reported as [`ConsumerEvent`]s and
//! never stop the consumer; failures are categorised by the [`ErrorClassifier`].
//!
//! ## Module Organization
//!
//! - [`batcher`] - Size/timeout batch accumulation
//! - [`consumer`] - The polling loop, its builder and the handler trait
//! - [`ack`] - Chunked acknowledgement
//! - [`classifier`] - Error taxonomy for runtime failures
//! - [`events`] - Consumer notifications
//! - [`options`] - Consumer configuration
//! - [`sender`] - Chunked outbound sending
//! - [`error`] - Error types

pub mod ack;
pub mod batcher;
pub mod classifier;
pub mod consumer;
pub mod error;
pub mod events;
pub mod options;
pub mod sender;

pub use ack::{AckCoordinator, AckPayload, Acknowledgement};
pub use batcher::{Batcher, BatcherOptions, FlushReceiver, TimedBatcher};
pub use classifier::{ErrorClassifier, ErrorKind};
pub use consumer::{handler_fn, Consumer, ConsumerBuilder, HandlerFn, MessageHandler};
pub use error::{ConfigurationError, ConsumerError, ProcessingFailure};
pub use events::{ConsumerEvent, EventReceiver};
pub use options::{ConsumerOptions, MAX_VISIBILITY_TIMEOUT_SECONDS, MAX_WAIT_TIME_SECONDS};
pub use sender::BatchSender;
