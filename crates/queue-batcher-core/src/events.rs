//! Notifications emitted by the consumer.

use crate::error::ConsumerError;
use queue_runtime::ReceivedMessage;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;

/// Receiving end of a consumer subscription
pub type EventReceiver = mpsc::UnboundedReceiver<ConsumerEvent>;

/// Everything the consumer reports to the hosting application
#[derive(Debug, Clone)]
pub enum ConsumerEvent {
    /// Authentication or generic receive failure
    Error(ConsumerError),

    /// A receive returned one or more messages
    MessageReceived(Vec<ReceivedMessage>),

    /// The application reported a failure, or an acknowledgement was malformed or failed
    ProcessingError(ConsumerError),

    /// An acknowledgement deleted all of its messages
    MessageProcessed(Vec<ReceivedMessage>),

    /// A poll was attempted after `stop()`
    Stopped,

    /// The batcher emitted a batch
    Flush(Vec<ReceivedMessage>),
}

impl ConsumerEvent {
    /// Stable notification name, as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::MessageReceived(_) => "message:received",
            Self::ProcessingError(_) => "processing:error",
            Self::MessageProcessed(_) => "message:processed",
            Self::Stopped => "stopped",
            Self::Flush(_) => "flush",
        }
    }
}

/// Fan-out of consumer events to any number of subscribers.
///
/// Events are delivered in emission order; subscribers whose receiver was
/// dropped are pruned on the next emission.
#[derive(Clone, Default)]
pub(crate) struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ConsumerEvent>>>>,
}

impl EventBus {
    pub(crate) fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: ConsumerEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
