//! Common test utilities for queue-batcher integration tests
//!
//! This module provides:
//! - The queue every test consumes from
//! - Handlers that record the batches they see
//! - Helpers for waiting on consumer events

use queue_batcher_core::{
    handler_fn, Acknowledgement, ConsumerEvent, ConsumerOptions, EventReceiver, MessageHandler,
};
use queue_runtime::{QueueUrl, ReceivedMessage};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const QUEUE: &str = "https://sqs.us-east-1.amazonaws.com/000000000000/integration";

pub fn queue() -> QueueUrl {
    QueueUrl::new(QUEUE.to_string()).unwrap()
}

/// Options for ten-message receives with the longest long poll
pub fn options() -> ConsumerOptions {
    ConsumerOptions {
        batch_size: 10,
        wait_time_seconds: Some(20),
        ..ConsumerOptions::for_queue(QUEUE)
    }
}

/// Batches seen by a handler, in invocation order
#[derive(Clone, Default)]
pub struct Recorder {
    batches: Arc<Mutex<Vec<Vec<ReceivedMessage>>>>,
}

impl Recorder {
    pub fn record(&self, messages: &[ReceivedMessage]) {
        self.batches.lock().unwrap().push(messages.to_vec());
    }

    #[allow(dead_code)]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    #[allow(dead_code)]
    pub fn bodies(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|m| m.body.clone())
            .collect()
    }
}

/// Handler that records every batch and acknowledges it in full
#[allow(dead_code)]
pub fn recording_handler(recorder: Recorder) -> impl MessageHandler {
    handler_fn(move |messages: Vec<ReceivedMessage>, ack: Acknowledgement| {
        let recorder = recorder.clone();
        async move {
            recorder.record(&messages);
            let _ = ack.complete().await;
        }
    })
}

pub async fn next_event(events: &mut EventReceiver) -> ConsumerEvent {
    tokio::time::timeout(Duration::from_secs(300), events.recv())
        .await
        .expect("timed out waiting for consumer event")
        .expect("event stream closed")
}

/// Wait until `total` messages have been acknowledged; returns the sizes of
/// the acknowledged batches in completion order
#[allow(dead_code)]
pub async fn wait_for_processed(events: &mut EventReceiver, total: usize) -> Vec<usize> {
    let mut sizes = Vec::new();
    while sizes.iter().sum::<usize>() < total {
        match next_event(events).await {
            ConsumerEvent::MessageProcessed(messages) => sizes.push(messages.len()),
            ConsumerEvent::ProcessingError(error) => panic!("unexpected processing error: {error}"),
            _ => {}
        }
    }
    sizes
}
