//! The consumer control loop.
//!
//! A [`Consumer`] polls one queue continuously. Every non-empty receive is
//! reported as a `MessageReceived` event and then either handed to the
//! application directly or added to a [`Batcher`], whose flushes are handed to
//! the application as they happen. Polling never waits for the application or
//! for acknowledgements: many batches can be in flight at once.
//!
//! Runtime failures never end the loop. Authentication failures delay the next
//! poll by the configured back-off, every other failure is retried immediately.
//! Only [`Consumer::stop`] halts polling, and only at the next poll decision; a
//! receive already in flight completes and its messages are still dispatched.
//!
//! # Example
//!
//! ```no_run
//! use queue_batcher_core::{handler_fn, ConsumerBuilder, ConsumerOptions};
//! use queue_runtime::QueueClientFactory;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ConsumerOptions {
//!     batch_size: 10,
//!     wait_time_seconds: Some(20),
//!     buffer_size: Some(100),
//!     ..ConsumerOptions::for_queue("https://sqs.us-east-1.amazonaws.com/123456789012/jobs")
//! };
//!
//! let consumer = ConsumerBuilder::new()
//!     .options(options)
//!     .handler(handler_fn(|messages, ack| async move {
//!         println!("processing {} messages", messages.len());
//!         let _ = ack.complete().await;
//!     }))
//!     .build(QueueClientFactory::create_test_client())?;
//!
//! let mut events = consumer.subscribe();
//! consumer.start();
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! # Ok(())
//! # }
//! ```

use crate::ack::{AckCoordinator, Acknowledgement};
use crate::batcher::{Batcher, FlushReceiver, TimedBatcher};
use crate::classifier::ErrorClassifier;
use crate::error::ConfigurationError;
use crate::events::{ConsumerEvent, EventBus, EventReceiver};
use crate::options::ConsumerOptions;
use async_trait::async_trait;
use queue_runtime::{QueueClient, QueueUrl, ReceiveRequest, ReceivedMessage};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

// ============================================================================
// Application Callback
// ============================================================================

/// Application callback invoked with every batch of messages.
///
/// Each invocation is spawned as its own Tokio task, in buffered and unbuffered
/// mode alike. The poll loop does not wait for the handler to start or finish,
/// so the next receive may be issued before the handler has run at all. A
/// handler that needs back-pressure must provide it itself.
///
/// The handler signals completion through the [`Acknowledgement`]; a batch
/// that is never acknowledged is redelivered after its visibility timeout.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, messages: Vec<ReceivedMessage>, ack: Acknowledgement);
}

/// [`MessageHandler`] backed by an async closure
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`MessageHandler`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Vec<ReceivedMessage>, Acknowledgement) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(Vec<ReceivedMessage>, Acknowledgement) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, messages: Vec<ReceivedMessage>, ack: Acknowledgement) {
        (self.f)(messages, ack).await
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder validating consumer construction options
#[derive(Default)]
pub struct ConsumerBuilder {
    options: ConsumerOptions,
    handler: Option<Arc<dyn MessageHandler>>,
    batcher: Option<Arc<dyn Batcher<ReceivedMessage>>>,
}

impl ConsumerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_url(mut self, queue_url: impl Into<String>) -> Self {
        self.options.queue_url = Some(queue_url.into());
        self
    }

    /// Replace all options; a queue URL set earlier is kept when `options` has none
    pub fn options(mut self, mut options: ConsumerOptions) -> Self {
        if options.queue_url.is_none() {
            options.queue_url = self.options.queue_url.take();
        }
        self.options = options;
        self
    }

    pub fn handler(mut self, handler: impl MessageHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Use a custom batcher instead of the default [`TimedBatcher`].
    ///
    /// Providing one enables buffering even when `buffer_size` is unset.
    pub fn batcher(mut self, batcher: Arc<dyn Batcher<ReceivedMessage>>) -> Self {
        self.batcher = Some(batcher);
        self
    }

    /// Validate the options and create a stopped consumer.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] naming the offending option: a missing
    /// or invalid `queue_url`, a missing `handler`, a `batch_size` outside 1-10,
    /// or a `buffer_size` not greater than `batch_size`.
    pub fn build(self, client: Arc<dyn QueueClient>) -> Result<Consumer, ConfigurationError> {
        let queue_url = self.options.parsed_queue_url()?;
        let handler = self
            .handler
            .ok_or_else(|| ConfigurationError::missing("handler"))?;
        self.options.validate()?;

        let batcher = match (self.batcher, self.options.batcher_options()) {
            (Some(batcher), _) => Some(batcher),
            (None, Some(batcher_options)) => {
                let batcher: Arc<dyn Batcher<ReceivedMessage>> =
                    Arc::new(TimedBatcher::new(batcher_options)?);
                Some(batcher)
            }
            (None, None) => None,
        };

        // Subscribe now so no flush is missed before the first start
        let flushes = batcher.as_ref().map(|b| b.subscribe());

        let events = EventBus::default();
        let acks = AckCoordinator::new(client.clone(), queue_url.clone(), events.clone());
        let request = self.options.receive_request(queue_url.clone());

        Ok(Consumer {
            inner: Arc::new(ConsumerInner {
                client,
                queue_url,
                request,
                auth_error_backoff: self.options.auth_error_backoff(),
                options: self.options,
                handler,
                batcher,
                events,
                acks,
                state: Mutex::new(LoopState {
                    stopped: true,
                    polling: false,
                    flushes,
                }),
            }),
        })
    }
}

// ============================================================================
// Consumer
// ============================================================================

/// Continuously polling queue consumer
///
/// Cloning yields another handle to the same consumer. A running consumer keeps
/// polling after its handles are dropped; call [`Consumer::stop`] to end it.
#[derive(Clone)]
pub struct Consumer {
    inner: Arc<ConsumerInner>,
}

struct ConsumerInner {
    client: Arc<dyn QueueClient>,
    queue_url: QueueUrl,
    request: ReceiveRequest,
    auth_error_backoff: Duration,
    options: ConsumerOptions,
    handler: Arc<dyn MessageHandler>,
    batcher: Option<Arc<dyn Batcher<ReceivedMessage>>>,
    events: EventBus,
    acks: AckCoordinator,
    state: Mutex<LoopState>,
}

struct LoopState {
    stopped: bool,
    /// A poll task exists; it re-reads `stopped` before every receive
    polling: bool,
    /// Taken by the flush dispatcher on first start
    flushes: Option<FlushReceiver<ReceivedMessage>>,
}

impl Consumer {
    pub fn builder() -> ConsumerBuilder {
        ConsumerBuilder::new()
    }

    /// Start polling. No-op when already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut state = self.inner.lock();
        if !state.stopped {
            return;
        }
        state.stopped = false;

        if let Some(flushes) = state.flushes.take() {
            tokio::spawn(ConsumerInner::dispatch_flushes(
                Arc::downgrade(&self.inner),
                flushes,
            ));
        }

        // A poll task that has not yet observed a previous stop keeps running
        if !state.polling {
            state.polling = true;
            tokio::spawn(self.inner.clone().poll_loop());
        }

        info!(
            queue = %self.inner.queue_url,
            batch_size = self.inner.options.batch_size,
            buffered = self.inner.batcher.is_some(),
            "Consumer started"
        );
    }

    /// Request a stop. Takes effect at the next poll decision, which emits
    /// `Stopped`; an in-flight receive is not cancelled.
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        info!(queue = %self.inner.queue_url, "Consumer stop requested");
    }

    pub fn is_running(&self) -> bool {
        !self.inner.lock().stopped
    }

    /// Subscribe to consumer events
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    pub fn queue_url(&self) -> &QueueUrl {
        &self.inner.queue_url
    }

    pub fn options(&self) -> &ConsumerOptions {
        &self.inner.options
    }
}

impl ConsumerInner {
    fn lock(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn poll_loop(self: Arc<Self>) {
        loop {
            {
                let mut state = self.lock();
                if state.stopped {
                    state.polling = false;
                    drop(state);
                    debug!(queue = %self.queue_url, "Poll skipped, consumer stopped");
                    self.events.emit(ConsumerEvent::Stopped);
                    return;
                }
            }

            if let Some(backoff) = self.poll().await {
                tokio::time::sleep(backoff).await;
            }
        }
    }

    /// Run one receive and dispatch its result. Returns the delay to wait
    /// before the next poll, if any.
    async fn poll(&self) -> Option<Duration> {
        match self.client.receive_messages(&self.request).await {
            Ok(messages) if messages.is_empty() => {
                debug!(queue = %self.queue_url, "Receive returned no messages");
                None
            }
            Ok(messages) => {
                debug!(
                    queue = %self.queue_url,
                    count = messages.len(),
                    "Received messages"
                );
                self.events
                    .emit(ConsumerEvent::MessageReceived(messages.clone()));
                self.dispatch(messages);
                None
            }
            Err(error) => {
                let error = ErrorClassifier::classify_receive(error);
                let backs_off = error.kind().backs_off();
                warn!(
                    queue = %self.queue_url,
                    kind = ?error.kind(),
                    transient = error.is_transient(),
                    error = %error,
                    "Receive failed"
                );
                self.events.emit(ConsumerEvent::Error(error));

                if backs_off {
                    Some(self.auth_error_backoff)
                } else {
                    tokio::task::yield_now().await;
                    None
                }
            }
        }
    }

    fn dispatch(&self, messages: Vec<ReceivedMessage>) {
        match &self.batcher {
            Some(batcher) => batcher.add(messages),
            None => self.invoke_handler(messages),
        }
    }

    fn invoke_handler(&self, messages: Vec<ReceivedMessage>) {
        let ack = Acknowledgement::new(self.acks.clone(), messages.clone());
        let handler = self.handler.clone();
        tokio::spawn(async move {
            handler.handle(messages, ack).await;
        });
    }

    /// Hand every batcher flush to the application
    async fn dispatch_flushes(
        consumer: Weak<ConsumerInner>,
        mut flushes: FlushReceiver<ReceivedMessage>,
    ) {
        while let Some(batch) = flushes.recv().await {
            let Some(inner) = consumer.upgrade() else {
                return;
            };

            debug!(
                queue = %inner.queue_url,
                size = batch.len(),
                "Dispatching flushed batch"
            );
            inner.events.emit(ConsumerEvent::Flush(batch.clone()));
            inner.invoke_handler(batch);
        }
    }
}
