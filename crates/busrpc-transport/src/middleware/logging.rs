//! Logging middleware for busrpc transports.
//!
//! This middleware logs every publish, request and delivered message,
//! useful for debugging and monitoring.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use busrpc_core::context::CallContext;
use tracing::{Level, debug, trace, warn};

use crate::error::TransportError;
use crate::middleware::TransportLayer;
use crate::traits::{Delivery, Message, MessageHandler, Publisher, Subscriber};

/// A layer that adds logging to a transport.
///
/// Logs all published and delivered messages at the configured level.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    /// The log level to use.
    level: Level,
    /// Whether to log message payload sizes.
    log_sizes: bool,
}

impl LoggingLayer {
    /// Create a new logging layer with the specified log level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self {
            level,
            log_sizes: false,
        }
    }

    /// Configure whether to log payload sizes.
    #[must_use]
    pub const fn with_sizes(mut self, log_sizes: bool) -> Self {
        self.log_sizes = log_sizes;
        self
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl<T> TransportLayer<T> for LoggingLayer {
    type Transport = LoggingTransport<T>;

    fn layer(&self, inner: T) -> Self::Transport {
        LoggingTransport {
            inner,
            level: self.level,
            log_sizes: self.log_sizes,
            counters: Arc::new(Counters::default()),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    requests: AtomicU64,
    delivered: AtomicU64,
}

/// A transport wrapped with logging.
pub struct LoggingTransport<T> {
    inner: T,
    level: Level,
    log_sizes: bool,
    counters: Arc<Counters>,
}

impl<T> LoggingTransport<T> {
    /// Number of messages published, including requests.
    pub fn messages_published(&self) -> u64 {
        self.counters.published.load(Ordering::Relaxed)
    }

    /// Number of requests sent.
    pub fn requests_sent(&self) -> u64 {
        self.counters.requests.load(Ordering::Relaxed)
    }

    /// Number of messages delivered to subscription handlers.
    pub fn messages_delivered(&self) -> u64 {
        self.counters.delivered.load(Ordering::Relaxed)
    }

    /// Get a reference to the wrapped transport.
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    fn log(&self, count: u64, subject: &str, size: usize, what: &str) {
        let size = self.log_sizes.then_some(size);
        match self.level {
            Level::TRACE => trace!(count, subject, ?size, "{what}"),
            _ => debug!(count, subject, ?size, "{what}"),
        }
    }
}

impl<T: Publisher> Publisher for LoggingTransport<T> {
    async fn publish(&self, msg: Message) -> Result<(), TransportError> {
        let count = self.counters.published.fetch_add(1, Ordering::Relaxed) + 1;
        self.log(count, &msg.subject, msg.data.len(), "publishing message");

        let subject = msg.subject.clone();
        let result = self.inner.publish(msg).await;
        if let Err(e) = &result {
            warn!(%subject, error = %e, "publish failed");
        }
        result
    }

    async fn request(&self, ctx: &CallContext, msg: Message) -> Result<Message, TransportError> {
        let count = self.counters.requests.fetch_add(1, Ordering::Relaxed) + 1;
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        self.log(count, &msg.subject, msg.data.len(), "sending request");

        let subject = msg.subject.clone();
        let result = self.inner.request(ctx, msg).await;
        match &result {
            Ok(reply) => self.log(count, &subject, reply.data.len(), "received reply"),
            Err(e) => warn!(%subject, error = %e, "request failed"),
        }
        result
    }
}

impl<T: Subscriber> Subscriber for LoggingTransport<T> {
    type Subscription = T::Subscription;

    async fn subscribe(
        &self,
        subject: &str,
        queue: &str,
        handler: MessageHandler,
    ) -> Result<T::Subscription, TransportError> {
        debug!(subject, queue, "subscribing");

        let counters = Arc::clone(&self.counters);
        let level = self.level;
        let wrapped: MessageHandler = Arc::new(move |delivery: Delivery| {
            let count = counters.delivered.fetch_add(1, Ordering::Relaxed) + 1;
            let subject = delivery.message.subject.as_str();
            match level {
                Level::TRACE => trace!(count, subject, "delivering message"),
                _ => debug!(count, subject, "delivering message"),
            }
            handler(delivery)
        });

        self.inner.subscribe(subject, queue, wrapped).await
    }
}
