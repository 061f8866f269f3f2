//! Transport traits for publish/subscribe brokers.
//!
//! These traits are the only thing busrpc needs from a broker. They are
//! runtime-agnostic and use `impl Future` return types.
//!
//! # Overview
//!
//! - [`Publisher`]: publish a message, or publish one and await one reply
//! - [`Subscriber`]: push delivery of a subject's messages to a handler
//! - [`Subscription`]: stop delivery
//!
//! # Example Implementation
//!
//! ```ignore
//! struct MyBroker { /* ... */ }
//!
//! impl Publisher for MyBroker {
//!     async fn publish(&self, msg: Message) -> Result<(), TransportError> {
//!         // Hand the message to the broker
//!         Ok(())
//!     }
//!
//!     async fn request(&self, ctx: &CallContext, msg: Message) -> Result<Message, TransportError> {
//!         // Publish with a reply subject and wait for the first reply or ctx
//!         todo!()
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use busrpc_core::context::CallContext;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::TransportError;

/// A message on a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Subject the message is published to.
    pub subject: String,
    /// Subject a reply should be published to, if the sender expects one.
    pub reply: Option<String>,
    /// Payload.
    pub data: Bytes,
}

impl Message {
    /// Create a message without a reply subject.
    #[must_use]
    pub fn new(subject: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            reply: None,
            data: data.into(),
        }
    }

    /// Set the reply subject.
    #[must_use]
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }
}

/// A message pushed to a subscriber.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Per-delivery context supplied by the transport. It is done when the
    /// transport no longer wants this delivery handled, e.g. because the
    /// subscription was removed.
    pub ctx: CallContext,
    /// The delivered message.
    pub message: Message,
}

/// Callback invoked once per delivered message.
///
/// Transports invoke the handler for one subscription sequentially, awaiting
/// each returned future before delivering the next message.
pub type MessageHandler = Arc<dyn Fn(Delivery) -> BoxFuture<'static, ()> + Send + Sync>;

/// Build a [`MessageHandler`] from an async closure.
pub fn handler<F, Fut>(f: F) -> MessageHandler
where
    F: Fn(Delivery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |delivery| f(delivery).boxed())
}

/// The publishing half of a broker connection.
pub trait Publisher: Send + Sync {
    /// Publish a message without waiting for any reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker did not accept the message.
    fn publish(&self, msg: Message) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Publish a message and wait for exactly one reply, bounded by `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Context`] if `ctx` finishes first,
    /// [`TransportError::NoResponders`] if nobody subscribes to the subject,
    /// or any publish error.
    fn request(
        &self,
        ctx: &CallContext,
        msg: Message,
    ) -> impl Future<Output = Result<Message, TransportError>> + Send;
}

/// A live subscription.
pub trait Subscription: Send + Sync + 'static {
    /// The subscribed subject.
    fn subject(&self) -> &str;

    /// Stop delivery. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker could not remove the subscription.
    fn unsubscribe(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The subscribing half of a broker connection.
pub trait Subscriber: Send + Sync {
    /// The subscription handle type.
    type Subscription: Subscription;

    /// Subscribe `handler` to `subject`.
    ///
    /// Subscribers sharing a non-empty `queue` form a group and each message
    /// is delivered to only one member of the group. An empty `queue` means
    /// the subscriber receives every message.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription could not be created.
    fn subscribe(
        &self,
        subject: &str,
        queue: &str,
        handler: MessageHandler,
    ) -> impl Future<Output = Result<Self::Subscription, TransportError>> + Send;
}

impl<T: Publisher> Publisher for Arc<T> {
    fn publish(&self, msg: Message) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).publish(msg)
    }

    fn request(
        &self,
        ctx: &CallContext,
        msg: Message,
    ) -> impl Future<Output = Result<Message, TransportError>> + Send {
        (**self).request(ctx, msg)
    }
}

impl<T: Subscriber> Subscriber for Arc<T> {
    type Subscription = T::Subscription;

    fn subscribe(
        &self,
        subject: &str,
        queue: &str,
        handler: MessageHandler,
    ) -> impl Future<Output = Result<Self::Subscription, TransportError>> + Send {
        (**self).subscribe(subject, queue, handler)
    }
}
