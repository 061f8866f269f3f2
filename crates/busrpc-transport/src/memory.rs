//! In-memory publish/subscribe bus.
//!
//! [`MemoryBus`] routes messages between publishers and subscribers in the
//! same process. It is primarily useful for testing busrpc clients and
//! servers without a broker.
//!
//! Routing follows the usual broker rules:
//!
//! - subjects match exactly (no wildcards);
//! - every subscriber with an empty queue group receives every message;
//! - subscribers sharing a queue group receive messages round-robin, one
//!   member per group;
//! - [`request`](Publisher::request) publishes with a private inbox reply
//!   subject and fails fast with [`TransportError::NoResponders`] when nobody
//!   is subscribed.
//!
//! # Example
//!
//! ```rust
//! use busrpc_core::CallContext;
//! use busrpc_transport::{MemoryBus, Message, Publisher, Subscriber, handler};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), busrpc_transport::TransportError> {
//! let bus = MemoryBus::new();
//! let replier = bus.clone();
//! let _sub = bus
//!     .subscribe("time.now", "", handler(move |delivery| {
//!         let replier = replier.clone();
//!         async move {
//!             if let Some(reply) = delivery.message.reply {
//!                 let _ = replier.publish(Message::new(reply, "noon")).await;
//!             }
//!         }
//!     }))
//!     .await?;
//!
//! let reply = bus
//!     .request(&CallContext::background(), Message::new("time.now", ""))
//!     .await?;
//! assert_eq!(&reply.data[..], b"noon");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use busrpc_core::context::CallContext;
use futures::StreamExt;
use futures::channel::mpsc;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::runtime::{self, AsyncMutex};
use crate::traits::{Delivery, Message, MessageHandler, Publisher, Subscriber, Subscription};

/// An in-process publish/subscribe bus.
///
/// Cloning the bus yields another handle to the same routes.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    routes: AsyncMutex<HashMap<String, Route>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    root: CallContext,
}

#[derive(Default)]
struct Route {
    entries: Vec<Entry>,
    cursors: HashMap<String, usize>,
}

struct Entry {
    id: u64,
    queue: String,
    ctx: CallContext,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl Route {
    /// Pick the receivers of one message and advance queue group cursors.
    fn targets(&mut self) -> Vec<(mpsc::UnboundedSender<Delivery>, CallContext)> {
        self.entries.retain(|entry| !entry.tx.is_closed());

        let mut targets = Vec::new();
        let mut groups: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if entry.queue.is_empty() {
                targets.push((entry.tx.clone(), entry.ctx.clone()));
            } else if !groups.contains(&entry.queue.as_str()) {
                groups.push(&entry.queue);
            }
        }

        for group in groups {
            let members: Vec<&Entry> = self
                .entries
                .iter()
                .filter(|entry| entry.queue == group)
                .collect();
            let cursor = self.cursors.entry(group.to_string()).or_default();
            let member = members[*cursor % members.len()];
            *cursor = cursor.wrapping_add(1);
            targets.push((member.tx.clone(), member.ctx.clone()));
        }

        targets
    }
}

impl MemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on `subject`.
    pub async fn subscriber_count(&self, subject: &str) -> usize {
        let routes = self.inner.routes.lock().await;
        routes.get(subject).map_or(0, |route| {
            route
                .entries
                .iter()
                .filter(|entry| !entry.tx.is_closed())
                .count()
        })
    }

    /// Close the bus: drop every subscription and reject further traffic.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.root.cancel();
        self.inner.routes.lock().await.clear();
        debug!("memory bus closed");
    }

    /// Returns `true` once [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            Err(TransportError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    async fn register(
        &self,
        subject: &str,
        queue: &str,
    ) -> Result<(u64, CallContext, mpsc::UnboundedReceiver<Delivery>), TransportError> {
        self.ensure_open()?;
        validate_subject(subject)?;
        if queue.chars().any(char::is_whitespace) {
            return Err(TransportError::subscribe(
                subject,
                format!("invalid queue group {queue:?}"),
            ));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let ctx = self.inner.root.child();
        let (tx, rx) = mpsc::unbounded();

        let mut routes = self.inner.routes.lock().await;
        routes.entry(subject.to_string()).or_default().entries.push(Entry {
            id,
            queue: queue.to_string(),
            ctx: ctx.clone(),
            tx,
        });
        trace!(subject, queue, id, "registered subscription");

        Ok((id, ctx, rx))
    }
}

impl BusInner {
    async fn remove(&self, subject: &str, id: u64) {
        let mut routes = self.routes.lock().await;
        if let Some(route) = routes.get_mut(subject) {
            route.entries.retain(|entry| entry.id != id);
            if route.entries.is_empty() {
                routes.remove(subject);
            }
        }
    }
}

impl Publisher for MemoryBus {
    async fn publish(&self, msg: Message) -> Result<(), TransportError> {
        self.ensure_open()?;
        validate_subject(&msg.subject)?;
        if let Some(reply) = &msg.reply {
            validate_subject(reply)?;
        }

        let targets = {
            let mut routes = self.inner.routes.lock().await;
            routes
                .get_mut(&msg.subject)
                .map(Route::targets)
                .unwrap_or_default()
        };
        trace!(subject = %msg.subject, receivers = targets.len(), "publish");

        for (tx, ctx) in targets {
            // A receiver that went away mid-publish is an unsubscribe race.
            let _ = tx.unbounded_send(Delivery {
                ctx,
                message: msg.clone(),
            });
        }
        Ok(())
    }

    async fn request(&self, ctx: &CallContext, msg: Message) -> Result<Message, TransportError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        if self.subscriber_count(&msg.subject).await == 0 {
            return Err(TransportError::NoResponders {
                subject: msg.subject,
            });
        }

        let inbox = format!(
            "_INBOX.{}",
            self.inner.next_id.fetch_add(1, Ordering::Relaxed)
        );
        let (id, _inbox_ctx, mut replies) = self.register(&inbox, "").await?;

        let result = async {
            self.publish(msg.with_reply(inbox.as_str())).await?;
            tokio::select! {
                biased;
                err = ctx.done() => Err(TransportError::from(err)),
                reply = replies.next() => reply
                    .map(|delivery| delivery.message)
                    .ok_or(TransportError::ConnectionClosed),
            }
        }
        .await;

        self.inner.remove(&inbox, id).await;
        result
    }
}

impl Subscriber for MemoryBus {
    type Subscription = MemorySubscription;

    async fn subscribe(
        &self,
        subject: &str,
        queue: &str,
        handler: MessageHandler,
    ) -> Result<MemorySubscription, TransportError> {
        let (id, ctx, mut deliveries) = self.register(subject, queue).await?;

        let task_ctx = ctx.clone();
        runtime::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = task_ctx.done() => break,
                    next = deliveries.next() => match next {
                        Some(delivery) => handler(delivery).await,
                        None => break,
                    },
                }
            }
        });

        Ok(MemorySubscription {
            bus: Arc::clone(&self.inner),
            id,
            subject: subject.to_string(),
            ctx,
        })
    }
}

/// A subscription on a [`MemoryBus`].
///
/// Dropping the handle stops delivery; [`unsubscribe`](Subscription::unsubscribe)
/// additionally removes the route right away.
pub struct MemorySubscription {
    bus: Arc<BusInner>,
    id: u64,
    subject: String,
    ctx: CallContext,
}

impl Subscription for MemorySubscription {
    fn subject(&self) -> &str {
        &self.subject
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        self.ctx.cancel();
        self.bus.remove(&self.subject, self.id).await;
        trace!(subject = %self.subject, id = self.id, "unsubscribed");
        Ok(())
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

/// Reject subjects a broker would not route.
fn validate_subject(subject: &str) -> Result<(), TransportError> {
    let valid = !subject.is_empty()
        && !subject.chars().any(char::is_whitespace)
        && subject.split('.').all(|token| !token.is_empty());
    if valid {
        Ok(())
    } else {
        Err(TransportError::InvalidSubject {
            subject: subject.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::handler;
    use busrpc_core::context::ContextError;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::mpsc as tokio_mpsc;

    fn collector() -> (MessageHandler, tokio_mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let h = handler(move |delivery| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(delivery);
            }
        });
        (h, rx)
    }

    fn replier(bus: &MemoryBus, reply_with: &'static [u8]) -> MessageHandler {
        let bus = bus.clone();
        handler(move |delivery: Delivery| {
            let bus = bus.clone();
            async move {
                if let Some(reply) = delivery.message.reply {
                    let _ = bus.publish(Message::new(reply, reply_with)).await;
                }
            }
        })
    }

    #[tokio::test]
    async fn test_fanout_without_queue() {
        let bus = MemoryBus::new();
        let (h1, mut rx1) = collector();
        let (h2, mut rx2) = collector();
        let _s1 = bus.subscribe("a.b", "", h1).await.unwrap();
        let _s2 = bus.subscribe("a.b", "", h2).await.unwrap();

        bus.publish(Message::new("a.b", "x")).await.unwrap();

        assert_eq!(&rx1.recv().await.unwrap().message.data[..], b"x");
        assert_eq!(&rx2.recv().await.unwrap().message.data[..], b"x");
    }

    #[tokio::test]
    async fn test_queue_group_delivers_to_one_member() {
        let bus = MemoryBus::new();
        let (h1, mut rx1) = collector();
        let (h2, mut rx2) = collector();
        let _s1 = bus.subscribe("work", "workers", h1).await.unwrap();
        let _s2 = bus.subscribe("work", "workers", h2).await.unwrap();

        for i in 0..4u8 {
            bus.publish(Message::new("work", vec![i])).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut first = 0;
        while rx1.try_recv().is_ok() {
            first += 1;
        }
        let mut second = 0;
        while rx2.try_recv().is_ok() {
            second += 1;
        }
        assert_eq!((first, second), (2, 2));
    }

    #[tokio::test]
    async fn test_request_reply() {
        let bus = MemoryBus::new();
        let _sub = bus
            .subscribe("svc", "", replier(&bus, b"pong"))
            .await
            .unwrap();

        let reply = bus
            .request(&CallContext::background(), Message::new("svc", "ping"))
            .await
            .unwrap();
        assert_eq!(reply.data, Bytes::from_static(b"pong"));
    }

    #[tokio::test]
    async fn test_request_without_responders() {
        let bus = MemoryBus::new();
        let err = bus
            .request(&CallContext::background(), Message::new("nobody", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NoResponders { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_bounded_by_deadline() {
        let bus = MemoryBus::new();
        let (silent, _rx) = collector();
        let _sub = bus.subscribe("slow", "", silent).await.unwrap();

        let ctx = CallContext::background().with_timeout(Duration::from_secs(1));
        let err = bus
            .request(&ctx, Message::new("slow", ""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Context(ContextError::DeadlineExceeded)
        ));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery_and_cancels_context() {
        let bus = MemoryBus::new();
        let (h, mut rx) = collector();
        let sub = bus.subscribe("a.b", "", h).await.unwrap();

        bus.publish(Message::new("a.b", "1")).await.unwrap();
        let delivery = rx.recv().await.unwrap();
        assert!(!delivery.ctx.is_done());

        sub.unsubscribe().await.unwrap();
        assert!(delivery.ctx.is_done());
        assert_eq!(bus.subscriber_count("a.b").await, 0);

        bus.publish(Message::new("a.b", "2")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        // Second unsubscribe is a no-op.
        sub.unsubscribe().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_subjects_rejected() {
        let bus = MemoryBus::new();
        for subject in ["", "a..b", "a b", ".a", "a."] {
            let err = bus.publish(Message::new(subject, "")).await.unwrap_err();
            assert!(
                matches!(err, TransportError::InvalidSubject { .. }),
                "{subject:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_closed_bus_rejects_traffic() {
        let bus = MemoryBus::new();
        let (h, _rx) = collector();
        let _sub = bus.subscribe("a", "", h).await.unwrap();

        bus.close().await;
        assert!(bus.is_closed());
        assert!(matches!(
            bus.publish(Message::new("a", "")).await,
            Err(TransportError::ConnectionClosed)
        ));
        let (h, _rx) = collector();
        assert!(matches!(
            bus.subscribe("a", "", h).await,
            Err(TransportError::ConnectionClosed)
        ));
    }
}
