//! The receive dispatcher.
//!
//! Messages on a call's response subject are pushed by the transport. The
//! dispatcher hands each one to the stream through a single-slot queue:
//!
//! 1. try to enqueue without waiting;
//! 2. if the slot is taken and the stream is already done, drop the message;
//! 3. otherwise wait for the first of: the stream finishing (drop), the
//!    delivery context finishing (cancel the stream), the slot freeing up
//!    (enqueue), or the stuck timeout passing (cancel the stream).
//!
//! A consumer that stops calling `recv` therefore holds the stream open for
//! at most the stuck timeout.

use std::sync::Arc;
use std::time::Duration;

use busrpc_core::context::CallContext;
use busrpc_transport::{Delivery, MessageHandler, Subscription, runtime};
use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, trace, warn};

/// What happened to one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// The message is in the queue.
    Queued,
    /// The stream was already done; the message was discarded.
    Dropped,
    /// The delivery context finished first; the stream was cancelled.
    DeliveryCancelled,
    /// The consumer did not drain the queue in time; the stream was cancelled.
    Stuck,
}

/// Feeds one stream's receive queue from its response subscription.
pub(crate) struct Dispatcher {
    stream_ctx: CallContext,
    queue: mpsc::Sender<Bytes>,
    stuck_timeout: Duration,
    subject: String,
    group: String,
}

impl Dispatcher {
    pub(crate) fn new(
        stream_ctx: CallContext,
        queue: mpsc::Sender<Bytes>,
        stuck_timeout: Duration,
        subject: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            stream_ctx,
            queue,
            stuck_timeout,
            subject: subject.into(),
            group: group.into(),
        }
    }

    /// Wrap the dispatcher in a transport handler.
    pub(crate) fn into_handler(self) -> MessageHandler {
        let this = Arc::new(self);
        Arc::new(move |delivery: Delivery| {
            let this = Arc::clone(&this);
            async move {
                let outcome = this.dispatch(delivery).await;
                trace!(subject = %this.subject, ?outcome, "dispatched response");
            }
            .boxed()
        })
    }

    pub(crate) async fn dispatch(&self, delivery: Delivery) -> Dispatch {
        let Delivery { ctx, message } = delivery;

        let data = match self.queue.try_send(message.data) {
            Ok(()) => return Dispatch::Queued,
            Err(TrySendError::Closed(_)) => return Dispatch::Dropped,
            Err(TrySendError::Full(data)) => data,
        };

        if self.stream_ctx.is_done() {
            return Dispatch::Dropped;
        }

        tokio::select! {
            biased;
            _ = self.stream_ctx.done() => Dispatch::Dropped,
            _ = ctx.done() => {
                debug!(subject = %self.subject, "delivery cancelled, closing stream");
                self.stream_ctx.cancel();
                Dispatch::DeliveryCancelled
            }
            sent = self.queue.send(data) => match sent {
                Ok(()) => Dispatch::Queued,
                Err(_) => Dispatch::Dropped,
            },
            () = tokio::time::sleep(self.stuck_timeout) => {
                error!(
                    subject = %self.subject,
                    queue = %self.group,
                    timeout = ?self.stuck_timeout,
                    "closing stream: client stream consumer stuck"
                );
                self.stream_ctx.cancel();
                Dispatch::Stuck
            }
        }
    }
}

/// Unsubscribe once `ctx` is done.
///
/// Failures are logged and otherwise ignored.
pub(crate) fn unsubscribe_when_done<S: Subscription>(ctx: CallContext, subscription: S) {
    runtime::spawn(async move {
        ctx.done().await;
        match subscription.unsubscribe().await {
            Ok(()) => debug!(subject = subscription.subject(), "unsubscribed client stream"),
            Err(e) => warn!(
                subject = subscription.subject(),
                error = %e,
                "failed to unsubscribe client stream"
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use busrpc_transport::{MemoryBus, Message, Publisher, Subscriber, handler};

    fn delivery(ctx: &CallContext, data: &'static [u8]) -> Delivery {
        Delivery {
            ctx: ctx.clone(),
            message: Message::new("nrpc.resp.svc.Echo.abc", data),
        }
    }

    fn dispatcher(stream_ctx: &CallContext) -> (Dispatcher, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(1);
        let d = Dispatcher::new(
            stream_ctx.clone(),
            tx,
            Duration::from_secs(30),
            "nrpc.resp.svc.Echo.abc",
            "receive",
        );
        (d, rx)
    }

    #[tokio::test]
    async fn test_enqueues_when_slot_free() {
        let stream_ctx = CallContext::background();
        let (d, mut rx) = dispatcher(&stream_ctx);

        let outcome = d.dispatch(delivery(&CallContext::background(), b"1")).await;
        assert_eq!(outcome, Dispatch::Queued);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"1"));
    }

    #[tokio::test]
    async fn test_full_queue_on_done_stream_drops() {
        let stream_ctx = CallContext::background();
        let (d, mut rx) = dispatcher(&stream_ctx);
        let delivery_ctx = CallContext::background();

        assert_eq!(d.dispatch(delivery(&delivery_ctx, b"1")).await, Dispatch::Queued);
        stream_ctx.cancel();
        assert_eq!(d.dispatch(delivery(&delivery_ctx, b"2")).await, Dispatch::Dropped);

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_cancelled_while_waiting_drops() {
        let stream_ctx = CallContext::background();
        let (d, _rx) = dispatcher(&stream_ctx);
        let delivery_ctx = CallContext::background();
        d.dispatch(delivery(&delivery_ctx, b"1")).await;

        let canceller = stream_ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        assert_eq!(d.dispatch(delivery(&delivery_ctx, b"2")).await, Dispatch::Dropped);
        assert!(!delivery_ctx.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_cancel_closes_stream() {
        let stream_ctx = CallContext::background();
        let (d, _rx) = dispatcher(&stream_ctx);
        let delivery_ctx = CallContext::background();
        d.dispatch(delivery(&delivery_ctx, b"1")).await;

        let canceller = delivery_ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        assert_eq!(
            d.dispatch(delivery(&delivery_ctx, b"2")).await,
            Dispatch::DeliveryCancelled
        );
        assert!(stream_ctx.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_slot() {
        let stream_ctx = CallContext::background();
        let (d, mut rx) = dispatcher(&stream_ctx);
        let delivery_ctx = CallContext::background();
        d.dispatch(delivery(&delivery_ctx, b"1")).await;

        let consumer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            (first, second)
        });

        assert_eq!(d.dispatch(delivery(&delivery_ctx, b"2")).await, Dispatch::Queued);
        let (first, second) = consumer.await.unwrap();
        assert_eq!(first, Bytes::from_static(b"1"));
        assert_eq!(second, Bytes::from_static(b"2"));
        assert!(!stream_ctx.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_consumer_cancels_stream() {
        let stream_ctx = CallContext::background();
        let (d, _rx) = dispatcher(&stream_ctx);
        let delivery_ctx = CallContext::background();
        d.dispatch(delivery(&delivery_ctx, b"1")).await;

        let started = tokio::time::Instant::now();
        assert_eq!(d.dispatch(delivery(&delivery_ctx, b"2")).await, Dispatch::Stuck);
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(stream_ctx.is_done());
    }

    #[tokio::test]
    async fn test_unsubscribes_once_context_done() {
        let bus = MemoryBus::new();
        let sub = bus.subscribe("resp.a", "receive", handler(|_| async {})).await.unwrap();
        assert_eq!(bus.subscriber_count("resp.a").await, 1);

        let ctx = CallContext::background();
        unsubscribe_when_done(ctx.clone(), sub);
        tokio::task::yield_now().await;
        assert_eq!(bus.subscriber_count("resp.a").await, 1);

        ctx.cancel();
        for _ in 0..100 {
            if bus.subscriber_count("resp.a").await == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(bus.subscriber_count("resp.a").await, 0);
        bus.publish(Message::new("resp.a", "late")).await.unwrap();
    }
}
