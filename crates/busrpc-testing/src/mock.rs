//! A scriptable server for testing busrpc clients.
//!
//! [`MockServer`] listens on a method subject of a [`MemoryBus`]. For every
//! opening envelope it subscribes to the call's request subject, answers the
//! handshake and hands the test a [`MockCall`]. The test then inspects what
//! the client sent and scripts the responses.
//!
//! # Example
//!
//! ```rust
//! use busrpc_testing::MockServer;
//! use busrpc_transport::MemoryBus;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), busrpc_core::RpcError> {
//! let bus = MemoryBus::new();
//! let server = MockServer::bind(&bus, "nrpc.svc.Echo").await?;
//! assert_eq!(server.handshakes(), 0);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use busrpc_core::codec::{Codec, JsonCodec};
use busrpc_core::envelope::{RequestEnvelope, ResponseEnvelope};
use busrpc_core::error::{RpcError, Status};
use busrpc_core::metadata::Metadata;
use busrpc_transport::runtime::AsyncMutex;
use busrpc_transport::{
    Delivery, MemoryBus, MemorySubscription, Message, Publisher, Subscriber, handler,
};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

/// A server bound to one method subject.
pub struct MockServer {
    subject: String,
    handshakes: Arc<AtomicUsize>,
    calls: AsyncMutex<mpsc::UnboundedReceiver<MockCall>>,
    _subscription: MemorySubscription,
}

impl MockServer {
    /// Bind to `method_subject` and accept every call with an empty
    /// acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus rejects the subscription.
    pub async fn bind(bus: &MemoryBus, method_subject: &str) -> Result<Self, RpcError> {
        Self::bind_with_ack(bus, method_subject, Bytes::new()).await
    }

    /// Bind to `method_subject` and answer every handshake with `ack`.
    ///
    /// A non-empty `ack` is a protocol violation the client must reject.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus rejects the subscription.
    pub async fn bind_with_ack(
        bus: &MemoryBus,
        method_subject: &str,
        ack: impl Into<Bytes>,
    ) -> Result<Self, RpcError> {
        let ack = ack.into();
        let handshakes = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();

        let accept = {
            let bus = bus.clone();
            let handshakes = Arc::clone(&handshakes);
            handler(move |delivery: Delivery| {
                let bus = bus.clone();
                let handshakes = Arc::clone(&handshakes);
                let tx = tx.clone();
                let ack = ack.clone();
                async move {
                    let Some(reply) = delivery.message.reply else {
                        return;
                    };
                    let Ok(opening) = JsonCodec.decode::<RequestEnvelope>(&delivery.message.data)
                    else {
                        return;
                    };
                    let Some(call) = MockCall::accept(&bus, opening).await else {
                        return;
                    };

                    handshakes.fetch_add(1, Ordering::SeqCst);
                    let _ = bus.publish(Message::new(reply, ack)).await;
                    let _ = tx.send(call);
                }
            })
        };

        let subscription = bus.subscribe(method_subject, "", accept).await?;
        Ok(Self {
            subject: method_subject.to_string(),
            handshakes,
            calls: AsyncMutex::new(rx),
            _subscription: subscription,
        })
    }

    /// The method subject this server listens on.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Number of handshakes answered so far.
    #[must_use]
    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    /// Wait for the next accepted call.
    pub async fn next_call(&self) -> Option<MockCall> {
        self.calls.lock().await.recv().await
    }
}

/// One call accepted by a [`MockServer`].
pub struct MockCall {
    bus: MemoryBus,
    opening: RequestEnvelope,
    request_subject: String,
    response_subject: String,
    requests: mpsc::UnboundedReceiver<RequestEnvelope>,
    _subscription: MemorySubscription,
}

impl MockCall {
    async fn accept(bus: &MemoryBus, opening: RequestEnvelope) -> Option<Self> {
        let request_subject = opening.req_subject.clone()?;
        let response_subject = opening.resp_subject.clone()?;

        let (tx, requests) = mpsc::unbounded_channel();
        let collect = handler(move |delivery: Delivery| {
            let tx = tx.clone();
            async move {
                if let Ok(envelope) = JsonCodec.decode::<RequestEnvelope>(&delivery.message.data) {
                    let _ = tx.send(envelope);
                }
            }
        });
        let subscription = bus.subscribe(&request_subject, "", collect).await.ok()?;

        Some(Self {
            bus: bus.clone(),
            opening,
            request_subject,
            response_subject,
            requests,
            _subscription: subscription,
        })
    }

    /// The opening envelope sent with the handshake.
    #[must_use]
    pub const fn opening(&self) -> &RequestEnvelope {
        &self.opening
    }

    /// Decode the payload of the opening envelope.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the payload is not a `T`.
    pub fn opening_payload<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        Ok(JsonCodec.decode(&self.opening.data)?)
    }

    /// The call's request subject.
    #[must_use]
    pub fn request_subject(&self) -> &str {
        &self.request_subject
    }

    /// The call's response subject.
    #[must_use]
    pub fn response_subject(&self) -> &str {
        &self.response_subject
    }

    /// Wait for the next envelope the client published on the request
    /// subject after the handshake.
    pub async fn next_request(&mut self) -> Option<RequestEnvelope> {
        self.requests.recv().await
    }

    /// Take the next request envelope if one already arrived.
    pub fn try_next_request(&mut self) -> Option<RequestEnvelope> {
        self.requests.try_recv().ok()
    }

    /// Publish an envelope on the response subject.
    ///
    /// # Errors
    ///
    /// Returns a codec or transport error.
    pub async fn send_envelope(&self, envelope: &ResponseEnvelope) -> Result<(), RpcError> {
        let payload = JsonCodec.encode(envelope)?;
        self.send_raw(payload).await
    }

    /// Publish raw bytes on the response subject.
    ///
    /// # Errors
    ///
    /// Returns a transport error.
    pub async fn send_raw(&self, payload: impl Into<Bytes>) -> Result<(), RpcError> {
        self.bus
            .publish(Message::new(self.response_subject.as_str(), payload))
            .await?;
        Ok(())
    }

    /// Publish a data envelope carrying `value`.
    ///
    /// # Errors
    ///
    /// Returns a codec or transport error.
    pub async fn send_data<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), RpcError> {
        let data = JsonCodec.encode(value)?;
        self.send_envelope(&ResponseEnvelope::data(data)).await
    }

    /// Publish a header-only envelope.
    ///
    /// # Errors
    ///
    /// Returns a codec or transport error.
    pub async fn send_header(&self, header: Metadata) -> Result<(), RpcError> {
        self.send_envelope(&ResponseEnvelope::header_only(header))
            .await
    }

    /// Publish a clean end-of-stream envelope.
    ///
    /// # Errors
    ///
    /// Returns a codec or transport error.
    pub async fn send_eos(&self) -> Result<(), RpcError> {
        self.send_envelope(&ResponseEnvelope::end_of_stream()).await
    }

    /// Publish an end-of-stream envelope carrying `status`.
    ///
    /// # Errors
    ///
    /// Returns a codec or transport error.
    pub async fn send_error(&self, status: &Status) -> Result<(), RpcError> {
        let data = JsonCodec.encode(status)?;
        self.send_envelope(&ResponseEnvelope::end_of_stream_with_error(data))
            .await
    }
}
