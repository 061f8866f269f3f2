//! The client stream state machine.
//!
//! A [`ClientStream`] is one call. It moves through
//! `Created -> Subscribed -> Terminal`:
//!
//! - **Created**: subjects are derived, nothing is on the wire yet.
//! - **Subscribed**: [`subscribe`](ClientStream::subscribe) listens on the
//!   response subject and derives the stream's lifetime context from the
//!   caller's. Sends and receives may interleave.
//! - **Terminal**: the lifetime context is done, because the caller
//!   cancelled it, an end-of-stream envelope arrived, or the consumer was
//!   stuck. Terminal is absorbing.
//!
//! # Concurrency
//!
//! One task may send (including [`close_send`](ClientStream::close_send))
//! while another receives. Concurrent sends, or concurrent receives, are a
//! usage error: they will not corrupt the stream but their interleaving is
//! unspecified.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use busrpc_core::codec::{Codec, JsonCodec};
use busrpc_core::context::CallContext;
use busrpc_core::envelope::{Inbound, RequestEnvelope, ResponseEnvelope};
use busrpc_core::error::{RpcError, Status};
use busrpc_core::metadata::Metadata;
use busrpc_core::subject::CallSubjects;
use busrpc_transport::runtime::AsyncMutex;
use busrpc_transport::{Message, Publisher, Subscriber};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::dispatcher::{self, Dispatcher};
use crate::handshake;

/// Metadata received from the server.
#[derive(Debug, Default)]
struct ReceivedMetadata {
    header: Metadata,
    trailer: Metadata,
}

/// State that exists once the stream is subscribed.
struct Live {
    ctx: CallContext,
    queue: AsyncMutex<mpsc::Receiver<Bytes>>,
}

/// One streaming call over a publish/subscribe transport.
///
/// Created by [`Client::new_stream`](crate::Client::new_stream). Dropping the
/// stream cancels its lifetime context, which releases the subscription.
///
/// # Example
///
/// ```rust
/// use busrpc_client::Client;
/// use busrpc_core::CallContext;
/// use busrpc_transport::MemoryBus;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), busrpc_core::RpcError> {
/// let client = Client::new(MemoryBus::new());
/// let mut stream = client.new_stream("/svc/Echo");
/// stream.subscribe(&CallContext::background()).await?;
/// assert_eq!(stream.subjects().method, "nrpc.svc.Echo");
/// assert!(!stream.is_terminal());
/// # Ok(())
/// # }
/// ```
pub struct ClientStream<T, C = JsonCodec> {
    transport: Arc<T>,
    codec: Arc<C>,
    config: StreamConfig,
    method: String,
    subjects: CallSubjects,
    handshake_done: AtomicBool,
    send_closed: AtomicBool,
    eos_sent: AtomicBool,
    eos: AtomicBool,
    metadata: Mutex<ReceivedMetadata>,
    live: Option<Live>,
}

impl<T, C> ClientStream<T, C>
where
    T: Publisher + Subscriber + 'static,
    C: Codec,
{
    pub(crate) fn new(
        transport: Arc<T>,
        codec: Arc<C>,
        config: StreamConfig,
        method: impl Into<String>,
        subjects: CallSubjects,
    ) -> Self {
        Self {
            transport,
            codec,
            config,
            method: method.into(),
            subjects,
            handshake_done: AtomicBool::new(false),
            send_closed: AtomicBool::new(false),
            eos_sent: AtomicBool::new(false),
            eos: AtomicBool::new(false),
            metadata: Mutex::new(ReceivedMetadata::default()),
            live: None,
        }
    }

    /// Start receiving and derive the stream's lifetime context from `ctx`.
    ///
    /// Must be called exactly once, before [`send`](Self::send) and
    /// [`recv`](Self::recv).
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidState`] if the stream is already subscribed,
    /// or the transport's error if the subscription could not be created.
    pub async fn subscribe(&mut self, ctx: &CallContext) -> Result<(), RpcError> {
        if self.live.is_some() {
            return Err(RpcError::invalid_state("stream is already subscribed"));
        }

        let stream_ctx = ctx.child();
        let (tx, rx) = mpsc::channel(1);
        let handler = Dispatcher::new(
            stream_ctx.clone(),
            tx,
            self.config.stuck_timeout(),
            &self.subjects.response,
            self.config.queue_group(),
        )
        .into_handler();

        let subscription = self
            .transport
            .subscribe(&self.subjects.response, self.config.queue_group(), handler)
            .await?;
        info!(
            method = %self.method,
            subject = %self.subjects.response,
            queue = self.config.queue_group(),
            "subscribed client stream"
        );
        dispatcher::unsubscribe_when_done(stream_ctx.clone(), subscription);

        self.live = Some(Live {
            ctx: stream_ctx,
            queue: AsyncMutex::new(rx),
        });
        Ok(())
    }

    /// Send one message.
    ///
    /// The first send is a request/acknowledgment round trip on the method
    /// subject that binds the call to its ephemeral subjects; it carries the
    /// stream context's remaining time, if any. Later sends are plain
    /// publishes to the request subject.
    ///
    /// # Errors
    ///
    /// - [`RpcError::SendClosed`] after [`close_send`](Self::close_send);
    /// - [`RpcError::Cancelled`] or [`RpcError::DeadlineExceeded`] once the
    ///   stream is done;
    /// - a codec, transport or protocol error. A failed handshake leaves the
    ///   stream unbound; the next send tries the handshake again.
    pub async fn send<M: Serialize + ?Sized>(&self, msg: &M) -> Result<(), RpcError> {
        if self.send_closed.load(Ordering::Acquire) {
            return Err(RpcError::SendClosed);
        }
        let live = self.live()?;
        if let Some(err) = live.ctx.err() {
            return Err(err.into());
        }

        let data = self.codec.encode(msg)?;

        if self.handshake_done.load(Ordering::Acquire) {
            let payload = self.codec.encode(&RequestEnvelope::data(data))?;
            self.transport
                .publish(Message::new(self.subjects.request.as_str(), payload))
                .await?;
            return Ok(());
        }

        let envelope = RequestEnvelope::open(data, &self.subjects, live.ctx.remaining());
        let payload = self.codec.encode(&envelope)?;
        handshake::bind(
            &*self.transport,
            &live.ctx,
            &self.subjects.method,
            payload,
            self.config.handshake_timeout(),
        )
        .await?;
        self.handshake_done.store(true, Ordering::Release);
        Ok(())
    }

    /// Receive the next message.
    ///
    /// Header-only envelopes are recorded and skipped. Returns `Ok(None)`
    /// once the server ended the stream cleanly; every later call returns
    /// `Ok(None)` again.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Status`] if the server ended the stream with an error;
    /// - [`RpcError::Cancelled`] or [`RpcError::DeadlineExceeded`] once the
    ///   stream is done;
    /// - [`RpcError::Codec`] for a malformed envelope or payload. The stream
    ///   stays usable.
    /// - [`RpcError::InvalidState`] before [`subscribe`](Self::subscribe).
    pub async fn recv<R: DeserializeOwned>(&self) -> Result<Option<R>, RpcError> {
        let live = self.live()?;
        if self.eos.load(Ordering::Acquire) {
            return Ok(None);
        }

        let mut queue = live.queue.lock().await;
        loop {
            let data = tokio::select! {
                biased;
                err = live.ctx.done() => return Err(err.into()),
                next = queue.recv() => match next {
                    Some(data) => data,
                    None => return Err(RpcError::Cancelled),
                },
            };

            let envelope: ResponseEnvelope = self.codec.decode(&data)?;
            match envelope.into_inbound() {
                Inbound::HeaderOnly { header, trailer } => self.record(header, trailer),
                Inbound::Data {
                    payload,
                    header,
                    trailer,
                } => {
                    self.record(header, trailer);
                    return self.codec.decode(&payload).map(Some).map_err(Into::into);
                }
                Inbound::EndOfStream {
                    error,
                    header,
                    trailer,
                } => {
                    self.record(header, trailer);
                    return self.finish(live, error);
                }
            }
        }
    }

    /// Half-close the stream: publish the end-of-stream marker on the
    /// request subject. Later sends fail with [`RpcError::SendClosed`].
    ///
    /// The send side is closed even if publishing the marker fails; calling
    /// this again retries the marker. Once the marker went out, further calls
    /// do nothing.
    ///
    /// # Errors
    ///
    /// Returns a codec or transport error if the marker could not be sent.
    pub async fn close_send(&self) -> Result<(), RpcError> {
        self.send_closed.store(true, Ordering::Release);
        if self.eos_sent.load(Ordering::Acquire) {
            return Ok(());
        }

        let payload = self.codec.encode(&RequestEnvelope::end_of_stream())?;
        self.transport
            .publish(Message::new(self.subjects.request.as_str(), payload))
            .await?;
        self.eos_sent.store(true, Ordering::Release);
        debug!(subject = %self.subjects.request, "closed send side");
        Ok(())
    }

    /// Header metadata received so far.
    ///
    /// This never waits: before the server sent a header the result is
    /// empty. Call it after [`recv`](Self::recv) returned at least once.
    #[must_use]
    pub fn header(&self) -> Metadata {
        self.metadata().header.clone()
    }

    /// Trailer metadata received so far.
    ///
    /// Complete only after [`recv`](Self::recv) returned `Ok(None)` or an
    /// error.
    #[must_use]
    pub fn trailer(&self) -> Metadata {
        self.metadata().trailer.clone()
    }

    /// The stream's lifetime context, once subscribed.
    #[must_use]
    pub fn context(&self) -> Option<&CallContext> {
        self.live.as_ref().map(|live| &live.ctx)
    }

    /// The full method name, e.g. `/svc/Echo`.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The call's subjects.
    #[must_use]
    pub const fn subjects(&self) -> &CallSubjects {
        &self.subjects
    }

    /// Returns `true` once the stream reached its terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.live.as_ref().is_some_and(|live| live.ctx.is_done())
    }

    /// Cancel the stream's lifetime context.
    ///
    /// Pending and later receives and sends fail with
    /// [`RpcError::Cancelled`] and the subscription is released.
    pub fn cancel(&self) {
        if let Some(live) = &self.live {
            live.ctx.cancel();
        }
    }

    fn live(&self) -> Result<&Live, RpcError> {
        self.live
            .as_ref()
            .ok_or_else(|| RpcError::invalid_state("stream is not subscribed"))
    }

    fn metadata(&self) -> MutexGuard<'_, ReceivedMetadata> {
        self.metadata.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, header: Option<Metadata>, trailer: Option<Metadata>) {
        if header.is_none() && trailer.is_none() {
            return;
        }
        let mut metadata = self.metadata();
        if let Some(header) = header {
            metadata.header = header;
        }
        if let Some(trailer) = trailer {
            metadata.trailer = trailer;
        }
    }

    /// Terminate the stream on an end-of-stream envelope.
    fn finish<R>(&self, live: &Live, error: Option<Bytes>) -> Result<Option<R>, RpcError> {
        let error = error.filter(|data| !data.is_empty());
        if error.is_none() {
            self.eos.store(true, Ordering::Release);
        }
        live.ctx.cancel();

        match error {
            None => {
                debug!(method = %self.method, "stream ended");
                Ok(None)
            }
            Some(data) => {
                let status: Status = self.codec.decode(&data)?;
                debug!(method = %self.method, %status, "stream ended with error");
                Err(RpcError::Status(status))
            }
        }
    }
}

impl<T, C> Drop for ClientStream<T, C> {
    fn drop(&mut self) {
        if let Some(live) = &self.live {
            live.ctx.cancel();
        }
    }
}
