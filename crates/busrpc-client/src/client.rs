//! The busrpc client.
//!
//! A [`Client`] owns a transport handle, a codec, a [`SubjectNamer`] and the
//! [`StreamConfig`] applied to every stream it opens. It is cheap to share:
//! the transport and codec sit behind `Arc`s.

use std::sync::Arc;

use busrpc_core::codec::{Codec, JsonCodec};
use busrpc_core::context::CallContext;
use busrpc_core::error::RpcError;
use busrpc_core::subject::SubjectNamer;
use busrpc_transport::{Publisher, Subscriber};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::trace;

use crate::builder::ClientBuilder;
use crate::config::StreamConfig;
use crate::stream::ClientStream;

/// Opens streaming calls over a publish/subscribe transport.
///
/// # Example
///
/// ```no_run
/// use busrpc_client::Client;
/// use busrpc_core::CallContext;
/// use busrpc_transport::MemoryBus;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct EchoRequest { msg: String }
///
/// #[derive(Deserialize)]
/// struct EchoReply { msg: String }
///
/// # async fn example() -> Result<(), busrpc_core::RpcError> {
/// let client = Client::new(MemoryBus::new());
/// let reply: EchoReply = client
///     .invoke(&CallContext::background(), "/svc/Echo", &EchoRequest { msg: "hi".into() })
///     .await?;
/// println!("{}", reply.msg);
/// # Ok(())
/// # }
/// ```
pub struct Client<T, C = JsonCodec> {
    transport: Arc<T>,
    codec: Arc<C>,
    namer: SubjectNamer,
    config: StreamConfig,
}

impl<T> Client<T, JsonCodec>
where
    T: Publisher + Subscriber + 'static,
{
    /// Create a client with the JSON codec and default settings.
    #[must_use]
    pub fn new(transport: T) -> Self {
        ClientBuilder::new().build(transport)
    }
}

impl<T, C> Client<T, C>
where
    T: Publisher + Subscriber + 'static,
    C: Codec,
{
    pub(crate) fn from_parts(
        transport: Arc<T>,
        codec: Arc<C>,
        namer: SubjectNamer,
        config: StreamConfig,
    ) -> Self {
        Self {
            transport,
            codec,
            namer,
            config,
        }
    }

    /// Create an unsubscribed stream for `method`, e.g. `/svc/Echo`.
    ///
    /// Each stream gets fresh ephemeral subjects.
    #[must_use]
    pub fn new_stream(&self, method: &str) -> ClientStream<T, C> {
        let subjects = self.namer.call_subjects(method);
        trace!(method, request = %subjects.request, response = %subjects.response, "new stream");
        ClientStream::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.codec),
            self.config.clone(),
            method,
            subjects,
        )
    }

    /// Create a stream for `method` and subscribe it under `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the subscription could not be created.
    pub async fn open_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> Result<ClientStream<T, C>, RpcError> {
        let mut stream = self.new_stream(method);
        stream.subscribe(ctx).await?;
        Ok(stream)
    }

    /// Perform a unary call: one request, one reply.
    ///
    /// # Errors
    ///
    /// Returns the remote [`Status`](busrpc_core::Status) if the server ended
    /// the call with an error, [`RpcError::Protocol`] if it ended the call
    /// without a reply or sent more than one, or any error of the underlying
    /// stream operations.
    pub async fn invoke<Req, Resp>(
        &self,
        ctx: &CallContext,
        method: &str,
        request: &Req,
    ) -> Result<Resp, RpcError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let stream = self.open_stream(ctx, method).await?;
        stream.send(request).await?;
        stream.close_send().await?;

        let reply: Resp = stream
            .recv()
            .await?
            .ok_or_else(|| RpcError::protocol(format!("{method} ended without a reply")))?;

        match stream.recv::<IgnoredAny>().await? {
            None => Ok(reply),
            Some(_) => Err(RpcError::protocol(format!(
                "{method} sent more than one reply to a unary call"
            ))),
        }
    }

    /// The subject namer.
    #[must_use]
    pub const fn namer(&self) -> &SubjectNamer {
        &self.namer
    }

    /// The configuration applied to new streams.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T, C> Clone for Client<T, C> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            codec: Arc::clone(&self.codec),
            namer: self.namer.clone(),
            config: self.config.clone(),
        }
    }
}
