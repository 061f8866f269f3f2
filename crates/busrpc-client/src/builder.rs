//! Client builder for fluent construction.
//!
//! The [`ClientBuilder`] provides a fluent API for constructing busrpc
//! clients with customizable subject naming, timeouts and codec.

use std::sync::Arc;
use std::time::Duration;

use busrpc_core::codec::{Codec, JsonCodec};
use busrpc_core::subject::SubjectNamer;
use busrpc_transport::{Publisher, Subscriber};

use crate::client::Client;
use crate::config::StreamConfig;

/// Builder for constructing busrpc clients.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use busrpc_client::ClientBuilder;
/// use busrpc_transport::MemoryBus;
///
/// let client = ClientBuilder::new()
///     .namespace("edge")
///     .handshake_timeout(Duration::from_secs(2))
///     .stuck_timeout(Duration::from_secs(10))
///     .build(MemoryBus::new());
/// assert_eq!(client.namer().method_subject("/svc/Echo"), "edge.svc.Echo");
/// ```
pub struct ClientBuilder<C = JsonCodec> {
    namer: SubjectNamer,
    config: StreamConfig,
    codec: C,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new client builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            namer: SubjectNamer::default(),
            config: StreamConfig::default(),
            codec: JsonCodec,
        }
    }
}

impl<C: Codec> ClientBuilder<C> {
    /// Set the subject namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        let token_len = self.namer.token_len();
        self.namer = SubjectNamer::new(namespace).with_token_len(token_len);
        self
    }

    /// Set the length of the random token in ephemeral subjects.
    #[must_use]
    pub fn token_len(mut self, token_len: usize) -> Self {
        self.namer = self.namer.with_token_len(token_len);
        self
    }

    /// Set how long the first send waits for the server's acknowledgment.
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_handshake_timeout(timeout);
        self
    }

    /// Set how long a full receive queue may stay full before the stream
    /// is closed.
    #[must_use]
    pub fn stuck_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_stuck_timeout(timeout);
        self
    }

    /// Set the delivery group of response subscriptions.
    #[must_use]
    pub fn queue_group(mut self, group: impl Into<String>) -> Self {
        self.config = self.config.with_queue_group(group);
        self
    }

    /// Replace the whole stream configuration.
    #[must_use]
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a different codec.
    #[must_use]
    pub fn codec<D: Codec>(self, codec: D) -> ClientBuilder<D> {
        ClientBuilder {
            namer: self.namer,
            config: self.config,
            codec,
        }
    }

    /// Build the client over `transport`.
    ///
    /// No traffic is sent until a stream is opened.
    #[must_use]
    pub fn build<T>(self, transport: T) -> Client<T, C>
    where
        T: Publisher + Subscriber + 'static,
    {
        Client::from_parts(
            Arc::new(transport),
            Arc::new(self.codec),
            self.namer,
            self.config,
        )
    }
}
