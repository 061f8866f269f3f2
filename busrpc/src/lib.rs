//! # busrpc - streaming RPC over publish/subscribe
//!
//! busrpc gives callers the usual streaming RPC surface (unary calls,
//! client, server and bidirectional streams, header and trailer metadata,
//! cancellable contexts) on top of a broker that only publishes to subjects
//! and pushes messages to subscribers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use busrpc::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct EchoRequest { msg: String }
//!
//! #[derive(Deserialize)]
//! struct EchoReply { msg: String }
//!
//! # async fn example() -> Result<(), RpcError> {
//! let client = ClientBuilder::new().build(MemoryBus::new());
//! let ctx = CallContext::background().with_timeout(std::time::Duration::from_secs(10));
//!
//! // Unary
//! let reply: EchoReply = client
//!     .invoke(&ctx, "/svc/Echo", &EchoRequest { msg: "hi".into() })
//!     .await?;
//!
//! // Server streaming
//! let stream = client.open_stream(&ctx, "/svc/Watch").await?;
//! stream.send(&EchoRequest { msg: reply.msg }).await?;
//! stream.close_send().await?;
//! while let Some(event) = stream.recv::<EchoReply>().await? {
//!     println!("{}", event.msg);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`busrpc_core`] - Subjects, envelopes, codecs, contexts, metadata and errors
//! - [`busrpc_transport`] - Publish/subscribe traits and the in-memory bus
//! - [`busrpc_client`] - Client streams and the unary client

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export core types
pub use busrpc_core::*;

// Re-export the client
pub use busrpc_client::{Client, ClientBuilder, ClientStream, StreamConfig};

// Re-export transport traits
pub use busrpc_transport::{Publisher, Subscriber, Subscription, TransportError};

pub mod prelude;

/// Client streams and configuration.
pub mod client {
    pub use busrpc_client::*;
}

/// Publish/subscribe transports.
pub mod transport {
    pub use busrpc_transport::*;
}
