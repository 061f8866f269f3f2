//! Streaming RPC client over publish/subscribe transports.
//!
//! The transport only publishes to subjects and pushes messages to
//! subscribers. This crate builds connection-like streaming calls on top:
//!
//! 1. A call derives a shared method subject and two ephemeral subjects, one
//!    per direction.
//! 2. [`ClientStream::subscribe`] listens on the response subject.
//! 3. The first [`ClientStream::send`] is a request to the method subject;
//!    an empty reply means a server bound itself to the call.
//! 4. Later sends publish to the request subject;
//!    [`ClientStream::close_send`] publishes the end-of-stream marker.
//! 5. [`ClientStream::recv`] yields results until the server's end-of-stream
//!    envelope.
//!
//! # Example
//!
//! ```no_run
//! use busrpc_client::ClientBuilder;
//! use busrpc_core::CallContext;
//! use busrpc_transport::MemoryBus;
//!
//! # async fn example() -> Result<(), busrpc_core::RpcError> {
//! let client = ClientBuilder::new().build(MemoryBus::new());
//! let ctx = CallContext::background();
//!
//! let stream = client.open_stream(&ctx, "/svc/Chat").await?;
//! stream.send("hello").await?;
//! stream.close_send().await?;
//! while let Some(line) = stream.recv::<String>().await? {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod client;
pub mod config;
mod dispatcher;
mod handshake;
pub mod stream;

// Re-export commonly used types
pub use builder::ClientBuilder;
pub use client::Client;
pub use config::StreamConfig;
pub use stream::ClientStream;
