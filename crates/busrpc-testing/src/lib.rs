//! Testing utilities for busrpc.
//!
//! This crate provides a scriptable server and async helpers for testing
//! busrpc clients against the in-process [`MemoryBus`](busrpc_transport::MemoryBus):
//!
//! - [`MockServer`] answers handshakes on a method subject and exposes each
//!   accepted call as a [`MockCall`]
//! - [`MockCall`] records what the client published and sends data,
//!   header-only and end-of-stream envelopes back
//! - [`async_helpers`] wraps futures in timeouts
//!
//! # Example
//!
//! ```rust
//! use busrpc_core::CallContext;
//! use busrpc_testing::MockServer;
//! use busrpc_transport::{MemoryBus, Message, Publisher};
//! use busrpc_core::{JsonCodec, Codec, RequestEnvelope, SubjectNamer};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), busrpc_core::RpcError> {
//! let bus = MemoryBus::new();
//! let server = MockServer::bind(&bus, "nrpc.svc.Echo").await?;
//!
//! let subjects = SubjectNamer::default().call_subjects("/svc/Echo");
//! let opening = JsonCodec.encode(&RequestEnvelope::open("{}".into(), &subjects, None))?;
//! bus.request(&CallContext::background(), Message::new("nrpc.svc.Echo", opening))
//!     .await
//!     .map_err(busrpc_core::RpcError::from)?;
//!
//! let call = server.next_call().await.expect("call accepted");
//! call.send_data(&"hi").await?;
//! call.send_eos().await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod async_helpers;
pub mod mock;

// Re-export commonly used types
pub use async_helpers::{assert_times_out, with_default_timeout, with_timeout};
pub use mock::{MockCall, MockServer};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::async_helpers::{assert_times_out, with_default_timeout, with_timeout};
    pub use crate::mock::{MockCall, MockServer};
}
