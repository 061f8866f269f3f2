//! Publish/subscribe transport abstractions for busrpc.
//!
//! busrpc runs streaming RPC on top of a broker that only knows how to
//! publish a payload to a named subject and push messages on a subject to
//! its subscribers. This crate defines that boundary:
//!
//! - [`Publisher`]: fire-and-forget [`publish`](Publisher::publish) and a
//!   one-reply [`request`](Publisher::request) bounded by a context
//! - [`Subscriber`]: push delivery of every message on a subject to a
//!   [`MessageHandler`], optionally load balanced within a queue group
//! - [`Subscription`]: the handle used to stop delivery
//!
//! # Available Transports
//!
//! | Transport | Use Case |
//! |-----------|----------|
//! | [`memory::MemoryBus`] | Testing and in-process communication |
//!
//! Broker-backed transports implement the same traits in their own crates.
//!
//! # Example
//!
//! ```rust
//! use busrpc_transport::{MemoryBus, Message, Publisher, Subscriber, handler};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), busrpc_transport::TransportError> {
//! let bus = MemoryBus::new();
//! let _sub = bus
//!     .subscribe("greetings", "", handler(|delivery| async move {
//!         println!("got {:?}", delivery.message.data);
//!     }))
//!     .await?;
//!
//! bus.publish(Message::new("greetings", "hello")).await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod memory;
pub mod middleware;
pub mod runtime;
pub mod traits;

// Re-export commonly used types
pub use error::TransportError;
pub use memory::{MemoryBus, MemorySubscription};
pub use traits::{
    Delivery, Message, MessageHandler, Publisher, Subscriber, Subscription, handler,
};

// Re-export bytes types for zero-copy message handling
pub use bytes::{Bytes, BytesMut};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::TransportError;
    pub use crate::memory::MemoryBus;
    pub use crate::middleware::{LayerStack, LoggingLayer};
    pub use crate::traits::{
        Delivery, Message, MessageHandler, Publisher, Subscriber, Subscription, handler,
    };
}
