//! Prelude module for convenient imports.
//!
//! ```rust
//! use busrpc::prelude::*;
//!
//! let client = Client::new(MemoryBus::new());
//! let stream = client.new_stream("/svc/Echo");
//! assert_eq!(stream.subjects().method, "nrpc.svc.Echo");
//! ```

pub use busrpc_core::{
    CallContext, CallSubjects, Code, Codec, JsonCodec, Metadata, RpcError, Status, SubjectNamer,
};

pub use busrpc_client::{Client, ClientBuilder, ClientStream, StreamConfig};

pub use busrpc_transport::{
    Delivery, MemoryBus, Message, Publisher, Subscriber, Subscription, TransportError, handler,
};
