//! # busrpc-core
//!
//! Core types for running streaming RPC over a publish/subscribe transport.
//!
//! This crate provides the building blocks shared by the transport and client
//! crates:
//!
//! - **Subjects**: deterministic method subjects and per-call ephemeral
//!   request/response subjects ([`subject`])
//! - **Envelopes**: the request and response frames exchanged on those
//!   subjects ([`envelope`])
//! - **Codecs**: pluggable payload serialization ([`codec`])
//! - **Contexts**: cancellation plus optional deadline, the lifetime of a
//!   call ([`context`])
//! - **Metadata**: header and trailer key/value pairs ([`metadata`])
//! - **Error handling**: the unified [`RpcError`] type and remote
//!   [`Status`] values
//!
//! # Example
//!
//! ```rust
//! use busrpc_core::subject::SubjectNamer;
//!
//! let namer = SubjectNamer::default();
//! assert_eq!(namer.method_subject("/svc/Echo"), "nrpc.svc.Echo");
//!
//! let subjects = namer.call_subjects("/svc/Echo");
//! assert!(subjects.request.starts_with("nrpc.req.svc.Echo."));
//! assert!(subjects.response.starts_with("nrpc.resp.svc.Echo."));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod context;
pub mod envelope;
pub mod error;
pub mod metadata;
pub mod subject;

// Re-export commonly used types at the crate root
pub use codec::{Codec, JsonCodec};
pub use context::{CallContext, ContextError};
pub use envelope::{Inbound, RequestEnvelope, ResponseEnvelope};
pub use error::{Code, CodecError, RpcError, Status, TransportErrorKind};
pub use metadata::Metadata;
pub use subject::{CallSubjects, SubjectNamer};
