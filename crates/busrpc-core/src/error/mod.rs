//! Unified error handling for busrpc.
//!
//! Every operation on a stream reports failures through [`RpcError`]. The
//! variants follow the life of a call:
//!
//! - **Local misuse**: [`RpcError::SendClosed`] after `close_send`,
//!   [`RpcError::InvalidState`] before a stream is subscribed
//! - **Context**: [`RpcError::Cancelled`] and [`RpcError::DeadlineExceeded`]
//! - **Transport**: [`RpcError::Transport`], classified by
//!   [`TransportErrorKind`]
//! - **Protocol**: [`RpcError::Protocol`] for peers that break the envelope
//!   contract (e.g. a non-empty handshake acknowledgment)
//! - **Codec**: [`RpcError::Codec`] when a payload cannot be (de)serialized
//! - **Remote**: [`RpcError::Status`] carries the [`Status`] a server attached
//!   to its end-of-stream envelope
//!
//! Clean termination of a stream is not an error; receive operations report
//! it as `Ok(None)`.

mod codec;
mod status;
mod transport;
mod types;

pub use codec::CodecError;
pub use status::{Code, Status};
pub use transport::TransportErrorKind;
pub use types::{BoxError, RpcError};

/// Convenient result alias for busrpc operations.
pub type Result<T, E = RpcError> = std::result::Result<T, E>;
