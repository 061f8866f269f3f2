//! The primary error type for busrpc.

use miette::Diagnostic;
use thiserror::Error;

use super::codec::CodecError;
use super::status::{Code, Status};
use super::transport::TransportErrorKind;
use crate::context::ContextError;

/// Boxed error type used as an error source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The primary error type for busrpc.
#[derive(Error, Diagnostic, Debug)]
pub enum RpcError {
    /// `send` was called after `close_send`.
    #[error("send on closed stream")]
    #[diagnostic(
        code(busrpc::stream::send_closed),
        help("close_send was already called on this stream")
    )]
    SendClosed,

    /// The call's context was cancelled.
    #[error("context cancelled")]
    #[diagnostic(code(busrpc::context::cancelled))]
    Cancelled,

    /// The call's context passed its deadline.
    #[error("context deadline exceeded")]
    #[diagnostic(
        code(busrpc::context::deadline_exceeded),
        help("Consider increasing the deadline or checking that a server is subscribed")
    )]
    DeadlineExceeded,

    /// The transport failed to carry a message.
    #[error("Transport error ({kind}): {message}")]
    #[diagnostic(code(busrpc::transport::error))]
    Transport {
        /// Classification of the failure.
        kind: TransportErrorKind,
        /// Human-readable error message.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// The peer broke the envelope protocol.
    #[error("Protocol error: {message}")]
    #[diagnostic(code(busrpc::protocol::violation))]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// A payload or envelope could not be (de)serialized.
    #[error(transparent)]
    #[diagnostic(code(busrpc::codec::error))]
    Codec(#[from] CodecError),

    /// The server terminated the call with an error status.
    #[error("Remote error: {0}")]
    #[diagnostic(code(busrpc::remote::status))]
    Status(Status),

    /// The operation is not valid in the stream's current state.
    #[error("Invalid stream state: {message}")]
    #[diagnostic(code(busrpc::stream::invalid_state))]
    InvalidState {
        /// What was wrong.
        message: String,
    },
}

impl RpcError {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a transport error without an underlying source.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` if this error came from context cancellation or deadline.
    #[must_use]
    pub const fn is_context(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// The remote status, if the server terminated the call with one.
    #[must_use]
    pub const fn status(&self) -> Option<&Status> {
        match self {
            Self::Status(status) => Some(status),
            _ => None,
        }
    }

    /// The status code that best describes this error.
    #[must_use]
    pub fn code(&self) -> Code {
        match self {
            Self::SendClosed | Self::InvalidState { .. } => Code::FailedPrecondition,
            Self::Cancelled => Code::Cancelled,
            Self::DeadlineExceeded => Code::DeadlineExceeded,
            Self::Transport { kind, .. } => match kind {
                TransportErrorKind::Timeout => Code::DeadlineExceeded,
                TransportErrorKind::Cancelled => Code::Cancelled,
                TransportErrorKind::InvalidSubject => Code::InvalidArgument,
                TransportErrorKind::ProtocolViolation => Code::Internal,
                _ => Code::Unavailable,
            },
            Self::Protocol { .. } | Self::Codec(_) => Code::Internal,
            Self::Status(status) => status.code,
        }
    }
}

impl From<ContextError> for RpcError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

impl From<Status> for RpcError {
    fn from(status: Status) -> Self {
        Self::Status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_conversion() {
        assert!(matches!(
            RpcError::from(ContextError::Cancelled),
            RpcError::Cancelled
        ));
        assert!(matches!(
            RpcError::from(ContextError::DeadlineExceeded),
            RpcError::DeadlineExceeded
        ));
        assert!(RpcError::Cancelled.is_context());
        assert!(!RpcError::SendClosed.is_context());
    }

    #[test]
    fn test_codes() {
        assert_eq!(RpcError::SendClosed.code(), Code::FailedPrecondition);
        assert_eq!(
            RpcError::transport(TransportErrorKind::NoResponders, "nobody home").code(),
            Code::Unavailable
        );
        assert_eq!(
            RpcError::from(Status::not_found("gone")).code(),
            Code::NotFound
        );
    }

    #[test]
    fn test_display() {
        let err = RpcError::protocol("unexpected response");
        assert_eq!(err.to_string(), "Protocol error: unexpected response");

        let err = RpcError::Status(Status::internal("boom"));
        assert_eq!(err.to_string(), "Remote error: internal: boom");
        assert_eq!(err.status().map(|s| s.code), Some(Code::Internal));
    }
}
