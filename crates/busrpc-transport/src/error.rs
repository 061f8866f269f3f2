//! Transport error types.

use busrpc_core::context::ContextError;
use busrpc_core::error::{RpcError, TransportErrorKind};
use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Connection to the broker was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A message could not be published.
    #[error("Publish to {subject} failed: {message}")]
    Publish {
        /// Target subject.
        subject: String,
        /// Error message.
        message: String,
    },

    /// A subscription could not be created or removed.
    #[error("Subscription on {subject} failed: {message}")]
    Subscribe {
        /// Subscribed subject.
        subject: String,
        /// Error message.
        message: String,
    },

    /// A request was sent to a subject nobody subscribes to.
    #[error("No responders on {subject}")]
    NoResponders {
        /// Request subject.
        subject: String,
    },

    /// The subject name is not valid.
    #[error("Invalid subject: {subject:?}")]
    InvalidSubject {
        /// The rejected subject.
        subject: String,
    },

    /// Timeout occurred.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long the operation waited.
        duration: std::time::Duration,
    },

    /// The operation's context finished before it completed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Protocol error.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },
}

impl TransportError {
    /// Create a publish error.
    pub fn publish(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a subscribe error.
    pub fn subscribe(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscribe {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Get the transport error kind.
    #[must_use]
    pub const fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Connection { .. } => TransportErrorKind::ConnectionFailed,
            Self::ConnectionClosed => TransportErrorKind::ConnectionClosed,
            Self::Publish { .. } => TransportErrorKind::PublishFailed,
            Self::Subscribe { .. } => TransportErrorKind::SubscribeFailed,
            Self::NoResponders { .. } => TransportErrorKind::NoResponders,
            Self::InvalidSubject { .. } => TransportErrorKind::InvalidSubject,
            Self::Timeout { .. } | Self::Context(ContextError::DeadlineExceeded) => {
                TransportErrorKind::Timeout
            }
            Self::Context(ContextError::Cancelled) => TransportErrorKind::Cancelled,
            Self::Protocol { .. } => TransportErrorKind::ProtocolViolation,
        }
    }
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Context(ctx) => Self::from(ctx),
            other => Self::Transport {
                kind: other.kind(),
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}
