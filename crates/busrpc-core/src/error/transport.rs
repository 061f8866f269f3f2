//! Classification of transport errors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Connection to the broker could not be established.
    ConnectionFailed,
    /// Connection to the broker was closed.
    ConnectionClosed,
    /// A publish could not be handed to the broker.
    PublishFailed,
    /// A subscription could not be created or removed.
    SubscribeFailed,
    /// A request found nobody subscribed to its subject.
    NoResponders,
    /// Operation timed out.
    Timeout,
    /// The operation's context was cancelled.
    Cancelled,
    /// The subject name is not acceptable to the transport.
    InvalidSubject,
    /// Protocol violation detected.
    ProtocolViolation,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection failed"),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::NoResponders => write!(f, "no responders"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::InvalidSubject => write!(f, "invalid subject"),
            Self::ProtocolViolation => write!(f, "protocol violation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(TransportErrorKind::NoResponders.to_string(), "no responders");
        assert_eq!(TransportErrorKind::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&TransportErrorKind::PublishFailed).unwrap();
        assert_eq!(json, "\"publish_failed\"");
    }
}
