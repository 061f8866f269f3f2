//! Codec errors.

use thiserror::Error;

use super::types::BoxError;

/// Errors produced while encoding or decoding payloads and envelopes.
#[derive(Error, Debug)]
pub enum CodecError {
    /// A value could not be serialized.
    #[error("{codec} encode of {what} failed: {source}")]
    Encode {
        /// Name of the codec that failed.
        codec: &'static str,
        /// What was being encoded.
        what: &'static str,
        /// The underlying error.
        #[source]
        source: BoxError,
    },

    /// Bytes could not be deserialized into the requested type.
    #[error("{codec} decode of {what} failed: {source}")]
    Decode {
        /// Name of the codec that failed.
        codec: &'static str,
        /// What was being decoded.
        what: &'static str,
        /// The underlying error.
        #[source]
        source: BoxError,
    },
}

impl CodecError {
    /// Create an encode error.
    pub fn encode(
        codec: &'static str,
        what: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Encode {
            codec,
            what,
            source: source.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(
        codec: &'static str,
        what: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Decode {
            codec,
            what,
            source: source.into(),
        }
    }
}
