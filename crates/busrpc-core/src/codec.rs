//! Payload codecs.
//!
//! A [`Codec`] turns call arguments, results, envelopes and error statuses
//! into bytes and back. Both ends of a call must agree on the codec;
//! [`JsonCodec`] is the default.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Serialization format for everything exchanged on a call's subjects.
pub trait Codec: Send + Sync + 'static {
    /// Short name used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Serialize `value`.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, CodecError>;

    /// Deserialize a `T` from `bytes`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, CodecError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| CodecError::encode(self.name(), std::any::type_name::<T>(), e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::decode(self.name(), std::any::type_name::<T>(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Echo {
        msg: String,
    }

    #[test]
    fn test_json_codec() {
        let codec = JsonCodec;
        let bytes = codec
            .encode(&Echo {
                msg: "a".to_string(),
            })
            .unwrap();
        assert_eq!(&bytes[..], br#"{"msg":"a"}"#);

        let echo: Echo = codec.decode(&bytes).unwrap();
        assert_eq!(echo.msg, "a");
    }

    #[test]
    fn test_decode_error_names_target_type() {
        let err = JsonCodec.decode::<Status>(b"not json").unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("json decode of"), "{text}");
        assert!(text.contains("Status"), "{text}");
    }
}
