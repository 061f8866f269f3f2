//! Request and response envelopes.
//!
//! Every message on a call's subjects is an envelope serialized with the
//! client's [`Codec`](crate::codec::Codec):
//!
//! - The first request of a call goes to the method subject and carries the
//!   call's ephemeral request/response subjects plus an optional timeout.
//! - Later requests go to the request subject and carry only the payload.
//! - Closing the send side publishes an end-of-stream request marker.
//! - Responses arrive on the response subject as data, header-only, or
//!   end-of-stream envelopes; see [`Inbound`].
//!
//! Payload bytes are base64 encoded on the wire.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;
use crate::subject::CallSubjects;

/// An outbound envelope published by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Encoded call arguments.
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Bytes::is_empty")]
    pub data: Bytes,
    /// Subject the server listens on for the rest of the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_subject: Option<String>,
    /// Subject the server publishes responses to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resp_subject: Option<String>,
    /// Time the server may spend on the call, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// End-of-stream marker: the client will send nothing more.
    #[serde(default, skip_serializing_if = "is_false")]
    pub eos: bool,
}

impl RequestEnvelope {
    /// The first envelope of a call, binding it to its ephemeral subjects.
    ///
    /// The timeout is rounded up to whole milliseconds, so a call with any
    /// time left never goes out with a zero timeout.
    #[must_use]
    pub fn open(data: Bytes, subjects: &CallSubjects, timeout: Option<Duration>) -> Self {
        Self {
            data,
            req_subject: Some(subjects.request.clone()),
            resp_subject: Some(subjects.response.clone()),
            timeout_ms: timeout.map(|t| {
                u64::try_from(t.as_micros().div_ceil(1000)).unwrap_or(u64::MAX)
            }),
            eos: false,
        }
    }

    /// A follow-up envelope on an established call.
    #[must_use]
    pub fn data(data: Bytes) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// The end-of-stream marker.
    #[must_use]
    pub fn end_of_stream() -> Self {
        Self {
            eos: true,
            ..Self::default()
        }
    }

    /// Returns `true` if this envelope opens a call.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.req_subject.is_some() && self.resp_subject.is_some()
    }

    /// The timeout carried by an opening envelope.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// An inbound envelope published by the server on the response subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Encoded result, or an encoded [`Status`](crate::error::Status) on an
    /// end-of-stream envelope.
    #[serde(default, with = "base64_opt_bytes", skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    /// Header metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Metadata>,
    /// Trailer metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer: Option<Metadata>,
    /// The envelope carries metadata only.
    #[serde(default, skip_serializing_if = "is_false")]
    pub header_only: bool,
    /// End of stream: no more envelopes follow.
    #[serde(default, skip_serializing_if = "is_false")]
    pub eos: bool,
}

impl ResponseEnvelope {
    /// A data envelope.
    #[must_use]
    pub fn data(data: Bytes) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// A header-only envelope.
    #[must_use]
    pub fn header_only(header: Metadata) -> Self {
        Self {
            header: Some(header),
            header_only: true,
            ..Self::default()
        }
    }

    /// A clean end-of-stream envelope.
    #[must_use]
    pub fn end_of_stream() -> Self {
        Self {
            eos: true,
            ..Self::default()
        }
    }

    /// An end-of-stream envelope carrying an encoded error.
    #[must_use]
    pub fn end_of_stream_with_error(error: Bytes) -> Self {
        Self {
            data: Some(error),
            eos: true,
            ..Self::default()
        }
    }

    /// Attach header metadata.
    #[must_use]
    pub fn with_header(mut self, header: Metadata) -> Self {
        self.header = Some(header);
        self
    }

    /// Attach trailer metadata.
    #[must_use]
    pub fn with_trailer(mut self, trailer: Metadata) -> Self {
        self.trailer = Some(trailer);
        self
    }

    /// Classify the envelope.
    ///
    /// The end-of-stream flag takes precedence over the header-only flag.
    #[must_use]
    pub fn into_inbound(self) -> Inbound {
        if self.eos {
            Inbound::EndOfStream {
                error: self.data,
                header: self.header,
                trailer: self.trailer,
            }
        } else if self.header_only {
            Inbound::HeaderOnly {
                header: self.header,
                trailer: self.trailer,
            }
        } else {
            Inbound::Data {
                payload: self.data.unwrap_or_default(),
                header: self.header,
                trailer: self.trailer,
            }
        }
    }
}

/// A classified inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A result message, optionally carrying metadata.
    Data {
        /// Encoded result.
        payload: Bytes,
        /// Header metadata.
        header: Option<Metadata>,
        /// Trailer metadata.
        trailer: Option<Metadata>,
    },
    /// Metadata only; never completes a receive.
    HeaderOnly {
        /// Header metadata.
        header: Option<Metadata>,
        /// Trailer metadata.
        trailer: Option<Metadata>,
    },
    /// The terminal envelope. `error` is an encoded status when present.
    EndOfStream {
        /// Encoded [`Status`](crate::error::Status), absent on clean termination.
        error: Option<Bytes>,
        /// Header metadata.
        header: Option<Metadata>,
        /// Trailer metadata.
        trailer: Option<Metadata>,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(b: &bool) -> bool {
    !*b
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

mod base64_opt_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        data: &Option<Bytes>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match data {
            Some(data) => serializer.serialize_some(&STANDARD.encode(data)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Bytes>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| {
                STANDARD
                    .decode(encoded)
                    .map(Bytes::from)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn subjects() -> CallSubjects {
        CallSubjects {
            method: "nrpc.svc.Echo".to_string(),
            request: "nrpc.req.svc.Echo.tok".to_string(),
            response: "nrpc.resp.svc.Echo.tok".to_string(),
        }
    }

    #[test]
    fn test_open_envelope_wire_shape() {
        let env = RequestEnvelope::open(
            Bytes::from_static(b"hi"),
            &subjects(),
            Some(Duration::from_millis(1500)),
        );
        assert!(env.is_open());
        assert_eq!(env.timeout(), Some(Duration::from_millis(1500)));

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "data": "aGk=",
                "reqSubject": "nrpc.req.svc.Echo.tok",
                "respSubject": "nrpc.resp.svc.Echo.tok",
                "timeoutMs": 1500,
            })
        );
    }

    #[test]
    fn test_follow_up_envelope_is_bare() {
        let env = RequestEnvelope::data(Bytes::from_static(b"hi"));
        assert!(!env.is_open());
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, serde_json::json!({"data": "aGk="}));

        let eos = serde_json::to_value(RequestEnvelope::end_of_stream()).unwrap();
        assert_eq!(eos, serde_json::json!({"eos": true}));
    }

    #[test]
    fn test_classify_header_only() {
        let md: Metadata = [("k", "v")].into_iter().collect();
        let inbound = ResponseEnvelope::header_only(md.clone()).into_inbound();
        assert_eq!(
            inbound,
            Inbound::HeaderOnly {
                header: Some(md),
                trailer: None
            }
        );
    }

    #[test]
    fn test_classify_eos_distinguishes_missing_and_present_error() {
        assert_eq!(
            ResponseEnvelope::end_of_stream().into_inbound(),
            Inbound::EndOfStream {
                error: None,
                header: None,
                trailer: None
            }
        );

        let env = ResponseEnvelope::end_of_stream_with_error(Bytes::from_static(b"{}"));
        let decoded: ResponseEnvelope =
            serde_json::from_slice(&serde_json::to_vec(&env).unwrap()).unwrap();
        assert_eq!(
            decoded.into_inbound(),
            Inbound::EndOfStream {
                error: Some(Bytes::from_static(b"{}")),
                header: None,
                trailer: None
            }
        );
    }

    #[test]
    fn test_sub_millisecond_timeout_rounds_up() {
        let env = RequestEnvelope::open(Bytes::new(), &subjects(), Some(Duration::from_micros(300)));
        assert_eq!(env.timeout_ms, Some(1));

        let env = RequestEnvelope::open(Bytes::new(), &subjects(), Some(Duration::from_micros(1001)));
        assert_eq!(env.timeout_ms, Some(2));

        let env = RequestEnvelope::open(Bytes::new(), &subjects(), Some(Duration::ZERO));
        assert_eq!(env.timeout_ms, Some(0));
    }

    #[test]
    fn test_classify_keeps_metadata() {
        let header: Metadata = [("x-node", "n1")].into_iter().collect();
        let trailer: Metadata = [("grpc-status", "0")].into_iter().collect();

        let data = ResponseEnvelope::data(Bytes::from_static(b"1")).with_header(header.clone());
        assert_eq!(
            data.into_inbound(),
            Inbound::Data {
                payload: Bytes::from_static(b"1"),
                header: Some(header),
                trailer: None
            }
        );

        let eos = ResponseEnvelope::end_of_stream().with_trailer(trailer.clone());
        assert_eq!(
            eos.into_inbound(),
            Inbound::EndOfStream {
                error: None,
                header: None,
                trailer: Some(trailer)
            }
        );
    }

    #[test]
    fn test_data_without_payload_is_empty() {
        let env: ResponseEnvelope = serde_json::from_str("{}").unwrap();
        assert_eq!(
            env.into_inbound(),
            Inbound::Data {
                payload: Bytes::new(),
                header: None,
                trailer: None
            }
        );
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let result: Result<ResponseEnvelope, _> = serde_json::from_str(r#"{"data":"***"}"#);
        assert!(result.is_err());
    }
}
