//! Envelope framing: one version-tag byte followed by a JSON-RPC 2.0 body.
//!
//! The codec owns both directions of the wire format. Outbound, it
//! serializes a [`Request`] and prepends the version tag. Inbound, it strips
//! the tag and classifies the body into exactly one [`InboundMessage`]
//! shape; anything it cannot classify comes back as
//! [`InboundMessage::Malformed`] rather than an error, because a bad frame
//! is never the caller's problem.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version tag carried as the first byte of every envelope.
pub const PROTOCOL_VERSION: u8 = 0;

/// An outgoing call, built by [`crate::RpcSession::create_request`].
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    jsonrpc: &'static str,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// A server-reported error object, surfaced to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl core::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// One decoded inbound frame, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A successful response to the call with this id.
    Result { id: u64, result: Value },
    /// A server-reported failure for the call with this id.
    Error { id: u64, error: ErrorObject },
    /// An unsolicited push event: has a method, no id.
    Event { name: String, params: Value },
    /// Empty frame, version mismatch, bad JSON, or an unclassifiable shape.
    Malformed,
}

/// Encodes requests and classifies inbound frames for one protocol version.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeCodec {
    version: u8,
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new(PROTOCOL_VERSION)
    }
}

impl EnvelopeCodec {
    pub fn new(version: u8) -> Self {
        Self { version }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Serialize a request and prepend the version tag.
    pub fn encode_request(&self, request: &Request) -> Result<Vec<u8>, serde_json::Error> {
        let body = serde_json::to_vec(request)?;
        Ok(self.frame(body))
    }

    /// Encode a fire-and-forget notification: a request body with no `id`.
    pub fn encode_notification(
        &self,
        method: &str,
        params: &Value,
    ) -> Result<Vec<u8>, serde_json::Error> {
        let body = serde_json::to_vec(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))?;
        Ok(self.frame(body))
    }

    fn frame(&self, body: Vec<u8>) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(body.len() + 1);
        bytes.push(self.version);
        bytes.extend_from_slice(&body);
        bytes
    }

    /// Decode and classify one inbound frame.
    ///
    /// Classification rules:
    /// - `id` + `error`  -> [`InboundMessage::Error`]
    /// - `id` + `result` -> [`InboundMessage::Result`]
    /// - `method`, no `id` -> [`InboundMessage::Event`]
    /// - anything else -> [`InboundMessage::Malformed`]
    ///
    /// Unknown extra fields are tolerated. This never fails or panics.
    pub fn decode(&self, bytes: &[u8]) -> InboundMessage {
        let Some((&version, body)) = bytes.split_first() else {
            return InboundMessage::Malformed;
        };
        if version != self.version {
            return InboundMessage::Malformed;
        }
        let Ok(value) = serde_json::from_slice::<Value>(body) else {
            return InboundMessage::Malformed;
        };
        let Some(object) = value.as_object() else {
            return InboundMessage::Malformed;
        };

        match object.get("id") {
            Some(raw_id) => {
                // Our outbound ids are always integers, so a response id we
                // cannot read as one can never match a pending call.
                let Some(id) = parse_id(raw_id) else {
                    return InboundMessage::Malformed;
                };
                if let Some(error) = object.get("error") {
                    match serde_json::from_value::<ErrorObject>(error.clone()) {
                        Ok(error) => InboundMessage::Error { id, error },
                        Err(_) => InboundMessage::Malformed,
                    }
                } else if let Some(result) = object.get("result") {
                    InboundMessage::Result {
                        id,
                        result: result.clone(),
                    }
                } else {
                    InboundMessage::Malformed
                }
            }
            None => match object.get("method").and_then(Value::as_str) {
                Some(name) => InboundMessage::Event {
                    name: name.to_owned(),
                    params: object.get("params").cloned().unwrap_or(Value::Null),
                },
                None => InboundMessage::Malformed,
            },
        }
    }
}

/// Response ids arrive as JSON integers or as strings of digits.
fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn frame(body: &Value) -> Vec<u8> {
        let mut bytes = vec![PROTOCOL_VERSION];
        bytes.extend_from_slice(&serde_json::to_vec(body).unwrap());
        bytes
    }

    #[test]
    fn request_round_trips_through_the_envelope() {
        let codec = EnvelopeCodec::default();
        let request = Request::new("contacts.get", json!({"page": 1}), 42);
        let bytes = codec.encode_request(&request).unwrap();

        assert_eq!(bytes[0], PROTOCOL_VERSION);
        let body: Value = serde_json::from_slice(&bytes[1..]).unwrap();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "contacts.get");
        assert_eq!(body["params"], json!({"page": 1}));
        assert_eq!(body["id"], 42);
    }

    #[test]
    fn notification_has_no_id() {
        let codec = EnvelopeCodec::default();
        let bytes = codec
            .encode_notification("presence.ping", &json!([1, 2]))
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes[1..]).unwrap();
        assert_eq!(body["method"], "presence.ping");
        assert!(body.get("id").is_none());
    }

    #[test]
    fn classifies_result_response() {
        let codec = EnvelopeCodec::default();
        let msg = codec.decode(&frame(&json!({
            "jsonrpc": "2.0", "id": 7, "result": ["a", "b"]
        })));
        assert_eq!(
            msg,
            InboundMessage::Result {
                id: 7,
                result: json!(["a", "b"])
            }
        );
    }

    #[test]
    fn classifies_error_response_with_optional_data() {
        let codec = EnvelopeCodec::default();
        let msg = codec.decode(&frame(&json!({
            "jsonrpc": "2.0", "id": "9",
            "error": {"code": -32601, "message": "Method not found"}
        })));
        assert_eq!(
            msg,
            InboundMessage::Error {
                id: 9,
                error: ErrorObject {
                    code: -32601,
                    message: "Method not found".into(),
                    data: None,
                }
            }
        );
    }

    #[test]
    fn classifies_event_without_id() {
        let codec = EnvelopeCodec::default();
        let msg = codec.decode(&frame(&json!({
            "jsonrpc": "2.0", "method": "contacts.updated", "params": [5]
        })));
        assert_eq!(
            msg,
            InboundMessage::Event {
                name: "contacts.updated".into(),
                params: json!([5]),
            }
        );
    }

    #[test]
    fn tolerates_unknown_extra_fields() {
        let codec = EnvelopeCodec::default();
        let msg = codec.decode(&frame(&json!({
            "jsonrpc": "2.0", "id": 3, "result": 1, "server_ts": 1234, "trace": "abc"
        })));
        assert_eq!(
            msg,
            InboundMessage::Result {
                id: 3,
                result: json!(1)
            }
        );
    }

    #[test]
    fn rejects_empty_and_version_mismatched_frames() {
        let codec = EnvelopeCodec::default();
        assert_eq!(codec.decode(&[]), InboundMessage::Malformed);

        let mut wrong = frame(&json!({"jsonrpc": "2.0", "id": 1, "result": 1}));
        wrong[0] = PROTOCOL_VERSION.wrapping_add(1);
        assert_eq!(codec.decode(&wrong), InboundMessage::Malformed);
    }

    #[test]
    fn rejects_unclassifiable_shapes() {
        let codec = EnvelopeCodec::default();
        // Valid JSON, but neither response nor event.
        assert_eq!(
            codec.decode(&frame(&json!({"jsonrpc": "2.0", "id": 1}))),
            InboundMessage::Malformed
        );
        assert_eq!(codec.decode(&frame(&json!([1, 2, 3]))), InboundMessage::Malformed);
        assert_eq!(codec.decode(&[PROTOCOL_VERSION, b'{']), InboundMessage::Malformed);
        // Null id cannot be correlated.
        assert_eq!(
            codec.decode(&frame(&json!({
                "jsonrpc": "2.0", "id": null,
                "error": {"code": -32700, "message": "Parse error"}
            }))),
            InboundMessage::Malformed
        );
    }
}
