//! JSON codec for transport payloads.
//!
//! Decoding is lenient about the discriminant and strict about everything
//! else:
//! - a JSON object without a string `type` field is `ClientRecord::Unknown`
//! - an unrecognised `type` is `ClientRecord::Unknown`
//! - invalid JSON, non-object JSON, or a known record with mistyped fields
//!   is a `DecodeError`

use serde_json::Value;
use thiserror::Error;

use crate::record::{ClientRecord, ServerRecord};

/// Errors produced while decoding an inbound payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload was not valid JSON (or not UTF-8 for binary frames).
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Payload was valid JSON but not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// A known record type carried fields of the wrong shape.
    #[error("malformed {kind} record: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors produced while encoding an outbound record.
#[derive(Debug, Error)]
#[error("failed to encode {kind} record: {source}")]
pub struct EncodeError {
    kind: &'static str,
    #[source]
    source: serde_json::Error,
}

/// Decodes a text payload into a client record.
pub fn decode_client(payload: &str) -> Result<ClientRecord, DecodeError> {
    let value: Value = serde_json::from_str(payload).map_err(DecodeError::InvalidJson)?;
    decode_value(value)
}

/// Decodes a binary payload (UTF-8 JSON) into a client record.
pub fn decode_client_bytes(payload: &[u8]) -> Result<ClientRecord, DecodeError> {
    let value: Value = serde_json::from_slice(payload).map_err(DecodeError::InvalidJson)?;
    decode_value(value)
}

fn decode_value(value: Value) -> Result<ClientRecord, DecodeError> {
    let kind = match &value {
        Value::Object(map) => match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Ok(ClientRecord::Unknown),
        },
        other => return Err(DecodeError::NotAnObject(json_kind(other))),
    };

    serde_json::from_value(value).map_err(|source| DecodeError::Malformed { kind, source })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Encodes a server record as a JSON text payload.
pub fn encode_server(record: &ServerRecord) -> Result<String, EncodeError> {
    serde_json::to_string(record).map_err(|source| EncodeError {
        kind: record.kind(),
        source,
    })
}

/// Encodes a client record as a JSON text payload.
///
/// The relay never sends client records; this exists for clients and tests.
pub fn encode_client(record: &ClientRecord) -> Result<String, EncodeError> {
    serde_json::to_string(record).map_err(|source| EncodeError {
        kind: record.kind(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_login() {
        let record = decode_client(r#"{"type":"login","username":"alice"}"#).unwrap();
        assert_eq!(record, ClientRecord::login("alice"));
    }

    #[test]
    fn test_decode_login_without_username() {
        let record = decode_client(r#"{"type":"login"}"#).unwrap();
        assert_eq!(record, ClientRecord::Login { username: None });

        let record = decode_client(r#"{"type":"login","username":null}"#).unwrap();
        assert_eq!(record, ClientRecord::Login { username: None });
    }

    #[test]
    fn test_decode_chat_keeps_message_opaque() {
        let record = decode_client(r#"{"type":"chat_message","message":"hi"}"#).unwrap();
        assert_eq!(record, ClientRecord::chat("hi"));

        let record = decode_client(r#"{"type":"chat_message","message":{"x":[1,2]}}"#).unwrap();
        assert_eq!(
            record,
            ClientRecord::ChatMessage {
                message: json!({"x": [1, 2]})
            }
        );

        let record = decode_client(r#"{"type":"chat_message"}"#).unwrap();
        assert_eq!(record, ClientRecord::ChatMessage { message: Value::Null });
    }

    #[test]
    fn test_decode_unknown_type() {
        assert_eq!(
            decode_client(r#"{"type":"typing","who":"bob"}"#).unwrap(),
            ClientRecord::Unknown
        );
        assert_eq!(decode_client(r#"{"hello":1}"#).unwrap(), ClientRecord::Unknown);
        assert_eq!(decode_client(r#"{"type":42}"#).unwrap(), ClientRecord::Unknown);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_client("not json"),
            Err(DecodeError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_client("[1,2,3]"),
            Err(DecodeError::NotAnObject("an array"))
        ));
        assert!(matches!(
            decode_client(r#"{"type":"login","username":5}"#),
            Err(DecodeError::Malformed { ref kind, .. }) if kind == "login"
        ));
    }

    #[test]
    fn test_decode_bytes() {
        let record = decode_client_bytes(br#"{"type":"login","username":"bob"}"#).unwrap();
        assert_eq!(record, ClientRecord::login("bob"));

        assert!(matches!(
            decode_client_bytes(&[0xff, 0xfe]),
            Err(DecodeError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_encode_server() {
        let payload = encode_server(&ServerRecord::login_rejected()).unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "Tên đã tồn tại hoặc không hợp lệ.");
    }

    #[test]
    fn test_error_display() {
        let err = decode_client("[]").unwrap_err();
        assert_eq!(err.to_string(), "expected a JSON object, got an array");
    }
}
