//! The engine's native wire format.
//!
//! A request frame is one complete UTF-8 SQL statement. A response frame is
//! one JSON document: `{"status":"ok","columns":[..],"rows":[..],
//! "rows_affected":n}` for a successful statement, or
//! `{"status":"error","message":".."}` for a statement the engine rejected.
//! Blob columns are base64 strings; non-finite reals serialize as null.
//!
//! The bridge relays these frames byte-for-byte and never constructs or
//! inspects them; only this module and the remote peer interpret them.

use base64::Engine;
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};

/// One complete response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WireResponse {
    /// The statement executed.
    Ok {
        /// Column names; empty for statements that return no rows.
        columns: Vec<String>,
        /// Result rows in query order.
        rows: Vec<Vec<serde_json::Value>>,
        /// Rows changed by a mutating statement; 0 for queries.
        rows_affected: u64,
    },
    /// The engine rejected or failed to process the statement.
    Error {
        /// Engine-supplied failure description.
        message: String,
    },
}

impl WireResponse {
    /// Response for a statement that returned no rows.
    pub fn exec(rows_affected: u64) -> Self {
        Self::Ok {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected,
        }
    }

    /// Response carrying a result set.
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self::Ok {
            columns,
            rows,
            rows_affected: 0,
        }
    }

    /// In-band error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Encodes this response as one outbound frame.
    pub fn encode(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("failed to encode wire response: {}", e);
                br#"{"status":"error","message":"internal encoding failure"}"#.to_vec()
            }
        }
    }

    /// Decodes a response frame. Intended for peers and tests; the bridge
    /// never calls this.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error for malformed frames.
    pub fn decode(frame: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(frame)
    }
}

/// Converts one SQLite column value into its JSON wire representation.
pub(crate) fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => {
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_mapping() {
        assert_eq!(value_to_json(ValueRef::Null), serde_json::Value::Null);
        assert_eq!(value_to_json(ValueRef::Integer(42)), serde_json::json!(42));
        assert_eq!(value_to_json(ValueRef::Real(1.5)), serde_json::json!(1.5));
        assert_eq!(
            value_to_json(ValueRef::Text(b"hello")),
            serde_json::json!("hello")
        );
        // 0xDEADBEEF -> "3q2+7w==" in standard base64
        assert_eq!(
            value_to_json(ValueRef::Blob(&[0xDE, 0xAD, 0xBE, 0xEF])),
            serde_json::json!("3q2+7w==")
        );
    }

    #[test]
    fn non_finite_real_serializes_as_null() {
        assert_eq!(value_to_json(ValueRef::Real(f64::NAN)), serde_json::Value::Null);
        assert_eq!(
            value_to_json(ValueRef::Real(f64::INFINITY)),
            serde_json::Value::Null
        );
    }

    #[test]
    fn ok_frame_shape() {
        let frame = WireResponse::rows(
            vec!["n".to_string()],
            vec![vec![serde_json::json!(1)]],
        )
        .encode();
        let json: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["columns"], serde_json::json!(["n"]));
        assert_eq!(json["rows"], serde_json::json!([[1]]));
        assert_eq!(json["rows_affected"], 0);
    }

    #[test]
    fn error_frame_shape() {
        let frame = WireResponse::error("no such table: t").encode();
        let json: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "no such table: t");
    }

    #[test]
    fn encode_decode_roundtrip() {
        let response = WireResponse::exec(3);
        let decoded = WireResponse::decode(&response.encode()).unwrap();
        assert_eq!(decoded, response);
    }
}
