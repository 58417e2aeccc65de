//! Persisted record format.
//!
//! Each partition line holds one JSON object, `{"k": key, "d": [tuple]}`,
//! with the storage tuple in column order. Time values serialize as RFC 3339
//! text; numbers keep their native JSON form (`serde_json` round-trips the
//! full 64-bit range exactly). An empty line is a tombstone and never reaches
//! the decoder.

use serde::{Deserialize, Serialize};

use crate::error::{EncodingError, Result};
use crate::schema::value::Value;

#[derive(Serialize, Deserialize)]
struct Record {
    k: String,
    d: Vec<serde_json::Value>,
}

/// Encode an entry (key + storage tuple) into one partition line.
pub fn encode_record(key: &str, tuple: &[Value]) -> Result<Vec<u8>> {
    let record = Record {
        k: key.to_string(),
        d: tuple.iter().map(Value::to_json).collect(),
    };
    serde_json::to_vec(&record).map_err(|e| EncodingError::JsonEncoding(e.to_string()).into())
}

/// Decode one partition line back into a key and an untyped tuple. The
/// caller re-canonicalizes each slot through the schema's restore filter.
pub fn decode_record(bytes: &[u8]) -> Result<(String, Vec<serde_json::Value>)> {
    let record: Record = serde_json::from_slice(bytes)
        .map_err(|e| EncodingError::JsonDecoding(e.to_string()))?;
    if record.d.is_empty() {
        return Err(EncodingError::JsonDecoding("record has no data tuple".into()).into());
    }
    Ok((record.k, record.d))
}
