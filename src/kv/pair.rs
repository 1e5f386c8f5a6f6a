//! A single key/value entry and its JSON wire form.
//!
//! The agent returns entries as JSON objects:
//!
//! ```json
//! {"CreateIndex":469,"ModifyIndex":469,"LockIndex":0,"Flags":0,
//!  "Session":"","Key":"test","Value":"dGVzdC12YWx1ZQ=="}
//! ```
//!
//! `Value` is base64 text on the wire and raw bytes in a [`KvPair`].

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ConsulError;
use crate::json::JsonKind;

/// Banner printed above an encoded value when displaying it.
pub const BASE64_HEADER: &str = "-----BEGIN BASE64 ENCODED STREAM-----";
/// Banner printed below an encoded value when displaying it.
pub const BASE64_FOOTER: &str = "-----END BASE64 ENCODED STREAM-----";

/// Standard alphabet, padded on encode, padding optional on decode.
const VALUE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// What to do when a reply omits `Key` or `Value`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    /// Leave the field at its empty default.
    #[default]
    Tolerant,
    /// Reject the reply as malformed.
    Strict,
}

/// Base64-encode a raw value for the wire.
pub fn encode_value(value: &[u8]) -> String {
    VALUE_ENGINE.encode(value)
}

/// Wrap encoded text between the BEGIN/END banner lines.
pub fn armor(encoded: &str) -> String {
    format!("{BASE64_HEADER}\n{encoded}\n{BASE64_FOOTER}")
}

/// Decode base64 wire text into raw bytes.
///
/// ASCII whitespace (including a trailing newline) is ignored.
pub fn decode_value(encoded: &str) -> Result<Vec<u8>, ConsulError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    VALUE_ENGINE
        .decode(compact.as_bytes())
        .map_err(|_| ConsulError::Range {
            field: "Value",
            expected: "base64 string",
            text: encoded.to_string(),
        })
}

/// One stored key as reported by the key/value endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvPair {
    pub create_index: u64,
    pub modify_index: u64,
    pub lock_index: u64,
    pub flags: u64,
    /// Session holding the lock; empty when unheld.
    pub session: String,
    pub key: String,
    pub value: Vec<u8>,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Decode one entry object, tolerating a missing `Key` or `Value`.
    pub fn decode(json: &Value) -> Result<Self, ConsulError> {
        Self::decode_with(json, MissingFieldPolicy::Tolerant)
    }

    /// Decode one entry object under the given missing-field policy.
    pub fn decode_with(json: &Value, policy: MissingFieldPolicy) -> Result<Self, ConsulError> {
        let obj = match json {
            Value::Object(obj) => obj,
            other => {
                return Err(ConsulError::Shape(format!(
                    "Expected a JSON object in KV Pair response, received {}",
                    JsonKind::of(other)
                )))
            }
        };
        if obj.is_empty() {
            return Err(ConsulError::Shape(
                "Unexpected empty object in KV Pair response".to_string(),
            ));
        }

        let mut pair = KvPair {
            create_index: index_field(obj, "CreateIndex")?,
            modify_index: index_field(obj, "ModifyIndex")?,
            lock_index: index_field(obj, "LockIndex")?,
            flags: index_field(obj, "Flags")?,
            session: string_field(obj, "Session")?.unwrap_or_default().to_string(),
            ..KvPair::default()
        };

        match string_field(obj, "Key")? {
            Some(key) => pair.key = key.to_string(),
            None => missing_field("Key", policy)?,
        }

        match string_field(obj, "Value")? {
            Some(encoded) => pair.value = decode_value(encoded)?,
            None => missing_field("Value", policy)?,
        }

        Ok(pair)
    }

    /// Parse and decode a single entry object from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConsulError> {
        let json: Value = serde_json::from_str(text)?;
        Self::decode(&json)
    }

    /// Wire JSON for this entry.
    ///
    /// Numeric fields are rendered as decimal strings and `Value` as
    /// base64 text.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("CreateIndex".into(), Value::String(self.create_index_str()));
        obj.insert("ModifyIndex".into(), Value::String(self.modify_index_str()));
        obj.insert("LockIndex".into(), Value::String(self.lock_index_str()));
        obj.insert("Flags".into(), Value::String(self.flags_str()));
        obj.insert("Session".into(), Value::String(self.session.clone()));
        obj.insert("Key".into(), Value::String(self.key.clone()));
        obj.insert("Value".into(), Value::String(self.value_encoded()));
        Value::Object(obj)
    }

    /// Compact JSON text of [`KvPair::to_json`].
    pub fn json(&self) -> String {
        self.to_json().to_string()
    }

    pub fn value_encoded(&self) -> String {
        encode_value(&self.value)
    }

    /// Encoded value between the BEGIN/END banners, for display.
    pub fn armored_value(&self) -> String {
        armor(&self.value_encoded())
    }

    /// Value as text, replacing invalid UTF-8.
    pub fn value_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    pub fn create_index_str(&self) -> String {
        self.create_index.to_string()
    }

    pub fn modify_index_str(&self) -> String {
        self.modify_index.to_string()
    }

    pub fn lock_index_str(&self) -> String {
        self.lock_index.to_string()
    }

    pub fn flags_str(&self) -> String {
        self.flags.to_string()
    }
}

/// Read an optional unsigned 64-bit field; absent means zero.
///
/// Non-integral numbers keep their integer part.  Range errors carry the
/// literal text of the number.
fn index_field(obj: &Map<String, Value>, field: &'static str) -> Result<u64, ConsulError> {
    let Some(value) = obj.get(field) else {
        return Ok(0);
    };
    let Value::Number(number) = value else {
        return Err(ConsulError::FieldType {
            field,
            expected: JsonKind::Number,
            found: JsonKind::of(value),
        });
    };
    let text = number.as_str();
    let range_error = || ConsulError::Range {
        field,
        expected: "64-bit unsigned integer",
        text: text.to_string(),
    };

    if text.contains(|c: char| c == 'e' || c == 'E') {
        // 2^64; every f64 below it truncates into range.
        const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;
        return match number.as_f64().map(f64::trunc) {
            Some(whole) if whole >= 0.0 && whole < U64_LIMIT => Ok(whole as u64),
            _ => Err(range_error()),
        };
    }

    let whole = text.split_once('.').map_or(text, |(whole, _)| whole);
    match whole.strip_prefix('-') {
        Some(magnitude) if magnitude.bytes().all(|b| b == b'0') => Ok(0),
        Some(_) => Err(range_error()),
        None => whole.parse::<u64>().map_err(|_| range_error()),
    }
}

fn string_field<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<&'a str>, ConsulError> {
    match obj.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(ConsulError::FieldType {
            field,
            expected: JsonKind::String,
            found: JsonKind::of(other),
        }),
    }
}

fn missing_field(field: &'static str, policy: MissingFieldPolicy) -> Result<(), ConsulError> {
    match policy {
        MissingFieldPolicy::Tolerant => {
            debug!(field, "KV Pair response is missing a field, using empty default");
            Ok(())
        }
        MissingFieldPolicy::Strict => Err(ConsulError::Shape(format!(
            "KV Pair response is missing the \"{field}\" field"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    const SAMPLE: &str = r#"{"CreateIndex":469,"ModifyIndex":469,"LockIndex":0,"Flags":0,"Session":"","Key":"test","Value":"dGVzdC12YWx1ZQ=="}"#;

    #[test]
    fn test_decode_sample_entry() {
        let pair = KvPair::from_json(SAMPLE).unwrap();
        assert_eq!(pair.key, "test");
        assert_eq!(pair.value, b"test-value");
        assert_eq!(pair.value.len(), 10);
        assert_eq!(pair.session, "");
        assert_eq!(pair.create_index, 469);
        assert_eq!(pair.modify_index, pair.create_index);
        assert_eq!(pair.lock_index, 0);
        assert_eq!(pair.flags, 0);
    }

    #[test]
    fn test_decode_empty_object_is_shape_error() {
        let err = KvPair::decode(&json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert_eq!(err.to_string(), "Unexpected empty object in KV Pair response");
    }

    #[test]
    fn test_decode_non_object_is_shape_error() {
        let err = KvPair::decode(&json!(["test"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert!(err.to_string().contains("received array"));
    }

    #[test]
    fn test_decode_string_flags_is_field_type_error() {
        let err = KvPair::decode(&json!({"Key": "k", "Flags": "5"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldType);
        assert_eq!(err.to_string(), "Flags's value is not a number: string");
    }

    #[test]
    fn test_decode_non_numeric_indices_name_field() {
        for field in ["CreateIndex", "ModifyIndex", "LockIndex"] {
            let mut obj = Map::new();
            obj.insert("Key".into(), json!("k"));
            obj.insert(field.into(), json!(true));
            let err = KvPair::decode(&Value::Object(obj)).unwrap_err();
            assert_eq!(err.to_string(), format!("{field}'s value is not a number: bool"));
        }
    }

    #[test]
    fn test_decode_max_u64_index() {
        let pair = KvPair::decode(&json!({"Key": "k", "ModifyIndex": u64::MAX})).unwrap();
        assert_eq!(pair.modify_index, u64::MAX);
    }

    #[test]
    fn test_decode_overflowing_index_is_range_error() {
        let pair = KvPair::from_json(r#"{"Key":"k","CreateIndex":18446744073709551616}"#);
        let err = pair.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(
            err.to_string(),
            "CreateIndex is not a valid 64-bit unsigned integer: 18446744073709551616"
        );
    }

    #[test]
    fn test_decode_fraction_above_max_u64_keeps_integer_part() {
        let pair =
            KvPair::from_json(r#"{"Key":"k","ModifyIndex":18446744073709551615.5}"#).unwrap();
        assert_eq!(pair.modify_index, u64::MAX);
    }

    #[test]
    fn test_decode_exponent_index() {
        let pair = KvPair::from_json(r#"{"Key":"k","Flags":1.5e2,"LockIndex":-0.5}"#).unwrap();
        assert_eq!(pair.flags, 150);
        assert_eq!(pair.lock_index, 0);
        let err = KvPair::from_json(r#"{"Key":"k","Flags":2E64}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_decode_negative_index_is_range_error() {
        let err = KvPair::decode(&json!({"Key": "k", "LockIndex": -1})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().contains("LockIndex"));
    }

    #[test]
    fn test_decode_fractional_index_keeps_integer_part() {
        let pair = KvPair::decode(&json!({"Key": "k", "Flags": 7.9})).unwrap();
        assert_eq!(pair.flags, 7);
    }

    #[test]
    fn test_decode_wrong_string_types() {
        let err = KvPair::decode(&json!({"Key": 1})).unwrap_err();
        assert_eq!(err.to_string(), "Key's value is not a string: number");
        let err = KvPair::decode(&json!({"Key": "k", "Session": null})).unwrap_err();
        assert_eq!(err.to_string(), "Session's value is not a string: null");
        let err = KvPair::decode(&json!({"Key": "k", "Value": {"a": 1}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldType);
        assert_eq!(err.to_string(), "Value's value is not a string: object");
    }

    #[test]
    fn test_decode_invalid_base64_value() {
        let err = KvPair::decode(&json!({"Key": "k", "Value": "not base64!"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().contains("not base64!"));
    }

    #[test]
    fn test_missing_key_and_value_tolerated_by_default() {
        let pair = KvPair::decode(&json!({"CreateIndex": 3})).unwrap();
        assert_eq!(pair.create_index, 3);
        assert_eq!(pair.key, "");
        assert!(pair.value.is_empty());
    }

    #[test]
    fn test_missing_key_rejected_when_strict() {
        let err = KvPair::decode_with(&json!({"Value": "dGVzdA=="}), MissingFieldPolicy::Strict)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert!(err.to_string().contains("\"Key\""));

        let err = KvPair::decode_with(&json!({"Key": "k"}), MissingFieldPolicy::Strict)
            .unwrap_err();
        assert!(err.to_string().contains("\"Value\""));
    }

    #[test]
    fn test_decode_value_round_trip() {
        let samples: [&[u8]; 5] = [b"", b"\0", b"test", b"\xff\xfe\x00binary\n", &[0u8; 64]];
        for sample in samples {
            assert_eq!(decode_value(&encode_value(sample)).unwrap(), sample);
        }
    }

    #[test]
    fn test_decode_value_ignores_trailing_newline() {
        assert_eq!(decode_value("dGVzdA==\n").unwrap(), b"test");
        assert_eq!(decode_value("dGVz\ndA==").unwrap(), b"test");
        assert_eq!(decode_value("dGVzdA").unwrap(), b"test");
    }

    #[test]
    fn test_encode_shape() {
        let mut pair = KvPair::new("svc/web", b"on".to_vec());
        pair.create_index = 12;
        pair.modify_index = u64::MAX;
        pair.flags = 3;
        pair.session = "sess-1".into();

        let json = pair.to_json();
        assert_eq!(json["CreateIndex"], "12");
        assert_eq!(json["ModifyIndex"], "18446744073709551615");
        assert_eq!(json["LockIndex"], "0");
        assert_eq!(json["Flags"], "3");
        assert_eq!(json["Session"], "sess-1");
        assert_eq!(json["Key"], "svc/web");
        assert_eq!(json["Value"], "b24=");
        assert!(!pair.json().contains('\n'));
    }

    #[test]
    fn test_encode_after_decode_preserves_fields() {
        let pair = KvPair::from_json(SAMPLE).unwrap();
        let json = pair.to_json();
        assert_eq!(json["CreateIndex"], "469");
        assert_eq!(json["ModifyIndex"], "469");
        assert_eq!(json["LockIndex"], "0");
        assert_eq!(json["Flags"], "0");
        assert_eq!(json["Value"], "dGVzdC12YWx1ZQ==");
        let value = json["Value"].as_str().unwrap();
        assert_eq!(decode_value(value).unwrap(), pair.value);
    }

    #[test]
    fn test_armored_value() {
        let pair = KvPair::new("k", b"test".to_vec());
        assert_eq!(
            pair.armored_value(),
            "-----BEGIN BASE64 ENCODED STREAM-----\ndGVzdA==\n-----END BASE64 ENCODED STREAM-----"
        );
    }
}
