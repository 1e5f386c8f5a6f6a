//! The array of entries returned by key/value reads.

use serde_json::Value;

use super::pair::{KvPair, MissingFieldPolicy};
use crate::errors::ConsulError;
use crate::json::JsonKind;

/// Entries in the order the agent returned them.
///
/// An empty collection is valid: a prefix may match nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvPairs {
    objs: Vec<KvPair>,
}

impl KvPairs {
    /// Parse and decode a JSON array of entries.
    pub fn from_json(text: &str) -> Result<Self, ConsulError> {
        Self::from_json_with(text, MissingFieldPolicy::Tolerant)
    }

    pub fn from_json_with(text: &str, policy: MissingFieldPolicy) -> Result<Self, ConsulError> {
        let json: Value = serde_json::from_str(text)?;
        Self::decode_with(&json, policy)
    }

    /// Decode an already parsed JSON array.
    ///
    /// The first element that fails to decode aborts the whole decode.
    pub fn decode_with(json: &Value, policy: MissingFieldPolicy) -> Result<Self, ConsulError> {
        let Value::Array(items) = json else {
            return Err(ConsulError::expected_array(JsonKind::of(json)));
        };

        let objs = items
            .iter()
            .map(|item| {
                KvPair::decode_with(item, policy)
                    .map_err(|e| e.context("Parsing JSON Objects failed"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { objs })
    }

    /// A non-recursive read names one key and must not yield more
    /// than one entry.
    pub fn check_recurse(&self, recurse: bool) -> Result<(), ConsulError> {
        if !recurse && self.objs.len() > 1 {
            return Err(ConsulError::Shape(format!(
                "Expected a single KV Pair for a non-recursive request, received {}",
                self.objs.len()
            )));
        }
        Ok(())
    }

    pub fn objs(&self) -> &[KvPair] {
        &self.objs
    }

    pub fn len(&self) -> usize {
        self.objs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KvPair> {
        self.objs.iter()
    }

    /// Wire JSON array of every entry.
    pub fn to_json(&self) -> Value {
        Value::Array(self.objs.iter().map(KvPair::to_json).collect())
    }

    pub fn json(&self) -> String {
        self.to_json().to_string()
    }
}

impl From<Vec<KvPair>> for KvPairs {
    fn from(objs: Vec<KvPair>) -> Self {
        Self { objs }
    }
}

impl IntoIterator for KvPairs {
    type Item = KvPair;
    type IntoIter = std::vec::IntoIter<KvPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.objs.into_iter()
    }
}

impl<'a> IntoIterator for &'a KvPairs {
    type Item = &'a KvPair;
    type IntoIter = std::slice::Iter<'a, KvPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.objs.iter()
    }
}
