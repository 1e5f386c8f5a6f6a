//! Query parameters accepted by the key/value endpoint.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Percent-encoding set for query values: everything except unreserved
/// characters.
const QUERY_VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Options for a key/value request.
///
/// Unset options are omitted from the query string entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvQuery {
    /// Data center (`dc=`).
    pub cluster: Option<String>,
    /// Return every key under the prefix (`recurse`, no value).
    pub recurse: bool,
    /// Check-and-set against this modify index (`cas=`).
    pub cas: Option<u64>,
    /// Acquire the lock with this session (`acquire=`).
    pub acquire: Option<String>,
    /// Release the lock held by this session (`release=`).
    pub release: Option<String>,
    /// Opaque user flags stored with the entry (`flags=`).
    pub flags: Option<u64>,
}

impl KvQuery {
    pub fn recursive() -> Self {
        Self {
            recurse: true,
            ..Self::default()
        }
    }

    /// Fill `cluster` from the agent when the query does not name one.
    pub fn with_default_cluster(mut self, cluster: Option<&str>) -> Self {
        if self.cluster.is_none() {
            self.cluster = cluster.map(str::to_string);
        }
        self
    }

    /// Render the query string without the leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(dc) = self.cluster.as_deref().filter(|dc| !dc.is_empty()) {
            parts.push(format!("dc={}", encode(dc)));
        }
        if self.recurse {
            parts.push("recurse".to_string());
        }
        if let Some(cas) = self.cas {
            parts.push(format!("cas={cas}"));
        }
        if let Some(flags) = self.flags {
            parts.push(format!("flags={flags}"));
        }
        if let Some(session) = self.acquire.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("acquire={}", encode(session)));
        }
        if let Some(session) = self.release.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("release={}", encode(session)));
        }
        parts.join("&")
    }

    /// Append the query string to `url`.
    pub fn apply(&self, url: &str) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            url.to_string()
        } else {
            format!("{url}?{query}")
        }
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE_ENCODE_SET).to_string()
}
