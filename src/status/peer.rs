//! A cluster peer address as reported by the status endpoints.
//!
//! Peers travel as bare `"host:port"` JSON strings.  The leader endpoint
//! returns one such string, or `""` when the cluster has no leader
//! (no quorum, split brain); that empty reply is a valid answer, not a
//! protocol error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::agent::{DEFAULT_HOST, DEFAULT_PORT};
use crate::errors::ConsulError;
use crate::json::JsonKind;

/// A consul server peer.
///
/// Equality compares host and port only; `leader` is ignored.
#[derive(Debug, Clone)]
pub struct Peer {
    pub host: String,
    pub port: u16,
    /// Set only by code that asked the leader endpoint specifically.
    pub leader: bool,
}

impl Default for Peer {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl Peer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            leader: false,
        }
    }

    /// Decode the reply of the leader endpoint from raw body text.
    pub fn leader_from_json(text: &str) -> Result<Self, ConsulError> {
        let json: Value = serde_json::from_str(text)?;
        Self::decode_leader(&json)
    }

    /// Decode a leader reply.
    ///
    /// `""` yields a default peer with `leader == false`; any other
    /// string must be `host:port` and yields `leader == true`.
    pub fn decode_leader(json: &Value) -> Result<Self, ConsulError> {
        let text = expect_string(json)?;
        if text.is_empty() {
            return Ok(Peer::default());
        }
        let mut peer: Peer = text.parse()?;
        peer.leader = true;
        Ok(peer)
    }

    /// Decode one element of the peers array; `leader` stays false.
    pub fn decode_address(json: &Value) -> Result<Self, ConsulError> {
        expect_string(json)?.parse()
    }

    /// Port rendered in decimal.
    pub fn port_str(&self) -> String {
        self.port.to_string()
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    /// Parse and set the port; on failure the peer is unchanged.
    pub fn set_port_str(&mut self, port: &str) -> Result<(), ConsulError> {
        self.port = port
            .parse()
            .map_err(|_| ConsulError::Format(format!("Failed to set port: {port}")))?;
        Ok(())
    }

    /// JSON form: a bare `"host:port"` string.
    pub fn to_json(&self) -> Value {
        Value::String(self.to_string())
    }

    pub fn json(&self) -> String {
        self.to_json().to_string()
    }
}

fn expect_string(json: &Value) -> Result<&str, ConsulError> {
    json.as_str().ok_or_else(|| {
        ConsulError::Shape(format!(
            "Expected a JSON string as input, received {}",
            JsonKind::of(json)
        ))
    })
}

/// Split on ':' the way a compressing tokenizer does: runs of
/// separators collapse, but a leading or trailing separator still
/// yields an empty edge token.
fn split_compressed(text: &str) -> Vec<&str> {
    let tokens: Vec<&str> = text.split(':').collect();
    let last = tokens.len() - 1;
    tokens
        .iter()
        .enumerate()
        .filter(|(i, tok)| !tok.is_empty() || *i == 0 || *i == last)
        .map(|(_, tok)| *tok)
        .collect()
}

impl FromStr for Peer {
    type Err = ConsulError;

    /// Parse `host:port`.  The host is taken as-is.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let tokens = split_compressed(text);
        let [host, port] = tokens.as_slice() else {
            return Err(ConsulError::Format(format!(
                "Expected a host:port pattern from string \"{text}\""
            )));
        };

        let mut peer = Peer::new(*host, DEFAULT_PORT);
        peer.set_port_str(port).map_err(|_| {
            ConsulError::Format(format!(
                "Failed to set port: {port} (from string \"{text}\")"
            ))
        })?;
        Ok(peer)
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Peer {}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Serialize for Peer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Peer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_decode_leader_address() {
        let peer = Peer::decode_leader(&json!("10.0.0.1:8300")).unwrap();
        assert_eq!(peer.host, "10.0.0.1");
        assert_eq!(peer.port, 8300);
        assert!(peer.leader);
    }

    #[test]
    fn test_decode_leader_empty_string_is_no_leader() {
        let peer = Peer::decode_leader(&json!("")).unwrap();
        assert!(!peer.leader);
        assert_eq!(peer.host, DEFAULT_HOST);
        assert_eq!(peer.port, DEFAULT_PORT);
    }

    #[test]
    fn test_leader_from_json_text() {
        let peer = Peer::leader_from_json("\"192.168.1.7:8300\"").unwrap();
        assert_eq!(peer.to_string(), "192.168.1.7:8300");
        assert!(peer.leader);

        let err = Peer::leader_from_json("192.168.1.7:8300").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_decode_leader_non_string() {
        let err = Peer::decode_leader(&json!(["10.0.0.1:8300"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert!(err.to_string().ends_with("received array"));
    }

    #[test]
    fn test_decode_leader_without_colon() {
        let err = Peer::decode_leader(&json!("bad-format")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(
            err.to_string(),
            "Expected a host:port pattern from string \"bad-format\""
        );
    }

    #[test]
    fn test_decode_leader_too_many_tokens() {
        let err = Peer::decode_leader(&json!("host:port:extra")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("host:port:extra"));
    }

    #[test]
    fn test_consecutive_separators_collapse() {
        let peer: Peer = "node1::8300".parse().unwrap();
        assert_eq!(peer.host, "node1");
        assert_eq!(peer.port, 8300);
    }

    #[test]
    fn test_bad_port_is_format_error() {
        for text in ["node1:http", "node1:70000", "node1:"] {
            let err = text.parse::<Peer>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{text}");
            assert!(err.to_string().contains(text));
        }
    }

    #[test]
    fn test_decode_address_keeps_leader_false() {
        let peer = Peer::decode_address(&json!("10.0.0.2:8300")).unwrap();
        assert!(!peer.leader);
        assert!(Peer::decode_address(&json!("")).is_err());
        assert!(Peer::decode_address(&json!(8300)).is_err());
    }

    #[test]
    fn test_equality_ignores_leader() {
        let mut a = Peer::new("10.0.0.1", 8300);
        let b = Peer::new("10.0.0.1", 8300);
        a.leader = true;
        assert_eq!(a, b);
        assert_ne!(a, Peer::new("10.0.0.1", 8301));
    }

    #[test]
    fn test_rendering() {
        let peer = Peer::new("10.0.0.1", 8300);
        assert_eq!(peer.to_string(), "10.0.0.1:8300");
        assert_eq!(peer.port_str(), "8300");
        assert_eq!(peer.to_json(), json!("10.0.0.1:8300"));
        assert_eq!(peer.json(), "\"10.0.0.1:8300\"");
    }

    #[test]
    fn test_serde_uses_bare_string() {
        let peers = vec![Peer::new("a", 1), Peer::new("b", 2)];
        let text = serde_json::to_string(&peers).unwrap();
        assert_eq!(text, r#"["a:1","b:2"]"#);
        let back: Vec<Peer> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, peers);
    }

    #[test]
    fn test_set_port_str_failure_leaves_port() {
        let mut peer = Peer::default();
        assert!(peer.set_port_str("x").is_err());
        assert_eq!(peer.port, DEFAULT_PORT);
        peer.set_port_str("8301").unwrap();
        assert_eq!(peer.port, 8301);
        peer.set_host("node2");
        assert_eq!(peer.to_string(), "node2:8301");
    }
}
