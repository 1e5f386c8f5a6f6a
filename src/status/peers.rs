//! The server peer set returned by `/v1/status/peers`.

use serde_json::Value;

use super::peer::Peer;
use crate::errors::ConsulError;
use crate::json::JsonKind;

/// Server peers in the order the agent listed them.
///
/// Never empty once decoded: a cluster always has at least one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peers {
    peers: Vec<Peer>,
}

impl Peers {
    /// Parse and decode a JSON array of `"host:port"` strings.
    pub fn from_json(text: &str) -> Result<Self, ConsulError> {
        let json: Value = serde_json::from_str(text)?;
        Self::decode(&json)
    }

    pub fn decode(json: &Value) -> Result<Self, ConsulError> {
        let Value::Array(items) = json else {
            return Err(ConsulError::expected_array(JsonKind::of(json)));
        };
        if items.is_empty() {
            return Err(ConsulError::Shape(
                "Unexpected empty array of peers".to_string(),
            ));
        }

        let peers = items
            .iter()
            .map(|item| {
                Peer::decode_address(item).map_err(|e| e.context("Unable to set peer in peers"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { peers })
    }

    /// Flag the peer equal to `leader`.
    ///
    /// Returns false when no listed peer matches, or when `leader` does
    /// not describe an elected leader.
    pub fn mark_leader(&mut self, leader: &Peer) -> bool {
        if !leader.leader {
            return false;
        }
        match self.peers.iter_mut().find(|peer| **peer == *leader) {
            Some(peer) => {
                peer.leader = true;
                true
            }
            None => false,
        }
    }

    /// The peer flagged as leader, if any.
    pub fn leader(&self) -> Option<&Peer> {
        self.peers.iter().find(|peer| peer.leader)
    }

    pub fn as_slice(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peer> {
        self.peers.iter()
    }
}

impl IntoIterator for Peers {
    type Item = Peer;
    type IntoIter = std::vec::IntoIter<Peer>;

    fn into_iter(self) -> Self::IntoIter {
        self.peers.into_iter()
    }
}

impl<'a> IntoIterator for &'a Peers {
    type Item = &'a Peer;
    type IntoIter = std::slice::Iter<'a, Peer>;

    fn into_iter(self) -> Self::IntoIter {
        self.peers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    const THREE_PEERS: &str = r#"["10.0.0.1:8300","10.0.0.2:8300","10.0.0.3:8300"]"#;

    #[test]
    fn test_decode_peers_in_order() {
        let peers = Peers::from_json(THREE_PEERS).unwrap();
        assert_eq!(peers.len(), 3);
        let hosts: Vec<&str> = peers.iter().map(|p| p.host.as_str()).collect();
        assert_eq!(hosts, ["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert!(peers.iter().all(|p| !p.leader));
        assert!(peers.leader().is_none());
    }

    #[test]
    fn test_empty_array_is_shape_error() {
        let err = Peers::from_json("[]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert_eq!(err.to_string(), "Unexpected empty array of peers");
    }

    #[test]
    fn test_non_array_root_names_type() {
        let err = Peers::from_json("\"10.0.0.1:8300\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert_eq!(err.to_string(), "Expected array, received string as input.");
        let err = Peers::from_json("null").unwrap_err();
        assert_eq!(err.to_string(), "Expected array, received null as input.");
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = Peers::from_json("[\"10.0.0.1:8300\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_bad_element_aborts_decode() {
        let err = Peers::from_json(r#"["10.0.0.1:8300","nope"]"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().starts_with("Unable to set peer in peers: "));

        let err = Peers::from_json(r#"["10.0.0.1:8300",8300]"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_mark_leader() {
        let mut peers = Peers::from_json(THREE_PEERS).unwrap();
        let leader = Peer::decode_leader(&serde_json::json!("10.0.0.2:8300")).unwrap();
        assert!(peers.mark_leader(&leader));
        assert_eq!(peers.leader().map(|p| p.host.as_str()), Some("10.0.0.2"));
        assert_eq!(peers.iter().filter(|p| p.leader).count(), 1);
    }

    #[test]
    fn test_mark_leader_without_election() {
        let mut peers = Peers::from_json(THREE_PEERS).unwrap();
        let no_leader = Peer::decode_leader(&serde_json::json!("")).unwrap();
        assert!(!peers.mark_leader(&no_leader));

        let unknown = Peer::decode_leader(&serde_json::json!("10.9.9.9:8300")).unwrap();
        assert!(!peers.mark_leader(&unknown));
        assert!(peers.leader().is_none());
    }
}
