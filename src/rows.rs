//! Tabular projection of agent replies for database-extension bindings.
//!
//! A host that exposes these replies as set-returning functions fetches
//! one row per call.  [`RowSet`] fits that protocol: the reply body is
//! decoded on the first fetch, rows are handed out in order, and the
//! decoded collection is released once the last row is taken or the
//! set is dropped.  Every column is text; numbers are rendered in
//! decimal.

use std::fmt;

use tracing::debug;

use crate::errors::ConsulError;
use crate::kv::{KvPair, KvPairs, MissingFieldPolicy};
use crate::status::{Peer, Peers};

/// One key/value entry as a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvRow {
    pub key: String,
    pub value: String,
    pub flags: String,
    pub create_index: String,
    pub modify_index: String,
    pub lock_index: String,
    pub session: String,
}

impl KvRow {
    pub const COLUMNS: [&'static str; 7] = [
        "key",
        "value",
        "flags",
        "create_index",
        "modify_index",
        "lock_index",
        "session",
    ];

    /// Column values in [`KvRow::COLUMNS`] order.
    pub fn fields(&self) -> [&str; 7] {
        [
            self.key.as_str(),
            self.value.as_str(),
            self.flags.as_str(),
            self.create_index.as_str(),
            self.modify_index.as_str(),
            self.lock_index.as_str(),
            self.session.as_str(),
        ]
    }
}

impl From<KvPair> for KvRow {
    fn from(pair: KvPair) -> Self {
        Self {
            value: pair.value_lossy(),
            flags: pair.flags_str(),
            create_index: pair.create_index_str(),
            modify_index: pair.modify_index_str(),
            lock_index: pair.lock_index_str(),
            key: pair.key,
            session: pair.session,
        }
    }
}

/// One cluster peer as a row; `leader` is `'t'` or `'f'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRow {
    pub host: String,
    pub port: String,
    pub leader: char,
}

impl PeerRow {
    pub const COLUMNS: [&'static str; 3] = ["host", "port", "leader"];

    pub fn fields(&self) -> [&str; 3] {
        let leader = if self.leader == 't' { "t" } else { "f" };
        [self.host.as_str(), self.port.as_str(), leader]
    }
}

impl From<Peer> for PeerRow {
    fn from(peer: Peer) -> Self {
        Self {
            port: peer.port_str(),
            leader: if peer.leader { 't' } else { 'f' },
            host: peer.host,
        }
    }
}

type Decode<T> = Box<dyn FnOnce() -> Result<Vec<T>, ConsulError> + Send>;

enum State<T> {
    Pending(Decode<T>),
    Streaming(std::vec::IntoIter<T>),
    Done,
}

/// Rows produced one per fetch from a lazily decoded reply.
pub struct RowSet<T> {
    name: &'static str,
    state: State<T>,
}

impl<T> RowSet<T> {
    /// A row set whose rows come from `decode`, run on the first fetch.
    pub fn new<F>(name: &'static str, decode: F) -> Self
    where
        F: FnOnce() -> Result<Vec<T>, ConsulError> + Send + 'static,
    {
        Self {
            name,
            state: State::Pending(Box::new(decode)),
        }
    }

    /// Fetch the next row; `Ok(None)` once the set is exhausted.
    ///
    /// A decode failure is returned from the first fetch and the set
    /// is exhausted afterwards.
    pub fn next_row(&mut self) -> Result<Option<T>, ConsulError> {
        let mut rows = match std::mem::replace(&mut self.state, State::Done) {
            State::Pending(decode) => {
                let rows = decode()?;
                debug!(rowset = self.name, rows = rows.len(), "Decoded row set");
                rows.into_iter()
            }
            State::Streaming(rows) => rows,
            State::Done => return Ok(None),
        };

        match rows.next() {
            Some(row) => {
                self.state = State::Streaming(rows);
                Ok(Some(row))
            }
            None => {
                debug!(rowset = self.name, "Row set exhausted");
                Ok(None)
            }
        }
    }

    /// True once every row has been fetched or decoding failed.
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Rows decoded but not yet fetched; `None` before the first fetch.
    pub fn remaining(&self) -> Option<usize> {
        match &self.state {
            State::Pending(_) => None,
            State::Streaming(rows) => Some(rows.len()),
            State::Done => Some(0),
        }
    }
}

impl<T> Iterator for RowSet<T> {
    type Item = Result<T, ConsulError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl<T> Drop for RowSet<T> {
    fn drop(&mut self) {
        match &self.state {
            State::Streaming(rows) if !rows.as_slice().is_empty() => {
                debug!(rowset = self.name, unread = rows.len(), "Row set released early");
            }
            State::Pending(_) => {
                debug!(rowset = self.name, "Row set released before the first fetch");
            }
            _ => {}
        }
    }
}

impl<T> fmt::Debug for RowSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSet")
            .field("name", &self.name)
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Rows of a KV read reply.
pub fn kv_get_rows(body: String, recurse: bool, policy: MissingFieldPolicy) -> RowSet<KvRow> {
    RowSet::new("kv_get", move || {
        let pairs = KvPairs::from_json_with(&body, policy)?;
        pairs.check_recurse(recurse)?;
        Ok(pairs.into_iter().map(KvRow::from).collect())
    })
}

/// Rows of the peer set with the leader flagged.
pub fn status_peer_rows(leader_body: String, peers_body: String) -> RowSet<PeerRow> {
    RowSet::new("status_peers", move || {
        let leader = Peer::leader_from_json(&leader_body)?;
        let mut peers = Peers::from_json(&peers_body)?;
        peers.mark_leader(&leader);
        Ok(peers.into_iter().map(PeerRow::from).collect())
    })
}

/// Leader as `host:port` text, or `None` when no leader is elected.
pub fn status_leader_text(body: &str) -> Result<Option<String>, ConsulError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let leader = Peer::leader_from_json(body)?;
    Ok(leader.leader.then(|| leader.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    const ENTRIES: &str = r#"[
        {"CreateIndex":1,"ModifyIndex":2,"LockIndex":0,"Flags":7,"Key":"app/a","Value":"YQ==","Session":""},
        {"CreateIndex":3,"ModifyIndex":4,"LockIndex":1,"Flags":0,"Key":"app/b","Value":"Yg==","Session":"s-1"}
    ]"#;
    const PEERS: &str = r#"["10.0.0.1:8300","10.0.0.2:8300"]"#;

    #[test]
    fn test_kv_rows_render_text() {
        let rows: Vec<KvRow> = kv_get_rows(ENTRIES.to_string(), true, MissingFieldPolicy::Tolerant)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields(), ["app/a", "a", "7", "1", "2", "0", ""]);
        assert_eq!(rows[1].session, "s-1");
        assert_eq!(rows[1].lock_index, "1");
    }

    #[test]
    fn test_rows_decode_lazily() {
        let mut rows = kv_get_rows("not json".to_string(), true, MissingFieldPolicy::Tolerant);
        assert_eq!(rows.remaining(), None);
        assert!(!rows.is_done());

        let err = rows.next_row().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(rows.is_done());
        assert!(rows.next_row().unwrap().is_none());
    }

    #[test]
    fn test_rows_one_per_fetch() {
        let mut rows = kv_get_rows(ENTRIES.to_string(), true, MissingFieldPolicy::Tolerant);
        let first = rows.next_row().unwrap().unwrap();
        assert_eq!(first.key, "app/a");
        assert_eq!(rows.remaining(), Some(1));
        let second = rows.next_row().unwrap().unwrap();
        assert_eq!(second.key, "app/b");
        assert!(rows.next_row().unwrap().is_none());
        assert!(rows.is_done());
    }

    #[test]
    fn test_early_drop_releases_rows() {
        let mut rows = kv_get_rows(ENTRIES.to_string(), true, MissingFieldPolicy::Tolerant);
        assert!(rows.next_row().unwrap().is_some());
        assert_eq!(rows.remaining(), Some(1));
        assert!(!rows.is_done());
        drop(rows);
    }

    #[test]
    fn test_kv_rows_non_recursive_guard() {
        let mut rows = kv_get_rows(ENTRIES.to_string(), false, MissingFieldPolicy::Tolerant);
        assert_eq!(rows.next_row().unwrap_err().kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_kv_rows_empty_array() {
        let mut rows = kv_get_rows("[]".to_string(), false, MissingFieldPolicy::Tolerant);
        assert!(rows.next_row().unwrap().is_none());
    }

    #[test]
    fn test_peer_rows_flag_leader() {
        let rows: Vec<PeerRow> = status_peer_rows("\"10.0.0.2:8300\"".to_string(), PEERS.to_string())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0].fields(), ["10.0.0.1", "8300", "f"]);
        assert_eq!(rows[1].fields(), ["10.0.0.2", "8300", "t"]);
    }

    #[test]
    fn test_peer_rows_without_leader() {
        let rows: Vec<PeerRow> = status_peer_rows("\"\"".to_string(), PEERS.to_string())
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(rows.iter().all(|row| row.leader == 'f'));
    }

    #[test]
    fn test_status_leader_text() {
        assert_eq!(
            status_leader_text("\"10.0.0.1:8300\"").unwrap().as_deref(),
            Some("10.0.0.1:8300")
        );
        assert_eq!(status_leader_text("\"\"").unwrap(), None);
        assert_eq!(status_leader_text("").unwrap(), None);
        assert_eq!(
            status_leader_text("\"nope\"").unwrap_err().kind(),
            ErrorKind::Format
        );
    }
}
