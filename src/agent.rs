//! Consul agent endpoint addressing.
//!
//! An [`Agent`] identifies the HTTP endpoint of one consul agent and
//! derives the request URLs for the key/value, status, and self
//! endpoints.  URLs are memoized on first use and invalidated whenever
//! the host or port changes.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::errors::ConsulError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8500;
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;
pub const TIMEOUT_MS_MIN: u32 = 1;
pub const TIMEOUT_MS_MAX: u32 = 65535;

/// Percent-encoding set for key paths: everything except unreserved
/// characters and '/', so hierarchical keys keep their separators.
const KEY_PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// The agent endpoints this client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    /// `/v1/kv/{key}`
    Kv(&'a str),
    /// `/v1/status/leader`
    StatusLeader,
    /// `/v1/status/peers`
    StatusPeers,
    /// `/v1/agent/self`
    AgentSelf,
}

impl Endpoint<'_> {
    /// Short label used for metrics and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Kv(_) => "kv",
            Endpoint::StatusLeader => "status_leader",
            Endpoint::StatusPeers => "status_peers",
            Endpoint::AgentSelf => "agent_self",
        }
    }
}

/// Address and request settings of a consul agent.
///
/// Equality compares host and port only.
#[derive(Debug, Clone)]
pub struct Agent {
    host: String,
    port: u16,
    cluster: Option<String>,
    timeout_ms: u32,
    leader: bool,

    kv_prefix: OnceLock<String>,
    leader_url: OnceLock<String>,
    peers_url: OnceLock<String>,
    self_url: OnceLock<String>,
}

impl Default for Agent {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl Agent {
    /// Create an agent address with the default timeout and no cluster.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            cluster: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            leader: false,
            kv_prefix: OnceLock::new(),
            leader_url: OnceLock::new(),
            peers_url: OnceLock::new(),
            self_url: OnceLock::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Data-center name sent as `dc=` on key/value requests.
    pub fn cluster(&self) -> Option<&str> {
        self.cluster.as_deref()
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Advisory flag; only the leader-discovery flow sets it.
    pub fn leader(&self) -> bool {
        self.leader
    }

    pub fn set_leader(&mut self, leader: bool) {
        self.leader = leader;
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.invalidate_memoized_urls();
        self.host = host.into();
    }

    pub fn set_port(&mut self, port: u16) {
        self.invalidate_memoized_urls();
        self.port = port;
    }

    /// Parse and set the port from text.
    ///
    /// On failure the agent is left unchanged.
    pub fn set_port_str(&mut self, port: &str) -> Result<(), ConsulError> {
        match port.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(ConsulError::Usage(format!(
                "Invalid consul port specification: {port}"
            ))),
            Ok(parsed) => {
                self.set_port(parsed);
                Ok(())
            }
        }
    }

    /// Set the data-center name; an empty name clears it.
    pub fn set_cluster(&mut self, cluster: impl Into<String>) {
        let cluster = cluster.into();
        self.cluster = if cluster.is_empty() { None } else { Some(cluster) };
    }

    /// Set the per-request timeout, clamped to
    /// [`TIMEOUT_MS_MIN`]..=[`TIMEOUT_MS_MAX`].
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms.clamp(TIMEOUT_MS_MIN, TIMEOUT_MS_MAX);
    }

    /// Build the URL for `endpoint` from the current host and port.
    pub fn url(&self, endpoint: Endpoint<'_>) -> String {
        match endpoint {
            Endpoint::Kv(key) => self.kv_url(key),
            Endpoint::StatusLeader => self.status_leader_url().to_string(),
            Endpoint::StatusPeers => self.status_peers_url().to_string(),
            Endpoint::AgentSelf => self.self_url().to_string(),
        }
    }

    /// URL of `key` on the key/value endpoint.
    pub fn kv_url(&self, key: &str) -> String {
        let prefix = self.kv_endpoint_url_prefix();
        let encoded = utf8_percent_encode(key, KEY_PATH_ENCODE_SET);
        let mut url = String::with_capacity(prefix.len() + key.len());
        url.push_str(prefix);
        url.extend(encoded);
        url
    }

    pub fn kv_endpoint_url_prefix(&self) -> &str {
        self.kv_prefix.get_or_init(|| self.base_url("kv/"))
    }

    pub fn status_leader_url(&self) -> &str {
        self.leader_url.get_or_init(|| self.base_url("status/leader"))
    }

    pub fn status_peers_url(&self) -> &str {
        self.peers_url.get_or_init(|| self.base_url("status/peers"))
    }

    pub fn self_url(&self) -> &str {
        self.self_url.get_or_init(|| self.base_url("agent/self"))
    }

    fn base_url(&self, suffix: &str) -> String {
        format!("http://{}:{}/v1/{}", self.host, self.port, suffix)
    }

    fn invalidate_memoized_urls(&mut self) {
        self.kv_prefix = OnceLock::new();
        self.leader_url = OnceLock::new();
        self.peers_url = OnceLock::new();
        self.self_url = OnceLock::new();
    }
}

impl PartialEq for Agent {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Agent {}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_default_urls() {
        let agent = Agent::default();
        assert_eq!(agent.status_leader_url(), "http://127.0.0.1:8500/v1/status/leader");
        assert_eq!(agent.status_peers_url(), "http://127.0.0.1:8500/v1/status/peers");
        assert_eq!(agent.self_url(), "http://127.0.0.1:8500/v1/agent/self");
        assert_eq!(agent.kv_url("test"), "http://127.0.0.1:8500/v1/kv/test");
    }

    #[test]
    fn test_url_by_endpoint() {
        let agent = Agent::new("consul.local", 8600);
        assert_eq!(
            agent.url(Endpoint::Kv("a/b")),
            "http://consul.local:8600/v1/kv/a/b"
        );
        assert_eq!(
            agent.url(Endpoint::AgentSelf),
            "http://consul.local:8600/v1/agent/self"
        );
        assert_eq!(Endpoint::StatusPeers.name(), "status_peers");
    }

    #[test]
    fn test_kv_url_percent_encodes_key() {
        let agent = Agent::default();
        assert_eq!(
            agent.kv_url("service/web app?x=1"),
            "http://127.0.0.1:8500/v1/kv/service/web%20app%3Fx%3D1"
        );
        assert_eq!(agent.kv_url(""), "http://127.0.0.1:8500/v1/kv/");
    }

    #[test]
    fn test_set_host_invalidates_memoized_urls() {
        let mut agent = Agent::default();
        assert_eq!(agent.status_leader_url(), "http://127.0.0.1:8500/v1/status/leader");
        agent.set_host("10.0.0.1");
        assert_eq!(agent.status_leader_url(), "http://10.0.0.1:8500/v1/status/leader");
        assert_eq!(agent.kv_endpoint_url_prefix(), "http://10.0.0.1:8500/v1/kv/");
    }

    #[test]
    fn test_set_port_invalidates_memoized_urls() {
        let mut agent = Agent::default();
        assert_eq!(agent.status_peers_url(), "http://127.0.0.1:8500/v1/status/peers");
        agent.set_port(9500);
        assert_eq!(agent.status_peers_url(), "http://127.0.0.1:9500/v1/status/peers");
    }

    #[test]
    fn test_set_port_str() {
        let mut agent = Agent::default();
        agent.set_port_str("8501").unwrap();
        assert_eq!(agent.port(), 8501);
        assert_eq!(agent.self_url(), "http://127.0.0.1:8501/v1/agent/self");
    }

    #[test]
    fn test_set_port_str_failure_leaves_state_unchanged() {
        let mut agent = Agent::default();
        let url_before = agent.status_leader_url().to_string();

        for bad in ["", "http", "65536", "-1", "0"] {
            let err = agent.set_port_str(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
        assert_eq!(agent.port(), DEFAULT_PORT);
        assert_eq!(agent.status_leader_url(), url_before);
    }

    #[test]
    fn test_set_cluster_and_timeout() {
        let mut agent = Agent::default();
        assert_eq!(agent.cluster(), None);
        agent.set_cluster("dc1");
        assert_eq!(agent.cluster(), Some("dc1"));
        agent.set_cluster("");
        assert_eq!(agent.cluster(), None);

        assert_eq!(agent.timeout_ms(), DEFAULT_TIMEOUT_MS);
        agent.set_timeout_ms(250);
        assert_eq!(agent.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_set_timeout_ms_clamps_to_range() {
        let mut agent = Agent::default();
        agent.set_timeout_ms(0);
        assert_eq!(agent.timeout_ms(), TIMEOUT_MS_MIN);
        agent.set_timeout_ms(70_000);
        assert_eq!(agent.timeout_ms(), TIMEOUT_MS_MAX);
        agent.set_timeout_ms(65_535);
        assert_eq!(agent.timeout(), Duration::from_millis(65_535));
    }

    #[test]
    fn test_equality_ignores_cluster_and_timeout() {
        let a = Agent::new("10.0.0.1", 8500);
        let mut b = Agent::new("10.0.0.1", 8500);
        b.set_cluster("dc2");
        b.set_timeout_ms(5000);
        b.set_leader(true);
        assert_eq!(a, b);
        assert_ne!(a, Agent::new("10.0.0.1", 8501));
        assert_ne!(a, Agent::new("10.0.0.2", 8500));
    }

    #[test]
    fn test_display() {
        assert_eq!(Agent::new("node1", 8500).to_string(), "node1:8500");
    }
}
