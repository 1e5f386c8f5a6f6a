//! HTTP transport to a consul agent.
//!
//! [`ConsulClient`] issues GET, PUT, and DELETE requests against the
//! endpoints named by an [`Agent`] and hands the reply bodies to the
//! decoders.  Each request carries the agent's timeout and asks the
//! agent to close the connection afterwards.

use std::time::Instant;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::agent::{Agent, Endpoint};
use crate::errors::ConsulError;
use crate::kv::{KvPairs, KvQuery, MissingFieldPolicy};
use crate::metrics;
use crate::status::agent_self::flatten_agent_self;
use crate::status::{Peer, Peers};

/// Client for one consul agent.
#[derive(Debug, Clone)]
pub struct ConsulClient {
    http: reqwest::Client,
    agent: Agent,
    policy: MissingFieldPolicy,
}

impl ConsulClient {
    pub fn new(agent: Agent) -> Result<Self, ConsulError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| ConsulError::Transport {
                url: agent.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            agent,
            policy: MissingFieldPolicy::default(),
        })
    }

    /// Use `policy` for KV entries missing `Key` or `Value`.
    pub fn with_policy(mut self, policy: MissingFieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn policy(&self) -> MissingFieldPolicy {
        self.policy
    }

    // -- Key/value ------------------------------------------------------------

    /// Raw body of a KV read.
    pub async fn kv_get_text(&self, key: &str, query: &KvQuery) -> Result<String, ConsulError> {
        let url = self.kv_request_url(key, query);
        self.send(Method::GET, Endpoint::Kv(key), &url, None).await
    }

    /// Read `key`, or every key under it when `query.recurse` is set.
    ///
    /// A non-recursive read must not return more than one entry.
    pub async fn kv_get(&self, key: &str, query: &KvQuery) -> Result<KvPairs, ConsulError> {
        let body = self.kv_get_text(key, query).await?;
        let pairs = decoded(KvPairs::from_json_with(&body, self.policy))?;
        decoded(pairs.check_recurse(query.recurse))?;
        debug!(key, entries = pairs.len(), "Read KV entries");
        Ok(pairs)
    }

    /// Store `value` at `key`. Returns the agent's verdict; `false`
    /// means a `cas`, `acquire`, or `release` condition did not hold.
    pub async fn kv_put(
        &self,
        key: &str,
        value: &[u8],
        query: &KvQuery,
    ) -> Result<bool, ConsulError> {
        let url = self.kv_request_url(key, query);
        let body = self
            .send(Method::PUT, Endpoint::Kv(key), &url, Some(value.to_vec()))
            .await?;
        decoded(parse_verdict(&body, false))
    }

    /// Delete `key`, or the whole tree under it when `query.recurse` is set.
    pub async fn kv_delete(&self, key: &str, query: &KvQuery) -> Result<bool, ConsulError> {
        let url = self.kv_request_url(key, query);
        let body = self
            .send(Method::DELETE, Endpoint::Kv(key), &url, None)
            .await?;
        decoded(parse_verdict(&body, true))
    }

    fn kv_request_url(&self, key: &str, query: &KvQuery) -> String {
        query
            .clone()
            .with_default_cluster(self.agent.cluster())
            .apply(&self.agent.kv_url(key))
    }

    // -- Status ---------------------------------------------------------------

    pub async fn status_leader_text(&self) -> Result<String, ConsulError> {
        let url = self.agent.status_leader_url();
        self.send(Method::GET, Endpoint::StatusLeader, url, None)
            .await
    }

    /// The current leader; `leader == false` when none is elected.
    pub async fn status_leader(&self) -> Result<Peer, ConsulError> {
        let body = self.status_leader_text().await?;
        decoded(Peer::leader_from_json(&body))
    }

    pub async fn status_peers_text(&self) -> Result<String, ConsulError> {
        let url = self.agent.status_peers_url();
        self.send(Method::GET, Endpoint::StatusPeers, url, None)
            .await
    }

    pub async fn status_peers(&self) -> Result<Peers, ConsulError> {
        let body = self.status_peers_text().await?;
        decoded(Peers::from_json(&body))
    }

    /// Peers with the current leader flagged.
    pub async fn cluster_peers(&self) -> Result<Peers, ConsulError> {
        let leader = self.status_leader().await?;
        let mut peers = self.status_peers().await?;
        if !peers.mark_leader(&leader) {
            debug!(leader = %leader, elected = leader.leader, "Leader not found among peers");
        }
        Ok(peers)
    }

    // -- Agent ----------------------------------------------------------------

    pub async fn agent_self_text(&self) -> Result<String, ConsulError> {
        let url = self.agent.self_url();
        self.send(Method::GET, Endpoint::AgentSelf, url, None).await
    }

    pub async fn agent_self(&self) -> Result<Value, ConsulError> {
        let body = self.agent_self_text().await?;
        decoded(serde_json::from_str(&body).map_err(ConsulError::from))
    }

    /// The agent self document flattened to `name=value` lines.
    pub async fn agent_self_lines(&self) -> Result<Vec<String>, ConsulError> {
        Ok(flatten_agent_self(&self.agent_self().await?))
    }

    /// True when the agent answers its self endpoint with a 2xx status.
    pub async fn ping(&self) -> bool {
        match self.agent_self_text().await {
            Ok(_) => true,
            Err(e) => {
                debug!(agent = %self.agent, error = %e, "Ping failed");
                false
            }
        }
    }

    // -- Transport ------------------------------------------------------------

    /// Send one request and return the body of a 2xx reply.
    async fn send(
        &self,
        method: Method,
        endpoint: Endpoint<'_>,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<String, ConsulError> {
        debug!(endpoint = endpoint.name(), %method, url, "Sending request to consul agent");
        let start = Instant::now();
        let outcome = self.exchange(method.clone(), url, body).await;

        let status_label = match &outcome {
            Ok((status, _)) => status.as_str().to_string(),
            Err(_) => metrics::STATUS_TRANSPORT_ERROR.to_string(),
        };
        metrics::record_request(endpoint.name(), method.as_str(), &status_label, start.elapsed());

        let (status, text) = outcome.inspect_err(|e| {
            warn!(endpoint = endpoint.name(), url, error = %e, "Consul agent request failed");
        })?;
        if !status.is_success() {
            warn!(
                endpoint = endpoint.name(),
                status = status.as_u16(),
                url,
                "Consul agent returned an error status"
            );
            return Err(ConsulError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(text)
    }

    async fn exchange(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<(StatusCode, String), ConsulError> {
        let transport = |source: reqwest::Error| ConsulError::Transport {
            url: url.to_string(),
            source,
        };

        let mut request = self
            .http
            .request(method, url)
            .timeout(self.agent.timeout());
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        Ok((status, text))
    }
}

/// Count decode failures before handing the result on.
fn decoded<T>(result: Result<T, ConsulError>) -> Result<T, ConsulError> {
    if let Err(e) = &result {
        metrics::record_decode_error(e.kind());
    }
    result
}

/// Interpret the `true`/`false` body of a KV write.
fn parse_verdict(body: &str, empty_is_success: bool) -> Result<bool, ConsulError> {
    match body.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        "" if empty_is_success => Ok(true),
        other => Err(ConsulError::Format(format!(
            "Expected true or false from the KV endpoint, received \"{other}\""
        ))),
    }
}
