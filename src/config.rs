//! Configuration loading and types for pgconsul.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! client: the agent endpoint, reply decoding, logging, and metrics.
//! Command-line flags override the file.

use std::path::Path;

use anyhow::Context;
use garde::Validate;
use serde::Deserialize;

use crate::agent::{Agent, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT_MS};
use crate::kv::MissingFieldPolicy;

/// File read when no `--config` is given. Its absence is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "pgconsul.yaml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct Config {
    /// Consul agent endpoint.
    #[serde(default)]
    #[garde(dive)]
    pub agent: AgentConfig,

    /// Reply decoding settings.
    #[serde(default)]
    #[garde(skip)]
    pub decode: DecodeConfig,

    /// Logging settings.
    #[serde(default)]
    #[garde(skip)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    #[garde(skip)]
    pub observability: ObservabilityConfig,
}

/// Where the consul agent listens.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AgentConfig {
    /// Host name or IPv4 address.
    #[serde(default = "default_host")]
    #[garde(
        length(min = 1, max = 255),
        pattern(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
    )]
    pub host: String,

    #[serde(default = "default_port")]
    #[garde(range(min = 1, max = 65535))]
    pub port: u16,

    /// Data center passed as `dc=` on key/value requests.
    #[serde(default)]
    #[garde(skip)]
    pub cluster: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    #[garde(range(min = 1, max = 65535))]
    pub timeout_ms: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cluster: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AgentConfig {
    /// Build the agent address described by this section.
    pub fn to_agent(&self) -> Agent {
        let mut agent = Agent::new(self.host.clone(), self.port);
        agent.set_timeout_ms(self.timeout_ms);
        if let Some(cluster) = &self.cluster {
            agent.set_cluster(cluster.clone());
        }
        agent
    }
}

/// Reply decoding configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecodeConfig {
    /// `tolerant` or `strict` handling of entries without `Key`/`Value`.
    #[serde(default)]
    pub missing_fields: MissingFieldPolicy,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Record request metrics.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_ms() -> u32 {
    DEFAULT_TIMEOUT_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load, parse, and validate configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = if contents.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?
    };
    config
        .validate()
        .map_err(|report| anyhow::anyhow!("Invalid config file {}: {report}", path.display()))?;
    Ok(config)
}

/// Load `explicit` if given, else the default file if it exists, else
/// the built-in defaults.
pub fn load_config_or_default(explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                load_config(path)
            } else {
                Ok(Config::default())
            }
        }
    }
}
