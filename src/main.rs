//! pgconsul -- command-line client for a consul agent.
//!
//! Reads and writes key/value entries and reports the cluster leader,
//! peer set, and agent self description.  Results go to standard
//! output; logs and errors go to standard error.  Failures exit with a
//! sysexits(3) code.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pgconsul::config::{self, Config, LogFormat};
use pgconsul::errors::{exit, ConsulError};
use pgconsul::kv::{armor, decode_value, encode_value, KvPair, KvQuery};
use pgconsul::rows::{kv_get_rows, KvRow};
use pgconsul::status::{StatusFlags, StatusSelection};
use pgconsul::{metrics, Agent, ConsulClient};

/// Command-line arguments for pgconsul.
#[derive(Parser, Debug)]
#[command(
    name = "pgconsul",
    version,
    about = "Query and update a consul agent's key/value store and cluster status"
)]
struct Cli {
    /// Consul agent host name or address.
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Consul agent HTTP port.
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Data center for key/value requests.
    #[arg(short, long, global = true)]
    cluster: Option<String>,

    /// Request timeout in milliseconds.
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..=65535))]
    timeout: Option<u32>,

    /// Verbose output and debug logging.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to the YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Key/value store operations.
    #[command(subcommand)]
    Kv(KvCommand),

    /// Show the current cluster leader.
    Leader,

    /// List the server peers, flagging the leader.
    Peers,

    /// Show leader, peers, and agent status.
    Status {
        /// Report to fetch; may be repeated.
        #[arg(short, long = "status", value_enum)]
        status: Vec<StatusSelection>,
    },

    /// Check that the agent answers.
    Ping,
}

#[derive(Subcommand, Debug)]
enum KvCommand {
    /// Read one or more keys.
    Get {
        #[arg(required = true)]
        keys: Vec<String>,

        /// Read every key under each prefix.
        #[arg(long)]
        recurse: bool,

        /// Print tab-separated rows instead of labelled fields.
        #[arg(long)]
        rows: bool,
    },

    /// Store a value.
    Put {
        key: String,
        value: String,

        #[arg(long)]
        flags: Option<u64>,

        /// Only write if the entry's modify index matches.
        #[arg(long)]
        cas: Option<u64>,

        /// Acquire the key's lock with this session.
        #[arg(long)]
        acquire: Option<String>,

        /// Release the key's lock held by this session.
        #[arg(long)]
        release: Option<String>,
    },

    /// Delete a key or a key prefix.
    Delete {
        key: String,

        #[arg(long)]
        recurse: bool,

        #[arg(long)]
        cas: Option<u64>,
    },

    /// Base64-encode text the way values travel on the wire.
    Encode { text: String },

    /// Decode a base64 value.
    Decode { base64: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // A failed write here has nowhere to be reported.
            e.print().ok();
            return ExitCode::from(if e.use_stderr() { exit::USAGE } else { exit::OK });
        }
    };

    let config = match config::load_config_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(exit::CONFIG);
        }
    };

    init_tracing(&config, cli.debug);

    if config.observability.metrics {
        metrics::init_metrics();
        metrics::describe_metrics();
    }

    let code = match run(&cli, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    };

    if cli.debug {
        if let Some(exposition) = metrics::render() {
            debug!("Request metrics:\n{exposition}");
        }
    }

    ExitCode::from(code)
}

/// Initialize tracing: `RUST_LOG` wins, then `--debug`, then the config.
fn init_tracing(config: &Config, debug: bool) {
    let level = if debug { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Agent from the config file with command-line overrides applied.
fn build_agent(cli: &Cli, config: &Config) -> Result<Agent, ConsulError> {
    let mut agent = config.agent.to_agent();
    if let Some(host) = &cli.host {
        if host.trim().is_empty() {
            return Err(ConsulError::Usage(format!("Invalid consul host: {host:?}")));
        }
        agent.set_host(host.trim());
    }
    if let Some(port) = &cli.port {
        agent.set_port_str(port)?;
    }
    if let Some(cluster) = &cli.cluster {
        agent.set_cluster(cluster.clone());
    }
    if let Some(timeout) = cli.timeout {
        agent.set_timeout_ms(timeout);
    }
    Ok(agent)
}

/// Run the selected command and return its exit code.
async fn run(cli: &Cli, config: &Config) -> Result<u8, ConsulError> {
    // Local conversions need no agent.
    match &cli.command {
        Command::Kv(KvCommand::Encode { text }) => {
            println!("{}", armor(&encode_value(text.as_bytes())));
            return Ok(exit::OK);
        }
        Command::Kv(KvCommand::Decode { base64 }) => {
            let raw = decode_value(base64)?;
            println!("Result: \"{}\"", String::from_utf8_lossy(&raw));
            return Ok(exit::OK);
        }
        _ => {}
    }

    let agent = build_agent(cli, config)?;
    debug!(agent = %agent, "Using consul agent");
    let client = ConsulClient::new(agent)?.with_policy(config.decode.missing_fields);

    match &cli.command {
        Command::Kv(kv) => run_kv(&client, kv, cli.debug).await?,
        Command::Leader => {
            let leader = client.status_leader().await?;
            print_leader(&leader, cli.debug);
        }
        Command::Peers => {
            for peer in &client.cluster_peers().await? {
                print_peer(peer);
            }
        }
        Command::Status { status } => {
            let mut flags: StatusFlags = status.iter().copied().collect();
            if flags.is_empty() {
                flags = StatusFlags::ALL;
            }
            run_status(&client, flags, cli.debug).await?;
        }
        Command::Ping => {
            if !client.ping().await {
                println!("Ping: failed");
                return Ok(exit::TEMPFAIL);
            }
            println!("Ping: ok");
        }
    }
    Ok(exit::OK)
}

async fn run_kv(client: &ConsulClient, command: &KvCommand, verbose: bool) -> Result<(), ConsulError> {
    match command {
        KvCommand::Get { keys, recurse, rows } => {
            let query = KvQuery {
                recurse: *recurse,
                ..KvQuery::default()
            };
            if *rows {
                println!("{}", KvRow::COLUMNS.join("\t"));
            }
            for key in keys {
                if *rows {
                    let body = client.kv_get_text(key, &query).await?;
                    let mut set = kv_get_rows(body, *recurse, client.policy());
                    while let Some(row) = set.next_row()? {
                        println!("{}", row.fields().join("\t"));
                    }
                } else {
                    for pair in &client.kv_get(key, &query).await? {
                        print_pair(pair, verbose);
                    }
                }
            }
            Ok(())
        }
        KvCommand::Put {
            key,
            value,
            flags,
            cas,
            acquire,
            release,
        } => {
            let query = KvQuery {
                flags: *flags,
                cas: *cas,
                acquire: acquire.clone(),
                release: release.clone(),
                ..KvQuery::default()
            };
            let stored = client.kv_put(key, value.as_bytes(), &query).await?;
            println!("Result: {stored}");
            Ok(())
        }
        KvCommand::Delete { key, recurse, cas } => {
            let query = KvQuery {
                recurse: *recurse,
                cas: *cas,
                ..KvQuery::default()
            };
            let deleted = client.kv_delete(key, &query).await?;
            println!("Result: {deleted}");
            Ok(())
        }
        KvCommand::Encode { .. } | KvCommand::Decode { .. } => Ok(()),
    }
}

async fn run_status(client: &ConsulClient, flags: StatusFlags, verbose: bool) -> Result<(), ConsulError> {
    if flags.leader {
        print_leader(&client.status_leader().await?, verbose);
    }
    if flags.peers {
        for peer in &client.cluster_peers().await? {
            print_peer(peer);
        }
    }
    if flags.agent_self {
        for line in client.agent_self_lines().await? {
            println!("{line}");
        }
    }
    Ok(())
}

fn print_pair(pair: &KvPair, verbose: bool) {
    println!("Key: {}", pair.key);
    println!("Value: {}", pair.value_lossy());
    if !pair.session.is_empty() {
        println!("Session: {}", pair.session);
    }
    if verbose {
        println!("CreateIndex: {}", pair.create_index);
        println!("ModifyIndex: {}", pair.modify_index);
        println!("LockIndex: {}", pair.lock_index);
        println!("Flags: {}", pair.flags);
        println!("{}", pair.armored_value());
        println!("JSON: {}", pair.json());
    }
}

fn print_leader(leader: &pgconsul::status::Peer, verbose: bool) {
    if !leader.leader {
        println!("Leader: none");
        return;
    }
    println!("Leader: {leader}");
    if verbose {
        println!("Host: {}", leader.host);
        println!("Port: {}", leader.port);
        println!("JSON: {}", leader.json());
    }
}

fn print_peer(peer: &pgconsul::status::Peer) {
    if peer.leader {
        println!("JSON Peer: {} (leader)", peer.json());
    } else {
        println!("JSON Peer: {}", peer.json());
    }
}
