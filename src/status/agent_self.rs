//! Flattening of the `/v1/agent/self` document.
//!
//! The agent describes its own configuration, network coordinate, and
//! gossip membership as nested JSON.  [`flatten_agent_self`] renders a
//! fixed selection of those fields as dotted `name=value` lines under
//! the `consul.agent.status` prefix, for example
//! `consul.agent.status.config.datacenter="dc1"`.  Values are compact
//! JSON; an absent field renders as `null`.

use serde_json::Value;

/// Root prefix of every flattened line.
pub const STATUS_PREFIX: &[&str] = &["consul", "agent", "status"];

/// (agent field, flattened name) pairs under `Config`.
const CONFIG_FIELDS: &[(&str, &str)] = &[
    ("ACLDatacenter", "acl_datacenter"),
    ("ACLDefaultPolicy", "acl_default_policy"),
    ("ACLDownPolicy", "acl_down_policy"),
    ("ACLTtl", "acl_ttl"),
    ("ACLTtlRaw", "acl_ttl_raw"),
    ("AdvertiseAddr", "advertise_addr"),
    ("AdvertiseAddrWan", "advertise_addr_wan"),
    ("Atlas_endpoint", "atlas_endpoint"),
    ("Atlas_infrastructure", "atlas_infrastructure"),
    ("Atlas_join", "atlas_join"),
    ("BindAddr", "bind_addr"),
    ("BootStrap", "bootstrap"),
    ("BootstrapExpect", "bootstrap_expect"),
    ("CAFile", "ca_file"),
    ("CertFile", "cert_file"),
    ("CheckUpdateInterval", "check_update_interval"),
    ("ClientAddr", "client_addr"),
    ("DNSRecursor", "dns_recursor"),
    ("DNSRecursors", "dns_recursors"),
    ("DataDir", "data_dir"),
    ("Datacenter", "datacenter"),
    ("DisableAnonymousSignature", "disable_anonymous_signature"),
    ("DisableRemoteExec", "disable_remote_exec"),
    ("DisableUpdateCheck", "disable_update_check"),
    ("Disable_coordinates", "disable_coordinates"),
    ("DogStatsdAddr", "dog_statsd_addr"),
    ("DogStatsdTags", "dog_statsd_tags"),
    ("Domain", "domain"),
    ("EnableDebug", "enable_debug"),
    ("EnableSyslog", "enable_syslog"),
    ("HTTPAPIResponseHeaders", "http_api_response_headers"),
    ("KeyFile", "key_file"),
    ("LeaveOnTerm", "leave_on_term"),
    ("LogLevel", "log_level"),
    ("NodeName", "node_name"),
    ("PidFile", "pid_file"),
    ("Protocol", "protocol"),
    ("RejoinAfterLeave", "rejoin_after_leave"),
    ("RetryIntervalRaw", "retry_interval_raw"),
    ("RetryIntervalWanRaw", "retry_interval_wan_raw"),
    ("RetryJoin", "retry_join"),
    ("RetryJoinWan", "retry_join_wan"),
    ("RetryMaxAttempts", "retry_max_attempts"),
    ("RetryMaxAttemptsWan", "retry_max_attempts_wan"),
    ("Revision", "revision"),
    ("Server", "server"),
    ("ServerName", "server_name"),
    ("SessionTTLMin", "session_ttl_min"),
    ("SessionTTLMinRaw", "session_ttl_min_raw"),
    ("SkipLeaveOnInt", "skip_leave_on_int"),
    ("StartJoin", "start_join"),
    ("StartJoinWan", "start_join_wan"),
    ("StatsdAddr", "statsd_addr"),
    ("StatsiteAddr", "statsite_addr"),
    ("StatsitePrefix", "statsite_prefix"),
    ("SyslogFacility", "syslog_facility"),
    ("UIDir", "ui_dir"),
    ("VerifyIncoming", "verify_incoming"),
    ("VerifyOutgoing", "verify_outgoing"),
    ("VerifyServerHostname", "verify_server_hostname"),
    ("Version", "version"),
    ("VersionPrerelease", "version_prerelease"),
    ("Watches", "watches"),
];

const DNS_FIELDS: &[(&str, &str)] = &[
    ("AllowStale", "allow_stale"),
    ("EnableTruncate", "enable_truncate"),
    ("MaxStale", "max_stale"),
    ("NodeTTL", "node_ttl"),
    ("OnlyPassing", "only_passing"),
    ("ServiceTTL", "service_ttl"),
];

const ADVERTISE_ADDRS_FIELDS: &[(&str, &str)] = &[
    ("RPC", "rpc"),
    ("RPCRaw", "rpc_raw"),
    ("SerfLan", "serf_lan"),
    ("SerfLanRaw", "serf_lan_raw"),
    ("SerfWan", "serf_wan"),
    ("SerfWanRaw", "serf_wan_raw"),
];

const PORTS_FIELDS: &[(&str, &str)] = &[
    ("DNS", "dns"),
    ("HTTP", "http"),
    ("HTTPS", "https"),
    ("RPC", "rpc"),
    ("SerfLan", "serf_lan"),
    ("SerfWan", "serf_wan"),
    ("Server", "server"),
];

const ADDRESSES_FIELDS: &[(&str, &str)] = &[
    ("DNS", "dns"),
    ("HTTP", "http"),
    ("HTTPS", "https"),
    ("RPC", "rpc"),
];

const UNIX_SOCKETS_FIELDS: &[(&str, &str)] = &[
    ("Group", "grp"),
    ("Perms", "perms"),
    ("User", "usr"),
];

const COORD_FIELDS: &[(&str, &str)] = &[
    ("Adjustment", "adjustment"),
    ("Error", "error"),
    ("Height", "height"),
    ("Vec", "vec"),
];

const MEMBER_FIELDS: &[(&str, &str)] = &[
    ("Addr", "addr"),
    ("DelegateCur", "delegate_cur"),
    ("DelegateMax", "delegate_max"),
    ("DelegateMin", "delegate_min"),
    ("Name", "name"),
    ("Port", "port"),
    ("ProtocolCur", "protocol_cur"),
    ("ProtocolMax", "protocol_max"),
    ("ProtocolMin", "protocol_min"),
    ("Status", "status"),
];

const MEMBER_TAGS_FIELDS: &[(&str, &str)] = &[
    ("bootstrap", "bootstrap"),
    ("build", "build"),
    ("dc", "dc"),
    ("port", "port"),
    ("role", "role"),
    ("vsn", "vsn"),
    ("vsn_max", "vsn_max"),
    ("vsn_min", "vsn_min"),
];

/// Nested sections under `Config`: (agent field, segment, fields).
const CONFIG_SECTIONS: &[(&str, &str, &[(&str, &str)])] = &[
    ("DNSConfig", "dns_config", DNS_FIELDS),
    ("AdvertiseAddrs", "advertise_addrs", ADVERTISE_ADDRS_FIELDS),
    ("Ports", "ports", PORTS_FIELDS),
    ("Addresses", "addresses", ADDRESSES_FIELDS),
    ("UnixSockets", "unix_sockets", UNIX_SOCKETS_FIELDS),
];

/// Render one line: `a.b.name=value`.
pub fn format_line(prefix: &[String], name: &str, value: &Value) -> String {
    format!("{}.{}={}", prefix.join("."), name, value)
}

/// Flatten an agent self document into `name=value` lines.
pub fn flatten_agent_self(doc: &Value) -> Vec<String> {
    let root: Vec<String> = STATUS_PREFIX.iter().map(|s| s.to_string()).collect();
    let mut lines = Vec::new();

    let config = field(doc, "Config");
    let config_prefix = append_segment(&root, "config");
    emit_fields(&mut lines, &config_prefix, config, CONFIG_FIELDS);
    for (agent_field, segment, fields) in CONFIG_SECTIONS {
        let prefix = append_segment(&config_prefix, segment);
        emit_fields(&mut lines, &prefix, field(config, agent_field), fields);
    }

    let coord_prefix = append_segment(&root, "coord");
    emit_fields(&mut lines, &coord_prefix, field(doc, "Coord"), COORD_FIELDS);

    let member = field(doc, "Member");
    let member_prefix = append_segment(&root, "member");
    emit_fields(&mut lines, &member_prefix, member, MEMBER_FIELDS);
    let tags_prefix = append_segment(&member_prefix, "tags");
    emit_fields(&mut lines, &tags_prefix, field(member, "Tags"), MEMBER_TAGS_FIELDS);

    lines
}

fn field<'a>(value: &'a Value, name: &str) -> &'a Value {
    value.get(name).unwrap_or(&Value::Null)
}

fn append_segment(prefix: &[String], segment: &str) -> Vec<String> {
    let mut next = Vec::with_capacity(prefix.len() + 1);
    next.extend_from_slice(prefix);
    next.push(segment.to_string());
    next
}

fn emit_fields(lines: &mut Vec<String>, prefix: &[String], section: &Value, fields: &[(&str, &str)]) {
    for (agent_field, name) in fields {
        lines.push(format_line(prefix, name, field(section, agent_field)));
    }
}
