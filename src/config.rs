//! Process configuration.
//!
//! All settings are read once at startup from environment-style keys and
//! frozen into a [`SyncConfig`]. Nothing here fails: an unset or empty key
//! takes its default, and a malformed duration falls back to the default
//! with a warning.

use std::time::Duration;

use tracing::warn;

pub const DEFAULT_TRAEFIK_API: &str = "http://localhost:8080/api/rawdata";
pub const DEFAULT_CONSUL_ADDR: &str = "http://localhost:8500";
pub const DEFAULT_NODE_ID: &str = "node1";
pub const DEFAULT_NODE_BACKEND: &str = "http://127.0.0.1:80";
/// `%s` is replaced with the node ID.
pub const DEFAULT_KV_PATH: &str = "traefik/routing/nodes/%s/config";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Substitution slot for the node ID inside a KV path template.
pub const NODE_ID_SLOT: &str = "%s";

/// Who this node is and where its traffic goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Namespace discriminator for router names and the KV key.
    pub node_id: String,
    /// URL the shared proxy fleet should send this node's traffic to.
    pub backend_url: String,
    /// KV path template containing [`NODE_ID_SLOT`].
    pub kv_path_template: String,
}

impl NodeIdentity {
    pub fn new(
        node_id: impl Into<String>,
        backend_url: impl Into<String>,
        kv_path_template: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            backend_url: backend_url.into(),
            kv_path_template: kv_path_template.into(),
        }
    }

    /// Name of the single load-balancer service published for this node.
    pub fn service_name(&self) -> String {
        format!("{}-backend", self.node_id)
    }

    /// KV key this node owns, e.g. `traefik/routing/nodes/node1/config`.
    pub fn kv_path(&self) -> String {
        self.kv_path_template.replace(NODE_ID_SLOT, &self.node_id)
    }
}

/// Immutable runtime configuration, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Source routing snapshot endpoint (`TRAEFIK_API`).
    pub traefik_api: String,
    /// KV store base URL without trailing slash (`CONSUL_ADDR`).
    pub consul_addr: String,
    /// Optional ACL token sent as `X-Consul-Token`.
    pub consul_token: Option<String>,
    pub identity: NodeIdentity,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl SyncConfig {
    /// Build from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let duration = |key: &str, default: Duration| match get(key) {
            None => default,
            Some(raw) => match parse_duration(&raw) {
                Ok(d) if !d.is_zero() => d,
                Ok(_) => {
                    warn!(key, value = %raw, fallback = ?default, "zero duration not allowed, using fallback");
                    default
                }
                Err(e) => {
                    warn!(key, value = %raw, error = %e, fallback = ?default, "invalid duration, using fallback");
                    default
                }
            },
        };

        let identity = NodeIdentity::new(
            or_default("NODE_ID", DEFAULT_NODE_ID),
            or_default("NODE_BACKEND", DEFAULT_NODE_BACKEND),
            or_default("KV_PATH", DEFAULT_KV_PATH),
        );

        Self {
            traefik_api: or_default("TRAEFIK_API", DEFAULT_TRAEFIK_API),
            consul_addr: or_default("CONSUL_ADDR", DEFAULT_CONSUL_ADDR)
                .trim_end_matches('/')
                .to_string(),
            consul_token: get("CONSUL_TOKEN"),
            identity,
            poll_interval: duration("POLL_INTERVAL", DEFAULT_POLL_INTERVAL),
            connect_timeout: duration("CONNECT_TIMEOUT", DEFAULT_CONNECT_TIMEOUT),
            request_timeout: duration("REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Parse a compact duration such as `10s`, `1m30s`, `250ms` or `1.5h`.
///
/// Accepted units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. A bare `0` is zero;
/// any other number needs a unit. A leading `+` is allowed. Values that do
/// not fit in a `u64` of nanoseconds are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    let s = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let is_numeric = |c: char| c.is_ascii_digit() || c == '.';
    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest.find(|c: char| !is_numeric(c)).unwrap_or(rest.len());
        if num_len == 0 {
            return Err(format!("expected a number in {input:?}"));
        }
        let value: f64 = rest[..num_len]
            .parse()
            .map_err(|_| format!("invalid number {:?} in {input:?}", &rest[..num_len]))?;
        rest = &rest[num_len..];

        let unit_len = rest.find(is_numeric).unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            "" => return Err(format!("missing unit in {input:?}")),
            other => return Err(format!("unknown unit {other:?} in {input:?}")),
        };
        nanos += value * scale;
        rest = &rest[unit_len..];
    }

    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Err(format!("duration {input:?} overflows"));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}
