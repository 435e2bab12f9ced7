//! Rewrites a [`RoutingSnapshot`] into the node-scoped [`PublishDocument`].
//!
//! ## Responsibility
//! Pure function of the snapshot and the [`NodeIdentity`]; no I/O and no
//! state carried between cycles. It never fails: entries that cannot be
//! republished are skipped and counted in a [`TransformReport`].
//!
//! ## Filtering, in order
//! | Step | Router is skipped when                                  | Reason               |
//! |------|---------------------------------------------------------|----------------------|
//! | 1    | name ends with `@internal`                              | `Internal`           |
//! | 2    | value is not an object / `rule` absent / not a string   | shape reasons        |
//! | 3    | rule does not start with `Host(`                        | `NotHostRule`        |
//! | 4    | no non-empty text between the first and last backtick   | `MalformedHostRule`  |
//!
//! ## Naming
//! A retained router is published as `<hostname with . → ->@<nodeID>`, e.g.
//! `app-example-com@node1`. Two source routers that yield the same name
//! overwrite each other; the later one in name order wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NodeIdentity;
use crate::traefik::{RouterEntry, RoutingSnapshot};

/// Router-name suffix Traefik uses for its own dashboard and API routers.
pub const INTERNAL_SUFFIX: &str = "@internal";
/// Function-call prefix of the host-match predicate.
pub const HOST_RULE_PREFIX: &str = "Host(";
/// Quoting delimiter around predicate arguments.
pub const RULE_DELIMITER: char = '`';
pub const ENTRY_POINTS: [&str; 2] = ["web", "websecure"];
pub const STATUS_ENABLED: &str = "enabled";
pub const CERT_RESOLVER: &str = "letsencrypt";

// ---------------------------------------------------------------------------
// Published document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(rename = "certResolver")]
    pub cert_resolver: String,
}

/// Rewritten form of one retained router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRouterEntry {
    /// Source rule, verbatim.
    pub rule: String,
    pub service: String,
    pub entry_points: Vec<String>,
    pub status: String,
    pub tls: TlsConfig,
}

impl CanonicalRouterEntry {
    fn new(rule: &str, identity: &NodeIdentity) -> Self {
        Self {
            rule: rule.to_string(),
            service: identity.service_name(),
            entry_points: ENTRY_POINTS.iter().map(|s| s.to_string()).collect(),
            status: STATUS_ENABLED.to_string(),
            tls: TlsConfig {
                cert_resolver: CERT_RESOLVER.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTarget {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub servers: Vec<ServerTarget>,
}

/// Where this node's traffic is load-balanced to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalServiceEntry {
    pub load_balancer: LoadBalancer,
}

impl CanonicalServiceEntry {
    pub fn single(url: impl Into<String>) -> Self {
        Self {
            load_balancer: LoadBalancer {
                servers: vec![ServerTarget { url: url.into() }],
            },
        }
    }
}

/// The `routers` and `services` namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfiguration {
    pub routers: BTreeMap<String, CanonicalRouterEntry>,
    pub services: BTreeMap<String, CanonicalServiceEntry>,
}

/// Complete value written to this node's KV key. Replaces whatever was
/// stored before.
///
/// Serializes as `{"http":{"routers":{..},"services":{..}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDocument {
    pub http: HttpConfiguration,
}

impl PublishDocument {
    pub fn routers(&self) -> &BTreeMap<String, CanonicalRouterEntry> {
        &self.http.routers
    }

    pub fn services(&self) -> &BTreeMap<String, CanonicalServiceEntry> {
        &self.http.services
    }

    /// Wire form sent to the KV store.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

/// Why a source router was not republished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    Internal,
    NotAnObject,
    RuleMissing,
    RuleNotString,
    NotHostRule,
    MalformedHostRule,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::Internal          => "internal router",
            SkipReason::NotAnObject       => "router is not an object",
            SkipReason::RuleMissing       => "rule missing",
            SkipReason::RuleNotString     => "rule is not a string",
            SkipReason::NotHostRule       => "rule is not host-based",
            SkipReason::MalformedHostRule => "host rule has no quoted hostname",
        };
        write!(f, "{s}")
    }
}

/// Per-cycle accounting of what the transformer kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    /// Source routers that produced a canonical entry (collisions included).
    pub retained: usize,
    /// `(source router name, reason)` for every skipped router.
    pub skipped: Vec<(String, SkipReason)>,
    /// Synthesized names that were written more than once.
    pub collisions: Vec<String>,
}

impl TransformReport {
    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|(_, r)| *r == reason).count()
    }
}

/// Text between the first and last [`RULE_DELIMITER`] of `rule`.
///
/// Returns `None` when there is no delimiter pair or the text is empty.
pub fn extract_hostname(rule: &str) -> Option<&str> {
    let start = rule.find(RULE_DELIMITER)?;
    let end = rule.rfind(RULE_DELIMITER)?;
    if end <= start {
        return None;
    }
    let host = &rule[start + RULE_DELIMITER.len_utf8()..end];
    (!host.is_empty()).then_some(host)
}

/// Canonical router name for `hostname` on `node_id`.
pub fn router_key(hostname: &str, node_id: &str) -> String {
    format!("{}@{}", hostname.replace('.', "-"), node_id)
}

fn classify<'a>(name: &str, entry: &'a RouterEntry) -> Result<(&'a str, &'a str), SkipReason> {
    if name.ends_with(INTERNAL_SUFFIX) {
        return Err(SkipReason::Internal);
    }
    let rule = match entry {
        RouterEntry::WellFormed(desc) => desc.rule.as_str(),
        RouterEntry::NotAnObject { .. } => return Err(SkipReason::NotAnObject),
        RouterEntry::RuleMissing => return Err(SkipReason::RuleMissing),
        RouterEntry::RuleNotString { .. } => return Err(SkipReason::RuleNotString),
    };
    if !rule.starts_with(HOST_RULE_PREFIX) {
        return Err(SkipReason::NotHostRule);
    }
    let host = extract_hostname(rule).ok_or(SkipReason::MalformedHostRule)?;
    Ok((rule, host))
}

/// Build the publish document for `identity` from `snapshot`.
pub fn transform(snapshot: &RoutingSnapshot, identity: &NodeIdentity) -> PublishDocument {
    transform_with_report(snapshot, identity).0
}

/// Same as [`transform`], also returning what was skipped and overwritten.
pub fn transform_with_report(
    snapshot: &RoutingSnapshot,
    identity: &NodeIdentity,
) -> (PublishDocument, TransformReport) {
    let mut report = TransformReport::default();
    let mut routers = BTreeMap::new();

    for (name, entry) in &snapshot.routers {
        match classify(name, entry) {
            Ok((rule, host)) => {
                let key = router_key(host, &identity.node_id);
                if routers.insert(key.clone(), CanonicalRouterEntry::new(rule, identity)).is_some() {
                    debug!(router = %name, key = %key, "synthesized router name collides, last write wins");
                    report.collisions.push(key);
                }
                report.retained += 1;
            }
            Err(reason) => {
                debug!(router = %name, reason = %reason, "skipping router");
                report.skipped.push((name.clone(), reason));
            }
        }
    }

    let mut services = BTreeMap::new();
    services.insert(
        identity.service_name(),
        CanonicalServiceEntry::single(identity.backend_url.clone()),
    );

    (
        PublishDocument {
            http: HttpConfiguration { routers, services },
        },
        report,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
