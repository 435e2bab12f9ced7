//! Publishes a Traefik node's host-based routers into a shared Consul KV
//! namespace so a fleet of proxies can each advertise their own routes.
//!
//! One cycle is `fetch → transform → publish`:
//!
//! 1. [`traefik::SnapshotFetcher`] reads `/api/rawdata` from the local proxy.
//! 2. [`transform::transform`] keeps host rules, renames them per node and
//!    adds one backend service for this node.
//! 3. [`consul::KvPublisher`] replaces the node's key with the result.
//!
//! [`scheduler::Scheduler`] repeats that on a fixed interval until cancelled.

pub mod config;
pub mod consul;
pub mod error;
pub mod scheduler;
pub mod traefik;
pub mod transform;

pub use config::{NodeIdentity, SyncConfig};
pub use consul::KvPublisher;
pub use error::{FetchError, PublishError, SyncError};
pub use scheduler::{CycleReport, RunStats, Scheduler};
pub use traefik::{RoutingSnapshot, SnapshotFetcher};
pub use transform::{transform, transform_with_report, PublishDocument, TransformReport};
