//! Fixed-cadence sync loop: fetch → transform → publish.
//!
//! ## Guarantees
//! - Sequential: a cycle finishes (or is cancelled) before the idle wait
//!   starts, so cycles never overlap.
//! - Isolated: a failed cycle is logged and the schedule carries on; no
//!   state from one cycle reaches the next.
//! - Bounded: every network call is capped by the client's connect and
//!   request timeouts, and a [`CancellationToken`] aborts both the idle wait
//!   and an in-flight cycle.
//!
//! No backoff, no jitter: one attempt per interval.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::consul::KvPublisher;
use crate::error::SyncError;
use crate::traefik::SnapshotFetcher;
use crate::transform::transform_with_report;

/// Consecutive failures after which a failed cycle is logged at `error`.
pub const ESCALATE_AFTER: u32 = 5;

/// Outcome of one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// KV key that was replaced.
    pub key: String,
    /// Routers in the published document.
    pub routers: usize,
    /// Source routers that were filtered out.
    pub skipped: usize,
    /// Synthesized names written more than once.
    pub collisions: usize,
    /// Size of the published value.
    pub bytes: usize,
}

/// Totals for a finished [`Scheduler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Cycles that ran to an outcome (success or failure).
    pub cycles: u64,
    pub failures: u64,
}

/// Drives the sync pipeline for one node.
pub struct Scheduler {
    config: Arc<SyncConfig>,
    fetcher: SnapshotFetcher,
    publisher: KvPublisher,
    key: String,
}

impl Scheduler {
    /// Build the fetcher and publisher around one shared HTTP client.
    pub fn new(config: Arc<SyncConfig>) -> Self {
        // Building only fails when the TLS backend cannot initialise; fall
        // back to a default client instead of panicking.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();

        let fetcher = SnapshotFetcher::new(config.traefik_api.clone(), client.clone());
        let publisher = KvPublisher::new(config.consul_addr.clone(), config.consul_token.clone(), client);
        let key = config.identity.kv_path();
        Self {
            config,
            fetcher,
            publisher,
            key,
        }
    }

    /// KV key this scheduler writes to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run one fetch → transform → publish pass.
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let snapshot = self.fetcher.fetch().await?;
        let (document, report) = transform_with_report(&snapshot, &self.config.identity);
        let bytes = self.publisher.publish(&self.key, &document).await?;

        Ok(CycleReport {
            key: self.key.clone(),
            routers: document.routers().len(),
            skipped: report.skipped.len(),
            collisions: report.collisions.len(),
            bytes,
        })
    }

    /// Run cycles every `poll_interval` until `cancel` fires.
    ///
    /// The first cycle starts immediately. The interval is measured from the
    /// end of one cycle to the start of the next.
    pub async fn run(&self, cancel: CancellationToken) -> RunStats {
        let mut stats = RunStats::default();
        let mut consecutive_failures: u32 = 0;

        info!(
            source = %self.fetcher.url(),
            key = %self.key,
            node = %self.config.identity.node_id,
            interval = ?self.config.poll_interval,
            "sync loop started"
        );

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(SyncError::Cancelled),
                result = self.run_cycle() => result,
            };

            match outcome {
                Ok(report) => {
                    stats.cycles += 1;
                    consecutive_failures = 0;
                    info!(
                        routers = report.routers,
                        skipped = report.skipped,
                        collisions = report.collisions,
                        bytes = report.bytes,
                        key = %report.key,
                        "pushed routers to KV store"
                    );
                }
                Err(SyncError::Cancelled) => {
                    info!("sync cycle abandoned on shutdown");
                    break;
                }
                Err(e) => {
                    stats.cycles += 1;
                    stats.failures += 1;
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    if consecutive_failures >= ESCALATE_AFTER {
                        error!(
                            stage = e.stage(),
                            error = %e,
                            consecutive_failures,
                            "sync cycle failed repeatedly, will retry next interval"
                        );
                    } else {
                        warn!(stage = e.stage(), error = %e, "sync cycle failed, will retry next interval");
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(cycles = stats.cycles, failures = stats.failures, "sync loop stopped");
        stats
    }
}
