//! # Traefik source
//!
//! Reads the local proxy's active routers from its API (`/api/rawdata`) and
//! decodes them into a [`RoutingSnapshot`].
//!
//! ```rust,ignore
//! let fetcher = SnapshotFetcher::new("http://localhost:8080/api/rawdata", client);
//! let snapshot = fetcher.fetch().await?;
//! ```

pub mod fetcher;
pub mod snapshot;

pub use fetcher::SnapshotFetcher;
pub use snapshot::{RouterDescriptor, RouterEntry, RoutingSnapshot};
