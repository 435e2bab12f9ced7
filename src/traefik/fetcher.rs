//! HTTP client for the source proxy's routing API.

use tracing::debug;

use super::snapshot::RoutingSnapshot;
use crate::error::FetchError;

/// Reads the routing snapshot from one fixed URL.
///
/// The response is consumed (and its connection released) on every path,
/// including error statuses.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    url: String,
    client: reqwest::Client,
}

impl SnapshotFetcher {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode the current snapshot.
    ///
    /// # Returns
    /// - `Ok(RoutingSnapshot)` on a 2xx response whose body has a `routers` object.
    /// - `Err(FetchError::Connect | Timeout)` on transport failure.
    /// - `Err(FetchError::Status)` on a non-2xx response, with the body attached.
    /// - `Err(FetchError::Body | Decode | RoutersMissing | RoutersNotObject)`
    ///   when the body cannot be read or does not have the expected shape.
    pub async fn fetch(&self) -> Result<RoutingSnapshot, FetchError> {
        let resp = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: self.url.clone() }
            } else {
                FetchError::Connect {
                    url: self.url.clone(),
                    detail: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: self.url.clone() }
            } else {
                FetchError::Body {
                    url: self.url.clone(),
                    detail: e.to_string(),
                }
            }
        })?;

        let snapshot = RoutingSnapshot::from_slice(&bytes)?;
        debug!(url = %self.url, routers = snapshot.len(), "fetched routing snapshot");
        Ok(snapshot)
    }
}
