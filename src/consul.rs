//! # Consul KV publisher
//!
//! Writes a node's [`PublishDocument`] to `PUT {addr}/v1/kv/{key}` as a full
//! replace. No retries here; the scheduler simply tries again next interval.
//!
//! ```rust,ignore
//! let publisher = KvPublisher::new("http://localhost:8500", None, client);
//! publisher.publish("traefik/routing/nodes/node1/config", &doc).await?;
//! ```

use reqwest::StatusCode;
use tracing::debug;

use crate::error::{PublishError, SyncError};
use crate::transform::PublishDocument;

/// ACL token header understood by Consul.
pub const TOKEN_HEADER: &str = "X-Consul-Token";

/// Client for one KV store.
#[derive(Debug, Clone)]
pub struct KvPublisher {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl KvPublisher {
    pub fn new(base_url: impl Into<String>, token: Option<String>, client: reqwest::Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    /// Full URL of `key`.
    pub fn kv_url(&self, key: &str) -> String {
        format!("{}/v1/kv/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.header(TOKEN_HEADER, token),
            None => req,
        }
    }

    fn transport_error(url: &str, e: reqwest::Error) -> PublishError {
        if e.is_timeout() {
            PublishError::Timeout { url: url.to_string() }
        } else {
            PublishError::Connect {
                url: url.to_string(),
                detail: e.to_string(),
            }
        }
    }

    /// Serialize `document` and replace the value at `key`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    /// - [`SyncError::Serialization`] if the document cannot be encoded; no
    ///   request is sent in that case.
    /// - [`SyncError::Publish`] for any failure reported by [`put`](Self::put).
    pub async fn publish(&self, key: &str, document: &PublishDocument) -> Result<usize, SyncError> {
        let body = document.to_vec()?;
        let len = body.len();
        self.put(key, body).await?;
        Ok(len)
    }

    /// Overwrite `key` with `body` as `application/json`.
    ///
    /// # Returns
    /// - `Ok(())` on any 2xx.
    /// - `Err(PublishError::Connect | Timeout)` on transport failure.
    /// - `Err(PublishError::Status)` otherwise, carrying the store's body.
    pub async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), PublishError> {
        let url = self.kv_url(key);
        let req = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| Self::transport_error(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }

        debug!(url = %url, status = status.as_u16(), "KV value replaced");
        Ok(())
    }

    /// Read back the document stored at `key`.
    ///
    /// Returns `Ok(None)` when the key does not exist.
    pub async fn read(&self, key: &str) -> Result<Option<PublishDocument>, PublishError> {
        let url = self.kv_url(key);
        let req = self.client.get(&url).query(&[("raw", "")]);
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| Self::transport_error(&url, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| Self::transport_error(&url, e))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PublishError::InvalidStoredValue {
                key: key.to_string(),
                detail: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher(base: &str) -> KvPublisher {
        KvPublisher::new(base, None, reqwest::Client::new())
    }

    #[test]
    fn kv_url_joins_base_and_key() {
        let p = publisher("http://localhost:8500");
        assert_eq!(
            p.kv_url("traefik/routing/nodes/node1/config"),
            "http://localhost:8500/v1/kv/traefik/routing/nodes/node1/config"
        );
    }

    #[test]
    fn kv_url_tolerates_stray_slashes() {
        let p = publisher("http://consul:8500/");
        assert_eq!(p.kv_url("/a/b"), "http://consul:8500/v1/kv/a/b");
    }

    #[tokio::test]
    async fn put_to_unreachable_store_is_transport_error() {
        let p = publisher("http://127.0.0.1:9");
        let err = p.put("k", b"{}".to_vec()).await.unwrap_err();
        assert!(
            matches!(err, PublishError::Connect { .. } | PublishError::Timeout { .. }),
            "unexpected error: {err:?}"
        );
    }
}
