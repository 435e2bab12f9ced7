//! Error taxonomy for one sync cycle.
//!
//! Every variant is cycle-local: the scheduler logs it and moves on to the
//! next interval. Nothing here is fatal to the process.

use thiserror::Error;

/// Failure while retrieving or decoding the routing snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A TCP-level connection could not be established.
    #[error("connection to {url} failed: {detail}")]
    Connect { url: String, detail: String },
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },
    /// The API replied with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },
    /// The response body could not be read off the connection.
    #[error("failed to read response body from {url}: {detail}")]
    Body { url: String, detail: String },
    /// The body is not a JSON object.
    #[error("invalid JSON from routing API: {detail}")]
    Decode { detail: String },
    /// The document has no `routers` field.
    #[error("no routers found in routing API response")]
    RoutersMissing,
    /// `routers` is present but is not an object.
    #[error("`routers` must be an object, found {found}")]
    RoutersNotObject { found: &'static str },
}

/// Failure while writing to the KV store.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("connection to {url} failed: {detail}")]
    Connect { url: String, detail: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    /// The store answered with anything other than a 2xx. `body` carries
    /// whatever the store said, possibly empty.
    #[error("KV store returned HTTP {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },
    /// Read-back only: the stored value is not a publish document.
    #[error("value at {key} is not a publish document: {detail}")]
    InvalidStoredValue { key: String, detail: String },
}

/// Top-level error of a sync cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    /// Shutdown was requested while the cycle was in flight.
    #[error("cycle cancelled")]
    Cancelled,
}

impl SyncError {
    /// Name of the operation that failed, used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            SyncError::Fetch(_) => "fetch",
            SyncError::Serialization(_) => "serialize",
            SyncError::Publish(_) => "publish",
            SyncError::Cancelled => "cancel",
        }
    }
}

/// Short JSON type name for diagnostics.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
