// src/error.rs
//! Error kinds of the harvester. None of them is fatal to the process:
//! a failed cycle is retried on the next tick, persistence and alert
//! failures are logged and the in-memory state stays authoritative.

use thiserror::Error;

/// Failure to obtain one page. Aborts the current refresh cycle only.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("feed page is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("feed page has no list at `{0}`")]
    MissingField(String),

    #[error("feed item has invalid id `{0}`")]
    InvalidId(String),
}

/// Save/load failure of the collector snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("snapshot decoding: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Delivery failure of one alert. Reported per rule, never aborts the pipeline.
#[derive(Debug, Error)]
pub enum AlertDeliveryError {
    #[error("alert request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("alert endpoint returned HTTP {0}")]
    Status(u16),

    #[error("alert channel misconfigured: {0}")]
    Config(String),
}
