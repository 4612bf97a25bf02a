//! Error types for the metrics daemon
//!
//! Call failures are typed so the run can tell a partial registry read
//! (fatal, nothing is persisted) from a best-effort write or upload failure
//! (logged, never ends a run).

use alloy_primitives::Address;
use thiserror::Error;

/// A single on-chain read failed, or a page could not be merged
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("RPC call {call} failed: {message}")]
    Rpc { call: &'static str, message: String },

    #[error("failed to decode {call} result: {message}")]
    Decode { call: &'static str, message: String },

    #[error("pool {pool:?} could not be merged: {reason}")]
    Merge { pool: Address, reason: String },

    /// One or more calls failed while paging through the registry.
    /// The collected pools are discarded.
    #[error("registry read incomplete: {failed_calls} failed calls across {pages} pages")]
    PartialFetch { failed_calls: usize, pages: usize },
}

impl FetchError {
    pub fn rpc(call: &'static str, err: impl std::fmt::Display) -> Self {
        FetchError::Rpc { call, message: err.to_string() }
    }

    pub fn decode(call: &'static str, err: impl std::fmt::Display) -> Self {
        FetchError::Decode { call, message: err.to_string() }
    }
}

/// The price feed itself is unreachable or answered garbage.
/// Missing individual tokens are NOT an error.
#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("price feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("price feed returned HTTP {status}")]
    Status { status: u16 },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {name}: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("upload of {key} failed: {message}")]
    Upload { key: String, message: String },
}

/// Everything that can end a run early
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    PriceFeed(#[from] PriceFeedError),
}
