//! Core error types

use thiserror::Error;

/// Errors raised while discovering resources.
///
/// Payloads are plain strings so a failed iterator can hand the exact same
/// error back on every later call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Iterator is closed")]
    IteratorClosed,

    #[error("Upstream API error: {0}")]
    Api(String),

    #[error("Unsupported database engine: {0}")]
    UnsupportedEngine(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Client initialization failed: {0}")]
    ClientInit(String),

    #[error("Discovery cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors raised while parsing state snapshots or comparing attributes
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("Invalid state snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Unexpected shape for attribute '{attribute}' of {resource}: {reason}")]
    AttributeShape {
        resource: String,
        attribute: String,
        reason: String,
    },

    #[error("State retrieval failed: {0}")]
    Retrieval(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
