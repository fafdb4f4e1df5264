use infrasync_core::{DiscoveryError, DriftError};
use infrasync_provision::ProvisionError;
use thiserror::Error;

/// Failure of one import run
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Failed to import {id}: {source}")]
    Resource {
        id: String,
        #[source]
        source: ProvisionError,
    },

    #[error("Artifact error: {0}")]
    Artifact(#[from] ProvisionError),
}

/// Failure that stops a whole sync run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unreadable state snapshot: {0}")]
    Snapshot(#[from] DriftError),

    #[error("Failed to write sync artifacts: {0}")]
    Artifact(#[from] ProvisionError),

    #[error("Sync cancelled")]
    Cancelled,
}

/// Failure while scaffolding an output directory
#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("No project configured")]
    NoProject,

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
