//! Provisioning error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("{0} not found. Please install Terraform or OpenTofu")]
    BinaryNotFound(String),

    /// The resource is already bound to a declarative definition
    #[error("Resource already managed: {0}")]
    AlreadyExists(String),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unexpected provisioner output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
