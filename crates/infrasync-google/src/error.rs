//! Google provider error types

use infrasync_core::{DiscoveryError, DriftError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("gcloud not found. Please install the Google Cloud SDK: https://cloud.google.com/sdk/docs/install")]
    GcloudNotFound,

    #[error("gcloud command failed: {0}")]
    CommandFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Google API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GoogleError>;

impl From<GoogleError> for DiscoveryError {
    fn from(e: GoogleError) -> Self {
        DiscoveryError::Api(e.to_string())
    }
}

impl From<GoogleError> for DriftError {
    fn from(e: GoogleError) -> Self {
        DriftError::Retrieval(e.to_string())
    }
}
