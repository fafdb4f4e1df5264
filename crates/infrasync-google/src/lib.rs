//! InfraSync Google Cloud provider
//!
//! Service adapters for Pub/Sub, Cloud SQL and Cloud Storage, built on the
//! discovery protocol of `infrasync-core`.
//!
//! Upstream access goes through the [`PubSubApi`], [`CloudSqlApi`] and
//! [`StorageApi`] traits. In production these are served by
//! [`GoogleApiClient`] (REST) and [`Gcloud`] (CLI).

pub mod api;
pub mod auth;
pub mod cloudsql;
pub mod connector;
pub mod error;
pub mod gcloud;
mod iam;
pub mod pubsub;
pub mod state;
pub mod storage;

#[cfg(test)]
mod fake;

pub use api::{CloudSqlApi, Endpoints, GoogleApiClient, PubSubApi, StorageApi};
pub use auth::{AccessToken, resolve_token};
pub use cloudsql::CloudSqlImporter;
pub use connector::{GoogleConnector, SqlListing};
pub use error::{GoogleError, Result};
pub use gcloud::Gcloud;
pub use pubsub::PubSubImporter;
pub use state::GcsStateSource;
pub use storage::StorageImporter;
