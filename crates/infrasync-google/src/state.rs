//! State snapshots stored in Cloud Storage

use crate::api::StorageApi;
use async_trait::async_trait;
use infrasync_core::{DriftError, StateSource};

/// State snapshot stored as a GCS object
pub struct GcsStateSource<A: StorageApi> {
    api: A,
    bucket: String,
    object: String,
}

impl<A: StorageApi> GcsStateSource<A> {
    pub fn new(api: A, bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            api,
            bucket: bucket.into(),
            object: object.into(),
        }
    }
}

#[async_trait]
impl<A: StorageApi> StateSource for GcsStateSource<A> {
    fn describe(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object)
    }

    async fn fetch(&self) -> Result<Vec<u8>, DriftError> {
        let data = self.api.get_object(&self.bucket, &self.object).await?;
        tracing::debug!("Read {} bytes of state from {}", data.len(), self.describe());
        Ok(data)
    }
}
