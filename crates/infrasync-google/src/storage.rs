//! Cloud Storage adapter

use crate::api::{Bucket, PageCursor, StorageApi, upstream};
use crate::iam::binding_resources;
use async_trait::async_trait;
use infrasync_core::iterator::DEFAULT_PAGE_SIZE;
use infrasync_core::{
    DiscoveryError, PageSource, PagedIterator, Provider, Resource, ResourceImporter,
    ResourceIterator, ResourceType, Result, Service, sanitize_name,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Cloud Storage service adapter
pub struct StorageImporter<A: StorageApi> {
    api: A,
    provider: Provider,
    page_size: usize,
}

impl<A: StorageApi> StorageImporter<A> {
    pub fn new(api: A, provider: Provider) -> Self {
        Self {
            api,
            provider,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl<A: StorageApi> ResourceImporter for StorageImporter<A> {
    fn service(&self) -> Service {
        Service::Storage
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn import(&self, cancel: CancellationToken) -> Box<dyn ResourceIterator + '_> {
        let source = BucketPages {
            api: &self.api,
            provider: &self.provider,
            cursor: PageCursor::default(),
        };
        Box::new(PagedIterator::with_page_size(source, cancel, self.page_size))
    }

    fn close(self: Box<Self>) {
        tracing::debug!("Closing storage client for {}", self.provider.project_id);
    }
}

struct BucketPages<'a, A> {
    api: &'a A,
    provider: &'a Provider,
    cursor: PageCursor,
}

#[async_trait]
impl<'a, A: StorageApi> PageSource for BucketPages<'a, A> {
    type Item = Bucket;

    async fn fetch_page(&mut self, page_size: usize) -> Result<Option<Vec<Bucket>>> {
        if self.cursor.is_done() {
            return Ok(None);
        }

        let page = self
            .api
            .list_buckets(&self.provider.project_id, page_size, self.cursor.token())
            .await?;
        self.cursor.advance(page.next_page_token);
        Ok(Some(page.items))
    }

    async fn enrich(
        &mut self,
        bucket: Bucket,
        cancel: &CancellationToken,
    ) -> Result<Option<Resource>> {
        let mut resource = Resource::new(
            self.provider.clone(),
            ResourceType::StorageBucket,
            sanitize_name(&bucket.name),
            &bucket.name,
        )
        .with_attribute("project", json!(self.provider.project_id))
        .with_attribute("name", json!(bucket.name));

        if let Some(location) = &bucket.location {
            resource = resource.with_attribute("location", json!(location));
        }
        if let Some(storage_class) = &bucket.storage_class {
            resource = resource.with_attribute("storage_class", json!(storage_class));
        }

        // A bucket without readable IAM is still importable on its own
        let bindings = match upstream(cancel, self.api.get_bucket_iam_policy(&bucket.name)).await {
            Ok(policy) => binding_resources(
                self.provider,
                ResourceType::StorageBucketIamBinding,
                &bucket.name,
                &bucket.name,
                "bucket",
                policy,
            ),
            Err(DiscoveryError::Cancelled) => return Err(DiscoveryError::Cancelled),
            Err(e) => {
                tracing::warn!(resource = %bucket.name, "Failed to get bucket IAM policy: {}", e);
                Vec::new()
            }
        };

        Ok(Some(resource.with_dependents(bindings)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeGoogle;
    use infrasync_core::collect_resources;

    fn bucket(name: &str) -> Bucket {
        Bucket {
            name: name.to_string(),
            location: Some("US".to_string()),
            storage_class: Some("STANDARD".to_string()),
        }
    }

    #[tokio::test]
    async fn test_iam_failure_still_yields_bucket() {
        let mut api = FakeGoogle::new("p")
            .with_binding("b0", "roles/storage.objectViewer", &["allUsers"])
            .with_binding("b2", "roles/storage.admin", &["group:ops@example.com"]);
        api.buckets = vec![bucket("b0"), bucket("b1"), bucket("b2")];
        api.failing_policies.insert("b1".to_string());
        let importer = StorageImporter::new(api, Provider::google("p")).with_page_size(2);

        let resources = collect_resources(importer.import(CancellationToken::new()))
            .await
            .unwrap();

        let names: Vec<_> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b0", "b1", "b2"]);
        assert_eq!(resources[0].dependents.len(), 1);
        assert!(resources[1].dependents.is_empty());
        assert_eq!(resources[2].dependents.len(), 1);
    }

    #[tokio::test]
    async fn test_bucket_ids_and_bindings() {
        let mut api = FakeGoogle::new("p").with_binding(
            "my-assets",
            "roles/storage.objectViewer",
            &["allUsers"],
        );
        api.buckets = vec![bucket("my-assets")];
        let importer = StorageImporter::new(api, Provider::google("p"));

        let resources = collect_resources(importer.import(CancellationToken::new()))
            .await
            .unwrap();
        let flat = resources.into_iter().next().unwrap().flatten();

        assert_eq!(flat[0].id, "my-assets");
        assert_eq!(flat[0].name, "my_assets");
        assert_eq!(flat[0].attributes["storage_class"], json!("STANDARD"));
        assert_eq!(flat[1].id, "my-assets roles/storage.objectViewer");
        assert_eq!(flat[1].name, "my_assets_roles_storage_objectViewer");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut api = FakeGoogle::new("p");
        api.buckets = vec![bucket("b0")];
        let importer = StorageImporter::new(api, Provider::google("p"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut iter = importer.import(cancel);
        assert_eq!(iter.next().await, Err(DiscoveryError::Cancelled));
        drop(iter);
        assert!(importer.api.calls().is_empty());
    }
}
