//! Pub/Sub adapter
//!
//! Yields one topic per `next()`. Each topic carries its IAM bindings and
//! its subscriptions, and each subscription carries its own IAM bindings.

use crate::api::{PageCursor, PubSubApi, Topic, short_name, upstream};
use crate::iam::binding_resources;
use async_trait::async_trait;
use infrasync_core::iterator::DEFAULT_PAGE_SIZE;
use infrasync_core::{
    PageSource, PagedIterator, Provider, Resource, ResourceImporter, ResourceIterator,
    ResourceType, Result, Service, sanitize_name,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Pub/Sub service adapter
pub struct PubSubImporter<A: PubSubApi> {
    api: A,
    provider: Provider,
    page_size: usize,
}

impl<A: PubSubApi> PubSubImporter<A> {
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

impl<A: PubSubApi> ResourceImporter for PubSubImporter<A> {
    fn service(&self) -> Service {
        Service::PubSub
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn import(&self, cancel: CancellationToken) -> Box<dyn ResourceIterator + '_> {
        let source = TopicPages {
            api: &self.api,
            provider: &self.provider,
            page_size: self.page_size,
            cursor: PageCursor::default(),
        };
        Box::new(PagedIterator::with_page_size(source, cancel, self.page_size))
    }

    fn close(self: Box<Self>) {
        tracing::debug!("Closing pubsub client for {}", self.provider.project_id);
    }
}

struct TopicPages<'a, A> {
    api: &'a A,
    provider: &'a Provider,
    page_size: usize,
    cursor: PageCursor,
}

impl<'a, A: PubSubApi> TopicPages<'a, A> {
    async fn subscriptions(
        &self,
        topic_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Resource>> {
        let mut subscriptions = Vec::new();
        let mut cursor = PageCursor::default();

        while !cursor.is_done() {
            let page = upstream(
                cancel,
                self.api
                    .list_topic_subscriptions(topic_id, self.page_size, cursor.token()),
            )
            .await?;
            cursor.advance(page.next_page_token);

            for path in page.items {
                subscriptions.push(self.subscription(&path, cancel).await?);
            }
        }

        Ok(subscriptions)
    }

    async fn subscription(&self, path: &str, cancel: &CancellationToken) -> Result<Resource> {
        let details = upstream(cancel, self.api.get_subscription(path)).await?;
        let policy = upstream(cancel, self.api.get_iam_policy(path)).await?;

        let name = short_name(path);
        let mut subscription = Resource::new(
            self.provider.clone(),
            ResourceType::PubSubSubscription,
            sanitize_name(name),
            path,
        )
        .with_attribute("project", json!(self.provider.project_id))
        .with_attribute("name", json!(name))
        .with_attribute("topic", json!(details.topic));

        if let Some(ack_deadline) = details.ack_deadline_seconds {
            subscription = subscription.with_attribute("ack_deadline_seconds", json!(ack_deadline));
        }

        Ok(subscription.with_dependents(binding_resources(
            self.provider,
            ResourceType::PubSubSubscriptionIamBinding,
            name,
            path,
            "subscription",
            policy,
        )))
    }
}

#[async_trait]
impl<'a, A: PubSubApi> PageSource for TopicPages<'a, A> {
    type Item = Topic;

    async fn fetch_page(&mut self, page_size: usize) -> Result<Option<Vec<Topic>>> {
        if self.cursor.is_done() {
            return Ok(None);
        }

        let page = self
            .api
            .list_topics(&self.provider.project_id, page_size, self.cursor.token())
            .await?;
        self.cursor.advance(page.next_page_token);
        Ok(Some(page.items))
    }

    async fn enrich(
        &mut self,
        topic: Topic,
        cancel: &CancellationToken,
    ) -> Result<Option<Resource>> {
        let name = short_name(&topic.name);
        let topic_id = format!("projects/{}/topics/{}", self.provider.project_id, name);

        let policy = upstream(cancel, self.api.get_iam_policy(&topic_id)).await?;
        let bindings = binding_resources(
            self.provider,
            ResourceType::PubSubTopicIamBinding,
            name,
            &topic_id,
            "topic",
            policy,
        );
        let subscriptions = self.subscriptions(&topic_id, cancel).await?;

        tracing::debug!(
            resource = %topic_id,
            "Discovered topic with {} bindings and {} subscriptions",
            bindings.len(),
            subscriptions.len()
        );

        Ok(Some(
            Resource::new(
                self.provider.clone(),
                ResourceType::PubSubTopic,
                sanitize_name(name),
                &topic_id,
            )
            .with_attribute("project", json!(self.provider.project_id))
            .with_attribute("name", json!(name))
            .with_dependents(bindings)
            .with_dependents(subscriptions),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeGoogle;
    use infrasync_core::{DiscoveryError, collect_resources};

    fn importer(api: FakeGoogle) -> PubSubImporter<FakeGoogle> {
        PubSubImporter::new(api, Provider::google("p"))
    }

    #[tokio::test]
    async fn test_topic_with_viewer_binding() {
        let mut api = FakeGoogle::new("p").with_binding(
            "projects/p/topics/orders-topic",
            "roles/viewer",
            &["user:a@example.com", "user:b@example.com"],
        );
        api.topics = vec!["orders-topic".to_string()];
        let importer = importer(api);

        let resources = collect_resources(importer.import(CancellationToken::new()))
            .await
            .unwrap();

        assert_eq!(resources.len(), 1);
        let topic = &resources[0];
        assert_eq!(topic.name, "orders_topic");
        assert_eq!(topic.id, "projects/p/topics/orders-topic");
        assert_eq!(topic.dependents.len(), 1);

        let binding = &topic.dependents[0];
        assert_eq!(binding.resource_type, ResourceType::PubSubTopicIamBinding);
        assert_eq!(binding.name, "orders_topic_roles_viewer");
        assert_eq!(binding.id, "projects/p/topics/orders-topic roles/viewer");
        assert_eq!(
            binding.get_attribute::<Vec<String>>("members").unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_subscriptions_carry_their_bindings() {
        let mut api = FakeGoogle::new("p").with_binding(
            "projects/p/subscriptions/orders-worker",
            "roles/pubsub.subscriber",
            &["serviceAccount:w@p.iam.gserviceaccount.com"],
        );
        api.topics = vec!["orders".to_string()];
        api.subscriptions
            .insert("orders".to_string(), vec!["orders-worker".to_string()]);
        let importer = importer(api);

        let resources = collect_resources(importer.import(CancellationToken::new()))
            .await
            .unwrap();

        let flat = resources.into_iter().next().unwrap().flatten();
        let ids: Vec<_> = flat.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "projects/p/topics/orders",
                "projects/p/subscriptions/orders-worker",
                "projects/p/subscriptions/orders-worker roles/pubsub.subscriber",
            ]
        );

        let subscription = &flat[1];
        assert_eq!(subscription.name, "orders_worker");
        assert_eq!(
            subscription.attributes["topic"],
            json!("projects/p/topics/orders")
        );
        assert_eq!(subscription.attributes["ack_deadline_seconds"], json!(10));
        assert_eq!(flat[2].name, "orders_worker_roles_pubsub_subscriber");
    }

    #[tokio::test]
    async fn test_policy_failure_is_fatal_and_sticky() {
        let mut api = FakeGoogle::new("p");
        api.topics = vec!["a".to_string(), "b".to_string()];
        api.failing_policies.insert("projects/p/topics/a".to_string());
        let importer = importer(api);

        let mut iter = importer.import(CancellationToken::new());
        let first = iter.next().await.unwrap_err();
        assert!(matches!(first, DiscoveryError::Api(_)));
        assert_eq!(iter.next().await.unwrap_err(), first);
        iter.close().unwrap();
    }

    #[tokio::test]
    async fn test_topics_are_paged_lazily() {
        let mut api = FakeGoogle::new("p");
        api.topics = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let importer = importer(api).with_page_size(2);

        let mut iter = importer.import(CancellationToken::new());
        assert!(importer.api.calls().is_empty());

        assert_eq!(iter.next().await.unwrap().unwrap().name, "a");
        assert_eq!(iter.next().await.unwrap().unwrap().name, "b");
        assert_eq!(iter.next().await.unwrap().unwrap().name, "c");
        assert!(iter.next().await.unwrap().is_none());
        iter.close().unwrap();
        drop(iter);

        let listings: Vec<_> = importer
            .api
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("list_topics"))
            .collect();
        assert_eq!(listings, vec!["list_topics -", "list_topics 2"]);

        Box::new(importer).close();
    }
}
