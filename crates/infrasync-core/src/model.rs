//! Resource model shared by adapters, the import orchestrator and the
//! drift detector

use crate::error::DiscoveryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Cloud provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The cloud account/project a resource belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provider {
    pub kind: ProviderKind,
    pub project_id: String,
    pub region: Option<String>,
}

impl Provider {
    pub fn google(project_id: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Google,
            project_id: project_id.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Logical service grouping, one adapter per variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Topics and subscriptions
    PubSub,
    /// Relational database instances
    CloudSql,
    /// Object storage buckets
    Storage,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::PubSub, Service::CloudSql, Service::Storage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::PubSub => "pubsub",
            Service::CloudSql => "cloudsql",
            Service::Storage => "storage",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Service {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|service| service.as_str() == s.trim())
            .ok_or_else(|| DiscoveryError::UnknownService(s.to_string()))
    }
}

/// Declarative resource kinds.
///
/// New kinds are added here; resource types are never inferred at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    PubSubTopic,
    PubSubTopicIamBinding,
    PubSubSubscription,
    PubSubSubscriptionIamBinding,
    SqlDatabaseInstance,
    SqlDatabase,
    SqlUser,
    StorageBucket,
    StorageBucketIamBinding,
}

impl ResourceType {
    pub const ALL: [ResourceType; 9] = [
        ResourceType::PubSubTopic,
        ResourceType::PubSubTopicIamBinding,
        ResourceType::PubSubSubscription,
        ResourceType::PubSubSubscriptionIamBinding,
        ResourceType::SqlDatabaseInstance,
        ResourceType::SqlDatabase,
        ResourceType::SqlUser,
        ResourceType::StorageBucket,
        ResourceType::StorageBucketIamBinding,
    ];

    /// Terraform resource type name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::PubSubTopic => "google_pubsub_topic",
            ResourceType::PubSubTopicIamBinding => "google_pubsub_topic_iam_binding",
            ResourceType::PubSubSubscription => "google_pubsub_subscription",
            ResourceType::PubSubSubscriptionIamBinding => "google_pubsub_subscription_iam_binding",
            ResourceType::SqlDatabaseInstance => "google_sql_database_instance",
            ResourceType::SqlDatabase => "google_sql_database",
            ResourceType::SqlUser => "google_sql_user",
            ResourceType::StorageBucket => "google_storage_bucket",
            ResourceType::StorageBucketIamBinding => "google_storage_bucket_iam_binding",
        }
    }

    pub fn service(&self) -> Service {
        match self {
            ResourceType::PubSubTopic
            | ResourceType::PubSubTopicIamBinding
            | ResourceType::PubSubSubscription
            | ResourceType::PubSubSubscriptionIamBinding => Service::PubSub,
            ResourceType::SqlDatabaseInstance | ResourceType::SqlDatabase | ResourceType::SqlUser => {
                Service::CloudSql
            }
            ResourceType::StorageBucket | ResourceType::StorageBucketIamBinding => Service::Storage,
        }
    }

    /// Suffix used to tell apart two resources that sanitize to the same name
    pub fn short_suffix(&self) -> &'static str {
        match self {
            ResourceType::PubSubTopic => "topic",
            ResourceType::PubSubSubscription => "subscription",
            ResourceType::PubSubTopicIamBinding
            | ResourceType::PubSubSubscriptionIamBinding
            | ResourceType::StorageBucketIamBinding => "iam",
            ResourceType::SqlDatabaseInstance => "instance",
            ResourceType::SqlDatabase => "database",
            ResourceType::SqlUser => "user",
            ResourceType::StorageBucket => "bucket",
        }
    }

    pub fn is_iam_binding(&self) -> bool {
        matches!(
            self,
            ResourceType::PubSubTopicIamBinding
                | ResourceType::PubSubSubscriptionIamBinding
                | ResourceType::StorageBucketIamBinding
        )
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown resource type: {}", s))
    }
}

/// A discovered cloud resource and the dependents found while producing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub provider: Provider,

    pub resource_type: ResourceType,

    pub service: Service,

    /// File-system and HCL safe identifier
    pub name: String,

    /// Provider import identifier, passed through verbatim
    pub id: String,

    /// Attributes used for drift comparison only
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Child resources owned by this one
    #[serde(default)]
    pub dependents: Vec<Resource>,
}

impl Resource {
    pub fn new(
        provider: Provider,
        resource_type: ResourceType,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            service: resource_type.service(),
            resource_type,
            name: name.into(),
            id: id.into(),
            attributes: HashMap::new(),
            dependents: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_dependents(mut self, dependents: impl IntoIterator<Item = Resource>) -> Self {
        self.dependents.extend(dependents);
        self
    }

    /// Terraform address (`type.name`)
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    /// Get an attribute as a specific type
    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Pre-order list of this resource and all of its dependents, each
    /// detached from its children
    pub fn flatten(self) -> Vec<Resource> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(mut self, out: &mut Vec<Resource>) {
        let dependents = std::mem::take(&mut self.dependents);
        out.push(self);
        for dependent in dependents {
            dependent.flatten_into(out);
        }
    }

    /// Number of resources in this tree, including the root
    pub fn tree_size(&self) -> usize {
        1 + self.dependents.iter().map(Resource::tree_size).sum::<usize>()
    }
}

/// Derive a declarative identifier from a cloud-native name
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' | '.' | '/' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Resource {
        Resource::new(
            Provider::google("p"),
            ResourceType::PubSubTopic,
            sanitize_name(name),
            format!("projects/p/topics/{}", name),
        )
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("orders-topic"), "orders_topic");
        assert_eq!(sanitize_name("roles/pubsub.viewer"), "roles_pubsub_viewer");
        assert_eq!(sanitize_name("plain"), "plain");
        assert_eq!(sanitize_name("a-b.c/d"), sanitize_name("a-b.c/d"));
    }

    #[test]
    fn test_service_from_str() {
        assert_eq!("pubsub".parse::<Service>().unwrap(), Service::PubSub);
        assert_eq!("cloudsql".parse::<Service>().unwrap(), Service::CloudSql);
        assert_eq!("storage".parse::<Service>().unwrap(), Service::Storage);
        assert_eq!(
            "bigquery".parse::<Service>(),
            Err(DiscoveryError::UnknownService("bigquery".to_string()))
        );
    }

    #[test]
    fn test_resource_type_service() {
        for t in ResourceType::ALL {
            assert_eq!(t.as_str().parse::<ResourceType>().unwrap(), t);
        }
        assert_eq!(ResourceType::SqlUser.service(), Service::CloudSql);
        assert_eq!(
            ResourceType::StorageBucketIamBinding.service(),
            Service::Storage
        );
    }

    #[test]
    fn test_flatten_preorder() {
        let binding = Resource::new(
            Provider::google("p"),
            ResourceType::PubSubSubscriptionIamBinding,
            "sub_roles_viewer",
            "projects/p/subscriptions/sub roles/viewer",
        );
        let sub = Resource::new(
            Provider::google("p"),
            ResourceType::PubSubSubscription,
            "sub",
            "projects/p/subscriptions/sub",
        )
        .with_dependents([binding]);
        let root = topic("t").with_dependents([sub]);

        assert_eq!(root.tree_size(), 3);

        let flat = root.flatten();
        let names: Vec<_> = flat.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["t", "sub", "sub_roles_viewer"]);
        assert!(flat.iter().all(|r| r.dependents.is_empty()));
    }

    #[test]
    fn test_address() {
        assert_eq!(topic("orders-topic").address(), "google_pubsub_topic.orders_topic");
    }
}
