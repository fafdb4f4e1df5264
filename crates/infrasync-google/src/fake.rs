//! In-memory Google APIs for adapter tests

use crate::api::{
    Binding, Bucket, CloudSqlApi, Database, DatabaseInstance, Page, Policy, PubSubApi,
    StorageApi, Subscription, Topic, User,
};
use crate::error::{GoogleError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeGoogle {
    pub project: String,
    /// Short topic names
    pub topics: Vec<String>,
    /// Short topic name -> short subscription names
    pub subscriptions: HashMap<String, Vec<String>>,
    /// Resource id -> policy
    pub policies: HashMap<String, Policy>,
    /// Resource ids whose policy lookup fails
    pub failing_policies: HashSet<String>,
    pub instances: Vec<DatabaseInstance>,
    pub databases: HashMap<String, Vec<Database>>,
    pub users: HashMap<String, Vec<User>>,
    pub buckets: Vec<Bucket>,
    pub objects: HashMap<(String, String), Vec<u8>>,
    /// Upstream calls in order
    pub calls: Mutex<Vec<String>>,
}

impl FakeGoogle {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            ..Default::default()
        }
    }

    /// Add one binding to the policy of `resource`
    pub fn with_binding(mut self, resource: &str, role: &str, members: &[&str]) -> Self {
        self.policies
            .entry(resource.to_string())
            .or_default()
            .bindings
            .push(Binding {
                role: role.to_string(),
                members: members.iter().map(|m| m.to_string()).collect(),
            });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn policy(&self, resource: &str) -> Result<Policy> {
        if self.failing_policies.contains(resource) {
            return Err(GoogleError::ApiError {
                code: 403,
                message: format!("permission denied on {}", resource),
            });
        }
        Ok(self.policies.get(resource).cloned().unwrap_or_default())
    }
}

/// Pages use the item offset as token
fn page_of<T: Clone>(items: &[T], page_size: usize, page_token: Option<&str>) -> Page<T> {
    let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
    let end = (start + page_size).min(items.len());
    let next = (end < items.len()).then(|| end.to_string());
    Page::new(items[start.min(end)..end].to_vec(), next)
}

#[async_trait]
impl PubSubApi for FakeGoogle {
    async fn list_topics(
        &self,
        project: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<Topic>> {
        self.record(format!("list_topics {}", page_token.unwrap_or("-")));
        let topics: Vec<Topic> = self
            .topics
            .iter()
            .map(|t| Topic {
                name: format!("projects/{}/topics/{}", project, t),
            })
            .collect();
        Ok(page_of(&topics, page_size, page_token))
    }

    async fn list_topic_subscriptions(
        &self,
        topic: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<String>> {
        self.record(format!("list_topic_subscriptions {}", topic));
        let short = crate::api::short_name(topic);
        let names: Vec<String> = self
            .subscriptions
            .get(short)
            .into_iter()
            .flatten()
            .map(|s| format!("projects/{}/subscriptions/{}", self.project, s))
            .collect();
        Ok(page_of(&names, page_size, page_token))
    }

    async fn get_subscription(&self, subscription: &str) -> Result<Subscription> {
        self.record(format!("get_subscription {}", subscription));
        let short = crate::api::short_name(subscription);
        let topic = self
            .subscriptions
            .iter()
            .find(|(_, subs)| subs.iter().any(|s| s == short))
            .map(|(topic, _)| format!("projects/{}/topics/{}", self.project, topic))
            .ok_or_else(|| GoogleError::ApiError {
                code: 404,
                message: format!("{} not found", subscription),
            })?;
        Ok(Subscription {
            name: subscription.to_string(),
            topic,
            ack_deadline_seconds: Some(10),
        })
    }

    async fn get_iam_policy(&self, resource: &str) -> Result<Policy> {
        self.record(format!("get_iam_policy {}", resource));
        self.policy(resource)
    }
}

#[async_trait]
impl CloudSqlApi for FakeGoogle {
    async fn list_instances(
        &self,
        _project: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<DatabaseInstance>> {
        self.record("list_instances".to_string());
        Ok(page_of(&self.instances, page_size, page_token))
    }

    async fn list_databases(&self, _project: &str, instance: &str) -> Result<Vec<Database>> {
        self.record(format!("list_databases {}", instance));
        Ok(self.databases.get(instance).cloned().unwrap_or_default())
    }

    async fn list_users(&self, _project: &str, instance: &str) -> Result<Vec<User>> {
        self.record(format!("list_users {}", instance));
        Ok(self.users.get(instance).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl StorageApi for FakeGoogle {
    async fn list_buckets(
        &self,
        _project: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<Bucket>> {
        self.record(format!("list_buckets {}", page_token.unwrap_or("-")));
        Ok(page_of(&self.buckets, page_size, page_token))
    }

    async fn get_bucket_iam_policy(&self, bucket: &str) -> Result<Policy> {
        self.record(format!("get_bucket_iam_policy {}", bucket));
        self.policy(bucket)
    }

    async fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>> {
        self.objects
            .get(&(bucket.to_string(), object.to_string()))
            .cloned()
            .ok_or_else(|| GoogleError::ApiError {
                code: 404,
                message: format!("No such object: {}/{}", bucket, object),
            })
    }
}
