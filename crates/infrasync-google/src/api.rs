//! Google Cloud REST API client
//!
//! Thin `reqwest` client over the Pub/Sub, Cloud Storage and Cloud SQL Admin
//! REST APIs. Adapters never talk to it directly: they depend on the
//! [`PubSubApi`], [`CloudSqlApi`] and [`StorageApi`] seams, which
//! [`GoogleApiClient`] implements.

use crate::auth::AccessToken;
use crate::error::{GoogleError, Result};
use async_trait::async_trait;
use infrasync_core::{DiscoveryError, guarded};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::future::Future;
use tokio_util::sync::CancellationToken;

const PUBSUB_API_BASE: &str = "https://pubsub.googleapis.com/v1";
const STORAGE_API_BASE: &str = "https://storage.googleapis.com/storage/v1";
const SQLADMIN_API_BASE: &str = "https://sqladmin.googleapis.com/v1beta4";

/// One page of a listing call
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            // Google returns "" on some APIs for the last page
            next_page_token: next_page_token.filter(|t| !t.is_empty()),
        }
    }

    /// A final page
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Page token bookkeeping for a paged listing
#[derive(Debug, Default)]
pub struct PageCursor {
    token: Option<String>,
    done: bool,
}

impl PageCursor {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Record the token returned with the page just fetched
    pub fn advance(&mut self, next_page_token: Option<String>) {
        self.done = next_page_token.is_none();
        self.token = next_page_token;
    }
}

/// Run one upstream call for an adapter: cancellable, with the error mapped
/// into the discovery error space
pub(crate) async fn upstream<F, T>(
    cancel: &CancellationToken,
    call: F,
) -> infrasync_core::Result<T>
where
    F: Future<Output = Result<T>>,
{
    guarded(cancel, async { call.await.map_err(DiscoveryError::from) }).await
}

// ---------------------------------------------------------------------------
// Pub/Sub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Topic {
    /// Full resource name (`projects/P/topics/T`)
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Full resource name (`projects/P/subscriptions/S`)
    pub name: String,
    pub topic: String,
    #[serde(default)]
    pub ack_deadline_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Last path segment of a Google resource name
pub fn short_name(resource_name: &str) -> &str {
    resource_name.rsplit('/').next().unwrap_or(resource_name)
}

#[async_trait]
pub trait PubSubApi: Send + Sync {
    async fn list_topics(
        &self,
        project: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<Topic>>;

    /// Subscription resource names attached to a topic
    async fn list_topic_subscriptions(
        &self,
        topic: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<String>>;

    async fn get_subscription(&self, subscription: &str) -> Result<Subscription>;

    /// IAM policy of a topic or subscription
    async fn get_iam_policy(&self, resource: &str) -> Result<Policy>;
}

// ---------------------------------------------------------------------------
// Cloud SQL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInstance {
    pub name: String,
    #[serde(default)]
    pub database_version: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub settings: Option<Settings>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub tier: Option<String>,
    /// Encoded as a string by the API
    #[serde(default, deserialize_with = "int64")]
    pub data_disk_size_gb: Option<i64>,
    #[serde(default)]
    pub maintenance_window: Option<MaintenanceWindow>,
    #[serde(default)]
    pub insights_config: Option<InsightsConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MaintenanceWindow {
    #[serde(default)]
    pub day: i64,
    #[serde(default)]
    pub hour: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsConfig {
    #[serde(default)]
    pub query_string_length: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Database {
    pub name: String,
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub collation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub host: Option<String>,
}

fn int64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[async_trait]
pub trait CloudSqlApi: Send + Sync {
    async fn list_instances(
        &self,
        project: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<DatabaseInstance>>;

    async fn list_databases(&self, project: &str, instance: &str) -> Result<Vec<Database>>;

    async fn list_users(&self, project: &str, instance: &str) -> Result<Vec<User>>;
}

// ---------------------------------------------------------------------------
// Cloud Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub storage_class: Option<String>,
}

#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn list_buckets(
        &self,
        project: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<Bucket>>;

    async fn get_bucket_iam_policy(&self, bucket: &str) -> Result<Policy>;

    /// Raw object contents
    async fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// REST client
// ---------------------------------------------------------------------------

/// Service base URLs, overridable for emulators
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub pubsub: String,
    pub storage: String,
    pub sqladmin: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            pubsub: PUBSUB_API_BASE.to_string(),
            storage: STORAGE_API_BASE.to_string(),
            sqladmin: SQLADMIN_API_BASE.to_string(),
        }
    }
}

/// Google Cloud REST client authenticated with a bearer token
#[derive(Clone)]
pub struct GoogleApiClient {
    client: reqwest::Client,
    token: AccessToken,
    endpoints: Endpoints,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicList {
    #[serde(default)]
    topics: Vec<Topic>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicSubscriptionList {
    #[serde(default)]
    subscriptions: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Shared shape of Storage and Cloud SQL listings
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Decode a non-success response body into an API error
pub(crate) fn decode_error(code: u16, body: &str) -> GoogleError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    GoogleError::ApiError { code, message }
}

fn paging_query(
    size_key: &'static str,
    page_size: usize,
    page_token: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![(size_key, page_size.to_string())];
    if let Some(token) = page_token {
        query.push(("pageToken", token.to_string()));
    }
    query
}

impl GoogleApiClient {
    pub fn new(token: AccessToken) -> Self {
        Self::with_endpoints(token, Endpoints::default())
    }

    pub fn with_endpoints(token: AccessToken, endpoints: Endpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            endpoints,
        }
    }

    async fn send(&self, url: reqwest::Url) -> Result<reqwest::Response> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(decode_error(status.as_u16(), &body));
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = reqwest::Url::parse_with_params(url, query)
            .map_err(|e| GoogleError::InvalidUrl(format!("{}: {}", url, e)))?;
        let response = self.send(url).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PubSubApi for GoogleApiClient {
    async fn list_topics(
        &self,
        project: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<Topic>> {
        let url = format!("{}/projects/{}/topics", self.endpoints.pubsub, project);
        let list: TopicList = self
            .get_json(&url, &paging_query("pageSize", page_size, page_token))
            .await?;
        Ok(Page::new(list.topics, list.next_page_token))
    }

    async fn list_topic_subscriptions(
        &self,
        topic: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<String>> {
        let url = format!("{}/{}/subscriptions", self.endpoints.pubsub, topic);
        let list: TopicSubscriptionList = self
            .get_json(&url, &paging_query("pageSize", page_size, page_token))
            .await?;
        Ok(Page::new(list.subscriptions, list.next_page_token))
    }

    async fn get_subscription(&self, subscription: &str) -> Result<Subscription> {
        let url = format!("{}/{}", self.endpoints.pubsub, subscription);
        self.get_json(&url, &[]).await
    }

    async fn get_iam_policy(&self, resource: &str) -> Result<Policy> {
        let url = format!("{}/{}:getIamPolicy", self.endpoints.pubsub, resource);
        self.get_json(&url, &[]).await
    }
}

#[async_trait]
impl CloudSqlApi for GoogleApiClient {
    async fn list_instances(
        &self,
        project: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<DatabaseInstance>> {
        let url = format!("{}/projects/{}/instances", self.endpoints.sqladmin, project);
        let list: ItemList<DatabaseInstance> = self
            .get_json(&url, &paging_query("maxResults", page_size, page_token))
            .await?;
        Ok(Page::new(list.items, list.next_page_token))
    }

    async fn list_databases(&self, project: &str, instance: &str) -> Result<Vec<Database>> {
        let url = format!(
            "{}/projects/{}/instances/{}/databases",
            self.endpoints.sqladmin, project, instance
        );
        let list: ItemList<Database> = self.get_json(&url, &[]).await?;
        Ok(list.items)
    }

    async fn list_users(&self, project: &str, instance: &str) -> Result<Vec<User>> {
        let url = format!(
            "{}/projects/{}/instances/{}/users",
            self.endpoints.sqladmin, project, instance
        );
        let list: ItemList<User> = self.get_json(&url, &[]).await?;
        Ok(list.items)
    }
}

#[async_trait]
impl StorageApi for GoogleApiClient {
    async fn list_buckets(
        &self,
        project: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<Page<Bucket>> {
        let url = format!("{}/b", self.endpoints.storage);
        let mut query = paging_query("maxResults", page_size, page_token);
        query.push(("project", project.to_string()));

        let list: ItemList<Bucket> = self.get_json(&url, &query).await?;
        Ok(Page::new(list.items, list.next_page_token))
    }

    async fn get_bucket_iam_policy(&self, bucket: &str) -> Result<Policy> {
        let url = format!("{}/b/{}/iam", self.endpoints.storage, bucket);
        self.get_json(&url, &[]).await
    }

    async fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>> {
        let mut url = reqwest::Url::parse(&self.endpoints.storage)
            .map_err(|e| GoogleError::InvalidUrl(format!("{}: {}", self.endpoints.storage, e)))?;
        // Object names contain '/', which must be escaped as a single segment
        url.path_segments_mut()
            .map_err(|_| GoogleError::InvalidUrl(self.endpoints.storage.clone()))?
            .extend(["b", bucket, "o", object]);
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.send(url).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
