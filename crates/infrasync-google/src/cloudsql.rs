//! Cloud SQL adapter
//!
//! Yields one instance per `next()`. Running instances carry their
//! databases and users as dependents.

use crate::api::{CloudSqlApi, DatabaseInstance, PageCursor, User, upstream};
use async_trait::async_trait;
use infrasync_core::iterator::DEFAULT_PAGE_SIZE;
use infrasync_core::{
    DiscoveryError, PageSource, PagedIterator, Provider, Resource, ResourceImporter,
    ResourceIterator, ResourceType, Result, Service, sanitize_name,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Users managed by Cloud SQL itself
const RESERVED_USER_PREFIXES: &[&str] = &["mysql.", "cloudsqlsuperuser"];
const RESERVED_USERS: &[&str] = &[
    "cloudsqladmin",
    "cloudsqlreplica",
    "cloudsqlimportexport",
    "cloudsqlagent",
];

const STATE_RUNNABLE: &str = "RUNNABLE";

/// Cloud SQL service adapter
pub struct CloudSqlImporter<A: CloudSqlApi> {
    api: A,
    provider: Provider,
    page_size: usize,
}

impl<A: CloudSqlApi> CloudSqlImporter<A> {
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

impl<A: CloudSqlApi> ResourceImporter for CloudSqlImporter<A> {
    fn service(&self) -> Service {
        Service::CloudSql
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn import(&self, cancel: CancellationToken) -> Box<dyn ResourceIterator + '_> {
        let source = InstancePages {
            api: &self.api,
            provider: &self.provider,
            cursor: PageCursor::default(),
        };
        Box::new(PagedIterator::with_page_size(source, cancel, self.page_size))
    }

    fn close(self: Box<Self>) {
        tracing::debug!("Closing cloudsql client for {}", self.provider.project_id);
    }
}

/// Reason an instance cannot be imported, if any.
///
/// These mirror provider-side validation that would reject the generated
/// definition.
pub fn check_importable(instance: &DatabaseInstance) -> std::result::Result<(), &'static str> {
    let Some(settings) = &instance.settings else {
        return Err("instance has no settings");
    };

    if let Some(window) = &settings.maintenance_window
        && window.day == 0
        && window.hour == 0
    {
        return Err("maintenance window is set to any window");
    }

    if let Some(insights) = &settings.insights_config
        && insights.query_string_length == 0
    {
        return Err("insights query string length is zero");
    }

    Ok(())
}

/// Only running instances with storage attached are enriched
pub fn is_running(instance: &DatabaseInstance) -> bool {
    let disk_size = instance
        .settings
        .as_ref()
        .and_then(|s| s.data_disk_size_gb)
        .unwrap_or(0);
    instance.state.as_deref() == Some(STATE_RUNNABLE) && disk_size > 0
}

pub fn is_reserved_user(name: &str) -> bool {
    RESERVED_USER_PREFIXES.iter().any(|p| name.starts_with(p)) || RESERVED_USERS.contains(&name)
}

/// Import id of a SQL user, which depends on the database engine
pub fn user_id(project: &str, instance: &DatabaseInstance, user: &User) -> Result<String> {
    let version = instance.database_version.as_str();
    if version.starts_with("POSTGRES") {
        Ok(format!("{}/{}/{}", project, instance.name, user.name))
    } else if version.starts_with("MYSQL") {
        let host = user.host.as_deref().unwrap_or_default();
        Ok(format!("{}/{}/{}/{}", project, instance.name, host, user.name))
    } else {
        Err(DiscoveryError::UnsupportedEngine(version.to_string()))
    }
}

struct InstancePages<'a, A> {
    api: &'a A,
    provider: &'a Provider,
    cursor: PageCursor,
}

impl<'a, A: CloudSqlApi> InstancePages<'a, A> {
    async fn databases(
        &self,
        instance: &DatabaseInstance,
        cancel: &CancellationToken,
    ) -> Result<Vec<Resource>> {
        let project = &self.provider.project_id;
        let databases = upstream(cancel, self.api.list_databases(project, &instance.name)).await?;

        Ok(databases
            .into_iter()
            .map(|database| {
                let mut resource = Resource::new(
                    self.provider.clone(),
                    ResourceType::SqlDatabase,
                    format!(
                        "{}_{}",
                        sanitize_name(&instance.name),
                        sanitize_name(&database.name)
                    ),
                    format!(
                        "projects/{}/instances/{}/databases/{}",
                        project, instance.name, database.name
                    ),
                )
                .with_attribute("project", json!(project))
                .with_attribute("instance", json!(instance.name))
                .with_attribute("name", json!(database.name));

                if let Some(charset) = database.charset {
                    resource = resource.with_attribute("charset", json!(charset));
                }
                if let Some(collation) = database.collation {
                    resource = resource.with_attribute("collation", json!(collation));
                }
                resource
            })
            .collect())
    }

    async fn users(
        &self,
        instance: &DatabaseInstance,
        cancel: &CancellationToken,
    ) -> Result<Vec<Resource>> {
        let project = &self.provider.project_id;
        let users = upstream(cancel, self.api.list_users(project, &instance.name)).await?;

        users
            .into_iter()
            .filter(|user| !is_reserved_user(&user.name))
            .map(|user| {
                let id = user_id(project, instance, &user)?;
                let mut resource = Resource::new(
                    self.provider.clone(),
                    ResourceType::SqlUser,
                    format!(
                        "{}_{}",
                        sanitize_name(&instance.name),
                        sanitize_name(&user.name)
                    ),
                    id,
                )
                .with_attribute("project", json!(project))
                .with_attribute("instance", json!(instance.name))
                .with_attribute("name", json!(user.name));

                if let Some(host) = user.host {
                    resource = resource.with_attribute("host", json!(host));
                }
                Ok(resource)
            })
            .collect()
    }
}

#[async_trait]
impl<'a, A: CloudSqlApi> PageSource for InstancePages<'a, A> {
    type Item = DatabaseInstance;

    async fn fetch_page(&mut self, page_size: usize) -> Result<Option<Vec<DatabaseInstance>>> {
        if self.cursor.is_done() {
            return Ok(None);
        }

        let page = self
            .api
            .list_instances(&self.provider.project_id, page_size, self.cursor.token())
            .await?;
        self.cursor.advance(page.next_page_token);
        Ok(Some(page.items))
    }

    async fn enrich(
        &mut self,
        instance: DatabaseInstance,
        cancel: &CancellationToken,
    ) -> Result<Option<Resource>> {
        if let Err(reason) = check_importable(&instance) {
            tracing::info!(instance = %instance.name, "Skipping instance: {}", reason);
            return Ok(None);
        }

        let project = &self.provider.project_id;
        let mut resource = Resource::new(
            self.provider.clone(),
            ResourceType::SqlDatabaseInstance,
            sanitize_name(&instance.name),
            format!("projects/{}/instances/{}", project, instance.name),
        )
        .with_attribute("project", json!(project))
        .with_attribute("name", json!(instance.name))
        .with_attribute("database_version", json!(instance.database_version));

        if let Some(region) = &instance.region {
            resource = resource.with_attribute("region", json!(region));
        }

        if !is_running(&instance) {
            tracing::debug!(
                instance = %instance.name,
                "Instance is not running, skipping databases and users"
            );
            return Ok(Some(resource));
        }

        let databases = self.databases(&instance, cancel).await?;
        let users = self.users(&instance, cancel).await?;

        Ok(Some(resource.with_dependents(databases).with_dependents(users)))
    }
}
