//! Service adapter construction

use crate::api::GoogleApiClient;
use crate::auth::resolve_token;
use crate::cloudsql::CloudSqlImporter;
use crate::error::Result;
use crate::gcloud::{Gcloud, GcloudSqlClient};
use crate::pubsub::PubSubImporter;
use crate::storage::StorageImporter;
use async_trait::async_trait;
use infrasync_core::iterator::DEFAULT_PAGE_SIZE;
use infrasync_core::{Connector, DiscoveryError, Provider, ResourceImporter, Service};
use std::path::Path;

/// Where Cloud SQL instances are listed from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SqlListing {
    /// `gcloud sql instances list`
    #[default]
    Gcloud,
    /// Cloud SQL Admin REST API
    Api,
}

/// Builds Google service adapters sharing one authenticated client
pub struct GoogleConnector {
    client: GoogleApiClient,
    gcloud: Gcloud,
    sql_listing: SqlListing,
    page_size: usize,
}

impl GoogleConnector {
    pub fn new(client: GoogleApiClient, gcloud: Gcloud) -> Self {
        Self {
            client,
            gcloud,
            sql_listing: SqlListing::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Authenticate with an optional service account key file
    pub async fn from_credentials(credentials: Option<&Path>) -> Result<Self> {
        let gcloud = match credentials {
            Some(path) => Gcloud::new().with_credentials(path),
            None => Gcloud::new(),
        };
        let token = resolve_token(&gcloud).await?;
        Ok(Self::new(GoogleApiClient::new(token), gcloud))
    }

    pub fn with_sql_listing(mut self, sql_listing: SqlListing) -> Self {
        self.sql_listing = sql_listing;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn client(&self) -> &GoogleApiClient {
        &self.client
    }
}

#[async_trait]
impl Connector for GoogleConnector {
    async fn connect(
        &self,
        provider: &Provider,
        service: Service,
    ) -> infrasync_core::Result<Box<dyn ResourceImporter>> {
        tracing::debug!(
            "Connecting {} adapter for project {}",
            service,
            provider.project_id
        );

        let importer: Box<dyn ResourceImporter> = match service {
            Service::PubSub => Box::new(
                PubSubImporter::new(self.client.clone(), provider.clone())
                    .with_page_size(self.page_size),
            ),
            Service::CloudSql => match self.sql_listing {
                SqlListing::Gcloud => {
                    self.gcloud
                        .check_installed()
                        .await
                        .map_err(|e| DiscoveryError::ClientInit(e.to_string()))?;
                    Box::new(
                        CloudSqlImporter::new(
                            GcloudSqlClient::new(self.gcloud.clone(), self.client.clone()),
                            provider.clone(),
                        )
                        .with_page_size(self.page_size),
                    )
                }
                SqlListing::Api => Box::new(
                    CloudSqlImporter::new(self.client.clone(), provider.clone())
                        .with_page_size(self.page_size),
                ),
            },
            Service::Storage => Box::new(
                StorageImporter::new(self.client.clone(), provider.clone())
                    .with_page_size(self.page_size),
            ),
        };

        Ok(importer)
    }
}
