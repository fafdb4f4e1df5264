//! Provisioning tool seam

use crate::error::Result;
use async_trait::async_trait;
use infrasync_core::{Resource, ResourceType};
use std::path::PathBuf;

/// One resource to bind to a declarative definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub resource_type: ResourceType,
    pub name: String,
    pub id: String,
    /// Where the generated definition is written
    pub definition_path: PathBuf,
}

impl ImportRequest {
    pub fn new(resource: &Resource, definition_path: impl Into<PathBuf>) -> Self {
        Self {
            resource_type: resource.resource_type,
            name: resource.name.clone(),
            id: resource.id.clone(),
            definition_path: definition_path.into(),
        }
    }

    /// Declarative address (`type.name`)
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// External tool that materializes declarative definitions
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Prepare the working directory
    async fn initialize(&self) -> Result<()>;

    /// Bind one native resource and write its definition.
    ///
    /// Fails with [`ProvisionError::AlreadyExists`](crate::ProvisionError::AlreadyExists)
    /// when the resource is already managed.
    async fn import(&self, request: &ImportRequest) -> Result<()>;

    /// Regenerate declarative files from recorded state, returning the files
    /// written
    async fn generate(&self) -> Result<Vec<PathBuf>>;
}
