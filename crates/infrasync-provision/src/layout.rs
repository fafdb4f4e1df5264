//! On-disk artifact layout
//!
//! ```text
//! {root}/
//! ├── resources/{provider}/{project}/{service}/{name}.tf   definitions
//! ├── imports/{provider}/{project}/{service}/{name}.tf     pending import intents
//! └── generated/{type}/{name}.tf                           regenerated from state
//! ```

use crate::error::Result;
use infrasync_core::Resource;
use std::path::{Path, PathBuf};
use tokio::fs;

const RESOURCES_DIR: &str = "resources";
const IMPORTS_DIR: &str = "imports";
const GENERATED_DIR: &str = "generated";

/// Paths of every artifact under an output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scoped(&self, base: &str, resource: &Resource) -> PathBuf {
        self.root
            .join(base)
            .join(resource.provider.kind.as_str())
            .join(&resource.provider.project_id)
            .join(resource.service.as_str())
    }

    pub fn definition_path(&self, resource: &Resource) -> PathBuf {
        self.scoped(RESOURCES_DIR, resource)
            .join(format!("{}.tf", resource.name))
    }

    pub fn intent_path(&self, resource: &Resource) -> PathBuf {
        self.scoped(IMPORTS_DIR, resource)
            .join(format!("{}.tf", resource.name))
    }

    pub fn generated_path(&self, resource_type: &str, name: &str) -> PathBuf {
        self.root
            .join(GENERATED_DIR)
            .join(resource_type)
            .join(format!("{}.tf", name))
    }

    pub async fn definition_exists(&self, resource: &Resource) -> Result<bool> {
        Ok(fs::try_exists(self.definition_path(resource)).await?)
    }

    /// Write the import intent of `resource`, returning its path
    pub async fn write_intent(&self, resource: &Resource) -> Result<PathBuf> {
        let path = self.intent_path(resource);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, import_block(&resource.address(), &resource.id)).await?;
        tracing::debug!("Wrote import intent {}", path.display());
        Ok(path)
    }

    /// Remove the import intent of `resource`. Missing intents are fine.
    pub async fn remove_intent(&self, resource: &Resource) -> Result<()> {
        match fs::remove_file(self.intent_path(resource)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `import` block binding `address` to the native `id`
pub fn import_block(address: &str, id: &str) -> String {
    format!(
        "import {{\n  to = {}\n  id = {}\n}}\n",
        address,
        crate::hcl::quote(id)
    )
}
