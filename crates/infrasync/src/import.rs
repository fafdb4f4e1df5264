//! Import orchestration
//!
//! Drains one service adapter and asks the provisioner to write a
//! declarative definition for every resource it yields. Resources that
//! already have a definition are never touched again, so a run can be
//! repeated after a partial failure.

use crate::error::ImportError;
use futures_util::stream::{self, StreamExt};
use infrasync_core::{Provider, Resource, ResourceImporter, ResourceIterator, Service};
use infrasync_provision::{ArtifactLayout, ImportRequest, ProvisionError, Provisioner};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Counts of one import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub already_present: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.imported + self.already_present
    }
}

impl std::ops::AddAssign for ImportSummary {
    fn add_assign(&mut self, other: Self) {
        self.imported += other.imported;
        self.already_present += other.already_present;
    }
}

/// Outcome of one service in [`ImportOrchestrator::import_all`]
#[derive(Debug)]
pub struct ServiceImport {
    pub provider: Provider,
    pub service: Service,
    pub result: Result<ImportSummary, ImportError>,
}

enum Outcome {
    Imported,
    AlreadyPresent,
}

pub struct ImportOrchestrator {
    layout: ArtifactLayout,
    provisioner: Arc<dyn Provisioner>,
}

impl ImportOrchestrator {
    pub fn new(layout: ArtifactLayout, provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            layout,
            provisioner,
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Import everything one adapter yields
    pub async fn run(
        &self,
        importer: &dyn ResourceImporter,
        cancel: CancellationToken,
    ) -> Result<ImportSummary, ImportError> {
        tracing::info!(
            "Importing {} resources of project {}",
            importer.service(),
            importer.provider().project_id
        );

        let mut iter = importer.import(cancel);
        let outcome = self.drain(iter.as_mut()).await;
        let closed = iter.close();

        let summary = outcome?;
        closed?;

        tracing::info!(
            "{}: {} imported, {} already present",
            importer.service(),
            summary.imported,
            summary.already_present
        );
        Ok(summary)
    }

    async fn drain(
        &self,
        iter: &mut (dyn ResourceIterator + '_),
    ) -> Result<ImportSummary, ImportError> {
        let mut summary = ImportSummary::default();
        let mut seen = HashSet::new();

        while let Some(resource) = iter.next().await? {
            for resource in resource.flatten() {
                if !seen.insert(resource.id.clone()) {
                    tracing::info!(resource = %resource.id, "Already imported in this run");
                    summary.already_present += 1;
                    continue;
                }

                match self.import_one(&resource).await? {
                    Outcome::Imported => summary.imported += 1,
                    Outcome::AlreadyPresent => summary.already_present += 1,
                }
            }
        }

        Ok(summary)
    }

    async fn import_one(&self, resource: &Resource) -> Result<Outcome, ImportError> {
        if self.layout.definition_exists(resource).await? {
            tracing::info!(
                resource = %resource.id,
                "Definition already exists, skipping {}",
                resource.address()
            );
            return Ok(Outcome::AlreadyPresent);
        }

        self.layout.write_intent(resource).await?;

        let request = ImportRequest::new(resource, self.layout.definition_path(resource));
        match self.provisioner.import(&request).await {
            Ok(()) => {
                self.layout.remove_intent(resource).await?;
                Ok(Outcome::Imported)
            }
            Err(ProvisionError::AlreadyExists(_)) => {
                tracing::info!(resource = %resource.id, "Already managed: {}", resource.address());
                self.layout.remove_intent(resource).await?;
                Ok(Outcome::AlreadyPresent)
            }
            Err(source) => Err(ImportError::Resource {
                id: resource.id.clone(),
                source,
            }),
        }
    }

    /// Run several adapters with at most `concurrency` in flight. Every
    /// adapter is closed afterwards and every outcome is reported.
    pub async fn import_all(
        &self,
        importers: Vec<Box<dyn ResourceImporter>>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Vec<ServiceImport> {
        stream::iter(importers)
            .map(|importer| {
                let cancel = cancel.clone();
                async move {
                    let result = self.run(importer.as_ref(), cancel).await;
                    let provider = importer.provider().clone();
                    let service = importer.service();
                    importer.close();
                    ServiceImport {
                        provider,
                        service,
                        result,
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }
}
