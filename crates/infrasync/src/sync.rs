//! Drift synchronization
//!
//! Compares what each configured service reports live against the recorded
//! state snapshot, then brings the output directory up to date.

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use infrasync_core::{
    Connector, DiscoveryError, DriftDetector, DriftResult, Provider, Resource, Service,
    StateSnapshot, StateSource, collect_resources,
};
use infrasync_provision::{ArtifactLayout, Provisioner};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Report only, write nothing
    pub dry_run: bool,
    /// Also report recorded resources that no longer exist
    pub detect_removals: bool,
}

/// Services to compare for one project
#[derive(Debug, Clone)]
pub struct SyncTarget {
    pub provider: Provider,
    pub services: Vec<Service>,
}

/// Summary of one sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub drift_detected: bool,
    pub resources_drifted: usize,
    pub resources_added: usize,
    pub resources_removed: usize,
    pub output_dir: PathBuf,
    pub drift: Vec<DriftResult>,
    pub failed_services: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct SyncCoordinator {
    connector: Box<dyn Connector>,
    state: Box<dyn StateSource>,
    provisioner: Arc<dyn Provisioner>,
    layout: ArtifactLayout,
    detector: DriftDetector,
    targets: Vec<SyncTarget>,
    options: SyncOptions,
}

impl SyncCoordinator {
    pub fn new(
        connector: Box<dyn Connector>,
        state: Box<dyn StateSource>,
        provisioner: Arc<dyn Provisioner>,
        layout: ArtifactLayout,
    ) -> Self {
        Self {
            connector,
            state,
            provisioner,
            layout,
            detector: DriftDetector::new(),
            targets: Vec::new(),
            options: SyncOptions::default(),
        }
    }

    pub fn with_target(mut self, provider: Provider, services: Vec<Service>) -> Self {
        self.targets.push(SyncTarget { provider, services });
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_detector(mut self, detector: DriftDetector) -> Self {
        self.detector = detector;
        self
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<SyncResult, SyncError> {
        let snapshot = self.load_snapshot().await?;
        tracing::info!(
            "Loaded {} recorded resources from {}",
            snapshot.len(),
            self.state.describe()
        );

        let mut live = Vec::new();
        let mut requested: HashSet<Service> = HashSet::new();
        let mut incomplete: HashSet<Service> = HashSet::new();
        let mut failed_services = Vec::new();

        for target in &self.targets {
            for &service in &target.services {
                requested.insert(service);
                match self.discover(&target.provider, service, cancel.clone()).await {
                    Ok(resources) => {
                        tracing::info!(
                            "{}/{}: {} live resources",
                            target.provider.project_id,
                            service,
                            resources.len()
                        );
                        live.extend(resources);
                    }
                    Err(DiscoveryError::Cancelled) => return Err(SyncError::Cancelled),
                    Err(e) => {
                        tracing::error!(
                            "Failed to sync {} for project {}: {}",
                            service,
                            target.provider.project_id,
                            e
                        );
                        incomplete.insert(service);
                        failed_services.push(format!("{}/{}", target.provider.project_id, service));
                    }
                }
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
            }
        }

        let results = self.detector.detect_resources(&live, &snapshot);
        let by_id: HashMap<&str, &Resource> = live.iter().map(|r| (r.id.as_str(), r)).collect();
        let added: Vec<Resource> = results
            .iter()
            .filter(|r| r.is_added())
            .filter_map(|r| by_id.get(r.resource_id.as_str()))
            .map(|r| (*r).clone())
            .collect();
        let mut drift = results;

        if self.options.detect_removals {
            // A service proves absence only once every project listed it completely
            let synced: Vec<Service> = requested.difference(&incomplete).copied().collect();
            drift.extend(self.detector.detect_removals(&live, &snapshot, &synced));
        }

        let resources_added = drift.iter().filter(|r| r.is_added()).count();
        let resources_removed = drift.iter().filter(|r| r.is_removed()).count();
        let resources_drifted = drift.len() - resources_added - resources_removed;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        if !self.options.dry_run {
            self.write_artifacts(&added, resources_drifted > 0).await?;
        }

        let result = SyncResult {
            drift_detected: !drift.is_empty(),
            resources_drifted,
            resources_added,
            resources_removed,
            output_dir: self.layout.root().to_path_buf(),
            drift,
            failed_services,
            timestamp: Utc::now(),
        };
        tracing::info!(
            drifted = result.resources_drifted,
            added = result.resources_added,
            removed = result.resources_removed,
            "Sync finished"
        );
        Ok(result)
    }

    async fn load_snapshot(&self) -> Result<StateSnapshot, SyncError> {
        match self.state.fetch().await {
            Ok(data) => Ok(StateSnapshot::parse(&data)?),
            Err(e) => {
                tracing::warn!(
                    "Could not read state from {}, comparing against empty state: {}",
                    self.state.describe(),
                    e
                );
                Ok(StateSnapshot::empty())
            }
        }
    }

    async fn discover(
        &self,
        provider: &Provider,
        service: Service,
        cancel: CancellationToken,
    ) -> infrasync_core::Result<Vec<Resource>> {
        let importer = self.connector.connect(provider, service).await?;
        let resources = collect_resources(importer.import(cancel)).await;
        importer.close();
        Ok(resources?.into_iter().flat_map(Resource::flatten).collect())
    }

    async fn write_artifacts(&self, added: &[Resource], regenerate: bool) -> Result<(), SyncError> {
        for resource in added {
            if self.layout.definition_exists(resource).await? {
                continue;
            }
            let path = self.layout.write_intent(resource).await?;
            tracing::info!(resource = %resource.id, "New resource, wrote {}", path.display());
        }

        if regenerate {
            let written = self.provisioner.generate().await?;
            tracing::info!("Regenerated {} definition files", written.len());
        }
        Ok(())
    }
}
