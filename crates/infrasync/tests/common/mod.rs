//! In-memory stand-ins for adapters, the connector and the provisioner

#![allow(dead_code)]

use async_trait::async_trait;
use infrasync_core::{
    Connector, DiscoveryError, Provider, Resource, ResourceImporter, ResourceIterator,
    ResourceType, Service,
};
use infrasync_provision::{ImportRequest, ProvisionError, Provisioner};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const PROJECT: &str = "p";

pub fn provider() -> Provider {
    Provider::google(PROJECT)
}

/// Bare topic `name` in `project`
pub fn topic_in(project: &str, name: &str) -> Resource {
    Resource::new(
        Provider::google(project),
        ResourceType::PubSubTopic,
        name,
        format!("projects/{}/topics/{}", project, name),
    )
}

/// `orders-topic` with a `roles/viewer` binding
pub fn orders_topic() -> Resource {
    let topic_id = format!("projects/{}/topics/orders-topic", PROJECT);
    let binding = Resource::new(
        provider(),
        ResourceType::PubSubTopicIamBinding,
        "orders_topic_roles_viewer",
        format!("{} roles/viewer", topic_id),
    )
    .with_attribute("role", json!("roles/viewer"))
    .with_attribute("members", json!(["user:a@example.com", "user:b@example.com"]));

    Resource::new(provider(), ResourceType::PubSubTopic, "orders_topic", topic_id)
        .with_attribute("name", json!("orders-topic"))
        .with_dependents([binding])
}

pub fn subscription(name: &str, ack_deadline_seconds: u64) -> Resource {
    Resource::new(
        provider(),
        ResourceType::PubSubSubscription,
        name,
        format!("projects/{}/subscriptions/{}", PROJECT, name),
    )
    .with_attribute(
        "topic",
        json!(format!("projects/{}/topics/orders-topic", PROJECT)),
    )
    .with_attribute("ack_deadline_seconds", json!(ack_deadline_seconds))
}

pub fn bucket(name: &str) -> Resource {
    Resource::new(provider(), ResourceType::StorageBucket, name, name)
        .with_attribute("location", json!("US"))
        .with_attribute("storage_class", json!("STANDARD"))
}

/// Iterator over a fixed list, optionally failing once the list runs out
pub struct FakeIterator {
    items: VecDeque<Resource>,
    fail_at_end: Option<DiscoveryError>,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
}

#[async_trait]
impl ResourceIterator for FakeIterator {
    async fn next(&mut self) -> infrasync_core::Result<Option<Resource>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DiscoveryError::IteratorClosed);
        }
        if self.cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        match self.items.pop_front() {
            Some(resource) => Ok(Some(resource)),
            None => match &self.fail_at_end {
                Some(e) => Err(e.clone()),
                None => Ok(None),
            },
        }
    }

    fn close(&mut self) -> infrasync_core::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeImporter {
    pub provider: Provider,
    pub service: Service,
    pub resources: Vec<Resource>,
    pub fail_at_end: Option<DiscoveryError>,
    pub closed: Arc<AtomicBool>,
}

impl FakeImporter {
    pub fn new(service: Service, resources: Vec<Resource>) -> Self {
        Self {
            provider: provider(),
            service,
            resources,
            fail_at_end: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing(mut self, error: DiscoveryError) -> Self {
        self.fail_at_end = Some(error);
        self
    }
}

impl ResourceImporter for FakeImporter {
    fn service(&self) -> Service {
        self.service
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn import(&self, cancel: CancellationToken) -> Box<dyn ResourceIterator + '_> {
        Box::new(FakeIterator {
            items: self.resources.clone().into(),
            fail_at_end: self.fail_at_end.clone(),
            closed: self.closed.clone(),
            cancel,
        })
    }

    fn close(self: Box<Self>) {}
}

/// Serves a fixed resource list per project and service
#[derive(Default)]
pub struct FakeConnector {
    pub resources: HashMap<(String, Service), Vec<Resource>>,
    pub failing: HashSet<Service>,
}

impl FakeConnector {
    pub fn with(self, service: Service, resources: Vec<Resource>) -> Self {
        self.with_project(PROJECT, service, resources)
    }

    pub fn with_project(
        mut self,
        project: &str,
        service: Service,
        resources: Vec<Resource>,
    ) -> Self {
        self.resources.insert((project.to_string(), service), resources);
        self
    }

    pub fn failing(mut self, service: Service) -> Self {
        self.failing.insert(service);
        self
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        provider: &Provider,
        service: Service,
    ) -> infrasync_core::Result<Box<dyn ResourceImporter>> {
        let resources = self
            .resources
            .get(&(provider.project_id.clone(), service))
            .cloned()
            .unwrap_or_default();
        let mut importer = FakeImporter::new(service, resources);
        importer.provider = provider.clone();
        if self.failing.contains(&service) {
            importer = importer.failing(DiscoveryError::Api("permission denied".to_string()));
        }
        Ok(Box::new(importer))
    }
}

/// Writes a one-line definition for every import, like the real tool
#[derive(Default)]
pub struct FakeProvisioner {
    pub imports: Mutex<Vec<ImportRequest>>,
    pub already_managed: HashSet<String>,
    pub failing: HashSet<String>,
    pub generated: AtomicUsize,
}

impl FakeProvisioner {
    pub fn imported_ids(&self) -> Vec<String> {
        self.imports
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn initialize(&self) -> infrasync_provision::Result<()> {
        Ok(())
    }

    async fn import(&self, request: &ImportRequest) -> infrasync_provision::Result<()> {
        self.imports.lock().unwrap().push(request.clone());

        if self.already_managed.contains(&request.id) {
            return Err(ProvisionError::AlreadyExists(request.address()));
        }
        if self.failing.contains(&request.id) {
            return Err(ProvisionError::CommandFailed {
                command: "terraform plan".to_string(),
                stderr: "Error: quota exceeded".to_string(),
            });
        }

        if let Some(parent) = request.definition_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(
            &request.definition_path,
            format!("resource \"{}\" \"{}\" {{}}\n", request.resource_type, request.name),
        )
        .await?;
        Ok(())
    }

    async fn generate(&self) -> infrasync_provision::Result<Vec<PathBuf>> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}
