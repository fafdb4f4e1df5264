//! Recorded state snapshots
//!
//! A snapshot is a JSON object with a top-level `resources` list. Entries
//! are read leniently: a malformed entry is skipped with a warning, only a
//! missing `resources` list rejects the whole snapshot.

use crate::error::DriftError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One resource entry from a state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    #[serde(rename = "type")]
    pub resource_type: String,

    pub name: String,

    pub provider: String,

    pub id: String,

    pub attributes: HashMap<String, Value>,
}

impl ResourceState {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: "google".to_string(),
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Parsed state snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    pub resources: Vec<ResourceState>,
}

impl StateSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(data: &[u8]) -> Result<Self, DriftError> {
        let root: Value = serde_json::from_slice(data)?;
        let entries = root
            .get("resources")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                DriftError::InvalidSnapshot("resources not found".to_string())
            })?;

        let mut resources = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let Some(entry) = entry.as_object() else {
                tracing::warn!("Skipping state entry #{}: not an object", index);
                continue;
            };

            if entry.contains_key("id") {
                match parse_flat_entry(entry) {
                    Some(state) => resources.push(state),
                    None => tracing::warn!("Skipping malformed state entry #{}", index),
                }
            } else if let Some(instances) = entry.get("instances").and_then(Value::as_array) {
                // Terraform's native layout: one entry per address, ids live
                // in instances[].attributes
                let expanded = parse_instances(entry, instances);
                if expanded.is_empty() {
                    tracing::warn!("Skipping state entry #{}: no usable instances", index);
                }
                resources.extend(expanded);
            } else {
                tracing::warn!("Skipping state entry #{}: no id", index);
            }
        }

        tracing::debug!("Parsed state snapshot with {} resources", resources.len());
        Ok(Self { resources })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Lookup by native id
    pub fn by_id(&self) -> HashMap<&str, &ResourceState> {
        self.resources
            .iter()
            .map(|r| (r.id.as_str(), r))
            .collect()
    }
}

fn parse_flat_entry(entry: &Map<String, Value>) -> Option<ResourceState> {
    Some(ResourceState {
        resource_type: entry.get("type")?.as_str()?.to_string(),
        name: entry.get("name")?.as_str()?.to_string(),
        provider: entry.get("provider")?.as_str()?.to_string(),
        id: entry.get("id")?.as_str()?.to_string(),
        attributes: entry
            .get("attributes")?
            .as_object()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })
}

fn parse_instances(entry: &Map<String, Value>, instances: &[Value]) -> Vec<ResourceState> {
    let (Some(resource_type), Some(name), Some(provider)) = (
        entry.get("type").and_then(Value::as_str),
        entry.get("name").and_then(Value::as_str),
        entry.get("provider").and_then(Value::as_str),
    ) else {
        return Vec::new();
    };

    instances
        .iter()
        .filter_map(|instance| {
            let attributes = instance.get("attributes")?.as_object()?;
            let id = attributes.get("id")?.as_str()?;
            Some(ResourceState {
                resource_type: resource_type.to_string(),
                name: name.to_string(),
                provider: provider.to_string(),
                id: id.to_string(),
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })
        })
        .collect()
}

/// Where the recorded state comes from
#[async_trait]
pub trait StateSource: Send + Sync {
    /// Human readable location, used in logs
    fn describe(&self) -> String;

    /// Raw snapshot bytes
    async fn fetch(&self) -> Result<Vec<u8>, DriftError>;
}

/// State snapshot stored on the local filesystem
pub struct LocalStateSource {
    path: PathBuf,
}

impl LocalStateSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl StateSource for LocalStateSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>, DriftError> {
        let data = fs::read(&self.path).await?;
        tracing::debug!("Read {} bytes of state from {}", data.len(), self.path.display());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_parse_flat_entries() {
        let data = json!({
            "resources": [
                {
                    "type": "google_pubsub_topic",
                    "name": "orders",
                    "provider": "google",
                    "id": "projects/p/topics/orders",
                    "attributes": {"name": "orders"}
                }
            ]
        });
        let snapshot = StateSnapshot::parse(data.to_string().as_bytes()).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.resources[0].id, "projects/p/topics/orders");
        assert_eq!(snapshot.resources[0].attributes["name"], json!("orders"));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let data = json!({
            "resources": [
                "not an object",
                {"type": "google_pubsub_topic", "name": "a", "provider": "google", "id": 42, "attributes": {}},
                {"type": "google_pubsub_topic", "name": "b", "provider": "google", "id": "x"},
                {"type": "google_pubsub_topic", "name": "c", "provider": "google", "id": "y", "attributes": {}},
                {"name": "no-id"}
            ]
        });
        let snapshot = StateSnapshot::parse(data.to_string().as_bytes()).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.resources[0].name, "c");
    }

    #[test]
    fn test_missing_resources_is_fatal() {
        let err = StateSnapshot::parse(b"{}").unwrap_err();
        assert!(matches!(err, DriftError::InvalidSnapshot(_)));

        let err = StateSnapshot::parse(b"not json").unwrap_err();
        assert!(matches!(err, DriftError::Json(_)));
    }

    #[test]
    fn test_terraform_instances_layout() {
        let data = json!({
            "version": 4,
            "resources": [
                {
                    "mode": "managed",
                    "type": "google_storage_bucket",
                    "name": "assets",
                    "provider": "provider[\"registry.terraform.io/hashicorp/google\"]",
                    "instances": [
                        {"attributes": {"id": "assets", "location": "US"}},
                        {"attributes": {"location": "EU"}}
                    ]
                }
            ]
        });
        let snapshot = StateSnapshot::parse(data.to_string().as_bytes()).unwrap();

        assert_eq!(snapshot.len(), 1);
        let bucket = &snapshot.resources[0];
        assert_eq!(bucket.id, "assets");
        assert_eq!(bucket.resource_type, "google_storage_bucket");
        assert_eq!(bucket.attributes["location"], json!("US"));
    }

    #[tokio::test]
    async fn test_local_state_source() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, r#"{"resources": []}"#).unwrap();

        let source = LocalStateSource::new(&path);
        let data = source.fetch().await.unwrap();
        assert!(StateSnapshot::parse(&data).unwrap().is_empty());

        let missing = LocalStateSource::new(temp_dir.path().join("missing.json"));
        assert!(matches!(missing.fetch().await, Err(DriftError::Io(_))));
    }
}
