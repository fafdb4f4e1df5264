//! Drift detection between live resources and a recorded state snapshot

use crate::error::DriftError;
use crate::model::{Resource, ResourceType, Service};
use crate::state::{ResourceState, StateSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Synthetic attribute reported when a resource exists on one side only
pub const EXISTENCE: &str = "existence";

/// Change of a single attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub old: Value,
    pub new: Value,
}

/// Result of comparing one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    pub resource_type: String,
    pub resource_name: String,
    pub resource_id: String,
    pub has_drift: bool,
    pub changes: BTreeMap<String, Change>,
}

impl DriftResult {
    pub fn new(
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            resource_id: resource_id.into(),
            has_drift: false,
            changes: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, attribute: impl Into<String>, old: Value, new: Value) {
        self.changes.insert(attribute.into(), Change { old, new });
        self.has_drift = true;
    }

    /// Live resource that was never recorded
    pub fn is_added(&self) -> bool {
        self.existence_change() == Some((false, true))
    }

    /// Recorded resource that no longer exists
    pub fn is_removed(&self) -> bool {
        self.existence_change() == Some((true, false))
    }

    fn existence_change(&self) -> Option<(bool, bool)> {
        let change = self.changes.get(EXISTENCE)?;
        Some((change.old.as_bool()?, change.new.as_bool()?))
    }
}

/// How an attribute is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Plain value equality
    Exact,
    /// List of strings compared as a set
    Unordered,
}

/// An attribute checked for drift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparedField {
    pub name: &'static str,
    pub comparison: Comparison,
}

const fn exact(name: &'static str) -> ComparedField {
    ComparedField {
        name,
        comparison: Comparison::Exact,
    }
}

const fn unordered(name: &'static str) -> ComparedField {
    ComparedField {
        name,
        comparison: Comparison::Unordered,
    }
}

const IAM_FIELDS: &[ComparedField] = &[unordered("members"), exact("role")];
const SUBSCRIPTION_FIELDS: &[ComparedField] = &[exact("topic"), exact("ack_deadline_seconds")];
const INSTANCE_FIELDS: &[ComparedField] = &[exact("database_version"), exact("region")];
const DATABASE_FIELDS: &[ComparedField] = &[exact("charset"), exact("collation")];
const USER_FIELDS: &[ComparedField] = &[exact("host")];
const BUCKET_FIELDS: &[ComparedField] = &[exact("location"), exact("storage_class")];

/// Attributes compared for each resource type unless overridden
pub fn default_fields(resource_type: ResourceType) -> &'static [ComparedField] {
    match resource_type {
        ResourceType::PubSubTopicIamBinding
        | ResourceType::PubSubSubscriptionIamBinding
        | ResourceType::StorageBucketIamBinding => IAM_FIELDS,
        ResourceType::PubSubSubscription => SUBSCRIPTION_FIELDS,
        ResourceType::SqlDatabaseInstance => INSTANCE_FIELDS,
        ResourceType::SqlDatabase => DATABASE_FIELDS,
        ResourceType::SqlUser => USER_FIELDS,
        ResourceType::StorageBucket => BUCKET_FIELDS,
        ResourceType::PubSubTopic => &[],
    }
}

/// Compares live resources against recorded state
#[derive(Debug, Default)]
pub struct DriftDetector {
    overrides: HashMap<ResourceType, Vec<ComparedField>>,
}

impl DriftDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the compared attributes for one resource type
    pub fn with_fields(mut self, resource_type: ResourceType, fields: Vec<ComparedField>) -> Self {
        self.overrides.insert(resource_type, fields);
        self
    }

    fn fields_for(&self, resource_type: ResourceType) -> &[ComparedField] {
        self.overrides
            .get(&resource_type)
            .map(Vec::as_slice)
            .unwrap_or_else(|| default_fields(resource_type))
    }

    /// Compare one live resource with its recorded state
    pub fn detect(
        &self,
        resource: &Resource,
        state: &ResourceState,
    ) -> Result<DriftResult, DriftError> {
        let mut result = DriftResult::new(
            resource.resource_type.as_str(),
            &resource.name,
            &resource.id,
        );

        for field in self.fields_for(resource.resource_type) {
            // Attributes the adapter did not capture cannot drift
            let Some(live) = resource.attributes.get(field.name) else {
                continue;
            };
            let recorded = state.attributes.get(field.name).unwrap_or(&Value::Null);

            let (old, new) = match field.comparison {
                Comparison::Exact => (recorded.clone(), live.clone()),
                Comparison::Unordered => (
                    normalize_list(&resource.id, field.name, recorded)?,
                    normalize_list(&resource.id, field.name, live)?,
                ),
            };

            if old != new {
                result.record(field.name, old, new);
            }
        }

        Ok(result)
    }

    /// Compare live resources with a snapshot, returning only resources that
    /// drifted. Snapshot entries without a live counterpart are ignored here,
    /// see [`detect_removals`](Self::detect_removals).
    pub fn detect_resources(
        &self,
        resources: &[Resource],
        snapshot: &StateSnapshot,
    ) -> Vec<DriftResult> {
        let recorded = snapshot.by_id();
        let mut results = Vec::new();

        for resource in resources {
            let Some(state) = recorded.get(resource.id.as_str()) else {
                let mut result = DriftResult::new(
                    resource.resource_type.as_str(),
                    &resource.name,
                    &resource.id,
                );
                result.record(EXISTENCE, Value::Bool(false), Value::Bool(true));
                results.push(result);
                continue;
            };

            match self.detect(resource, state) {
                Ok(result) if result.has_drift => results.push(result),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(resource = %resource.id, "Failed to detect drift: {}", e);
                }
            }
        }

        results
    }

    /// Snapshot entries of the given services that have no live counterpart
    pub fn detect_removals(
        &self,
        resources: &[Resource],
        snapshot: &StateSnapshot,
        services: &[Service],
    ) -> Vec<DriftResult> {
        let live: HashSet<&str> = resources.iter().map(|r| r.id.as_str()).collect();

        snapshot
            .resources
            .iter()
            .filter(|state| {
                state
                    .resource_type
                    .parse::<ResourceType>()
                    .is_ok_and(|t| services.contains(&t.service()))
            })
            .filter(|state| !live.contains(state.id.as_str()))
            .map(|state| {
                let mut result =
                    DriftResult::new(&state.resource_type, &state.name, &state.id);
                result.record(EXISTENCE, Value::Bool(true), Value::Bool(false));
                result
            })
            .collect()
    }
}

/// Sort and dedupe a list of strings. `null` stays `null`.
fn normalize_list(resource: &str, attribute: &str, value: &Value) -> Result<Value, DriftError> {
    let shape_error = |reason: &str| DriftError::AttributeShape {
        resource: resource.to_string(),
        attribute: attribute.to_string(),
        reason: reason.to_string(),
    };

    match value {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => {
            let set = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| shape_error("list contains a non-string value"))
                })
                .collect::<Result<BTreeSet<String>, _>>()?;
            Ok(Value::Array(set.into_iter().map(Value::String).collect()))
        }
        _ => Err(shape_error("expected a list of strings")),
    }
}
