//! IAM binding dependents shared by the Pub/Sub and Storage adapters

use crate::api::Policy;
use infrasync_core::{Provider, Resource, ResourceType, sanitize_name};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// One binding resource per role of `policy` that has members.
///
/// A role listed more than once has its members merged and deduplicated.
/// `parent_key` names the attribute that points back at the parent, it is
/// set to `parent_id`.
pub(crate) fn binding_resources(
    provider: &Provider,
    binding_type: ResourceType,
    parent_name: &str,
    parent_id: &str,
    parent_key: &str,
    policy: Policy,
) -> Vec<Resource> {
    let mut roles: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for binding in policy.bindings {
        roles.entry(binding.role).or_default().extend(binding.members);
    }

    roles
        .into_iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(role, members)| {
            Resource::new(
                provider.clone(),
                binding_type,
                sanitize_name(&format!("{}_{}", parent_name, role)),
                format!("{} {}", parent_id, role),
            )
            .with_attribute(parent_key, json!(parent_id))
            .with_attribute("role", json!(role))
            .with_attribute("members", json!(members))
        })
        .collect()
}
