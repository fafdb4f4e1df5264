//! Configuration file model

use crate::error::{ConfigError, Result};
use infrasync_core::{Provider, Service};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default object key of a remote state snapshot
pub const DEFAULT_STATE_KEY: &str = "terraform/state/default.tfstate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub name: String,

    /// Output directory of declarative files
    #[serde(default = "default_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub providers: Providers,

    #[serde(default)]
    pub backend: Option<Backend>,

    #[serde(default)]
    pub provisioner: ProvisionerKind,
}

fn default_path() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Providers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleProvider>,

    /// Anything else is rejected by validation
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleProvider {
    /// Service account key file; ambient credentials when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<PathBuf>,

    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Gcs,
    Local,
}

/// Where the recorded state snapshot lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    #[serde(rename = "type")]
    pub backend_type: BackendType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Validated backend location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateLocation {
    Gcs { bucket: String, key: String },
    Local { path: PathBuf },
}

impl Backend {
    pub fn location(&self) -> Result<StateLocation> {
        match self.backend_type {
            BackendType::Gcs => {
                let bucket = self
                    .bucket
                    .clone()
                    .filter(|b| !b.trim().is_empty())
                    .ok_or(ConfigError::MissingBackendBucket)?;
                let key = self
                    .key
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STATE_KEY.to_string());
                Ok(StateLocation::Gcs { bucket, key })
            }
            BackendType::Local => {
                let path = self
                    .path
                    .clone()
                    .filter(|p| !p.as_os_str().is_empty())
                    .ok_or(ConfigError::MissingBackendPath)?;
                Ok(StateLocation::Local { path })
            }
        }
    }
}

/// Declarative tool flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionerKind {
    #[default]
    Terraform,
    Tofu,
}

impl ProvisionerKind {
    pub fn binary(&self) -> &'static str {
        match self {
            ProvisionerKind::Terraform => "terraform",
            ProvisionerKind::Tofu => "tofu",
        }
    }
}

impl Config {
    /// Parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = self.providers.other.keys().next() {
            return Err(ConfigError::UnsupportedProvider(name.clone()));
        }

        let google = self
            .providers
            .google
            .as_ref()
            .ok_or(ConfigError::NoProviders)?;
        if google.projects.is_empty() {
            return Err(ConfigError::NoProjects);
        }

        for project in &google.projects {
            if project.id.trim().is_empty() {
                return Err(ConfigError::MissingProjectId);
            }
            if project.services.is_empty() {
                return Err(ConfigError::NoServices(project.id.clone()));
            }
            for service in &project.services {
                if service.parse::<Service>().is_err() {
                    return Err(ConfigError::UnknownService {
                        project: project.id.clone(),
                        service: service.clone(),
                    });
                }
            }
        }

        if let Some(backend) = &self.backend {
            backend.location()?;
        }

        Ok(())
    }

    /// Every configured project as a provider
    pub fn providers(&self) -> Vec<Provider> {
        self.providers
            .google
            .iter()
            .flat_map(|google| &google.projects)
            .map(|project| {
                let provider = Provider::google(&project.id);
                match &project.region {
                    Some(region) => provider.with_region(region),
                    None => provider,
                }
            })
            .collect()
    }

    /// Services configured for `provider`, deduplicated in configured order
    pub fn services(&self, provider: &Provider) -> Vec<Service> {
        let mut services = Vec::new();
        let projects = self
            .providers
            .google
            .iter()
            .flat_map(|google| &google.projects)
            .filter(|project| project.id == provider.project_id);
        for project in projects {
            for service in project.services.iter().filter_map(|s| s.parse::<Service>().ok()) {
                if !services.contains(&service) {
                    services.push(service);
                }
            }
        }
        services
    }

    pub fn credentials(&self) -> Option<&Path> {
        self.providers
            .google
            .as_ref()
            .and_then(|google| google.credentials.as_deref())
    }

    pub fn state_location(&self) -> Result<Option<StateLocation>> {
        self.backend.as_ref().map(Backend::location).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name: my-infra
path: ./infra
providers:
  google:
    credentials: /keys/sa.json
    projects:
      - id: my-project
        region: us-central1
        services: [pubsub, cloudsql, storage]
      - id: other
        services: [storage]
backend:
  type: gcs
  bucket: my-state
provisioner: tofu
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_yaml(FULL).unwrap();

        assert_eq!(config.name, "my-infra");
        assert_eq!(config.path, PathBuf::from("./infra"));
        assert_eq!(config.provisioner, ProvisionerKind::Tofu);
        assert_eq!(config.credentials(), Some(Path::new("/keys/sa.json")));
        assert_eq!(
            config.state_location().unwrap(),
            Some(StateLocation::Gcs {
                bucket: "my-state".to_string(),
                key: DEFAULT_STATE_KEY.to_string(),
            })
        );

        let providers = config.providers();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].region.as_deref(), Some("us-central1"));
        assert_eq!(
            config.services(&providers[0]),
            vec![Service::PubSub, Service::CloudSql, Service::Storage]
        );
        assert_eq!(config.services(&providers[1]), vec![Service::Storage]);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml(
            "name: x\nproviders:\n  google:\n    projects:\n      - id: p\n        services: [pubsub]\n",
        )
        .unwrap();

        assert_eq!(config.path, PathBuf::from("."));
        assert_eq!(config.provisioner, ProvisionerKind::Terraform);
        assert_eq!(config.state_location().unwrap(), None);
        assert_eq!(config.credentials(), None);
    }

    #[test]
    fn test_unknown_service_rejected() {
        let err = Config::from_yaml(
            "name: x\nproviders:\n  google:\n    projects:\n      - id: p\n        services: [pubsub, bigquery]\n",
        )
        .unwrap_err();

        match err {
            ConfigError::UnknownService { project, service } => {
                assert_eq!(project, "p");
                assert_eq!(service, "bigquery");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            Config::from_yaml("name: x\n"),
            Err(ConfigError::NoProviders)
        ));
        assert!(matches!(
            Config::from_yaml("name: x\nproviders:\n  aws: {}\n"),
            Err(ConfigError::UnsupportedProvider(p)) if p == "aws"
        ));
        assert!(matches!(
            Config::from_yaml("name: x\nproviders:\n  google:\n    projects: []\n"),
            Err(ConfigError::NoProjects)
        ));
        assert!(matches!(
            Config::from_yaml("name: x\nproviders:\n  google:\n    projects:\n      - id: p\n"),
            Err(ConfigError::NoServices(p)) if p == "p"
        ));
        assert!(matches!(
            Config::from_yaml(
                "name: x\nproviders:\n  google:\n    projects:\n      - id: p\n        services: [pubsub]\nbackend:\n  type: gcs\n"
            ),
            Err(ConfigError::MissingBackendBucket)
        ));
        assert!(matches!(
            Config::from_yaml(
                "name: x\nproviders:\n  google:\n    projects:\n      - id: p\n        services: [pubsub]\nbackend:\n  type: local\n"
            ),
            Err(ConfigError::MissingBackendPath)
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = Config::from_yaml(FULL).unwrap();
        let reparsed = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(config, reparsed);
    }
}
