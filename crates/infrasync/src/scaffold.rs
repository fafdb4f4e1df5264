//! Output directory scaffolding
//!
//! Writes the Terraform root module that imports land in: provider and
//! backend settings, project variables and a `.gitignore` for tool state.

use crate::error::ScaffoldError;
use infrasync_config::{Config, StateLocation};
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

const PROVIDER_TF: &str = r#"# Generated by InfraSync
terraform {
{%- if backend_bucket %}
  backend "gcs" {
    bucket = "{{ backend_bucket }}"
    prefix = "{{ backend_prefix }}"
  }
{%- endif %}

  required_providers {
    google = {
      source  = "hashicorp/google"
      version = "~> 6.0"
    }
  }
}

provider "google" {
  project = "{{ project_id }}"
{%- if region %}
  region  = "{{ region }}"
{%- endif %}
}
"#;

const VARIABLES_TF: &str = r#"# Generated by InfraSync
variable "project_id" {
  description = "The Google Cloud project ID"
  type        = string
  default     = "{{ project_id }}"
}

variable "region" {
  description = "The default region for resources"
  type        = string
  default     = "{{ region }}"
}
"#;

const MAIN_TF: &str = "# Generated by InfraSync\n# Imported definitions live under resources/\n";

const GITIGNORE: &str = r#"# Generated by InfraSync
.terraform/
.terraform.lock.hcl
terraform.tfstate
terraform.tfstate.backup
*.tfvars
"#;

const CONFIG_TEMPLATE: &str = r#"name: {{ name }}
path: {{ path }}

providers:
  google:
    # credentials: /path/to/service-account.json
    projects:
      - id: {{ project_id }}
        region: {{ region }}
        services:
{%- for service in services %}
          - {{ service }}
{%- endfor %}

backend:
  type: gcs
  bucket: {{ project_id }}-tfstate
  key: terraform/state/default.tfstate

provisioner: terraform
"#;

/// Files created or left alone by [`Scaffold::write`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScaffoldReport {
    pub created: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Root module files for one configuration
pub struct Scaffold {
    context: Context,
}

impl Scaffold {
    /// Scaffold for the first configured project
    pub fn from_config(config: &Config) -> Result<Self, ScaffoldError> {
        let provider = config
            .providers()
            .into_iter()
            .next()
            .ok_or(ScaffoldError::NoProject)?;

        let mut context = Context::new();
        context.insert("project_id", &provider.project_id);
        context.insert("region", &provider.region.unwrap_or_default());

        if let Ok(Some(StateLocation::Gcs { bucket, key })) = config.state_location() {
            context.insert("backend_bucket", &bucket);
            context.insert("backend_prefix", &state_prefix(&key));
        } else {
            context.insert("backend_bucket", &false);
        }

        Ok(Self { context })
    }

    /// Rendered files, relative to the output directory
    pub fn render(&self) -> Result<Vec<(&'static str, String)>, ScaffoldError> {
        let mut tera = Tera::default();
        Ok(vec![
            ("provider.tf", tera.render_str(PROVIDER_TF, &self.context)?),
            ("variables.tf", tera.render_str(VARIABLES_TF, &self.context)?),
            ("main.tf", MAIN_TF.to_string()),
            (".gitignore", GITIGNORE.to_string()),
        ])
    }

    /// Write every file missing from `dir`. Existing files are kept as is.
    pub fn write(&self, dir: &Path) -> Result<ScaffoldReport, ScaffoldError> {
        std::fs::create_dir_all(dir)?;

        let mut report = ScaffoldReport::default();
        for (file, content) in self.render()? {
            let path = dir.join(file);
            if path.exists() {
                tracing::info!("{} already exists, leaving it untouched", path.display());
                report.skipped.push(path);
                continue;
            }
            std::fs::write(&path, content)?;
            tracing::debug!("Created {}", path.display());
            report.created.push(path);
        }
        Ok(report)
    }
}

/// GCS backends take a prefix and append `{workspace}.tfstate` themselves
fn state_prefix(key: &str) -> String {
    Path::new(key)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "terraform/state".to_string())
}

/// Starter configuration file
pub fn config_template(name: &str, project_id: &str, region: &str) -> Result<String, ScaffoldError> {
    let mut context = Context::new();
    context.insert("name", name);
    context.insert("path", "./infra");
    context.insert("project_id", project_id);
    context.insert("region", region);
    context.insert("services", &["pubsub", "cloudsql", "storage"]);

    Ok(Tera::default().render_str(CONFIG_TEMPLATE, &context)?)
}
