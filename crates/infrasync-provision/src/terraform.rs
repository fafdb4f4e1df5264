//! Terraform / OpenTofu CLI wrapper
//!
//! Both binaries share the same command line, so one runner serves both.
//! Every invocation holds the runner's lock: the tools keep state and lock
//! files in the working directory and cannot run concurrently there.

use crate::error::{ProvisionError, Result};
use crate::hcl;
use crate::layout::{ArtifactLayout, import_block};
use crate::provisioner::{ImportRequest, Provisioner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Import block staged in the root module during an import
pub const STAGING_FILE: &str = "infrasync_import.tf";

/// Terraform-compatible provisioner
pub struct TerraformRunner {
    binary: String,
    working_dir: PathBuf,
    lock: Mutex<()>,
}

impl TerraformRunner {
    pub fn new(binary: impl Into<String>, working_dir: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.into(),
            working_dir: working_dir.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn terraform(working_dir: impl AsRef<Path>) -> Self {
        Self::new("terraform", working_dir)
    }

    pub fn tofu(working_dir: impl AsRef<Path>) -> Self {
        Self::new("tofu", working_dir)
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Installed version, also used to check the binary is present
    pub async fn version(&self) -> Result<String> {
        let _guard = self.lock.lock().await;
        let output = self.run_command(&["version"]).await?;
        Ok(output.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Run a command in the working directory and return stdout. The caller
    /// must hold the lock.
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.current_dir(&self.working_dir);
        cmd.env("TF_IN_AUTOMATION", "1");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running: {} {}", self.binary, args.join(" "));

        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProvisionError::BinaryNotFound(self.binary.clone()),
            _ => ProvisionError::IoError(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let command = format!("{} {}", self.binary, args.first().unwrap_or(&""));
            return Err(classify_failure(command, &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn classify_failure(command: String, stderr: &str) -> ProvisionError {
    let stderr = stderr.trim().to_string();
    if stderr.contains("already managed") {
        ProvisionError::AlreadyExists(stderr)
    } else {
        ProvisionError::CommandFailed { command, stderr }
    }
}

#[async_trait]
impl Provisioner for TerraformRunner {
    async fn initialize(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        fs::create_dir_all(&self.working_dir).await?;
        self.run_command(&["init", "-input=false", "-no-color"])
            .await?;
        tracing::info!("Initialized {} in {}", self.binary, self.working_dir.display());
        Ok(())
    }

    async fn import(&self, request: &ImportRequest) -> Result<()> {
        let _guard = self.lock.lock().await;

        // The tool resolves relative paths against its own working directory
        let definition_path = std::path::absolute(&request.definition_path)?;
        if let Some(parent) = definition_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staging = self.working_dir.join(STAGING_FILE);
        fs::write(&staging, import_block(&request.address(), &request.id)).await?;

        let generate_arg = format!("-generate-config-out={}", definition_path.display());
        let result = self
            .run_command(&["plan", "-input=false", "-no-color", &generate_arg])
            .await;

        if let Err(e) = fs::remove_file(&staging).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("Failed to remove {}: {}", staging.display(), e);
        }

        result?;
        tracing::info!(resource = %request.id, "Imported {}", request.address());
        Ok(())
    }

    async fn generate(&self) -> Result<Vec<PathBuf>> {
        let _guard = self.lock.lock().await;
        let output = self.run_command(&["show", "-json", "-no-color"]).await?;

        let layout = ArtifactLayout::new(&self.working_dir);
        let mut written = Vec::new();
        for resource in hcl::managed_resources(&output)? {
            let path = layout.generated_path(&resource.resource_type, &resource.name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, hcl::render_resource(&resource)?).await?;
            written.push(path);
        }

        tracing::info!("Generated {} definition files", written.len());
        Ok(written)
    }
}
