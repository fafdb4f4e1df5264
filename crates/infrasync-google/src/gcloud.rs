//! gcloud CLI wrapper
//!
//! The Cloud SQL Admin listing returned through the REST API misses fields
//! that gcloud reports, so instances are listed through gcloud while
//! databases and users still come from the REST client.

use crate::api::{CloudSqlApi, Database, DatabaseInstance, GoogleApiClient, Page, User};
use crate::auth::AccessToken;
use crate::error::{GoogleError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// gcloud property override pointing at a service account key file
const CREDENTIAL_FILE_ENV: &str = "CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE";

/// gcloud CLI wrapper
#[derive(Debug, Clone)]
pub struct Gcloud {
    program: String,
    credentials: Option<PathBuf>,
}

impl Default for Gcloud {
    fn default() -> Self {
        Self::new()
    }
}

impl Gcloud {
    pub fn new() -> Self {
        Self {
            program: "gcloud".to_string(),
            credentials: None,
        }
    }

    /// Authenticate every invocation with a service account key file
    pub fn with_credentials(mut self, path: impl AsRef<Path>) -> Self {
        self.credentials = Some(path.as_ref().to_path_buf());
        self
    }

    /// Check that gcloud is on the PATH
    pub async fn check_installed(&self) -> Result<()> {
        let which = Command::new("which")
            .arg(&self.program)
            .output()
            .await?;

        if !which.status.success() {
            return Err(GoogleError::GcloudNotFound);
        }
        Ok(())
    }

    /// Run a gcloud command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        if let Some(credentials) = &self.credentials {
            cmd.env(CREDENTIAL_FILE_ENV, credentials);
        }

        tracing::debug!("Running: {} {}", self.program, args.join(" "));

        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GoogleError::GcloudNotFound,
            _ => GoogleError::IoError(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GoogleError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    pub async fn print_access_token(&self) -> Result<AccessToken> {
        let output = self
            .run_command(&["auth", "print-access-token", "--quiet"])
            .await
            .map_err(|e| GoogleError::AuthenticationFailed(e.to_string()))?;
        AccessToken::new(output)
    }

    /// List every Cloud SQL instance of a project
    pub async fn list_sql_instances(&self, project: &str) -> Result<Vec<DatabaseInstance>> {
        let project_arg = format!("--project={}", project);
        let output = self
            .run_command(&["sql", "instances", "list", &project_arg, "--format=json"])
            .await?;
        parse_instances(&output)
    }
}

/// Parse `gcloud sql instances list --format=json` output
pub fn parse_instances(output: &str) -> Result<Vec<DatabaseInstance>> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(output)?)
}

/// [`CloudSqlApi`] listing instances through gcloud and everything else
/// through the REST client
#[derive(Clone)]
pub struct GcloudSqlClient {
    gcloud: Gcloud,
    api: GoogleApiClient,
}

impl GcloudSqlClient {
    pub fn new(gcloud: Gcloud, api: GoogleApiClient) -> Self {
        Self { gcloud, api }
    }
}

#[async_trait]
impl CloudSqlApi for GcloudSqlClient {
    async fn list_instances(
        &self,
        project: &str,
        _page_size: usize,
        _page_token: Option<&str>,
    ) -> Result<Page<DatabaseInstance>> {
        // gcloud pages internally
        let instances = self.gcloud.list_sql_instances(project).await?;
        Ok(Page::last(instances))
    }

    async fn list_databases(&self, project: &str, instance: &str) -> Result<Vec<Database>> {
        self.api.list_databases(project, instance).await
    }

    async fn list_users(&self, project: &str, instance: &str) -> Result<Vec<User>> {
        self.api.list_users(project, instance).await
    }
}
