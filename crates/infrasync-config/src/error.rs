use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Config file not found. Looked in:\n\
        - INFRASYNC_CONFIG environment variable\n\
        - current directory: infrasync.yaml, .infrasync.yaml\n\
        - ~/.config/infrasync/config.yaml"
    )]
    ConfigFileNotFound,

    #[error("Config file does not exist: {0}")]
    MissingFile(PathBuf),

    #[error("At least one provider must be configured")]
    NoProviders,

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Google provider needs at least one project")]
    NoProjects,

    #[error("Project id must not be empty")]
    MissingProjectId,

    #[error("Project {0} has no services")]
    NoServices(String),

    #[error("Project {project}: unknown service '{service}'")]
    UnknownService { project: String, service: String },

    #[error("gcs backend requires a bucket")]
    MissingBackendBucket,

    #[error("local backend requires a path")]
    MissingBackendPath,

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
