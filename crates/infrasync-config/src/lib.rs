//! InfraSync configuration
//!
//! Loads the YAML file that names the projects, services, state backend and
//! provisioner of a run.

pub mod error;
pub mod model;

pub use error::*;
pub use model::{
    Backend, BackendType, Config, DEFAULT_STATE_KEY, GoogleProvider, ProjectConfig, Providers,
    ProvisionerKind, StateLocation,
};

use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "INFRASYNC_CONFIG";

const CANDIDATES: [&str; 2] = ["infrasync.yaml", ".infrasync.yaml"];

/// InfraSync's per-user config directory, created on first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("infrasync");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the config file.
///
/// Search order:
/// 1. `explicit`, which must exist
/// 2. `INFRASYNC_CONFIG`
/// 3. current directory: infrasync.yaml, .infrasync.yaml
/// 4. ~/.config/infrasync/config.yaml
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }

    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("infrasync").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Find and load the config file in one step
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = find_config_file(explicit)?;
    Config::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const MINIMAL: &str =
        "name: test\nproviders:\n  google:\n    projects:\n      - id: p\n        services: [pubsub]\n";

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("infrasync"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join(".infrasync.yaml"), MINIMAL).unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_ENV, || find_config_file(None));
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".infrasync.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_prefers_plain_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join("infrasync.yaml"), MINIMAL).unwrap();
        fs::write(temp_dir.path().join(".infrasync.yaml"), MINIMAL).unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_ENV, || find_config_file(None));
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("infrasync.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = temp_dir.path().join("custom.yaml");
        fs::write(&config, MINIMAL).unwrap();

        let result = temp_env::with_var(CONFIG_ENV, Some(&config), || find_config_file(None));
        assert_eq!(result.unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_explicit_path_must_exist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope.yaml");

        assert!(matches!(
            find_config_file(Some(&missing)),
            Err(ConfigError::MissingFile(p)) if p == missing
        ));
    }

    #[test]
    #[serial]
    fn test_load_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("infrasync.yaml");
        fs::write(&path, MINIMAL).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.name, "test");
        assert_eq!(config.providers().len(), 1);
    }
}
