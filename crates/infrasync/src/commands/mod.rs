pub mod import;
pub mod init;
pub mod sync;
pub mod validate;

use infrasync_config::Config;
use infrasync_provision::TerraformRunner;
use std::sync::Arc;

/// Provisioner working in the configured output directory
pub fn runner(config: &Config) -> Arc<TerraformRunner> {
    Arc::new(TerraformRunner::new(
        config.provisioner.binary(),
        &config.path,
    ))
}
