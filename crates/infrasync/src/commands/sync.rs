use colored::Colorize;
use infrasync::{SyncCoordinator, SyncOptions, SyncResult};
use infrasync_config::{Config, StateLocation};
use infrasync_core::{LocalStateSource, StateSource};
use infrasync_google::{GcsStateSource, GoogleConnector};
use infrasync_provision::ArtifactLayout;
use tokio_util::sync::CancellationToken;

/// Run a sync and report it. Returns whether drift was found.
pub async fn handle(
    config: &Config,
    options: SyncOptions,
    json: bool,
    cancel: CancellationToken,
) -> anyhow::Result<bool> {
    let connector = GoogleConnector::from_credentials(config.credentials()).await?;

    let state: Box<dyn StateSource> = match config.state_location()? {
        Some(StateLocation::Gcs { bucket, key }) => Box::new(GcsStateSource::new(
            connector.client().clone(),
            bucket,
            key,
        )),
        Some(StateLocation::Local { path }) => Box::new(LocalStateSource::new(path)),
        None => Box::new(LocalStateSource::new(config.path.join("terraform.tfstate"))),
    };

    let mut coordinator = SyncCoordinator::new(
        Box::new(connector),
        state,
        super::runner(config),
        ArtifactLayout::new(&config.path),
    )
    .with_options(options);
    for provider in config.providers() {
        let services = config.services(&provider);
        coordinator = coordinator.with_target(provider, services);
    }

    let result = coordinator.run(cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(result.drift_detected)
}

fn print_result(result: &SyncResult) {
    for drift in &result.drift {
        let marker = if drift.is_added() {
            "+".green()
        } else if drift.is_removed() {
            "-".red()
        } else {
            "~".yellow()
        };
        println!(
            "{} {}.{} ({})",
            marker, drift.resource_type, drift.resource_name, drift.resource_id
        );
        if !drift.is_added() && !drift.is_removed() {
            for (attribute, change) in &drift.changes {
                println!("    {}: {} → {}", attribute, change.old, change.new);
            }
        }
    }

    println!();
    if result.drift_detected {
        println!(
            "{} {} drifted, {} added, {} removed",
            "Drift detected:".yellow().bold(),
            result.resources_drifted,
            result.resources_added,
            result.resources_removed
        );
    } else {
        println!("{}", "✓ No drift detected".green().bold());
    }
    for service in &result.failed_services {
        eprintln!("{} {} could not be synced", "✗".red(), service);
    }
    println!("Output: {}", result.output_dir.display());
}
