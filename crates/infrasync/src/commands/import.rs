use colored::Colorize;
use infrasync::{ImportOrchestrator, ImportSummary};
use infrasync_config::Config;
use infrasync_core::{Connector, Service};
use infrasync_google::GoogleConnector;
use infrasync_provision::{ArtifactLayout, Provisioner};
use tokio_util::sync::CancellationToken;

pub async fn handle(
    config: &Config,
    only: &[String],
    concurrency: usize,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let only = only
        .iter()
        .map(|s| s.parse::<Service>())
        .collect::<Result<Vec<_>, _>>()?;

    let connector = GoogleConnector::from_credentials(config.credentials()).await?;

    let runner = super::runner(config);
    println!("{}", format!("Initializing {}...", runner.binary()).blue());
    runner.initialize().await?;

    let mut importers = Vec::new();
    let mut failures = 0;
    for provider in config.providers() {
        for service in config.services(&provider) {
            if !only.is_empty() && !only.contains(&service) {
                continue;
            }
            match connector.connect(&provider, service).await {
                Ok(importer) => importers.push(importer),
                Err(e) => {
                    eprintln!(
                        "{} {}/{}: {}",
                        "✗".red(),
                        provider.project_id,
                        service,
                        e
                    );
                    failures += 1;
                }
            }
        }
    }

    let orchestrator = ImportOrchestrator::new(ArtifactLayout::new(&config.path), runner);
    let results = orchestrator
        .import_all(importers, concurrency, cancel)
        .await;

    let mut total = ImportSummary::default();
    for outcome in results {
        let label = format!("{}/{}", outcome.provider.project_id, outcome.service);
        match outcome.result {
            Ok(summary) => {
                println!(
                    "{} {}: {} imported, {} already present",
                    "✓".green(),
                    label.cyan(),
                    summary.imported,
                    summary.already_present
                );
                total += summary;
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), label, e);
                failures += 1;
            }
        }
    }

    println!();
    println!(
        "{} resources imported, {} already present",
        total.imported.to_string().bold(),
        total.already_present
    );

    if failures > 0 {
        anyhow::bail!("{} service(s) failed to import", failures);
    }
    Ok(())
}
