mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use infrasync::SyncOptions;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Exit code of a sync that found drift
const DRIFT_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(name = "infrasync")]
#[command(about = "Import live GCP resources into Terraform and keep them in sync", long_about = None)]
struct Cli {
    /// Config file (default: ./infrasync.yaml or ~/.config/infrasync/config.yaml)
    #[arg(short, long, global = true, env = "INFRASYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold the Terraform root module in the output directory
    Init {
        /// Print a starter config file instead
        #[arg(long)]
        config_template: bool,
        /// Project id used by --config-template
        #[arg(long, default_value = "my-project")]
        project: String,
        /// Region used by --config-template
        #[arg(long, default_value = "us-central1")]
        region: String,
    },
    /// Import live resources as declarative definitions
    Import {
        /// Only import these services (pubsub, cloudsql, storage)
        #[arg(short, long = "service")]
        services: Vec<String>,
        /// Services imported at the same time
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// Compare live resources with recorded state
    Sync {
        /// Report drift without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Also report recorded resources that no longer exist
        #[arg(long)]
        detect_removals: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the config file
    Validate,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `sync --json` output stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("infrasync {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Validate => return commands::validate::handle(cli.config.as_deref()),
        Commands::Init {
            config_template: true,
            ref project,
            ref region,
        } => return commands::init::print_config_template(project, region),
        _ => {}
    }

    let config = match infrasync_config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            eprintln!();
            eprintln!(
                "{}",
                "Hint: run `infrasync init --config-template > infrasync.yaml` to get started"
                    .yellow()
            );
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Init { .. } => commands::init::handle(&config)?,
        Commands::Import {
            services,
            concurrency,
        } => commands::import::handle(&config, &services, concurrency, cancel).await?,
        Commands::Sync {
            dry_run,
            detect_removals,
            json,
        } => {
            let options = SyncOptions {
                dry_run,
                detect_removals,
            };
            if commands::sync::handle(&config, options, json, cancel).await? {
                std::process::exit(DRIFT_EXIT_CODE);
            }
        }
        Commands::Validate | Commands::Version => {}
    }

    Ok(())
}
