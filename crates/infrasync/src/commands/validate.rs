use colored::Colorize;
use std::path::Path;

pub fn handle(explicit: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "Validating configuration...".blue());

    let path = match infrasync_config::find_config_file(explicit) {
        Ok(path) => path,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Config file not found".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    println!("Config file: {}", path.display().to_string().cyan());

    match infrasync_config::Config::load(&path) {
        Ok(config) => {
            println!("{}", "✓ Configuration is valid".green().bold());
            println!();
            println!("Summary:");
            println!("  name: {}", config.name.cyan());
            println!("  output: {}", config.path.display());
            println!("  provisioner: {}", config.provisioner.binary());
            for provider in config.providers() {
                let services: Vec<_> = config
                    .services(&provider)
                    .iter()
                    .map(|s| s.as_str())
                    .collect();
                println!(
                    "    - {} ({})",
                    provider.project_id.cyan(),
                    services.join(", ")
                );
            }
            match config.state_location()? {
                Some(infrasync_config::StateLocation::Gcs { bucket, key }) => {
                    println!("  state: gs://{}/{}", bucket, key)
                }
                Some(infrasync_config::StateLocation::Local { path }) => {
                    println!("  state: {}", path.display())
                }
                None => println!("  state: {}", "(not configured)".dimmed()),
            }
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Configuration error".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
