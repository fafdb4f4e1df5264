use colored::Colorize;
use infrasync::Scaffold;
use infrasync_config::Config;

pub fn handle(config: &Config) -> anyhow::Result<()> {
    println!(
        "Initializing {} in {}",
        config.name.cyan(),
        config.path.display().to_string().cyan()
    );

    let report = Scaffold::from_config(config)?.write(&config.path)?;

    for path in &report.created {
        println!("  {} {}", "created".green(), path.display());
    }
    for path in &report.skipped {
        println!("  {} {} (already exists)", "skipped".yellow(), path.display());
    }

    println!();
    println!("{}", "Next:".bold());
    println!("  {} import", "infrasync".cyan());
    Ok(())
}

pub fn print_config_template(project: &str, region: &str) -> anyhow::Result<()> {
    print!("{}", infrasync::config_template("my-infra", project, region)?);
    Ok(())
}
