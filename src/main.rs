use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use cloudcharm::charms::builtin_charms;
use cloudcharm::engine::{InstallReport, Installer};
use cloudcharm::orchestrator::InMemoryOrchestrator;
use cloudcharm::{CharmRegistry, Config, RelationPolicy, RelationStatus};

#[derive(Parser)]
#[command(name = "cloudcharm")]
#[command(about = "Charm deployment ordering and relation wiring", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "TOML config file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory of extra YAML charm descriptors")]
    plugin_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print enabled charms in deploy order
    Plan,
    /// Print one charm descriptor
    Show {
        #[arg(help = "Charm name")]
        charm: String,
        #[arg(long)]
        json: bool,
    },
    /// Deploy and relate every charm against an in-memory orchestrator
    Simulate {
        #[arg(long = "not-ready", help = "Peer that rejects every relation")]
        not_ready: Vec<String>,
        #[arg(long, help = "Stop at the first failed relation in a pass")]
        abort_on_failure: bool,
        #[arg(long, default_value_t = 5)]
        max_attempts: u32,
        #[arg(long, default_value_t = 10)]
        interval_ms: u64,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.plugin_dir {
        config.charm_plugin_dir = Some(dir);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let registry = load_registry(&config)?;

    match cli.command {
        Commands::Plan => print_plan(&registry),
        Commands::Show { charm, json } => show_charm(&registry, &charm, json)?,
        Commands::Simulate {
            not_ready,
            abort_on_failure,
            max_attempts,
            interval_ms,
            json,
        } => {
            if abort_on_failure {
                config.relation_policy = RelationPolicy::AbortOnFailure;
            }
            config.max_relation_attempts = max_attempts;
            config.relation_retry_interval_ms = interval_ms;
            config.deploy_retry_interval_ms = interval_ms;
            simulate(registry, config, &not_ready, json).await?
        }
    }

    Ok(())
}

fn load_registry(config: &Config) -> Result<CharmRegistry> {
    let mut registry = CharmRegistry::from_charms(builtin_charms()?)?;
    if let Some(dir) = &config.charm_plugin_dir {
        let loaded = registry.load_plugin_dir(dir)?;
        log::info!("Loaded {} charm plugins from {}", loaded, dir.display());
    }
    Ok(registry)
}

fn print_plan(registry: &CharmRegistry) {
    println!("{:<4} {:<24} {:<24} {:>8}", "PRI", "CHARM", "NAME", "REVISION");
    for charm in registry.deploy_order() {
        println!(
            "{:<4} {:<24} {:<24} {:>8}",
            charm.deploy_priority, charm.name, charm.display_name, charm.revision
        );
    }
    for charm in registry.disabled() {
        println!("-    {:<24} {:<24} (disabled)", charm.name, charm.display_name);
    }
}

fn show_charm(registry: &CharmRegistry, name: &str, json: bool) -> Result<()> {
    let charm = registry
        .get(name)
        .ok_or_else(|| anyhow!("Unknown charm '{}'", name))?;

    if json {
        println!("{}", serde_json::to_string_pretty(charm)?);
        return Ok(());
    }

    println!("{} ({})", charm.display_name, charm.name);
    println!("  revision:        {}", charm.revision);
    println!("  deploy priority: {}", charm.deploy_priority);
    println!("  enabled:         {}", charm.enabled);
    println!("  relations:");
    for (peer, edge) in &charm.relations {
        println!("    {:<24} {}", peer, edge);
    }
    Ok(())
}

async fn simulate(
    mut registry: CharmRegistry,
    config: Config,
    not_ready: &[String],
    json: bool,
) -> Result<()> {
    registry.add_placeholders_for_missing_peers();

    let orchestrator = Arc::new(InMemoryOrchestrator::new());
    for peer in not_ready {
        orchestrator.set_not_ready(peer);
    }

    let installer = Installer::new(orchestrator.clone(), config);
    let report = installer.run(&registry).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        println!("Relations set: {}", orchestrator.relations().len());
    }

    if !report.is_ready() {
        bail!("Relationships still pending: {}", report.pending().join(", "));
    }
    Ok(())
}

fn print_report(report: &InstallReport) {
    for progress in report.progress.values() {
        println!(
            "{:<24} {:<10} relation passes: {}",
            progress.charm,
            progress.state.as_str(),
            progress.relation_passes
        );
    }
    for pass in &report.relation_passes {
        for outcome in &pass.outcomes {
            let status = match &outcome.status {
                RelationStatus::Added { .. } => "added".to_string(),
                RelationStatus::Failed { error } => format!("failed: {}", error),
                RelationStatus::Skipped => "skipped".to_string(),
            };
            println!("  {} -> {:<24} {}", pass.charm, outcome.peer, status);
        }
    }
}
