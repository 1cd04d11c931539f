//! CLI helper functions

use crate::{
    config::EtlConfig,
    connectors::Connectors,
    orchestrator::{Orchestrator, RunSummary},
    transform::HookRegistry,
};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

/// Load the configuration file, keeping only the processes named in `only`
pub fn load_config(config_path: impl AsRef<Path>, only: &[String]) -> Result<EtlConfig> {
    let config_path = config_path.as_ref();
    log::info!("Loading configuration from {}", config_path.display());

    let mut config = EtlConfig::read(config_path)?;
    config.retain_named(only);
    log::info!(
        "Configuration loaded: {} process(es), {} active",
        config.processes.len(),
        config.active_count()
    );
    Ok(config)
}

fn orchestrator(config: &EtlConfig, parallel: Option<usize>) -> Orchestrator<Connectors> {
    let connectors = Connectors::new(config.settings.clone(), HookRegistry::with_builtins());
    let orchestrator = Orchestrator::new(connectors, &config.settings);
    match parallel {
        Some(n) => orchestrator.with_max_parallel(n),
        None => orchestrator,
    }
}

/// Run every active process of a configuration file
///
/// Pipeline per process: Extractor → (Transformer) → Loader
pub async fn run_processes(
    config_path: impl AsRef<Path>,
    only: &[String],
    parallel: Option<usize>,
) -> Result<RunSummary> {
    let config = load_config(config_path, only)?;
    let summary = orchestrator(&config, parallel).run(&config.processes).await;
    summary.log();
    Ok(summary)
}

/// Build every active process and run its setups, without moving data
pub async fn check_processes(config_path: impl AsRef<Path>, only: &[String]) -> Result<RunSummary> {
    let config = load_config(config_path, only)?;
    let summary = orchestrator(&config, None).check(&config.processes).await;
    summary.log();
    Ok(summary)
}

/// Print the processes of a configuration file with their stage types
pub fn list_processes(config_path: impl AsRef<Path>) -> Result<usize> {
    let config_path = config_path.as_ref();
    let config = EtlConfig::read(config_path)
        .with_context(|| format!("Cannot list processes of {}", config_path.display()))?;

    for process in &config.processes {
        let state = match process.active {
            true => "active".green().to_string(),
            false => "inactive".bright_black().to_string(),
        };
        let transformation = process
            .transformation()
            .and_then(|spec| spec.kind())
            .unwrap_or("-");
        println!(
            "{} [{}] {} → {} → {}",
            process.name.cyan(),
            state,
            process.extraction.kind().unwrap_or("?"),
            transformation,
            process.loading.kind().unwrap_or("?"),
        );
    }
    Ok(config.processes.len())
}
