//! Command-line front end for `bidding-data`.

pub mod cli_args;

use bidding_core::logging::{LoggingDestination, init_logging};
use bidding_core::{
    RunConfig, RunSummary, apply_runtime_overrides, load_config, run_with_config, save_config,
};
use clap::Parser;
use cli_args::Cli;
use tracing::{info, warn};

/// Parse the process arguments and run.
pub async fn run() -> Result<RunSummary, String> {
    run_with_cli(Cli::parse()).await
}

pub async fn run_with_cli(cli: Cli) -> Result<RunSummary, String> {
    if let Err(err) = init_logging(LoggingDestination::FileAndStderr, cli.verbosity()) {
        eprintln!("Warning: logging unavailable: {err}");
    }
    info!("Program started");

    let (source_dir, tournament_page) = cli.resolve_paths()?;

    let load = load_config();
    let mut warnings = load.warnings;
    let mut config = load.config;

    let (overrides, mut override_warnings) = cli.to_runtime_overrides()?;
    warnings.append(&mut override_warnings);
    apply_runtime_overrides(&mut config.runtime, &overrides, &mut warnings);

    if config.runtime.force_resend && !config.runtime.goniec_enabled {
        warnings.push("--force-resend has no effect unless Goniec is enabled.".to_string());
    }
    for warning in warnings {
        warn!("{warning}");
    }

    if cli.save_config {
        save_config(&config).map_err(|err| err.to_string())?;
        info!(path = %bidding_core::config_path().display(), "Saved configuration");
    }

    let run_config = RunConfig::from_preferences(source_dir, tournament_page, &config.runtime);
    let summary = run_with_config(run_config)
        .await
        .map_err(|err| err.to_string())?;
    info!("Program ended");
    Ok(summary)
}
