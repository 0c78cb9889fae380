//! DecisionDesk CLI - capture meetings offline and sync them later
//!
//! Recordings are stored and queued locally first; the backend is contacted
//! only when it is reachable.

mod cli;
mod commands;
mod error;

use std::path::{Path, PathBuf};

use clap::Parser;
use desk_core::config::{default_config_path, EngineConfig};

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::commands::config::{run_config_init, run_config_show, InitOptions};
use crate::commands::manage::{run_delete, run_retry};
use crate::commands::queue::run_queue;
use crate::commands::record::run_record;
use crate::commands::show::{run_list, run_show};
use crate::commands::sync::{run_pull, run_refresh, run_sync};
use crate::commands::transcribe::run_transcribe;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "desk=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let metered = cli.metered;

    match cli.command {
        Commands::Config {
            command:
                ConfigCommands::Init {
                    api_base_url,
                    allow_metered,
                    no_optimistic,
                    pull_interval,
                    force,
                },
        } => run_config_init(
            &config_path,
            InitOptions {
                api_base_url,
                allow_metered,
                optimistic_processing: !no_optimistic,
                pull_interval_secs: pull_interval,
                force,
            },
        ),
        command => {
            let config = resolve_config(&config_path, cli.api_url, cli.db_path)?;
            dispatch(command, &config, &config_path, metered).await
        }
    }
}

async fn dispatch(
    command: Commands,
    config: &EngineConfig,
    config_path: &Path,
    metered: bool,
) -> Result<(), CliError> {
    match command {
        Commands::Record { file, no_sync } => run_record(&file, no_sync, config, metered).await,
        Commands::List {
            limit,
            status,
            json,
        } => run_list(limit, status, json, config).await,
        Commands::Show { id, json } => run_show(&id, json, config).await,
        Commands::Queue { json } => run_queue(json, config).await,
        Commands::Sync => run_sync(config, metered).await,
        Commands::Pull => run_pull(config, metered).await,
        Commands::Refresh { id } => run_refresh(&id, config, metered).await,
        Commands::Transcribe {
            id,
            provider,
            model,
            diarize,
        } => run_transcribe(&id, provider, model, diarize, config, metered).await,
        Commands::Retry { id } => run_retry(&id, config, metered).await,
        Commands::Delete { id } => run_delete(&id, config).await,
        Commands::Watch => run_watch(config, metered).await,
        Commands::Config {
            command: ConfigCommands::Show { json },
        } => run_config_show(config, config_path, json),
        Commands::Config {
            command: ConfigCommands::Init { .. },
        } => Err(CliError::Config(
            "config init must run before the config is loaded".to_string(),
        )),
    }
}

/// Config file, then `DESK_*` environment, then command-line flags
pub fn resolve_config(
    config_path: &Path,
    api_url: Option<String>,
    db_path: Option<PathBuf>,
) -> Result<EngineConfig, CliError> {
    let mut config = EngineConfig::load_with_env(config_path)?;
    if let Some(url) = api_url {
        config.api_base_url = url.trim().trim_end_matches('/').to_string();
    }
    if db_path.is_some() {
        config.db_path = db_path;
    }
    config.validate()?;
    Ok(config)
}
