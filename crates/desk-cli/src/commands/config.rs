use std::path::Path;

use desk_core::config::EngineConfig;

use crate::error::CliError;

/// Values accepted by `desk config init`
#[derive(Debug, Default)]
pub struct InitOptions {
    pub api_base_url: Option<String>,
    pub allow_metered: bool,
    pub optimistic_processing: bool,
    pub pull_interval_secs: Option<u64>,
    pub force: bool,
}

pub fn run_config_init(path: &Path, options: InitOptions) -> Result<(), CliError> {
    if path.exists() && !options.force {
        return Err(CliError::Config(format!(
            "{} already exists; pass --force to overwrite",
            path.display()
        )));
    }

    let config = build_config(options)?;
    config.save_to_path(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn build_config(options: InitOptions) -> Result<EngineConfig, CliError> {
    let defaults = EngineConfig::default();
    let config = EngineConfig {
        api_base_url: options
            .api_base_url
            .map_or(defaults.api_base_url.clone(), |url| {
                url.trim().trim_end_matches('/').to_string()
            }),
        allow_metered: options.allow_metered,
        optimistic_processing: options.optimistic_processing,
        pull_interval_secs: options
            .pull_interval_secs
            .unwrap_or(defaults.pull_interval_secs),
        ..defaults
    };
    config
        .validate()
        .map_err(|error| CliError::Config(error.to_string()))?;
    Ok(config)
}

pub fn run_config_show(
    config: &EngineConfig,
    config_path: &Path,
    as_json: bool,
) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", config_path.display())
    };
    println!("config:          {source}");
    println!("api_base_url:    {}", config.api_base_url);
    println!("database:        {}", config.resolved_db_path().display());
    println!("recordings:      {}", config.resolved_recordings_dir().display());
    println!("allow_metered:   {}", config.allow_metered);
    println!("optimistic:      {}", config.optimistic_processing);
    println!("pull interval:   {}s", config.pull_interval_secs);
    println!(
        "processing:      {} / {}{}",
        config.default_processing.provider,
        config.default_processing.model,
        if config.default_processing.enable_diarization {
            " + diarization"
        } else {
            ""
        }
    );
    Ok(())
}
