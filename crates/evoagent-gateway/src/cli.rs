//! `clap`-derived CLI surface (spec §4.J), grounded on the teacher's
//! `gateway/src/cli/mod.rs` shape, scoped to this system's subcommands.

use clap::{Parser, Subcommand};
use evoagent_domain::config::Config;

/// evoagent-gateway — a life-science evidence synthesis agent.
#[derive(Debug, Parser)]
#[command(name = "evoagent-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults, secrets redacted)
    /// as TOML.
    Show,
}

/// Load configuration from the path named by `EVOAGENT_CONFIG` (or
/// `evoagent.toml` by default), falling back to defaults when absent.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path =
        std::env::var("EVOAGENT_CONFIG").unwrap_or_else(|_| "evoagent.toml".into());
    let config = Config::load(std::path::Path::new(&config_path))
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok((config, config_path))
}

pub fn show(config: &Config) {
    match toml::to_string_pretty(&config.redacted()) {
        Ok(output) => print!("{output}"),
        Err(e) => eprintln!("failed to serialize config: {e}"),
    }
}

/// Prints a human-readable validation report. A missing config file is
/// not itself an error — `Config::load` falls back to defaults — so
/// this only checks the TOML actually parsed.
pub fn validate(config_path: &str) -> bool {
    if !std::path::Path::new(config_path).exists() {
        println!("{config_path} not found; using built-in defaults");
        return true;
    }
    match std::fs::read_to_string(config_path) {
        Ok(raw) => match toml::from_str::<Config>(&raw) {
            Ok(_) => {
                println!("config OK ({config_path})");
                true
            }
            Err(e) => {
                println!("{config_path}: {e}");
                false
            }
        },
        Err(e) => {
            println!("{config_path}: {e}");
            false
        }
    }
}
