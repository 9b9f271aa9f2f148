//! Command-line interface.
//!
//! Operator CLI for allocating, releasing and inspecting pool addresses.

pub mod commands;

use crate::core::config::{BackendKind, Config, ConfigOverrides};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Config file read when `--config` is not given, if present.
pub const DEFAULT_CONFIG_PATH: &str = "config/ipalloc.toml";

/// Exit code for an allocation from a fully assigned pool.
pub const EXIT_POOL_EXHAUSTED: u8 = 2;

/// ipalloc - sequential IP address allocation over etcd.
#[derive(Parser, Debug)]
#[command(name = "ipalloc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// etcd endpoints, comma separated (host:port or URL).
    #[arg(long, global = true, env = "ETCD_AUTHORITY", value_delimiter = ',')]
    pub etcd_authority: Option<Vec<String>>,

    /// Store backend.
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Allocate the lowest free address in a pool.
    Allocate(commands::AllocateArgs),
    /// Release an address back to its pool.
    Release(commands::ReleaseArgs),
    /// List assigned addresses in a pool.
    List(commands::ListArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
}

impl Cli {
    /// Overrides carried by flags and the environment.
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            log_level: self.log_level.clone(),
            endpoints: self.etcd_authority.clone(),
            backend: self.backend,
            ..Default::default()
        };
        if let Commands::Allocate(args) = &self.command {
            overrides.max_attempts = args.max_attempts;
            overrides.deadline_ms = args.deadline_ms;
        }
        overrides
    }

    /// Where the effective configuration comes from.
    pub fn config_source(&self) -> ConfigSource {
        ConfigSource {
            path: self.config.clone(),
            overrides: self.overrides(),
        }
    }
}

/// A config file location plus the overrides layered on top of it.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

impl ConfigSource {
    /// Resolved file: `--config`, else the default path if it exists.
    pub fn file(&self) -> Option<PathBuf> {
        match &self.path {
            Some(path) => Some(path.clone()),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Some(PathBuf::from(DEFAULT_CONFIG_PATH))
            }
            None => None,
        }
    }

    /// Load the effective configuration: file (if any), then overrides.
    pub fn load(&self) -> Result<Config> {
        let mut config = match self.file() {
            Some(path) => Config::from_file(&path)?,
            None => Config::default(),
        };
        config.apply_overrides(&self.overrides);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Run a parsed command line to completion.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let source = cli.config_source();

    let command = match cli.command {
        Commands::Config(args) => {
            return commands::run_config(args, &source).map(|()| ExitCode::SUCCESS);
        }
        command => command,
    };

    let config = source.load()?;
    crate::ops::telemetry::init_tracing(&config.telemetry);

    match command {
        Commands::Allocate(args) => commands::run_allocate(args, &config).await,
        Commands::Release(args) => commands::run_release(args, &config)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::List(args) => commands::run_list(args, &config)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Config(_) => Ok(ExitCode::SUCCESS),
    }
}
