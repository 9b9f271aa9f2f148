//! Config command implementation.

use crate::cli::ConfigSource;
use crate::core::config::Config;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the effective configuration.
    Validate,
    /// Print the effective configuration, defaults filled in.
    Show {
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Generate a commented configuration template.
    Generate {
        /// Output file path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the difference between two configuration files.
    Diff {
        /// First config file.
        file1: PathBuf,
        /// Second config file.
        file2: PathBuf,
    },
}

/// Run the config command.
pub fn run_config(args: ConfigArgs, source: &ConfigSource) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => validate_config(source),
        ConfigCommand::Show { format } => show_config(source, &format),
        ConfigCommand::Generate { output } => generate_config(output.as_deref()),
        ConfigCommand::Diff { file1, file2 } => diff_configs(&file1, &file2),
    }
}

fn validate_config(source: &ConfigSource) -> Result<()> {
    let config = source.load()?;
    match source.file() {
        Some(path) => println!("✓ {:?} is valid", path),
        None => println!("✓ no config file; defaults are valid"),
    }
    println!("  backend: {}", config.store.backend);
    println!("  namespace root: {}", config.store.namespace_root);
    println!("  max attempts: {}", config.allocator.max_attempts);
    Ok(())
}

fn show_config(source: &ConfigSource, format: &str) -> Result<()> {
    let config = source.load()?;
    println!("{}", render_config(&config, format)?);
    Ok(())
}

fn render_config(config: &Config, format: &str) -> Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(config)?),
        "toml" => Ok(toml::to_string_pretty(config)?),
        other => anyhow::bail!("unknown format {:?} (expected toml or json)", other),
    }
}

fn generate_config(output: Option<&Path>) -> Result<()> {
    let template = config_template();
    match output {
        Some(path) => {
            std::fs::write(path, template)
                .with_context(|| format!("failed to write {:?}", path))?;
            println!("Generated config template: {:?}", path);
        }
        None => println!("{}", template),
    }
    Ok(())
}

fn config_template() -> &'static str {
    r#"# ipalloc configuration

[store]
# "etcd" or "memory" (in-process, for testing)
backend = "etcd"
# host:port or URL; ETCD_AUTHORITY overrides
endpoints = ["127.0.0.1:2379"]
namespace_root = "/calico/v1"
request_timeout_ms = 5000
connect_timeout_ms = 2000

[allocator]
# scan-and-claim attempts before reporting contention
max_attempts = 64
# overall allocation deadline; unbounded when unset
# deadline_ms = 2000

[telemetry]
log_level = "info"
json = false
"#
}

fn diff_configs(file1: &Path, file2: &Path) -> Result<()> {
    let config1 = effective_value(file1)?;
    let config2 = effective_value(file2)?;

    println!("Comparing {:?} and {:?}", file1, file2);
    println!();

    for line in diff_toml_values("", &config1, &config2) {
        println!("{}", line);
    }
    Ok(())
}

/// A file's configuration with defaults applied, as a TOML tree.
fn effective_value(path: &Path) -> Result<toml::Value> {
    let config = Config::from_file(path)?;
    toml::Value::try_from(&config).context("failed to serialize configuration")
}

fn diff_toml_values(path: &str, v1: &toml::Value, v2: &toml::Value) -> Vec<String> {
    let mut out = Vec::new();
    match (v1, v2) {
        (toml::Value::Table(t1), toml::Value::Table(t2)) => {
            for (key, left) in t1 {
                let child = join_path(path, key);
                match t2.get(key) {
                    Some(right) => out.extend(diff_toml_values(&child, left, right)),
                    None => out.push(format!("- {}: {}", child, left)),
                }
            }
            for (key, right) in t2 {
                if !t1.contains_key(key) {
                    out.push(format!("+ {}: {}", join_path(path, key), right));
                }
            }
        }
        (v1, v2) if v1 != v2 => out.push(format!("~ {}: {} -> {}", path, v1, v2)),
        _ => {}
    }
    out
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}
