//! Configuration parsing and validation.
//!
//! Configuration is loaded from TOML files with CLI overrides. Every field has
//! a default, so an empty file (or no file at all) yields a usable config that
//! talks to a local etcd.

use crate::allocator::AllocateOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backing store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Allocation policy configuration.
    #[serde(default)]
    pub allocator: AllocatorConfig,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Store backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// etcd v3 over gRPC.
    Etcd,
    /// In-process store; assignments live only as long as the process.
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Etcd => write!(f, "etcd"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Backing store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend kind.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// etcd endpoints as `host:port` (or full `http://` URLs).
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Root prefix under which the `ipam/` tree lives.
    #[serde(default = "default_namespace_root")]
    pub namespace_root: String,

    /// Timeout applied to every store round trip, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Connection establishment timeout, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoints: default_endpoints(),
            namespace_root: default_namespace_root(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Per-round-trip timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Connection establishment timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Allocation policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Maximum scan-and-claim attempts per allocation.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Overall allocation deadline in milliseconds (unbounded if absent).
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            deadline_ms: None,
        }
    }
}

impl AllocatorConfig {
    /// Build allocation options from this configuration.
    pub fn options(&self) -> AllocateOptions {
        let mut options = AllocateOptions::default().with_max_attempts(self.max_attempts);
        if let Some(ms) = self.deadline_ms {
            options = options.with_deadline(Duration::from_millis(ms));
        }
        options
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions

fn default_backend() -> BackendKind {
    BackendKind::Etcd
}

fn default_endpoints() -> Vec<String> {
    vec!["127.0.0.1:2379".to_string()]
}

fn default_namespace_root() -> String {
    "/calico/v1".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_max_attempts() -> u32 {
    crate::allocator::DEFAULT_MAX_ATTEMPTS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ref endpoints) = overrides.endpoints {
            self.store.endpoints = endpoints.clone();
        }
        if let Some(backend) = overrides.backend {
            self.store.backend = backend;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.allocator.max_attempts = max_attempts;
        }
        if let Some(deadline_ms) = overrides.deadline_ms {
            self.allocator.deadline_ms = Some(deadline_ms);
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_store()?;
        self.validate_allocator()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_store(&self) -> Result<()> {
        if self.store.backend == BackendKind::Etcd && self.store.endpoints.is_empty() {
            anyhow::bail!("store.endpoints required for the etcd backend");
        }

        if let Some(bad) = self.store.endpoints.iter().find(|e| e.trim().is_empty()) {
            anyhow::bail!("store.endpoints contains an empty entry: {:?}", bad);
        }

        if !self.store.namespace_root.starts_with('/') {
            anyhow::bail!(
                "store.namespace_root must start with '/', got: {}",
                self.store.namespace_root
            );
        }
        if self.store.namespace_root.len() > 1 && self.store.namespace_root.ends_with('/') {
            anyhow::bail!(
                "store.namespace_root must not end with '/', got: {}",
                self.store.namespace_root
            );
        }

        if self.store.request_timeout_ms == 0 {
            anyhow::bail!("store.request_timeout_ms must be > 0");
        }
        if self.store.connect_timeout_ms == 0 {
            anyhow::bail!("store.connect_timeout_ms must be > 0");
        }

        Ok(())
    }

    fn validate_allocator(&self) -> Result<()> {
        if self.allocator.max_attempts == 0 {
            anyhow::bail!("allocator.max_attempts must be > 0");
        }
        if self.allocator.deadline_ms == Some(0) {
            anyhow::bail!("allocator.deadline_ms must be > 0 when set");
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override store endpoints.
    pub endpoints: Option<Vec<String>>,
    /// Override backend kind.
    pub backend: Option<BackendKind>,
    /// Override retry ceiling.
    pub max_attempts: Option<u32>,
    /// Override allocation deadline.
    pub deadline_ms: Option<u64>,
}
