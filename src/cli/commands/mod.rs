//! CLI command implementations.

mod allocate;
mod config;
mod list;
mod release;

pub use allocate::{allocate_and_report, run_allocate, AllocateArgs};
pub use config::{run_config, ConfigArgs};
pub use list::{run_list, ListArgs, ListFormat};
pub use release::{run_release, ReleaseArgs};

use crate::allocator::SequentialAllocator;
use crate::core::config::Config;
use crate::pool::Pool;
use anyhow::{Context, Result};

/// Allocator over the configured store, with configured default options.
pub(crate) fn open_allocator(config: &Config) -> Result<SequentialAllocator> {
    let store = crate::store::open(&config.store)
        .with_context(|| format!("failed to open {} store", config.store.backend))?;
    Ok(SequentialAllocator::new(store).with_options(config.allocator.options()))
}

pub(crate) fn parse_pool(text: &str) -> Result<Pool> {
    text.parse::<Pool>()
        .with_context(|| format!("cannot use {:?} as a pool", text))
}
