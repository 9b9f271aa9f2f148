//! Allocate command implementation.

use super::{open_allocator, parse_pool};
use crate::allocator::{AllocateOptions, SequentialAllocator};
use crate::cli::EXIT_POOL_EXHAUSTED;
use crate::core::config::Config;
use crate::pool::Pool;
use anyhow::Result;
use clap::Args;
use std::process::ExitCode;
use tokio::sync::watch;

/// Allocate the lowest free address in a pool.
///
/// `--max-attempts` and `--deadline-ms` are configuration overrides and are
/// validated with the rest of the effective configuration.
#[derive(Args, Debug)]
pub struct AllocateArgs {
    /// Pool in CIDR notation (e.g. 10.0.0.0/24).
    pub pool: String,

    /// Scan-and-claim attempts before giving up.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Overall deadline in milliseconds.
    #[arg(long)]
    pub deadline_ms: Option<u64>,
}

/// Run the allocate command.
///
/// Prints the address on success. An exhausted pool exits with
/// [`EXIT_POOL_EXHAUSTED`].
pub async fn run_allocate(args: AllocateArgs, config: &Config) -> Result<ExitCode> {
    let pool = parse_pool(&args.pool)?;
    let allocator = open_allocator(config)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let options = config.allocator.options().with_cancel(cancel_rx);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling allocation");
            let _ = cancel_tx.send(true);
        }
    });

    let status = allocate_and_report(&allocator, &pool, &options).await;
    interrupt.abort();
    Ok(ExitCode::from(status?))
}

/// Allocate from `pool`, report the outcome and return the process status.
pub async fn allocate_and_report(
    allocator: &SequentialAllocator,
    pool: &Pool,
    options: &AllocateOptions,
) -> Result<u8> {
    match allocator.allocate_with(pool, options).await? {
        Some(address) => {
            println!("{}", address);
            Ok(0)
        }
        None => {
            eprintln!("pool {} is exhausted", pool);
            Ok(EXIT_POOL_EXHAUSTED)
        }
    }
}
