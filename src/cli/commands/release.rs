//! Release command implementation.

use super::{open_allocator, parse_pool};
use crate::core::config::Config;
use anyhow::Result;
use clap::Args;
use std::net::IpAddr;

/// Release an address back to its pool.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Pool in CIDR notation.
    pub pool: String,

    /// Address to release.
    pub address: IpAddr,
}

/// Run the release command. Releasing an unassigned address is not an error.
pub async fn run_release(args: ReleaseArgs, config: &Config) -> Result<()> {
    let pool = parse_pool(&args.pool)?;
    let allocator = open_allocator(config)?;

    if allocator.release(&pool, args.address).await? {
        println!("released {}", args.address);
    } else {
        println!("{} was not assigned in {}", args.address, pool);
    }
    Ok(())
}
