//! List command implementation.

use super::{open_allocator, parse_pool};
use crate::core::config::Config;
use crate::pool::Pool;
use anyhow::Result;
use clap::{Args, ValueEnum};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// List assigned addresses in a pool.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Pool in CIDR notation.
    pub pool: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = ListFormat::Text)]
    pub format: ListFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// One address per line.
    Text,
    /// A single JSON object.
    Json,
}

/// Run the list command.
pub async fn run_list(args: ListArgs, config: &Config) -> Result<()> {
    let pool = parse_pool(&args.pool)?;
    let allocator = open_allocator(config)?;
    let assigned = allocator.list_assigned(&pool).await?;
    println!("{}", render(&pool, &assigned, args.format)?);
    Ok(())
}

fn render(pool: &Pool, assigned: &BTreeSet<IpAddr>, format: ListFormat) -> Result<String> {
    match format {
        ListFormat::Text => Ok(assigned
            .iter()
            .map(|addr| addr.to_string())
            .collect::<Vec<_>>()
            .join("\n")),
        ListFormat::Json => {
            let value = serde_json::json!({
                "pool": pool.to_string(),
                "usable": pool.usable_count().to_string(),
                "assigned": assigned.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            });
            Ok(serde_json::to_string_pretty(&value)?)
        }
    }
}
