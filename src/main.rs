//! ipalloc - CLI entrypoint.
//!
//! Usage:
//!   ipalloc allocate 10.0.0.0/24 [--max-attempts N] [--deadline-ms MS]
//!   ipalloc release 10.0.0.0/24 10.0.0.7
//!   ipalloc list 10.0.0.0/24 [--format json]
//!   ipalloc config validate --config config/ipalloc.toml
//!
//! Exits 2 when `allocate` finds the pool exhausted.

use clap::Parser;
use ipalloc::cli::{self, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
