//! Binary crate for the `weather` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments and environment overrides
//! - Logging setup
//! - Printing the one-line summary and choosing the exit code

use clap::Parser;
use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    // Must happen before the runtime spawns its worker threads.
    nowcast_core::net::scrub_proxy_env();

    let cmd = cli::Cli::parse();
    cli::init_logging(cmd.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(cmd.run())
}
