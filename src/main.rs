//! OpenAPI from traffic - Command-line tool for building OpenAPI documentation from
//! observed HTTP traffic.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-traffic [OPTIONS] <COMMAND>
//! ```
//!
//! # Examples
//!
//! Derive a specification from a browser capture:
//! ```bash
//! openapi-from-traffic capture session.har -o capture_spec.yaml
//! ```
//!
//! Merge it with statically discovered routes and a base document:
//! ```bash
//! openapi-from-traffic merge --capture capture_spec.json --static-routes routes.json \
//!     --base plugin_spec.yaml -o merged_spec.yaml
//! ```
//!
//! Do both in one go, with verbose logging:
//! ```bash
//! openapi-from-traffic run session.har --static-routes routes.json -o merged_spec.yaml -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_traffic::cli;

fn main() -> Result<()> {
    // Parse once to read the verbose flag, validate after the logger is up
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI from traffic starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;
    cli::run(args)?;

    info!("Done");

    Ok(())
}
