use crate::capture::{CaptureConfig, CaptureDocument};
use crate::openapi_builder::OpenApiBuilder;
use crate::pipeline::build_final_spec;
use crate::serializer::{load_document, write_document};
use crate::static_routes::StaticRouteAdapter;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// OpenAPI from traffic - Build an OpenAPI document from captured traffic and discovered routes
#[derive(Parser, Debug)]
#[command(name = "openapi-from-traffic")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Derive a specification from a HAR capture
    Capture {
        /// Path to the HAR capture
        #[arg(value_name = "HAR")]
        har: PathBuf,

        /// Output file; written as <stem>.json and <stem>.yaml
        #[arg(short = 'o', long = "output", value_name = "FILE", default_value = "capture_spec.yaml")]
        output: PathBuf,

        /// URL path prefix of the REST API
        #[arg(long = "api-prefix", value_name = "PREFIX", default_value = "/wp-json")]
        api_prefix: String,
    },

    /// Merge a capture-derived specification with static routes and an optional base
    Merge {
        /// Capture-derived specification (JSON or YAML)
        #[arg(long = "capture", value_name = "FILE")]
        capture: PathBuf,

        /// Static route list (JSON or YAML)
        #[arg(long = "static-routes", value_name = "FILE")]
        static_routes: PathBuf,

        /// Base specification (JSON or YAML)
        #[arg(long = "base", value_name = "FILE")]
        base: Option<PathBuf>,

        /// Output file; written as <stem>.json and <stem>.yaml
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: PathBuf,
    },

    /// Capture and merge in one invocation
    Run {
        /// Path to the HAR capture
        #[arg(value_name = "HAR")]
        har: PathBuf,

        /// Static route list (JSON or YAML)
        #[arg(long = "static-routes", value_name = "FILE")]
        static_routes: PathBuf,

        /// Base specification (JSON or YAML)
        #[arg(long = "base", value_name = "FILE")]
        base: Option<PathBuf>,

        /// URL path prefix of the REST API
        #[arg(long = "api-prefix", value_name = "PREFIX", default_value = "/wp-json")]
        api_prefix: String,

        /// Output file; written as <stem>.json and <stem>.yaml
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: PathBuf,
    },
}

impl Command {
    fn inputs(&self) -> Vec<&Path> {
        match self {
            Command::Capture { har, .. } => vec![har.as_path()],
            Command::Merge {
                capture,
                static_routes,
                base,
                ..
            } => {
                let mut inputs = vec![capture.as_path(), static_routes.as_path()];
                inputs.extend(base.as_deref());
                inputs
            }
            Command::Run {
                har,
                static_routes,
                base,
                ..
            } => {
                let mut inputs = vec![har.as_path(), static_routes.as_path()];
                inputs.extend(base.as_deref());
                inputs
            }
        }
    }
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    for input in args.command.inputs() {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }
        if !input.is_file() {
            anyhow::bail!("Input path is not a file: {}", input.display());
        }
        info!("Input: {}", input.display());
    }

    Ok(args)
}

/// Run the selected command
pub fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Capture {
            har,
            output,
            api_prefix,
        } => {
            let capture = capture_spec(&har, &api_prefix)?;
            write_output(&capture, &output)
        }
        Command::Merge {
            capture,
            static_routes,
            base,
            output,
        } => {
            let capture = load_document(&capture)
                .with_context(|| format!("Failed to load capture spec {}", capture.display()))?;
            let merged = merge_with_routes(&capture, &static_routes, base.as_deref())?;
            write_output(&merged, &output)
        }
        Command::Run {
            har,
            static_routes,
            base,
            api_prefix,
            output,
        } => {
            let capture = capture_spec(&har, &api_prefix)?;
            let merged = merge_with_routes(&capture, &static_routes, base.as_deref())?;
            write_output(&merged, &output)
        }
    }
}

fn capture_spec(har: &Path, api_prefix: &str) -> Result<Value> {
    info!("Reading capture {}...", har.display());
    let document = CaptureDocument::from_file(har)
        .with_context(|| format!("Failed to read capture {}", har.display()))?;

    let config = CaptureConfig::default().with_api_prefix(api_prefix);
    let spec = OpenApiBuilder::from_capture(&document, config);
    info!(
        "Capture summary: {} records, {} endpoints",
        spec.records,
        spec.document.paths.len()
    );

    spec.document
        .to_value()
        .context("Failed to convert capture spec to a document tree")
}

fn merge_with_routes(capture: &Value, static_routes: &Path, base: Option<&Path>) -> Result<Value> {
    let records = StaticRouteAdapter::load(static_routes)
        .with_context(|| format!("Failed to load static routes {}", static_routes.display()))?;
    let static_paths = StaticRouteAdapter::adapt(&records);

    let base = base
        .map(|path| {
            load_document(path).with_context(|| format!("Failed to load base spec {}", path.display()))
        })
        .transpose()?;

    info!("Merging specifications...");
    let merged = build_final_spec(capture, &static_paths, base.as_ref())?;
    Ok(merged)
}

fn write_output(document: &Value, output: &Path) -> Result<()> {
    let (json_path, yaml_path) = write_document(document, output)?;
    info!("Wrote {}", json_path.display());
    info!("Wrote {}", yaml_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_defaults() {
        let args = CliArgs::try_parse_from(["openapi-from-traffic", "capture", "traffic.har"]).unwrap();
        assert!(!args.verbose);
        match args.command {
            Command::Capture {
                har,
                output,
                api_prefix,
            } => {
                assert_eq!(har, PathBuf::from("traffic.har"));
                assert_eq!(output, PathBuf::from("capture_spec.yaml"));
                assert_eq!(api_prefix, "/wp-json");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_merge_with_global_verbose() {
        let args = CliArgs::try_parse_from([
            "openapi-from-traffic",
            "merge",
            "--capture",
            "capture.json",
            "--static-routes",
            "routes.json",
            "-o",
            "merged.yaml",
            "-v",
        ])
        .unwrap();
        assert!(args.verbose);
        assert_eq!(args.command.inputs().len(), 2);
    }

    #[test]
    fn test_merge_requires_output() {
        let result = CliArgs::try_parse_from([
            "openapi-from-traffic",
            "merge",
            "--capture",
            "capture.json",
            "--static-routes",
            "routes.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_input_is_rejected() {
        let args = CliArgs::try_parse_from([
            "openapi-from-traffic",
            "run",
            "/nonexistent/traffic.har",
            "--static-routes",
            "/nonexistent/routes.json",
            "-o",
            "out.yaml",
        ])
        .unwrap();
        let err = parse_args_from_parsed(args).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
