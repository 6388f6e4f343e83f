// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pipekit`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipekit",
    version,
    about = "Build every source-to-sink chain of typed tasks and run them with a shared cache.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Pipekit.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Pipekit.toml")]
    pub config: String,

    /// Input value handed to every pipeline.
    #[arg(long, value_name = "TEXT", conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Read the input value from a file instead.
    #[arg(long, value_name = "PATH")]
    pub input_file: Option<PathBuf>,

    /// Maximum number of tasks per pipeline. Overrides `[config].max_depth`.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Run configuration entry passed to every task. Overrides the same key
    /// in `[run]`; may be repeated.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_run_setting)]
    pub run_settings: Vec<(String, String)>,

    /// Log progress for every pipeline. Also enabled by `[config].verbose`.
    #[arg(long)]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEKIT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task tree and pipelines, but don't run
    /// anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_run_setting(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
