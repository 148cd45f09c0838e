// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procrun",
    version,
    about = "Run an external command, stream its output, and report how it ended.",
    long_about = None,
    after_help = "Ctrl-C once cancels the command; a second Ctrl-C kills it and exits."
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Procrun.toml` in the current working directory if present,
    /// built-in defaults otherwise.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the invocation and effective config, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Executable to run. Resolved through `PATH`; no shell is involved.
    #[arg(value_name = "COMMAND", required = true)]
    pub command: String,

    /// Arguments passed to the command verbatim, one token each.
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
