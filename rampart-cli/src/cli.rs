//! CLI argument definitions for rampart-cli.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Rampart WAF event-analysis runner.
///
/// Loads configuration, assembles the analysis pipeline with in-memory
/// collaborators, runs a single analysis request, and prints the run
/// summary as JSON on stdout.
#[derive(Parser, Debug)]
#[command(name = "rampart")]
#[command(version, about, long_about = None)]
pub struct RampartCli {
    /// Path to rampart.toml configuration file.
    ///
    /// When omitted, built-in defaults are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to an analysis request payload (JSON, see AnalysisRequest).
    #[arg(short, long, conflicts_with = "records")]
    pub request: Option<PathBuf>,

    /// Path to a JSON array of raw WAF log records.
    ///
    /// Records are parsed into canonical events and analyzed as a
    /// real-time batch. Requires --organization.
    #[arg(long, requires = "organization")]
    pub records: Option<PathBuf>,

    /// Organization identifier for --records mode.
    #[arg(long)]
    pub organization: Option<String>,

    /// Path to a per-organization alert config row (JSON, camelCase).
    ///
    /// When omitted, the documented defaults apply (in-app only).
    #[arg(long)]
    pub alert_config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without running.
    #[arg(long)]
    pub validate: bool,
}
