//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Environment variable overriding the log directory
pub const LOG_DIR_ENV: &str = "RECOCACHE_LOG_DIR";

/// recocache - top-sites cache invalidation coordinator
#[derive(Parser)]
#[command(
    name = "rc",
    about = "Debounced invalidation coordinator for the top-sites recommendations cache",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive a coordinator against the simulated store and report what it did
    Simulate {
        /// Events to emit, in order (account-changed, sync-finished, private-data-cleared, ...)
        #[arg(value_name = "EVENT")]
        events: Vec<String>,

        /// Pause between emitted events in milliseconds
        #[arg(short, long, default_value = "0")]
        gap_ms: u64,

        /// Non-forced invalidations to issue after the events
        #[arg(short, long, default_value = "0")]
        soft: u32,

        /// Tear the store down before the soft invalidations
        #[arg(long)]
        shutdown: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config {
        /// Output format (text prints YAML)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Get the path to the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let dir = std::env::var_os(LOG_DIR_ENV).map(PathBuf::from).unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recocache")
            .join("logs")
    });
    let path = dir.join("recocache.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Output format for simulate/config commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text, json, or yaml", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}
