use clap::{Parser, Subcommand, ValueEnum};
use eventhub_core::config::default_config_path;
use eventhub_core::models::Fields;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "eventhub")]
#[command(
    author,
    version,
    about = "Keeps local records in sync with paginated sources and replays scans back to them"
)]
#[command(after_help = "Examples:
  eventhub run
  eventhub import members
  eventhub items members --format json > members.json
  eventhub scan members 101 --action checkin -p gate=north")]
pub struct Config {
    /// Path to the configuration file [default: <config_dir>/eventhub/config.toml]
    #[arg(short, long, env = "EVENTHUB_CONFIG", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// The configuration file to read, if one can be located.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(default_config_path)
    }

    /// Log level: `-v` flags win over the configured level.
    pub fn log_level(&self, configured: &str) -> Level {
        match self.verbose {
            0 => Level::from_str(configured).unwrap_or(Level::INFO),
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the keeper until Ctrl-C
    Run,
    /// Import one source now and print a summary
    #[command(after_help = "Example: eventhub import members")]
    Import {
        /// Source name from the configuration file
        source: String,
    },
    /// Export the records stored for a source
    #[command(after_help = "Examples:
  eventhub items members > members.jsonl
  eventhub items members --format json")]
    Items {
        source: String,
        /// Output format for exported records
        #[arg(short, long, default_value = "jsonl")]
        format: ExportFormat,
    },
    /// Print one record with its activity log
    Show { source: String, key: String },
    /// Record a scan on a record and replay it to the source
    #[command(after_help = "Example: eventhub scan members 101 --action checkin -p gate=north")]
    Scan {
        source: String,
        key: String,
        /// Activity name
        #[arg(short, long, default_value = "scan")]
        action: String,
        /// Activity property, repeatable
        #[arg(short = 'p', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },
    /// List configured sources
    Sources,
}

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// JSON Lines format (one JSON object per line)
    Jsonl,
    /// Standard JSON array format
    Json,
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty property name in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Collects repeated `-p` flags; the last value for a name wins.
pub fn properties_map(properties: &[(String, String)]) -> Fields {
    properties.iter().cloned().collect()
}
