//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Plain,
    /// JSON output
    Json,
}

/// Regional analysis arguments.
#[derive(Debug, Args)]
pub struct AnalyzeCommand {
    /// Region to analyze (defaults to `agent.default_region`)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Flight tracking arguments.
#[derive(Debug, Args)]
pub struct TrackCommand {
    /// Callsign or ICAO24 address
    pub flight: String,

    /// Region the flight is in (defaults to `agent.default_region`)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Traveler question arguments.
#[derive(Debug, Args)]
pub struct AskCommand {
    /// Callsign or ICAO24 address of the flight to track
    pub flight: String,

    /// The question about the flight
    pub question: String,

    /// Region the flight is in (defaults to `agent.default_region`)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Alert listing arguments.
#[derive(Debug, Args)]
pub struct AlertsCommand {
    /// Region to list (defaults to `agent.default_region`)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Flight listing arguments.
#[derive(Debug, Args)]
pub struct FlightsCommand {
    /// Region to list (defaults to `agent.default_region`)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Only show anomalous flights
    #[arg(short, long)]
    pub anomalous: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Manual ingestion arguments.
#[derive(Debug, Args)]
pub struct IngestCommand {
    /// Region the payload belongs to
    pub region: String,

    /// Raw payload file (current or legacy shape)
    pub file: PathBuf,
}

/// Directory watching arguments.
#[derive(Debug, Args)]
pub struct MonitorCommand {
    /// Seconds between rescans (defaults to `store.refresh_interval_secs`)
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        file: Option<PathBuf>,
    },
}
