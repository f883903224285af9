//! Command-line interface for airspace-copilot.
//!
//! This module provides the CLI structure and plain-text rendering for the
//! `airspace` binary.

mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AlertsCommand, AnalyzeCommand, AskCommand, ConfigCommand, FlightsCommand, IngestCommand,
    MonitorCommand, OutputFormat, StatusCommand, TrackCommand,
};

/// airspace - Regional flight snapshots for operations and travelers
///
/// Summarizes regional air traffic, surfaces anomalous flights, and answers
/// traveler questions about a single flight.
#[derive(Debug, Parser)]
#[command(name = "airspace")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Operations summary of a region
    Analyze(AnalyzeCommand),

    /// Track one flight as a traveler
    Track(TrackCommand),

    /// Track a flight and ask a question about it
    Ask(AskCommand),

    /// Active alerts of a region
    Alerts(AlertsCommand),

    /// List the flights of a region
    Flights(FlightsCommand),

    /// Load a raw payload into the snapshot directory
    Ingest(IngestCommand),

    /// Watch the snapshot directory and log alert counts
    Monitor(MonitorCommand),

    /// Show snapshot store status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
