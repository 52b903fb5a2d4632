//! Command-line argument parsing for the expression analyser
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{DetectionRate, Settings};
use crate::export::ExportFormat;
use crate::session::TimeRange;

/// Expression Analyser - record, review and export expression sessions
#[derive(Parser, Debug)]
#[command(name = "expression-analyser")]
#[command(version)]
#[command(about = "Record expression-analysis sessions and export the results", long_about = None)]
pub struct Args {
    /// Data directory (~/.expression_analyser by default)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// TOML settings file, used instead of the stored settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a live session with the mock detector
    Record {
        /// Number of detections to record
        #[arg(short = 'n', long, default_value_t = 10)]
        samples: usize,

        /// Detection rate in milliseconds, or "realtime"
        #[arg(long)]
        rate: Option<DetectionRate>,

        /// Simulated inference latency in milliseconds
        #[arg(long, default_value_t = crate::inference::DEFAULT_LATENCY_MS)]
        latency_ms: u64,
    },

    /// List archived sessions
    Sessions {
        /// today, week, month, all, or a window like 3600000ms
        #[arg(long)]
        range: Option<TimeRange>,
    },

    /// Show one archived session
    Show {
        /// Session id
        session_id: String,
    },

    /// Dashboard overview of archived sessions
    Overview {
        #[arg(long, default_value = "week")]
        range: TimeRange,

        /// Pad thin histories with demo sessions
        #[arg(long)]
        demo: bool,
    },

    /// Export a session or a summary of all sessions
    Export {
        /// Export this session's samples
        #[arg(long, conflicts_with = "all")]
        session: Option<String>,

        /// Export a summary of archived sessions
        #[arg(long)]
        all: bool,

        #[arg(long)]
        range: Option<TimeRange>,

        /// json or csv (defaults to the stored export format)
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Analyse images and videos in one batch
    Batch {
        /// Files to analyse
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Video sampling rate (every Nth frame)
        #[arg(long, default_value_t = crate::batch::DEFAULT_VIDEO_SAMPLING)]
        sampling: u32,

        /// Save the results to the batch history
        #[arg(long)]
        save: bool,

        /// Write the results with the stored export format
        #[arg(long)]
        export: bool,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List saved batches
    Batches,

    /// View or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Write a full backup of settings, sessions and batches
    Backup {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Delete all stored data
    Clear {
        /// Skip the confirmation note
        #[arg(long)]
        yes: bool,
    },
}

/// Settings subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print current settings
    Show,
    /// Set one option by name, e.g. `minConfidence 60`
    Set { key: String, value: String },
    /// Restore defaults
    Reset,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Data directory (default location if not specified)
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(Settings::default_data_dir)
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Default log filter for this level
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::VeryVerbose => "debug",
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
