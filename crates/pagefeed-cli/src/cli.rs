//! # CLI Structure and Argument Parsing
//!
//! `pagefeed` drives the pagination pipeline from the command line: it pages
//! through the configured list resource, persists what it fetched, and
//! resolves item images through the disk cache.
//!
//! ```bash
//! # Fetch the first page, or the next one if pages are already stored
//! pagefeed next
//!
//! # Start over from the first page
//! pagefeed reload
//!
//! # Show stored items grouped by initial
//! pagefeed list --search smith
//!
//! # Resolve an image through the cache
//! pagefeed image https://rickandmortyapi.com/api/character/avatar/1.jpeg
//! ```
//!
//! Every command accepts `--format json` for machine-readable output.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Main CLI structure for the `pagefeed` command.
#[derive(Parser, Clone, Debug)]
#[command(name = "pagefeed")]
#[command(version)]
#[command(about = "pagefeed - page through, persist and cache a remote list", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, env = "PAGEFEED_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Output rendering.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// A single JSON document
    Json,
}

/// Available subcommands.
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Load the next page (the first page when nothing is stored)
    Next {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Reload from the first page, replacing every stored page
    Reload {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show stored items grouped by the first letter of their name
    List {
        /// Only show items whose name contains this text (overrides config)
        #[arg(short = 's', long)]
        search: Option<String>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Resolve an image URL through the local cache
    Image {
        /// Remote image URL
        url: String,

        /// Also copy the image bytes to this file
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Summarize stored pages and directories
    Status {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

impl Commands {
    /// Output format selected for this command.
    pub const fn format(&self) -> OutputFormat {
        match self {
            Self::Next { format }
            | Self::Reload { format }
            | Self::List { format, .. }
            | Self::Image { format, .. }
            | Self::Status { format } => *format,
        }
    }
}
