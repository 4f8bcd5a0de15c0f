//! CLI definitions for ytharvest.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ytharvest - YouTube channel metadata harvester
#[derive(Parser, Debug)]
#[command(name = "ytharvest")]
#[command(version)]
#[command(about = "Harvest YouTube channel and video metadata into SQLite")]
#[command(long_about = r#"
ytharvest fetches a channel's profile and its most recent uploads from the
YouTube Data API and stores them in a local SQLite database. Re-ingesting a
channel replaces everything previously stored for it.

Quick start:
  1. Get an API key from the Google Cloud console
  2. Run: ytharvest ingest UC_x5XG1OV2P6uZZ5FSM9Ttw --key <KEY>
  3. Explore: ytharvest report --list
"#)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, env = "YTHARVEST_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Output format (defaults to the configured format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Be quiet (errors only)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a channel and its recent videos, replacing any stored copy
    Ingest(IngestArgs),

    /// Search stored channel names and video titles
    Search(SearchArgs),

    /// Run a named report over the stored data
    Report(ReportArgs),

    /// List stored channels
    Channels,

    /// List stored videos for a channel
    Videos(VideosArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Channel identifier (e.g. `UC_x5XG1OV2P6uZZ5FSM9Ttw`)
    pub channel_id: String,

    /// API key (overrides config and `YTHARVEST_API_KEY`)
    #[arg(long, short = 'k')]
    pub key: Option<String>,

    /// Number of playlist pages to walk
    #[arg(long, short = 'p')]
    pub pages: Option<usize>,

    /// Playlist entries per page (1-50)
    #[arg(long, short = 's')]
    pub page_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text to look for in channel names and video titles
    pub query: String,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Report name (see --list)
    #[arg(required_unless_present = "list")]
    pub name: Option<String>,

    /// List available reports
    #[arg(long, short = 'l')]
    pub list: bool,
}

#[derive(Args, Debug)]
pub struct VideosArgs {
    /// Channel identifier
    pub channel_id: String,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show current configuration (the default; combine with --init to do both)
    #[arg(long)]
    pub show: bool,

    /// Write a default config file if none exists
    #[arg(long)]
    pub init: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}
