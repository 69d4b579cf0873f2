//! Command-line interface definitions for filetidy.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, color, catalog location) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Build or refresh the catalog for two trees
//! filetidy scan ~/Photos /mnt/backup/Photos
//!
//! # Show duplicate groups as JSON
//! filetidy duplicates --output json
//!
//! # Preview, then permanently delete every non-canonical copy
//! filetidy delete --dry-run
//! filetidy delete --yes
//!
//! # Copy files into per-extension folders
//! filetidy group ~/Downloads ~/Sorted --mode extension
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::actions::group::GroupingMode;
use crate::config::ConfigOverrides;

/// Bulk filesystem maintenance: duplicate detection, deletion and grouping.
///
/// filetidy hashes files (BLAKE3) into a persistent SQLite catalog, finds
/// duplicates keeping the first-found copy, and can permanently delete the
/// rest or copy files into folders grouped by extension or name.
#[derive(Debug, Parser)]
#[command(name = "filetidy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Catalog database file (default: hashdata.sqlite)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for filetidy.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hash files under one or more directories into the catalog
    Scan(ScanArgs),
    /// Resolve and report duplicate groups from the catalog
    Duplicates(DuplicatesArgs),
    /// Permanently delete every duplicate except the first-found copy
    Delete(DeleteArgs),
    /// Copy files into folders grouped by extension or name
    Group(GroupArgs),
    /// Show catalog contents and the state of the last operation
    Status(StatusArgs),
    /// Remove every row from the catalog
    Clear(ClearArgs),
    /// Show the effective configuration or write a default file
    Config(ConfigArgs),
}

/// Walk filters shared by `scan` and `group`.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Glob patterns to ignore (can be specified multiple times)
    ///
    /// These patterns are added to any .gitignore patterns found.
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links during the walk
    ///
    /// Warning: May cause infinite loops if symlinks form cycles.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directories to scan, in order
    #[arg(value_name = "ROOT", required = true, num_args = 1..)]
    pub roots: Vec<PathBuf>,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Number of I/O threads for hashing (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Do not re-hash files whose size or modification time changed
    #[arg(long)]
    pub no_refresh: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the duplicates subcommand.
#[derive(Debug, Args)]
pub struct DuplicatesArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Do not persist duplicate flags in the catalog
    #[arg(long)]
    pub no_mark: bool,
}

/// Arguments for the delete subcommand.
#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Show what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    ///
    /// Deletion is permanent; there is no trash.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Delete even if a file changed since it was scanned
    #[arg(long)]
    pub no_verify: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the group subcommand.
#[derive(Debug, Args)]
pub struct GroupArgs {
    /// Directory whose files are grouped
    #[arg(value_name = "ORIGIN")]
    pub origin: PathBuf,

    /// Directory the group folders are created in
    #[arg(value_name = "DEST")]
    pub destination: PathBuf,

    /// How to name group folders
    #[arg(short, long, value_enum)]
    pub mode: Option<GroupingMode>,

    /// Copy files whose content is already in the destination
    #[arg(long)]
    pub copy_duplicates: bool,

    /// Show what would be copied without copying anything
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the status subcommand.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the clear subcommand.
#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Arguments for the config subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Write the default configuration to the config file
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file with --init
    #[arg(long, requires = "init")]
    pub force: bool,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// `Some(true)` for a set flag, `None` to leave the config alone.
fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}

impl Cli {
    /// Configuration values given on the command line.
    #[must_use]
    pub fn config_overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            database: self.db.clone(),
            ..ConfigOverrides::default()
        };
        match &self.command {
            Commands::Scan(args) => {
                overrides.io_threads = args.io_threads;
                overrides.follow_symlinks = flag(args.filters.follow_symlinks);
                overrides.skip_hidden = flag(args.filters.skip_hidden);
            }
            Commands::Group(args) => {
                overrides.grouping_mode = args.mode;
                overrides.copy_duplicates = flag(args.copy_duplicates);
                overrides.follow_symlinks = flag(args.filters.follow_symlinks);
                overrides.skip_hidden = flag(args.filters.skip_hidden);
            }
            Commands::Delete(args) => {
                overrides.verify_before_delete = args.no_verify.then_some(false);
            }
            Commands::Duplicates(_)
            | Commands::Status(_)
            | Commands::Clear(_)
            | Commands::Config(_) => {}
        }
        overrides
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use filetidy::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    // Find where the number ends and the suffix begins
    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
