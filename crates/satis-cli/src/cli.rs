//! CLI argument definitions for the configuration store tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "satis-store",
    version,
    about = "Inspect and update a lock-guarded configuration file",
    long_about = "Inspect and update a lock-guarded configuration file.\n\n\
                  Writes are atomic, serialized across processes, and preceded by a\n\
                  timestamped backup of the previous content."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub guard: GuardArgs,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

/// Which file to guard and how.
#[derive(Args, Debug, Clone, Default)]
pub struct GuardArgs {
    /// Guard configuration file (TOML). The flags below override its values.
    #[arg(long = "config", value_name = "TOML", global = true)]
    pub config: Option<PathBuf>,

    /// Configuration document to load and store.
    #[arg(short = 'f', long = "file", value_name = "PATH", global = true)]
    pub file: Option<PathBuf>,

    /// Directory for timestamped backups.
    #[arg(long = "backup-dir", value_name = "DIR", global = true)]
    pub backup_dir: Option<PathBuf>,

    /// How long to wait for another writer, in milliseconds (0 fails at once).
    #[arg(long = "lock-timeout-ms", value_name = "MS", global = true)]
    pub lock_timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the current document.
    Show,

    /// Replace the document with new content.
    Write(WriteArgs),

    /// Back up the current document without changing it.
    Backup,

    /// List backup snapshots, oldest first.
    Backups(BackupsArgs),
}

#[derive(Parser)]
pub struct WriteArgs {
    /// Read the new content from this file instead of stdin.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,
}

#[derive(Parser)]
pub struct BackupsArgs {
    /// Print the list as JSON.
    #[arg(long = "json")]
    pub json: bool,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
