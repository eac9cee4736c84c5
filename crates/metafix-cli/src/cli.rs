//! CLI argument definitions for the metafix postprocessor.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "metafix",
    version,
    about = "Rule-based metadata postprocessing for a document management service",
    long_about = "Apply a directory of YAML rules to documents in a document\n\
                  management service: match, extract fields from the content,\n\
                  rewrite metadata through templates, and validate the result.\n\
                  Every change is recorded in a restorable backup file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

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

#[derive(Subcommand)]
pub enum Command {
    /// Run the ruleset over the selected documents.
    Process(ProcessArgs),

    /// Replay a backup file, restoring the recorded field values.
    Restore(RestoreArgs),
}

#[derive(Parser)]
pub struct ProcessArgs {
    /// Which documents to process.
    #[arg(value_enum, value_name = "SELECTOR")]
    pub selector: SelectorArg,

    /// Document id, or the name of the selected correspondent, document
    /// type, tag or storage path. Required for every selector except 'all'.
    #[arg(value_name = "NAME_OR_ID")]
    pub name_or_id: Option<String>,

    /// Directory containing the YAML rule files.
    #[arg(long = "rules-dir", value_name = "DIR", default_value = "rules.d")]
    pub rules_dir: PathBuf,

    /// Base URL of the document management service.
    #[arg(long, env = "METAFIX_URL", value_name = "URL")]
    pub url: String,

    /// API token for the service.
    #[arg(long, env = "METAFIX_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub token: String,

    /// Tag to apply to any document the run changed.
    #[arg(long = "postprocessing-tag", value_name = "TAG")]
    pub postprocessing_tag: Option<String>,

    /// Tag to apply to documents that fail validation. Validation only
    /// runs when this is set.
    #[arg(long = "invalid-tag", value_name = "TAG")]
    pub invalid_tag: Option<String>,

    /// Compute and log changes without patching anything.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Skip the validation pass entirely.
    #[arg(long = "skip-validation")]
    pub skip_validation: bool,

    /// Write pre-change values to this backup file. Without a value, or
    /// given a directory, a timestamped file name is generated.
    #[arg(long = "backup", value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    pub backup: Option<PathBuf>,
}

#[derive(Parser)]
pub struct RestoreArgs {
    /// Backup file to replay.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Base URL of the document management service.
    #[arg(long, env = "METAFIX_URL", value_name = "URL")]
    pub url: String,

    /// API token for the service.
    #[arg(long, env = "METAFIX_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub token: String,

    /// Log what would be restored without patching anything.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

/// Document selection modes.
#[derive(Clone, Copy, ValueEnum)]
pub enum SelectorArg {
    All,
    DocumentId,
    Correspondent,
    DocumentType,
    Tag,
    StoragePath,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
