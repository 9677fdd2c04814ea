//! Command-line definitions for the `netrepair` binary.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Directory scanned when no `--root` or `--dump` is given.
pub const DEFAULT_ROOT: &str = "/etc/systemd";

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "netrepair",
    about = "Inspect, validate and safely override systemd configuration",
    version
)]
pub struct Cli {
    /// Selected subcommand.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Settings file (default: $XDG_CONFIG_HOME/netrepair/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lint resolver settings and verify unit files
    Validate(ValidateOpts),
    /// Show active settings per file
    Panel(SourceOpts),
    /// Emit the configuration as a JSON schema document
    Schema(SchemaOpts),
    /// Turn a schema document back into dump text
    Render(RenderOpts),
    /// Override one option through a drop-in file
    Edit(EditOpts),
    /// Generate shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Subcommand name, used to name the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Validate(_) => "validate",
            Self::Panel(_) => "panel",
            Self::Schema(_) => "schema",
            Self::Render(_) => "render",
            Self::Edit(_) => "edit",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Where configuration is read from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceOpts {
    /// Parse a saved dump instead of scanning a directory
    #[arg(long, conflicts_with_all = ["root", "cat_config"])]
    pub dump: Option<PathBuf>,

    /// Directory to scan (default: /etc/systemd)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Build the dump with `systemd-analyze cat-config` instead of reading files
    #[arg(long)]
    pub cat_config: bool,
}

/// Options for the `validate` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ValidateOpts {
    /// Directory to scan
    #[arg(long, default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Verify unit files one at a time (parallel is enabled by default)
    #[arg(long = "no-parallel", action = clap::ArgAction::SetFalse)]
    pub parallel: bool,

    /// Per-file verification timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

/// Options for the `schema` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct SchemaOpts {
    /// Where the configuration is read from.
    #[command(flatten)]
    pub source: SourceOpts,

    /// Write the document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Options for the `render` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RenderOpts {
    /// Schema document produced by `netrepair schema`
    #[arg(long)]
    pub schema: PathBuf,
}

/// Options for the `edit` subcommand.
///
/// Without `--file`, the edit is chosen interactively.
#[derive(Parser, Debug, Clone)]
pub struct EditOpts {
    /// Where the configuration is read from.
    #[command(flatten)]
    pub source: SourceOpts,

    /// Write the drop-in here instead of `<file>.d`
    #[arg(long)]
    pub dropin_dir: Option<PathBuf>,

    /// File holding the option
    #[arg(long, requires_all = ["key", "value"])]
    pub file: Option<String>,

    /// Section of the option (omit for options before any section header)
    #[arg(long, requires = "file")]
    pub section: Option<String>,

    /// Option key
    #[arg(long, requires = "file")]
    pub key: Option<String>,

    /// New value
    #[arg(long, requires = "file", allow_hyphen_values = true)]
    pub value: Option<String>,

    /// Write without asking for confirmation
    #[arg(short, long, requires = "file")]
    pub yes: bool,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    pub shell: clap_complete::Shell,
}
