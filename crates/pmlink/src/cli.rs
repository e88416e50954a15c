//! Clap derive structures for the `pmlink` CLI.
//!
//! Kept free of workspace crates so `build.rs` can include it to render
//! man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pmlink -- talk to a PMIC evaluation board over its shell
#[derive(Debug, Parser)]
#[command(
    name = "pmlink",
    version,
    about = "Monitor and command PMIC evaluation boards",
    long_about = "Connects to the board's shell through a serial bridge, decodes its\n\
        log stream into typed events (telemetry, interrupts, connectivity)\n\
        and correlates shell commands with their replies.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'p', env = "PMLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Shell endpoint, e.g. tcp://127.0.0.1:4000 (overrides profile)
    #[arg(long, short = 'e', env = "PMLINK_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// PMIC model: npm1300, npm1304 or npm2100 (overrides profile)
    #[arg(long, short = 'm', env = "PMLINK_MODEL", global = true)]
    pub model: Option<String>,

    /// Reset the board as soon as the PMIC is reachable again
    #[arg(long, global = true)]
    pub auto_reboot: bool,

    /// Command timeout in milliseconds (overrides profile)
    #[arg(long, short = 't', env = "PMLINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PMLINK_OUTPUT",
        default_value = "plain",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text, one event per line
    Plain,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON (one object per line)
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream decoded events from the device
    #[command(alias = "mon")]
    Monitor(MonitorArgs),

    /// Send one shell command and print its reply
    Send(SendArgs),

    /// Fetch and print the diagnostic error logs
    Errlog,

    /// Decode a captured shell log offline
    Replay(ReplayArgs),

    /// Show the capabilities of the selected PMIC model
    Info,

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Subcommand Arguments ─────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Only show these event kinds (comma-separated, e.g. log,adc-sample)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Stop after this many seconds
    #[arg(long, short = 'd')]
    pub duration: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Command text; multiple words are joined with spaces
    #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
    pub command: Vec<String>,

    /// Collect a multi-line reply up to the next prompt
    #[arg(long)]
    pub dump: bool,

    /// Only accept a reply line starting with this prefix
    #[arg(long, conflicts_with = "dump")]
    pub expect: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Captured shell output, one line per device line ("-" for stdin)
    pub file: PathBuf,

    /// Only show these event kinds (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file location
    Path,

    /// Display the resolved configuration
    Show,

    /// Write a starter configuration file
    Init {
        /// Endpoint for the default profile
        #[arg(long, default_value = "tcp://127.0.0.1:4000")]
        endpoint: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
