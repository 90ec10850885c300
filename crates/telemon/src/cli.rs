//! Clap derive structures for the `telemon` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// telemon -- live terminal dashboards for device telemetry
#[derive(Debug, Parser)]
#[command(
    name = "telemon",
    version,
    about = "Live terminal dashboards for serial and message-bus device telemetry",
    long_about = "Reads telemetry from a serial device or a WebSocket message bus,\n\
        decodes it, and keeps a dashboard of bars, lamps, tables and logs up to date.\n\n\
        The dashboard layout lives in the config file; see `telemon config init`.",
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
    /// Config file to use instead of the platform default
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the device and show the dashboard
    Run(RunArgs),

    /// List serial devices telemon would autodetect
    Ports(PortsArgs),

    /// Inspect or create the config file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputArg {
    /// Redraw the dashboard in this terminal
    Terminal,
    /// Push rendered elements to WebSocket viewers
    Remote,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Serial device path (skips autodetection)
    #[arg(long, short = 'p')]
    pub port: Option<String>,

    /// Baud rate
    #[arg(long, short = 'b')]
    pub baud: Option<u32>,

    /// Only autodetect devices whose path matches this pattern
    #[arg(long, short = 's', conflicts_with = "port")]
    pub search: Option<String>,

    /// Where rendered frames go
    #[arg(long, short = 'o', value_enum)]
    pub output: Option<OutputArg>,

    /// Listen address for remote viewers (implies --output remote)
    #[arg(long)]
    pub listen: Option<String>,
}

#[derive(Debug, Args)]
pub struct PortsArgs {
    /// Only list devices whose path matches this pattern
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the resolved configuration (file + environment)
    Show,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long, short = 'f')]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
