//! CLI argument definitions
//!
//! All Clap derive structs for `damage-reflection` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Damage interception and punishment policy engine.
#[derive(Parser, Debug)]
#[command(name = "damage-reflection", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(
        long,
        default_value = "auto",
        global = true,
        env = "DAMAGE_REFLECTION_COLOR"
    )]
    pub color: ColorChoice,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration files.
    Validate(ValidateArgs),

    /// Replay a scenario against a simulated host.
    Simulate(SimulateArgs),

    /// Print the engine status for a configuration.
    Status(StatusArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to YAML configuration file; defaults apply when omitted.
    #[arg(short, long, env = "DAMAGE_REFLECTION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the scenario file.
    #[arg(short, long)]
    pub scenario: PathBuf,

    /// Sleep through `advance` steps instead of skipping time.
    #[arg(long)]
    pub realtime: bool,

    /// Write structured events to this file instead of discarding them.
    #[arg(long, env = "DAMAGE_REFLECTION_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this port while the replay runs.
    #[arg(long, env = "DAMAGE_REFLECTION_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Path to YAML configuration file; defaults apply when omitted.
    #[arg(short, long, env = "DAMAGE_REFLECTION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================
