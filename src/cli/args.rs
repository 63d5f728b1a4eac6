//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// jvm-vendors - Java runtime buildpack
///
/// Selects a JDK, JRE or native-image toolchain from the buildpack's
/// dependency catalog and installs it into build layers.
#[derive(Parser, Debug)]
#[command(name = "jvm-vendors")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Offer build plan alternatives (exit 100 when not applicable)
    Detect(DetectArgs),

    /// Plan and contribute runtime layers
    Build(BuildArgs),

    /// Print heap dump options for the launch environment
    HeapDump,
}

/// Arguments for the detect command
#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Directory containing buildpack.toml
    #[arg(long, env = "CNB_BUILDPACK_DIR", default_value = ".")]
    pub buildpack_dir: PathBuf,

    /// Write the build plan here instead of stdout
    #[arg(short, long, env = "CNB_BUILD_PLAN_PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Layers root directory
    #[arg(long, env = "CNB_LAYERS_DIR")]
    pub layers: PathBuf,

    /// Resolved buildpack plan (plan.toml)
    #[arg(long, env = "CNB_BP_PLAN_PATH")]
    pub plan: PathBuf,

    /// Dependency cache root (<root>/<sha256>/<file>)
    #[arg(long)]
    pub cache: PathBuf,

    /// Application directory
    #[arg(long, env = "CNB_APP_DIR", default_value = ".")]
    pub app: PathBuf,

    /// Stack id used to filter dependencies
    #[arg(long, env = "CNB_STACK_ID", default_value = "")]
    pub stack: String,

    /// Directory containing buildpack.toml and bin/helper
    #[arg(long, env = "CNB_BUILDPACK_DIR", default_value = ".")]
    pub buildpack_dir: PathBuf,

    /// Summary format
    #[arg(short, long, default_value = "json")]
    pub format: OutputFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// Output format for the build summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable text
    Text,
}
