//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Host stdio tool servers and call their tools.
#[derive(Parser)]
#[command(name = "mcphost")]
#[command(about = "Run stdio tool servers and call their tools")]
#[command(version)]
pub struct Cli {
    /// Servers file to use instead of the platform default
    #[arg(long = "config", env = "MCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Root directory for the built-in filesystem tools
    #[arg(long = "root", global = true)]
    pub root: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
