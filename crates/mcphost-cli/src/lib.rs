//! The `mcphost` command-line adapter.
//!
//! Loads settings and the servers file, wires an [`McpManager`] in
//! [`bootstrap`], and dispatches subcommands to [`handlers`].
//!
//! [`McpManager`]: mcphost_mcp::McpManager
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary target only
use dotenvy as _;
use tokio as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliConfig, CliContext, bootstrap, init_logging};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
