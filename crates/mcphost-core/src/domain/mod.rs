//! Tool host domain types.
//!
//! These types represent tool servers and tools independent of any
//! infrastructure concerns (process management, configuration files).
//!
//! # Design
//!
//! - `ServerConfig` - Declared configuration of one server
//! - `TransportKind` - Connection type (only stdio is executable)
//! - `ServerState` - Runtime state (stopped, starting, ready, error)
//! - `ServerInfo` - Configuration plus runtime view, for listings
//! - `Tool` - Tool exposed by a server or built into the host
//! - `ToolCall` / `ToolResult` - Invocation and normalised outcome

mod server;
mod tool;

pub use server::{ServerConfig, ServerInfo, ServerState, TransportKind};
pub use tool::{BUILTIN_SERVER_ID, Tool, ToolCall, ToolResult};
