//! Stdio tool server host.
//!
//! Spawns tool servers as child processes, speaks newline-delimited
//! JSON-RPC 2.0 with them over stdin/stdout, and routes tool calls by name
//! through a merged registry. [`McpManager`] is the entry point.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod builtin;
pub mod codec;
pub mod correlator;
pub mod gate;
pub mod handshake;
pub(crate) mod manager;
pub mod process;
pub mod protocol;
pub mod registry;

// Re-export domain types from core for convenience
pub use mcphost_core::{
    HostError, HostEvent, HostSettings, ServerConfig, ServerInfo, ServerState, Tool, ToolCall,
    ToolResult,
};

pub use builtin::{BuiltinTools, Sandbox};
pub use codec::{Decoded, IncomingMessage, LineCodec};
pub use correlator::Correlator;
pub use gate::{ConcurrencyGate, GatePermit};
pub use manager::McpManager;
pub use registry::{Route, Shadowed, ToolRegistry};
