//! Host error types.
//!
//! This module defines the typed outcomes the host returns to its callers.
//! A misbehaving tool server only ever produces one of these values; it
//! never takes the host process down.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the tool host.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The process could not be located or launched.
    #[error("Failed to spawn server '{server_id}': {reason}")]
    Spawn { server_id: String, reason: String },

    /// Protocol violation or timeout during initialize / tools/list.
    #[error("Handshake with server '{server_id}' failed: {reason}")]
    Handshake { server_id: String, reason: String },

    /// The server answered with a JSON-RPC error object.
    #[error("Server returned error: code={code}, message={message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// No response arrived within the request budget.
    #[error("Timed out after {timeout_ms}ms waiting for '{method}' on server '{server_id}'")]
    Timeout {
        server_id: String,
        method: String,
        timeout_ms: u64,
    },

    /// The process exited or was stopped while the request was pending.
    #[error("Server '{server_id}' disconnected")]
    ServerDisconnected { server_id: String },

    /// No ready server or built-in declares this tool.
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Unknown server: {server_id}")]
    UnknownServer { server_id: String },

    #[error("Server already exists: {server_id}")]
    AlreadyExists { server_id: String },

    #[error("Server already running: {server_id}")]
    AlreadyRunning { server_id: String },

    /// The owning server is not in the `ready` state.
    #[error("Server '{server_id}' is not ready (state: {state})")]
    NotReady { server_id: String, state: String },

    #[error("Invalid configuration for server '{server_id}': {reason}")]
    InvalidConfig { server_id: String, reason: String },

    /// The transport kind is reserved but not executable.
    #[error("Server '{server_id}' uses unsupported transport '{transport}'")]
    Unsupported { server_id: String, transport: String },

    /// Collision rejected under the `reject` policy.
    #[error("Tool '{tool}' from server '{server_id}' collides with server '{existing_server}'")]
    ToolCollision {
        tool: String,
        existing_server: String,
        server_id: String,
    },

    /// Arguments are not a JSON object.
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A built-in tool failed.
    #[error("Built-in tool '{tool}' failed: {reason}")]
    Builtin { tool: String, reason: String },

    /// A built-in tool was asked to touch a path outside its root.
    #[error("Path is outside the allowed root: {path}")]
    Sandbox { path: String },

    /// Host-level configuration problem (settings, servers file).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HostError {
    pub fn spawn(server_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            server_id: server_id.into(),
            reason: reason.into(),
        }
    }

    pub fn handshake(server_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Handshake {
            server_id: server_id.into(),
            reason: reason.into(),
        }
    }

    pub fn disconnected(server_id: impl Into<String>) -> Self {
        Self::ServerDisconnected {
            server_id: server_id.into(),
        }
    }

    pub fn unknown_server(server_id: impl Into<String>) -> Self {
        Self::UnknownServer {
            server_id: server_id.into(),
        }
    }

    pub fn builtin(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Builtin {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Coarse category for UI handling and exit codes.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Spawn { .. }
            | Self::ServerDisconnected { .. }
            | Self::AlreadyRunning { .. }
            | Self::NotReady { .. } => ErrorCategory::Process,
            Self::Handshake { .. } | Self::Rpc { .. } | Self::Timeout { .. } => {
                ErrorCategory::Protocol
            }
            Self::ToolCollision { .. }
            | Self::InvalidArguments { .. }
            | Self::Builtin { .. }
            | Self::Sandbox { .. } => ErrorCategory::Tool,
            Self::InvalidConfig { .. }
            | Self::Unsupported { .. }
            | Self::AlreadyExists { .. }
            | Self::Config(_) => ErrorCategory::Configuration,
            Self::ToolNotFound { .. } | Self::UnknownServer { .. } => ErrorCategory::NotFound,
        }
    }

    /// Whether this error is a timeout.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this error means the server went away.
    pub const fn is_disconnected(&self) -> bool {
        matches!(self, Self::ServerDisconnected { .. })
    }
}

/// Categories of host errors for UI handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Server process lifecycle error.
    Process,
    /// Protocol communication error.
    Protocol,
    /// Tool invocation error.
    Tool,
    /// Configuration error.
    Configuration,
    /// Unknown tool or server.
    NotFound,
}

/// User-safe error information for host events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Server the error belongs to.
    pub server_id: String,

    /// User-friendly error message.
    pub message: String,

    /// Error category for UI handling.
    pub category: ErrorCategory,
}

impl ErrorInfo {
    pub fn new(server_id: impl Into<String>, error: &HostError) -> Self {
        Self {
            server_id: server_id.into(),
            message: error.to_string(),
            category: error.category(),
        }
    }
}
