//! Core domain types, errors, settings and event ports for mcphost.
//!
//! This crate has no process management. It defines what a tool server and
//! a tool are, the typed errors the host reports, the events it emits, and
//! how host settings and the servers file are loaded.
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;

pub use config::{ConfigFileError, ServersFile, default_config_path};
pub use domain::{
    BUILTIN_SERVER_ID, ServerConfig, ServerInfo, ServerState, Tool, ToolCall, ToolResult,
    TransportKind,
};
pub use events::HostEvent;
pub use ports::{
    BroadcastEmitter, ErrorCategory, ErrorInfo, HostError, HostEventEmitter, NoopEmitter,
};
pub use settings::{CollisionPolicy, HostSettings, SettingsError};
