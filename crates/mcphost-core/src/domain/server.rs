//! Tool server domain types.
//!
//! These types describe configured tool servers, independent of any process
//! management concerns. They are shared with UI adapters as JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport used to reach a tool server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Child process speaking newline-delimited JSON-RPC over stdio.
    #[default]
    Stdio,
    /// WebSocket endpoint. Reserved, not executable by the host.
    Ws,
    /// HTTP endpoint. Reserved, not executable by the host.
    Http,
}

impl TransportKind {
    /// Wire name of the transport (`stdio`, `ws`, `http`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Ws => "ws",
            Self::Http => "http",
        }
    }

    /// Whether the host can actually start servers of this kind.
    pub const fn is_executable(self) -> bool {
        matches!(self, Self::Stdio)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime state of a tool server.
///
/// Legal edges: `stopped -> starting -> ready`, `starting -> error`,
/// `ready -> stopped`. An errored server may be started again, and stopping a
/// starting or errored server resets it to `stopped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    /// No process is running.
    #[default]
    Stopped,
    /// Process spawned, handshake in progress.
    Starting,
    /// Handshake complete, tools are callable.
    Ready,
    /// Last start attempt failed.
    Error(String),
}

impl ServerState {
    /// Short label used in logs and tables.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Error(_) => "error",
        }
    }

    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Starting or ready: a process is owned by the runtime.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Ready)
    }

    /// Whether `next` is a legal successor of this state.
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::Stopped | Self::Error(_), Self::Starting)
                | (Self::Starting, Self::Ready | Self::Error(_) | Self::Stopped)
                | (Self::Ready | Self::Error(_), Self::Stopped)
        )
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(reason) => write!(f, "error: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

/// Declared configuration of one tool server.
///
/// Created by loading the servers file or by an explicit add; never mutated
/// implicitly by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Unique identifier, also the key in the servers file.
    pub id: String,

    /// Human-friendly name. Defaults to the id when loaded from file.
    #[serde(default)]
    pub name: String,

    /// Transport kind. Only `stdio` is executable.
    #[serde(rename = "type", default)]
    pub transport: TransportKind,

    /// Executable name or path (stdio only). Flags belong in `args`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,

    /// Arguments passed to the executable, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Working directory for the process (absolute).
    #[serde(
        default,
        rename = "cwd",
        alias = "workingDirectory",
        skip_serializing_if = "Option::is_none"
    )]
    pub working_directory: Option<String>,

    /// Environment variable overrides for the process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Extra PATH entries searched for `command` and given to the child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_extra: Option<String>,

    /// Endpoint for the reserved `ws`/`http` transports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Whether the server takes part in start-all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Free-form grouping for UIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Free-form description for UIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ServerConfig {
    /// Create an enabled stdio server configuration.
    #[must_use]
    pub fn stdio(id: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            transport: TransportKind::Stdio,
            command: command.into(),
            args,
            working_directory: None,
            env: BTreeMap::new(),
            path_extra: None,
            url: None,
            enabled: true,
            category: None,
            description: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add an environment variable override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_path_extra(mut self, path_extra: impl Into<String>) -> Self {
        self.path_extra = Some(path_extra.into());
        self
    }

    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Name to show to users: `name` if set, otherwise the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Validate the configuration for its transport kind.
    ///
    /// Returns a user-facing reason when a required field is missing or malformed.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Server id cannot be empty".to_string());
        }

        match self.transport {
            TransportKind::Stdio => {
                if self.command.trim().is_empty() {
                    return Err("Stdio server requires a command".to_string());
                }

                if self.command.contains(char::is_whitespace) {
                    return Err(
                        "Command must be an executable name/path only (e.g., 'npx'). \
                         Put flags and arguments in the 'args' field."
                            .to_string(),
                    );
                }

                if let Some(ref cwd) = self.working_directory {
                    let path = Path::new(cwd);
                    if !path.is_absolute() {
                        return Err(format!("Working directory must be absolute: {cwd}"));
                    }
                    if !path.is_dir() {
                        return Err(format!("Working directory does not exist: {cwd}"));
                    }
                }

                Ok(())
            }
            TransportKind::Ws | TransportKind::Http => {
                let url = self
                    .url
                    .as_deref()
                    .ok_or_else(|| format!("{} server requires url", self.transport))?;

                if url.trim().is_empty() {
                    return Err(format!("{} server url cannot be empty", self.transport));
                }

                Ok(())
            }
        }
    }
}

/// A configured server together with its runtime view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Declared configuration.
    pub config: ServerConfig,
    /// Current runtime state.
    pub state: ServerState,
    /// Number of tools in the server's own catalog (0 unless ready).
    pub tool_count: usize,
    /// Name the server reported during `initialize`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Version the server reported during `initialize`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    /// When the server last reached `ready`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_started_at: Option<DateTime<Utc>>,
}
