//! Constructors for server lifecycle events.

use super::HostEvent;
use crate::domain::ServerState;
use crate::ports::ErrorInfo;

impl HostEvent {
    pub fn server_added(server_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ServerAdded {
            server_id: server_id.into(),
            name: name.into(),
        }
    }

    pub fn server_removed(server_id: impl Into<String>) -> Self {
        Self::ServerRemoved {
            server_id: server_id.into(),
        }
    }

    pub fn server_state_changed(server_id: impl Into<String>, state: ServerState) -> Self {
        Self::ServerStateChanged {
            server_id: server_id.into(),
            state,
        }
    }

    pub const fn tools_changed(tool_count: usize) -> Self {
        Self::ToolsChanged { tool_count }
    }

    pub fn tool_shadowed(
        tool: impl Into<String>,
        kept_server: impl Into<String>,
        shadowed_server: impl Into<String>,
    ) -> Self {
        Self::ToolShadowed {
            tool: tool.into(),
            kept_server: kept_server.into(),
            shadowed_server: shadowed_server.into(),
        }
    }

    pub const fn server_error(error: ErrorInfo) -> Self {
        Self::ServerError { error }
    }
}
