//! Host event union.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "server_state_changed", "serverId": "echo", "state": "ready" }
//! ```

mod server;

use serde::{Deserialize, Serialize};

use crate::domain::ServerState;
use crate::ports::ErrorInfo;

/// Events emitted by the tool host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A server configuration was registered.
    ServerAdded {
        #[serde(rename = "serverId")]
        server_id: String,
        name: String,
    },

    /// A server configuration was removed.
    ServerRemoved {
        #[serde(rename = "serverId")]
        server_id: String,
    },

    /// A server moved to a new runtime state.
    ServerStateChanged {
        #[serde(rename = "serverId")]
        server_id: String,
        state: ServerState,
    },

    /// The aggregated tool catalog was rebuilt.
    ToolsChanged {
        #[serde(rename = "toolCount")]
        tool_count: usize,
    },

    /// A tool name was declared by two owners; the earlier owner wins.
    ToolShadowed {
        tool: String,
        #[serde(rename = "keptServer")]
        kept_server: String,
        #[serde(rename = "shadowedServer")]
        shadowed_server: String,
    },

    /// A server operation failed.
    ServerError { error: ErrorInfo },
}

impl HostEvent {
    /// Stable name of the event type, matching the serialized tag.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ServerAdded { .. } => "server_added",
            Self::ServerRemoved { .. } => "server_removed",
            Self::ServerStateChanged { .. } => "server_state_changed",
            Self::ToolsChanged { .. } => "tools_changed",
            Self::ToolShadowed { .. } => "tool_shadowed",
            Self::ServerError { .. } => "server_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::HostError;

    #[test]
    fn test_state_change_wire_format() {
        let event = HostEvent::server_state_changed("echo", ServerState::Ready);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "server_state_changed");
        assert_eq!(json["serverId"], "echo");
        assert_eq!(json["state"], "ready");
        assert_eq!(event.event_type(), "server_state_changed");
    }

    #[test]
    fn test_error_event_wire_format() {
        let err = HostError::spawn("broken", "No such file or directory");
        let event = HostEvent::server_error(ErrorInfo::new("broken", &err));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "server_error");
        assert_eq!(json["error"]["serverId"], "broken");
        assert_eq!(json["error"]["category"], "process");
    }

    #[test]
    fn test_event_round_trips_through_json() {
        let event = HostEvent::tool_shadowed("read_file", "a", "b");
        let text = serde_json::to_string(&event).unwrap();
        let back: HostEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back.event_type(), "tool_shadowed");
    }
}
