//! JSON-RPC 2.0 and MCP wire types.
//!
//! Model Context Protocol, revision 2024-11-05.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Protocol revision sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client name reported in `initialize`.
pub const CLIENT_NAME: &str = "mcphost";

pub const JSONRPC_VERSION: &str = "2.0";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";
pub const METHOD_PING: &str = "ping";
pub const NOTIFICATION_TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

/// JSON-RPC "method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC "internal error".
pub const INTERNAL_ERROR: i64 = -32603;

/// Request identifier. Numbers are what the host generates; strings are
/// accepted from servers that issue their own requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Outgoing request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: &'a RequestId,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
}

/// Outgoing notification.
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'a Value>,
}

/// Outgoing response to a server-initiated request.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<'a> {
    pub jsonrpc: &'static str,
    pub id: &'a RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }
}

/// `initialize` params for this client.
pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": CLIENT_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// `initialize` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub server_info: Option<ServerIdentity>,
    #[serde(default)]
    pub capabilities: Value,
}

/// `serverInfo` from `initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerIdentity {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// `tools/list` result page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<WireTool>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Tool as declared on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct WireTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let id = RequestId::Number(7);
        let params = json!({"name": "echo"});
        let req = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: &id,
            method: METHOD_TOOLS_CALL,
            params: Some(&params),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "tools/call");
    }

    #[test]
    fn test_notification_has_no_id() {
        let note = JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION,
            method: METHOD_INITIALIZED,
            params: None,
        };
        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("params").is_none());
    }

    #[test]
    fn test_initialize_params() {
        let params = initialize_params();
        assert_eq!(params["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(params["clientInfo"]["name"], CLIENT_NAME);
    }

    #[test]
    fn test_tools_list_parsing() {
        let page: ToolsListResult = serde_json::from_value(json!({
            "tools": [{"name": "read_file", "inputSchema": {"type": "object"}}],
            "nextCursor": "p2"
        }))
        .unwrap();
        assert_eq!(page.tools[0].name, "read_file");
        assert!(page.tools[0].input_schema.is_some());
        assert_eq!(page.next_cursor.as_deref(), Some("p2"));
    }

    #[test]
    fn test_request_id_forms() {
        let n: RequestId = serde_json::from_value(json!(3)).unwrap();
        let s: RequestId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(n, RequestId::Number(3));
        assert_eq!(s.to_string(), "abc");
    }
}
