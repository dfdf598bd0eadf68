//! Tool descriptors, calls and normalised results.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Pseudo server id that owns the in-process built-in tools.
pub const BUILTIN_SERVER_ID: &str = "builtin";

/// Tool declared by a server (or built into the host).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Tool name, unique within its server.
    pub name: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the arguments. Passed through, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    /// Owning server id, or [`BUILTIN_SERVER_ID`].
    pub server_id: String,
}

impl Tool {
    pub fn new(name: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
            server_id: server_id.into(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn is_builtin(&self) -> bool {
        self.server_id == BUILTIN_SERVER_ID
    }
}

/// A request to invoke a tool by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    /// Arguments object. `null` is treated as `{}`.
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Normalised outcome of a tool invocation.
///
/// Protocol failures (RPC errors, timeouts, disconnects) are reported as
/// errors, not as a `ToolResult`. A result with `success == false` means the
/// tool itself ran and reported failure (`isError` on the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool reported success.
    pub success: bool,

    /// Content items as returned by the tool (`{type, text, ...}`).
    #[serde(default)]
    pub content: Vec<Value>,

    /// Failure message taken from the first text item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Successful result with the given content items.
    #[must_use]
    pub const fn success(content: Vec<Value>) -> Self {
        Self {
            success: true,
            content,
            error: None,
        }
    }

    /// Successful result holding a single text item.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::success(vec![text_item(text.into())])
    }

    /// Failed result; the message is also the single text item.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            content: vec![text_item(message.clone())],
            error: Some(message),
        }
    }

    /// Normalise the `result` object of a `tools/call` response.
    ///
    /// Servers that return something other than a `content` array still
    /// produce a usable result: strings become one text item, anything else
    /// is rendered as JSON text.
    pub fn from_call_result(result: &Value) -> Self {
        let content = match result.get("content").and_then(Value::as_array) {
            Some(items) => items.clone(),
            None => match result {
                Value::String(s) => vec![text_item(s.clone())],
                Value::Null => Vec::new(),
                other => vec![text_item(other.to_string())],
            },
        };

        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if is_error {
            let message = first_text(&content).unwrap_or("Unknown error").to_string();
            Self {
                success: false,
                content,
                error: Some(message),
            }
        } else {
            Self::success(content)
        }
    }

    /// Concatenate all text items, one per line.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn text_item(text: String) -> Value {
    json!({ "type": "text", "text": text })
}

fn first_text(content: &[Value]) -> Option<&str> {
    content
        .iter()
        .find_map(|item| item.get("text").and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_builder() {
        let tool = Tool::new("get_weather", "weather")
            .with_description("Get the current weather for a location");

        assert_eq!(tool.name, "get_weather");
        assert_eq!(tool.server_id, "weather");
        assert!(!tool.is_builtin());
        assert!(Tool::new("list_dir", BUILTIN_SERVER_ID).is_builtin());
    }

    #[test]
    fn test_tool_serializes_camel_case() {
        let tool = Tool::new("echo", "b").with_input_schema(json!({"type": "object"}));
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["inputSchema"]["type"], "object");
        assert_eq!(json["serverId"], "b");
    }

    #[test]
    fn test_from_call_result_success() {
        let result = ToolResult::from_call_result(&json!({
            "content": [{"type": "text", "text": "hi"}, {"type": "text", "text": "there"}]
        }));
        assert!(result.success);
        assert_eq!(result.text(), "hi\nthere");
        assert!(result.error.is_none());
    }

    #[test]
    fn test_from_call_result_is_error() {
        let result = ToolResult::from_call_result(&json!({
            "content": [{"type": "text", "text": "file not found"}],
            "isError": true
        }));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("file not found"));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn test_from_call_result_non_standard_shape() {
        let result = ToolResult::from_call_result(&json!({"temp": 72}));
        assert!(result.success);
        assert!(result.text().contains("72"));

        let result = ToolResult::from_call_result(&json!("plain"));
        assert_eq!(result.text(), "plain");
    }

    #[test]
    fn test_error_result() {
        let result = ToolResult::error("Connection failed");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Connection failed"));
        assert_eq!(result.text(), "Connection failed");
    }
}
