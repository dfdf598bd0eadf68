//! `call`: start enabled servers and invoke one tool.

use anyhow::Result;
use mcphost_core::ToolCall;
use serde_json::Value;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Parse `--args`; absent means an empty object.
pub fn parse_arguments(raw: Option<&str>) -> Result<Value, CliError> {
    let Some(raw) = raw else {
        return Ok(Value::Object(serde_json::Map::new()));
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CliError::Arguments(format!("--args is not valid JSON: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(CliError::Arguments("--args must be a JSON object".to_string()))
    }
}

pub async fn execute(ctx: &CliContext, tool: &str, raw_args: Option<&str>) -> Result<()> {
    let arguments = parse_arguments(raw_args)?;
    let manager = ctx.manager();

    // Built-ins need no servers.
    if manager.registry().get(tool).is_none() {
        super::start_enabled(manager).await;
    }
    let result = manager.call_tool(ToolCall::new(tool, arguments)).await;
    manager.shutdown().await;

    let result = result.map_err(CliError::from)?;
    if !result.success {
        return Err(CliError::ToolFailed {
            tool: tool.to_string(),
            message: result.error.clone().unwrap_or_else(|| result.text()),
        }
        .into());
    }
    println!("{}", result.text());
    Ok(())
}
