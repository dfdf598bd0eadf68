//! Bringing a freshly spawned server from `starting` to `ready`.
//!
//! `initialize` -> `notifications/initialized` -> `tools/list`, strictly in
//! order. Each request step has its own timeout.

use std::collections::HashSet;
use std::time::Duration;

use mcphost_core::{HostError, Tool};
use serde_json::json;
use tracing::{debug, warn};

use crate::correlator::Correlator;
use crate::protocol::{
    InitializeResult, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_TOOLS_LIST, ToolsListResult,
    WireTool, initialize_params,
};

/// Upper bound on `tools/list` pages followed for one catalog.
pub const MAX_TOOL_PAGES: usize = 64;

/// What a server told us during the handshake.
#[derive(Debug, Clone)]
pub struct HandshakeOutcome {
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    pub protocol_version: Option<String>,
    pub tools: Vec<Tool>,
}

/// Run the full handshake. Any failure is reported as `Handshake`.
pub async fn perform(
    correlator: &Correlator,
    timeout: Duration,
) -> Result<HandshakeOutcome, HostError> {
    let server_id = correlator.server_id();
    let fail = |step: &str, e: HostError| HostError::handshake(server_id, format!("{step}: {e}"));

    let raw = correlator
        .request(METHOD_INITIALIZE, Some(initialize_params()), timeout)
        .await
        .map_err(|e| fail(METHOD_INITIALIZE, e))?;
    let init: InitializeResult = serde_json::from_value(raw).map_err(|e| {
        HostError::handshake(server_id, format!("{METHOD_INITIALIZE}: malformed result: {e}"))
    })?;

    debug!(
        server_id,
        protocol = init.protocol_version.as_deref().unwrap_or("unknown"),
        server_name = init.server_info.as_ref().map_or("unknown", |i| i.name.as_str()),
        "Initialize complete"
    );

    correlator
        .notify(METHOD_INITIALIZED, None)
        .map_err(|e| fail(METHOD_INITIALIZED, e))?;

    let tools = list_tools(correlator, timeout)
        .await
        .map_err(|e| fail(METHOD_TOOLS_LIST, e))?;

    let (server_name, server_version) = init
        .server_info
        .map_or((None, None), |info| (Some(info.name), info.version));

    Ok(HandshakeOutcome {
        server_name,
        server_version,
        protocol_version: init.protocol_version,
        tools,
    })
}

/// Fetch the complete tool catalog, following `nextCursor`.
///
/// Nameless tools and repeated names within the catalog are dropped.
pub async fn list_tools(correlator: &Correlator, timeout: Duration) -> Result<Vec<Tool>, HostError> {
    let server_id = correlator.server_id();
    let mut tools = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;

    for page in 0..MAX_TOOL_PAGES {
        let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
        let raw = correlator.request(METHOD_TOOLS_LIST, params, timeout).await?;
        let result: ToolsListResult = serde_json::from_value(raw).map_err(|e| {
            HostError::handshake(server_id, format!("{METHOD_TOOLS_LIST}: malformed result: {e}"))
        })?;

        for wire in result.tools {
            if wire.name.trim().is_empty() {
                warn!(server_id, "Ignoring tool without a name");
                continue;
            }
            if !seen.insert(wire.name.clone()) {
                warn!(server_id, tool = %wire.name, "Ignoring duplicate tool in catalog");
                continue;
            }
            tools.push(into_tool(wire, server_id));
        }

        match result.next_cursor.filter(|c| !c.is_empty()) {
            Some(next) => {
                debug!(server_id, page, "Following tools/list cursor");
                cursor = Some(next);
            }
            None => return Ok(tools),
        }
    }

    warn!(server_id, pages = MAX_TOOL_PAGES, "tools/list page limit reached, catalog truncated");
    Ok(tools)
}

fn into_tool(wire: WireTool, server_id: &str) -> Tool {
    let mut tool = Tool::new(wire.name, server_id);
    tool.description = wire.description;
    // Servers that omit the schema accept an empty arguments object.
    tool.input_schema = Some(
        wire.input_schema
            .filter(|s| !s.is_null())
            .unwrap_or_else(|| json!({ "type": "object" })),
    );
    tool
}
