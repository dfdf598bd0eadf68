//! Command handlers.
//!
//! Each handler is a thin `execute(ctx, ...)` that validates CLI input,
//! calls the manager or the servers file, and formats terminal output.
//! Handlers that start servers shut them down before returning.

pub mod add;
pub mod call;
pub mod check;
pub mod remove;
pub mod servers;
pub mod tools;

use mcphost_mcp::McpManager;
use tracing::warn;

/// Start every enabled server, logging failures without aborting.
pub(crate) async fn start_enabled(manager: &McpManager) {
    for (server_id, result) in manager.start_enabled().await {
        if let Err(e) = result {
            warn!(server_id = %server_id, error = %e, "Server failed to start");
        }
    }
}
