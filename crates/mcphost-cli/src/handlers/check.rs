//! `check`: start each enabled server and report how it went.

use anyhow::Result;
use mcphost_core::{HostError, ServerState};

use crate::bootstrap::CliContext;
use crate::presentation::state_label;

/// Stderr lines shown for a failing server.
const STDERR_LINES: usize = 10;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let manager = ctx.manager();
    let servers = manager.list_servers().await;
    if servers.is_empty() {
        println!("No servers configured in {}.", ctx.config_path.display());
        return Ok(());
    }

    let mut failures = 0usize;
    for server in servers {
        let id = &server.config.id;
        if !server.config.enabled {
            println!("- {id}: skipped (disabled)");
            continue;
        }
        if !server.config.transport.is_executable() {
            println!("- {id}: skipped ({} transport)", server.config.transport);
            continue;
        }

        match manager.start_server(id).await {
            Ok(info) => {
                let reported = match (&info.server_name, &info.server_version) {
                    (Some(name), Some(version)) => format!(" as {name} {version}"),
                    (Some(name), None) => format!(" as {name}"),
                    _ => String::new(),
                };
                println!(
                    "\u{2713} {id}: {}{reported}, {} tool(s)",
                    state_label(&info.state),
                    info.tool_count
                );
            }
            Err(e) => {
                failures += 1;
                let state = manager
                    .server_info(id)
                    .await
                    .map_or(ServerState::Stopped, |info| info.state);
                println!("\u{2717} {id}: {} - {e}", state_label(&state));
                // Handshake errors already carry the stderr tail.
                if matches!(e, HostError::Handshake { .. }) {
                    continue;
                }
                for line in manager.server_logs(id, STDERR_LINES).await.unwrap_or_default() {
                    println!("    | {line}");
                }
            }
        }
    }
    manager.shutdown().await;

    if failures > 0 {
        anyhow::bail!("{failures} server(s) failed to start");
    }
    Ok(())
}
