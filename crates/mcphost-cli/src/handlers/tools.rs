//! `tools`: start enabled servers and print the catalog.

use anyhow::Result;
use mcphost_core::Tool;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{print_separator, truncate_string};

pub async fn execute(ctx: &CliContext, server: Option<&str>, json: bool) -> Result<()> {
    let manager = ctx.manager();
    super::start_enabled(manager).await;

    let tools = match server {
        Some(id) => manager.get_server_tools(id).await.map_err(CliError::from),
        None => Ok(manager.get_tools()),
    };
    manager.shutdown().await;
    let tools = tools?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
    } else {
        print_table(&tools);
    }
    Ok(())
}

fn print_table(tools: &[Tool]) {
    if tools.is_empty() {
        println!("No tools available.");
        return;
    }

    println!("{:<24} {:<16} Description", "Tool", "Server");
    print_separator(90);
    for tool in tools {
        println!(
            "{:<24} {:<16} {}",
            truncate_string(&tool.name, 23),
            truncate_string(&tool.server_id, 15),
            truncate_string(tool.description.as_deref().unwrap_or(""), 48)
        );
    }
}
