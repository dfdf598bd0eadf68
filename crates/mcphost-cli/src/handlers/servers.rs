//! `servers`: list configured servers.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::{print_separator, truncate_string};

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let servers = ctx.manager().list_servers().await;

    if servers.is_empty() {
        println!("No servers configured in {}.", ctx.config_path.display());
        println!("Use 'mcphost add <id> <command> -- <args>' to add one.");
        return Ok(());
    }

    println!(
        "{:<16} {:<20} {:<6} {:<8} Command",
        "ID", "Name", "Type", "Enabled"
    );
    print_separator(80);

    for server in servers {
        let config = &server.config;
        let command = if config.args.is_empty() {
            config.command.clone()
        } else {
            format!("{} {}", config.command, config.args.join(" "))
        };
        println!(
            "{:<16} {:<20} {:<6} {:<8} {}",
            truncate_string(&config.id, 15),
            truncate_string(config.display_name(), 19),
            config.transport,
            if config.enabled { "yes" } else { "no" },
            command
        );
    }

    Ok(())
}
