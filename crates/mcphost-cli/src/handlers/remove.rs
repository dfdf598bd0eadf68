//! `remove`: delete a server from the servers file.

use anyhow::Result;
use mcphost_core::HostError;

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub fn execute(ctx: &mut CliContext, id: &str) -> Result<()> {
    if !ctx.servers_file.remove(id) {
        println!("Use 'mcphost servers' to see configured servers.");
        return Err(CliError::from(HostError::unknown_server(id)).into());
    }
    ctx.save_servers()?;
    println!("Removed server '{id}' from {}", ctx.config_path.display());
    Ok(())
}
