//! `add`: append a stdio server to the servers file.

use std::collections::BTreeMap;

use anyhow::Result;
use mcphost_core::{HostError, ServerConfig};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Arguments of the add command.
#[derive(Debug, Default)]
pub struct AddArgs {
    pub id: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub name: Option<String>,
    pub cwd: Option<String>,
    pub path_extra: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub disabled: bool,
    pub force: bool,
}

impl AddArgs {
    /// Build and validate the server configuration.
    pub fn into_config(self) -> Result<ServerConfig, CliError> {
        let mut config = ServerConfig::stdio(&self.id, self.command, self.args)
            .with_enabled(!self.disabled);
        config.env = parse_env(&self.env)?;
        if let Some(name) = self.name {
            config = config.with_name(name);
        }
        if let Some(cwd) = self.cwd {
            config = config.with_working_directory(cwd);
        }
        if let Some(path_extra) = self.path_extra {
            config = config.with_path_extra(path_extra);
        }
        if let Some(description) = self.description {
            config = config.with_description(description);
        }
        if let Some(category) = self.category {
            config = config.with_category(category);
        }

        config.validate().map_err(|reason| HostError::InvalidConfig {
            server_id: self.id,
            reason,
        })?;
        Ok(config)
    }
}

/// Parse repeated `KEY=VALUE` options.
pub fn parse_env(pairs: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CliError::Arguments(format!(
                "expected KEY=VALUE for --env, got '{pair}'"
            ))),
        })
        .collect()
}

pub fn execute(ctx: &mut CliContext, args: AddArgs) -> Result<()> {
    let force = args.force;
    let config = args.into_config()?;

    if ctx.servers_file.contains(&config.id) && !force {
        return Err(CliError::from(HostError::AlreadyExists {
            server_id: config.id,
        })
        .into());
    }

    ctx.servers_file.upsert(&config).map_err(CliError::from)?;
    ctx.save_servers()?;

    println!(
        "Added server '{}' to {}",
        config.id,
        ctx.config_path.display()
    );
    Ok(())
}
