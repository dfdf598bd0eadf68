//! CLI bootstrap: the composition root.
//!
//! Settings come from the environment, servers from the servers file, and
//! both are handed to a fresh [`McpManager`]. Handlers only see the
//! resulting [`CliContext`].

use std::path::PathBuf;
use std::sync::Arc;

use mcphost_core::{HostSettings, NoopEmitter, ServersFile, default_config_path};
use mcphost_mcp::McpManager;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Servers file path.
    pub config_path: PathBuf,
    /// Host settings, already loaded from the environment.
    pub settings: HostSettings,
}

impl CliConfig {
    /// Resolve the servers file and settings, applying CLI overrides.
    pub fn new(
        config_path: Option<PathBuf>,
        root: Option<PathBuf>,
        settings: HostSettings,
    ) -> Result<Self, CliError> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let settings = match root {
            Some(root) => settings.with_builtin_root(root),
            None => settings,
        };
        settings.validate()?;
        Ok(Self {
            config_path,
            settings,
        })
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub manager: McpManager,
    pub servers_file: ServersFile,
    pub config_path: PathBuf,
}

impl CliContext {
    pub const fn manager(&self) -> &McpManager {
        &self.manager
    }

    /// Persist the servers file after `add`/`remove`.
    pub fn save_servers(&self) -> Result<(), CliError> {
        self.servers_file.save(&self.config_path)?;
        Ok(())
    }
}

/// Load the servers file and register every entry with a new manager.
///
/// Entries the manager refuses are logged and skipped.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let servers_file = ServersFile::load(&config.config_path)?;
    let manager = McpManager::new(config.settings, Arc::new(NoopEmitter::new()))?;

    for server in servers_file.configs()? {
        let id = server.id.clone();
        if let Err(e) = manager.add_server(server).await {
            warn!(server_id = %id, error = %e, "Skipping server");
        }
    }
    debug!(
        path = %config.config_path.display(),
        servers = servers_file.servers.len(),
        "Loaded servers file"
    );

    Ok(CliContext {
        manager,
        servers_file,
        config_path: config.config_path,
    })
}

/// Initialise tracing on stderr.
///
/// `--verbose` forces `debug`; otherwise the filter comes from
/// `MCP_LOG_LEVEL`, then `RUST_LOG`, then `warn`.
pub fn init_logging(verbose: bool, log_level: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if let Some(level) = log_level {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
