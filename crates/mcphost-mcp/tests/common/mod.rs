//! Shared helpers for mcphost-mcp integration tests.

// Not every test file uses every helper
#![allow(dead_code)]

use std::sync::Arc;

use mcphost_core::{BroadcastEmitter, HostEvent, HostSettings, ServerConfig};
use mcphost_mcp::McpManager;
use tokio::sync::broadcast;

/// Path of the scriptable fixture server built alongside the tests.
pub const FIXTURE: &str = env!("CARGO_BIN_EXE_mcphost-fixture-server");

/// A fixture server config. `tools` is a comma separated list.
pub fn fixture(id: &str, mode: &str, tools: &str) -> ServerConfig {
    ServerConfig::stdio(id, FIXTURE, vec![])
        .with_env("FIXTURE_MODE", mode)
        .with_env("FIXTURE_TOOLS", tools)
        .with_env("FIXTURE_NAME", format!("fixture {id}"))
}

/// A manager rooted in its own temp dir, plus an event subscription.
pub struct TestHost {
    pub manager: McpManager,
    pub events: broadcast::Receiver<HostEvent>,
    pub root: tempfile::TempDir,
}

impl TestHost {
    pub fn new() -> Self {
        Self::with_settings(HostSettings::default())
    }

    pub fn with_settings(settings: HostSettings) -> Self {
        let root = tempfile::tempdir().unwrap();
        let emitter = BroadcastEmitter::new(1024);
        let events = emitter.subscribe();
        let manager = McpManager::new(
            settings.with_builtin_root(root.path()),
            Arc::new(emitter),
        )
        .unwrap();
        Self {
            manager,
            events,
            root,
        }
    }

    /// Add a server and start it, panicking on failure.
    pub async fn start(&self, config: ServerConfig) {
        let id = self.manager.add_server(config).await.unwrap();
        self.manager.start_server(&id).await.unwrap();
    }

    /// Drain every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
