//! Merged tool catalog and name routing.
//!
//! A [`ToolRegistry`] is an immutable snapshot. The manager rebuilds it
//! whenever a server's catalog changes and swaps it in behind an `Arc`, so
//! readers never observe a half-built table.

use std::collections::HashMap;

use mcphost_core::{BUILTIN_SERVER_ID, HostError, Tool};

/// Where a tool call is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Executed in-process by the built-in tool set.
    Builtin,
    /// Sent to the server with this id.
    Remote(String),
}

/// A tool declaration hidden by an earlier owner of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shadowed {
    pub tool: String,
    pub kept_server: String,
    pub shadowed_server: String,
}

/// Immutable name -> owner table.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
    shadowed: Vec<Shadowed>,
}

impl ToolRegistry {
    /// Build a snapshot.
    ///
    /// `builtins` are registered first and always win. `servers` must be in
    /// registration order (earliest successful handshake first); within that
    /// order the first declaration of a name wins.
    pub fn build<'a, I>(builtins: &[Tool], servers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [Tool])>,
    {
        let mut registry = Self::default();
        for tool in builtins {
            registry.insert(tool.clone());
        }
        for (server_id, tools) in servers {
            for tool in tools {
                let mut tool = tool.clone();
                tool.server_id = server_id.to_string();
                registry.insert(tool);
            }
        }
        registry
    }

    fn insert(&mut self, tool: Tool) {
        if let Some(&existing) = self.index.get(&tool.name) {
            let kept = &self.tools[existing];
            if kept.server_id != tool.server_id {
                self.shadowed.push(Shadowed {
                    tool: tool.name.clone(),
                    kept_server: kept.server_id.clone(),
                    shadowed_server: tool.server_id,
                });
            }
            return;
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
    }

    /// Resolve a tool name to its route.
    pub fn resolve(&self, name: &str) -> Result<Route, HostError> {
        let tool = self
            .get(name)
            .ok_or_else(|| HostError::ToolNotFound {
                name: name.to_string(),
            })?;

        if tool.server_id == BUILTIN_SERVER_ID {
            Ok(Route::Builtin)
        } else {
            Ok(Route::Remote(tool.server_id.clone()))
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// All reachable tools, builtins first, then servers in registration order.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Declarations hidden by an earlier owner.
    pub fn shadowed(&self) -> &[Shadowed] {
        &self.shadowed
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// First name in `tools` already owned by someone else, with that owner.
    pub fn find_collision<'a>(&self, tools: &'a [Tool]) -> Option<(&'a str, &str)> {
        tools.iter().find_map(|tool| {
            self.get(&tool.name)
                .filter(|owner| owner.server_id != tool.server_id)
                .map(|owner| (tool.name.as_str(), owner.server_id.as_str()))
        })
    }
}
