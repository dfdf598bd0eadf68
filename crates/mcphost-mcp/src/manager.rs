//! Tool server lifecycle management and tool dispatch.
//!
//! [`McpManager`] is the public surface of the host: add, start, stop and
//! remove servers, list tools, and call them. It owns one slot per
//! configured server, the merged [`ToolRegistry`] snapshot, the
//! [`ConcurrencyGate`] and the built-in tools.
//!
//! Locks are never held across process I/O. A start attempt is identified by
//! a generation number; stop and exit handling bump or compare it so that a
//! late handshake or exit notice cannot overwrite newer state.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock, Weak};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use mcphost_core::{
    BUILTIN_SERVER_ID, CollisionPolicy, ErrorInfo, HostError, HostEvent, HostEventEmitter,
    HostSettings, ServerConfig, ServerInfo, ServerState, Tool, ToolCall, ToolResult,
};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::builtin::BuiltinTools;
use crate::correlator::Correlator;
use crate::gate::ConcurrencyGate;
use crate::handshake;
use crate::process::{
    ExitReason, ProcessObserver, RuntimeHandle, SpawnRequest, StderrLog, spawn_runtime,
};
use crate::protocol::METHOD_TOOLS_CALL;
use crate::registry::{Route, Shadowed, ToolRegistry};

/// Stderr lines attached to start failures.
const STDERR_TAIL_LINES: usize = 10;

/// Per-server bookkeeping.
struct ServerSlot {
    config: ServerConfig,
    state: ServerState,
    /// Generation of the start attempt that owns `runtime`.
    generation: u64,
    runtime: Option<RuntimeHandle>,
    /// Catalog from the last successful `tools/list`; empty unless ready.
    tools: Vec<Tool>,
    /// Insertion order, for listings.
    added_seq: u64,
    /// Order of the handshake that made this server ready; drives shadowing.
    ready_seq: Option<u64>,
    server_name: Option<String>,
    server_version: Option<String>,
    last_started_at: Option<chrono::DateTime<Utc>>,
    /// Kept after the process is gone for post-mortem diagnostics.
    stderr: Option<StderrLog>,
}

impl ServerSlot {
    fn new(config: ServerConfig, added_seq: u64) -> Self {
        Self {
            config,
            state: ServerState::Stopped,
            generation: 0,
            runtime: None,
            tools: Vec::new(),
            added_seq,
            ready_seq: None,
            server_name: None,
            server_version: None,
            last_started_at: None,
            stderr: None,
        }
    }

    fn info(&self) -> ServerInfo {
        ServerInfo {
            config: self.config.clone(),
            state: self.state.clone(),
            tool_count: self.tools.len(),
            server_name: self.server_name.clone(),
            server_version: self.server_version.clone(),
            last_started_at: self.last_started_at,
        }
    }

    fn clear_catalog(&mut self) {
        self.tools.clear();
        self.ready_seq = None;
    }
}

struct ManagerInner {
    settings: HostSettings,
    servers: RwLock<BTreeMap<String, ServerSlot>>,
    registry: StdRwLock<Arc<ToolRegistry>>,
    builtins: BuiltinTools,
    builtin_tools: Vec<Tool>,
    gate: ConcurrencyGate,
    emitter: Arc<dyn HostEventEmitter>,
    next_generation: AtomicU64,
    next_seq: AtomicU64,
}

/// Manager for tool server lifecycle and tool dispatch.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct McpManager {
    inner: Arc<ManagerInner>,
}

impl McpManager {
    /// Create a manager.
    ///
    /// Built-in tools are rooted at `settings.builtin_root`, or the current
    /// directory when unset.
    pub fn new(
        settings: HostSettings,
        emitter: Arc<dyn HostEventEmitter>,
    ) -> Result<Self, HostError> {
        settings
            .validate()
            .map_err(|e| HostError::Config(e.to_string()))?;

        let root = match settings.builtin_root.clone() {
            Some(root) => root,
            None => std::env::current_dir()
                .map_err(|e| HostError::Config(format!("cannot determine current directory: {e}")))?,
        };
        let builtins = BuiltinTools::new(&root).map_err(|e| {
            HostError::Config(format!("invalid built-in root {}: {e}", root.display()))
        })?;
        let builtin_tools = builtins.descriptors();
        let registry = ToolRegistry::build(&builtin_tools, std::iter::empty::<(&str, &[Tool])>());
        let gate = ConcurrencyGate::new(settings.max_concurrent_tools);

        debug!(
            root = %builtins.root().display(),
            max_concurrent_tools = settings.max_concurrent_tools,
            collision_policy = %settings.collision_policy,
            "Tool host initialised"
        );

        Ok(Self {
            inner: Arc::new(ManagerInner {
                settings,
                servers: RwLock::new(BTreeMap::new()),
                registry: StdRwLock::new(Arc::new(registry)),
                builtins,
                builtin_tools,
                gate,
                emitter,
                next_generation: AtomicU64::new(1),
                next_seq: AtomicU64::new(1),
            }),
        })
    }

    pub fn settings(&self) -> &HostSettings {
        &self.inner.settings
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.inner.gate
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<ToolRegistry> {
        let guard = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn emit(&self, event: HostEvent) {
        self.inner.emitter.emit(event);
    }

    fn next_generation(&self) -> u64 {
        self.inner.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    fn next_seq(&self) -> u64 {
        self.inner.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn set_state(&self, server_id: &str, slot: &mut ServerSlot, next: ServerState) {
        if slot.state == next {
            return;
        }
        if !slot.state.can_transition_to(&next) {
            warn!(server_id, from = %slot.state, to = %next, "Ignoring illegal state transition");
            return;
        }
        debug!(server_id, from = slot.state.label(), to = next.label(), "Server state changed");
        slot.state = next.clone();
        self.emit(HostEvent::server_state_changed(server_id, next));
    }

    /// Rebuild and swap the registry from all ready servers.
    fn rebuild_registry(&self, servers: &BTreeMap<String, ServerSlot>) {
        let mut ready: Vec<(&String, &ServerSlot)> = servers
            .iter()
            .filter(|(_, slot)| slot.state.is_ready())
            .collect();
        ready.sort_by_key(|(_, slot)| slot.ready_seq);

        let next = ToolRegistry::build(
            &self.inner.builtin_tools,
            ready
                .iter()
                .map(|&(id, slot)| (id.as_str(), slot.tools.as_slice())),
        );

        let previous = self.registry();
        let known: HashSet<&Shadowed> = previous.shadowed().iter().collect();
        for shadow in next.shadowed().iter().filter(|s| !known.contains(s)) {
            warn!(
                tool = %shadow.tool,
                kept = %shadow.kept_server,
                shadowed = %shadow.shadowed_server,
                "Tool name collision, later declaration is unreachable"
            );
            self.emit(HostEvent::tool_shadowed(
                &shadow.tool,
                &shadow.kept_server,
                &shadow.shadowed_server,
            ));
        }

        let tool_count = next.len();
        *self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        self.emit(HostEvent::tools_changed(tool_count));
    }

    // ========== Configuration ==========

    /// Register a server configuration. Returns its id.
    pub async fn add_server(&self, mut config: ServerConfig) -> Result<String, HostError> {
        config.validate().map_err(|reason| HostError::InvalidConfig {
            server_id: config.id.clone(),
            reason,
        })?;
        if config.id == BUILTIN_SERVER_ID {
            return Err(HostError::InvalidConfig {
                server_id: config.id,
                reason: format!("'{BUILTIN_SERVER_ID}' is reserved"),
            });
        }
        if config.name.trim().is_empty() {
            config.name.clone_from(&config.id);
        }

        let mut servers = self.inner.servers.write().await;
        if servers.contains_key(&config.id) {
            return Err(HostError::AlreadyExists {
                server_id: config.id,
            });
        }

        let id = config.id.clone();
        let name = config.name.clone();
        servers.insert(id.clone(), ServerSlot::new(config, self.next_seq()));
        drop(servers);

        info!(server_id = %id, "Server added");
        self.emit(HostEvent::server_added(&id, name));
        Ok(id)
    }

    /// Stop (if needed) and unregister a server.
    pub async fn remove_server(&self, server_id: &str) -> Result<(), HostError> {
        self.stop_server(server_id).await?;

        let removed = self.inner.servers.write().await.remove(server_id);
        let Some(slot) = removed else {
            return Err(HostError::unknown_server(server_id));
        };
        if let Some(runtime) = slot.runtime {
            runtime.stop().await;
        }

        info!(server_id, "Server removed");
        self.emit(HostEvent::server_removed(server_id));
        Ok(())
    }

    /// All configured servers with their runtime view, in insertion order.
    pub async fn list_servers(&self) -> Vec<ServerInfo> {
        let servers = self.inner.servers.read().await;
        let mut slots: Vec<&ServerSlot> = servers.values().collect();
        slots.sort_by_key(|slot| slot.added_seq);
        slots.into_iter().map(ServerSlot::info).collect()
    }

    pub async fn server_info(&self, server_id: &str) -> Result<ServerInfo, HostError> {
        self.inner
            .servers
            .read()
            .await
            .get(server_id)
            .map(ServerSlot::info)
            .ok_or_else(|| HostError::unknown_server(server_id))
    }

    /// Most recent stderr lines of a server's current or last process.
    pub async fn server_logs(&self, server_id: &str, lines: usize) -> Result<Vec<String>, HostError> {
        let servers = self.inner.servers.read().await;
        let slot = servers
            .get(server_id)
            .ok_or_else(|| HostError::unknown_server(server_id))?;
        Ok(slot
            .stderr
            .as_ref()
            .map(|log| log.tail(lines))
            .unwrap_or_default())
    }

    // ========== Lifecycle ==========

    /// Spawn a server and run the handshake.
    ///
    /// On success the server is `ready` and its tools are routable. On
    /// failure the server is left in `error` and the process is gone.
    pub async fn start_server(&self, server_id: &str) -> Result<ServerInfo, HostError> {
        let (config, generation) = {
            let mut servers = self.inner.servers.write().await;
            let slot = servers
                .get_mut(server_id)
                .ok_or_else(|| HostError::unknown_server(server_id))?;

            if slot.state.is_active() {
                return Err(HostError::AlreadyRunning {
                    server_id: server_id.to_string(),
                });
            }
            if !slot.config.transport.is_executable() {
                return Err(HostError::Unsupported {
                    server_id: server_id.to_string(),
                    transport: slot.config.transport.to_string(),
                });
            }
            if !slot.config.enabled {
                return Err(HostError::InvalidConfig {
                    server_id: server_id.to_string(),
                    reason: "server is disabled".to_string(),
                });
            }
            slot.config
                .validate()
                .map_err(|reason| HostError::InvalidConfig {
                    server_id: server_id.to_string(),
                    reason,
                })?;

            let generation = self.next_generation();
            slot.generation = generation;
            slot.stderr = None;
            self.set_state(server_id, slot, ServerState::Starting);
            (slot.config.clone(), generation)
        };

        info!(server_id, command = %config.command, generation, "Starting tool server");
        let started = Instant::now();

        let observer: Arc<dyn ProcessObserver> = Arc::new(ManagerObserver {
            inner: Arc::downgrade(&self.inner),
        });
        let runtime = match spawn_runtime(
            SpawnRequest {
                config: &config,
                generation,
                shutdown_grace: self.inner.settings.shutdown_grace,
            },
            observer,
        ) {
            Ok(runtime) => runtime,
            Err(e) => {
                self.fail_start(server_id, generation, &e).await;
                return Err(e);
            }
        };

        let correlator = Arc::clone(runtime.correlator());
        let stderr = runtime.stderr().clone();

        // Park the runtime in the slot so a concurrent stop can reach it.
        {
            let mut servers = self.inner.servers.write().await;
            match servers.get_mut(server_id) {
                Some(slot) if slot.generation == generation => {
                    slot.stderr = Some(stderr.clone());
                    slot.runtime = Some(runtime);
                }
                _ => {
                    drop(servers);
                    runtime.stop().await;
                    return Err(HostError::disconnected(server_id));
                }
            }
        }

        let outcome =
            match handshake::perform(&correlator, self.inner.settings.handshake_timeout).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let e = with_stderr_tail(e, &stderr);
                    self.fail_start(server_id, generation, &e).await;
                    return Err(e);
                }
            };

        self.commit_start(server_id, generation, &correlator, outcome, started)
            .await
    }

    async fn commit_start(
        &self,
        server_id: &str,
        generation: u64,
        correlator: &Correlator,
        outcome: handshake::HandshakeOutcome,
        started: Instant,
    ) -> Result<ServerInfo, HostError> {
        let mut servers = self.inner.servers.write().await;
        let Some(slot) = servers
            .get_mut(server_id)
            .filter(|slot| slot.generation == generation)
        else {
            // Stopped or removed while the handshake ran.
            return Err(HostError::disconnected(server_id));
        };

        let rejection = if correlator.is_closed() {
            Some(HostError::handshake(
                server_id,
                "process exited right after the handshake",
            ))
        } else if self.inner.settings.collision_policy == CollisionPolicy::Reject {
            self.registry()
                .find_collision(&outcome.tools)
                .map(|(tool, owner)| HostError::ToolCollision {
                    tool: tool.to_string(),
                    existing_server: owner.to_string(),
                    server_id: server_id.to_string(),
                })
        } else {
            None
        };

        if let Some(err) = rejection {
            let runtime = slot.runtime.take();
            self.set_state(server_id, slot, ServerState::Error(err.to_string()));
            self.emit(HostEvent::server_error(ErrorInfo::new(server_id, &err)));
            drop(servers);
            if let Some(runtime) = runtime {
                runtime.stop().await;
            }
            warn!(server_id, error = %err, "Tool server rejected after handshake");
            return Err(err);
        }

        let tool_count = outcome.tools.len();
        slot.tools = outcome.tools;
        slot.server_name = outcome.server_name;
        slot.server_version = outcome.server_version;
        slot.last_started_at = Some(Utc::now());
        slot.ready_seq = Some(self.next_seq());
        self.set_state(server_id, slot, ServerState::Ready);
        let info = slot.info();

        self.rebuild_registry(&servers);
        drop(servers);

        info!(
            server_id,
            tools = tool_count,
            protocol = outcome.protocol_version.as_deref().unwrap_or("unknown"),
            elapsed_ms = started.elapsed().as_millis(),
            "Tool server ready"
        );
        Ok(info)
    }

    /// Move a failed start attempt to `error` and dispose of its process.
    async fn fail_start(&self, server_id: &str, generation: u64, err: &HostError) {
        warn!(server_id, error = %err, "Tool server failed to start");

        let runtime = {
            let mut servers = self.inner.servers.write().await;
            let Some(slot) = servers
                .get_mut(server_id)
                .filter(|slot| slot.generation == generation)
            else {
                return;
            };
            let runtime = slot.runtime.take();
            slot.clear_catalog();
            self.set_state(server_id, slot, ServerState::Error(err.to_string()));
            self.emit(HostEvent::server_error(ErrorInfo::new(server_id, err)));
            runtime
        };

        if let Some(runtime) = runtime {
            runtime.stop().await;
        }
    }

    /// Stop a server. Pending calls fail with `ServerDisconnected` at once.
    ///
    /// Stopping a server that is not running is a no-op.
    pub async fn stop_server(&self, server_id: &str) -> Result<(), HostError> {
        let runtime = {
            let mut servers = self.inner.servers.write().await;
            let slot = servers
                .get_mut(server_id)
                .ok_or_else(|| HostError::unknown_server(server_id))?;

            if slot.state == ServerState::Stopped && slot.runtime.is_none() {
                return Ok(());
            }

            // Invalidate any start attempt or exit notice still in flight.
            slot.generation = self.next_generation();
            let was_ready = slot.state.is_ready();
            let runtime = slot.runtime.take();
            slot.clear_catalog();
            self.set_state(server_id, slot, ServerState::Stopped);
            if was_ready {
                self.rebuild_registry(&servers);
            }
            runtime
        };

        if let Some(runtime) = runtime {
            info!(server_id, pid = ?runtime.pid(), "Stopping tool server");
            runtime.stop().await;
        }
        Ok(())
    }

    /// Start every enabled stdio server that is not already running.
    ///
    /// Servers start concurrently; one failure does not affect the others.
    /// Results are in insertion order.
    pub async fn start_enabled(&self) -> Vec<(String, Result<ServerInfo, HostError>)> {
        let ids: Vec<String> = {
            let servers = self.inner.servers.read().await;
            let mut candidates: Vec<&ServerSlot> = servers
                .values()
                .filter(|slot| {
                    slot.config.enabled
                        && slot.config.transport.is_executable()
                        && !slot.state.is_active()
                })
                .collect();
            candidates.sort_by_key(|slot| slot.added_seq);
            candidates.into_iter().map(|slot| slot.config.id.clone()).collect()
        };

        let tasks: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let manager = self.clone();
                let task_id = id.clone();
                (
                    id,
                    tokio::spawn(async move { manager.start_server(&task_id).await }),
                )
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for (id, task) in tasks {
            let result = task
                .await
                .unwrap_or_else(|e| Err(HostError::spawn(&id, format!("start task failed: {e}"))));
            results.push((id, result));
        }
        results
    }

    /// Stop every server and wait for all processes to be reaped.
    pub async fn shutdown(&self) {
        let runtimes: Vec<RuntimeHandle> = {
            let mut servers = self.inner.servers.write().await;
            let mut any_ready = false;
            let mut runtimes = Vec::new();
            let ids: Vec<String> = servers.keys().cloned().collect();
            for id in ids {
                if let Some(slot) = servers.get_mut(&id) {
                    if slot.state == ServerState::Stopped && slot.runtime.is_none() {
                        continue;
                    }
                    slot.generation = self.next_generation();
                    any_ready |= slot.state.is_ready();
                    runtimes.extend(slot.runtime.take());
                    slot.clear_catalog();
                    self.set_state(&id, slot, ServerState::Stopped);
                }
            }
            if any_ready {
                self.rebuild_registry(&servers);
            }
            runtimes
        };

        if runtimes.is_empty() {
            return;
        }
        info!(count = runtimes.len(), "Shutting down tool servers");
        let stops: Vec<_> = runtimes
            .into_iter()
            .map(|runtime| tokio::spawn(runtime.stop()))
            .collect();
        for stop in stops {
            if let Err(e) = stop.await {
                warn!(error = %e, "Server stop task failed");
            }
        }
    }

    async fn handle_exit(&self, server_id: &str, generation: u64, reason: ExitReason) {
        let ExitReason::Exited(why) = reason else {
            return;
        };

        let mut servers = self.inner.servers.write().await;
        let Some(slot) = servers
            .get_mut(server_id)
            .filter(|slot| slot.generation == generation)
        else {
            return;
        };

        // A starting server learns about the exit from its failed handshake.
        if !slot.state.is_ready() {
            return;
        }

        warn!(server_id, reason = %why, "Tool server exited unexpectedly");
        slot.runtime = None;
        slot.clear_catalog();
        self.set_state(server_id, slot, ServerState::Stopped);
        self.emit(HostEvent::server_error(ErrorInfo::new(
            server_id,
            &HostError::disconnected(server_id),
        )));
        self.rebuild_registry(&servers);
    }

    // ========== Tools ==========

    /// Merged tool list: built-ins first, then ready servers in registration order.
    pub fn get_tools(&self) -> Vec<Tool> {
        self.registry().tools().to_vec()
    }

    /// Tools declared by one server (empty unless it is ready).
    ///
    /// Shadowed declarations are included; this is the server's own view.
    pub async fn get_server_tools(&self, server_id: &str) -> Result<Vec<Tool>, HostError> {
        if server_id == BUILTIN_SERVER_ID {
            return Ok(self.inner.builtin_tools.clone());
        }
        self.inner
            .servers
            .read()
            .await
            .get(server_id)
            .map(|slot| slot.tools.clone())
            .ok_or_else(|| HostError::unknown_server(server_id))
    }

    /// Re-fetch a ready server's catalog and rebuild the registry.
    ///
    /// Under [`CollisionPolicy::Reject`], a catalog that declares a name
    /// owned by another server or a built-in is refused: the previous
    /// catalog stays in place, the server stays ready, and `ToolCollision`
    /// is returned.
    pub async fn refresh_tools(&self, server_id: &str) -> Result<Vec<Tool>, HostError> {
        self.refresh_generation(server_id, None).await
    }

    async fn refresh_generation(
        &self,
        server_id: &str,
        expected: Option<u64>,
    ) -> Result<Vec<Tool>, HostError> {
        let (correlator, generation) = {
            let servers = self.inner.servers.read().await;
            let slot = servers
                .get(server_id)
                .ok_or_else(|| HostError::unknown_server(server_id))?;
            let runtime = slot
                .runtime
                .as_ref()
                .filter(|_| slot.state.is_ready())
                .ok_or_else(|| not_ready(server_id, &slot.state))?;
            if expected.is_some_and(|g| g != slot.generation) {
                return Err(HostError::disconnected(server_id));
            }
            (Arc::clone(runtime.correlator()), slot.generation)
        };

        let tools =
            handshake::list_tools(&correlator, self.inner.settings.handshake_timeout).await?;

        let mut servers = self.inner.servers.write().await;
        let slot = servers
            .get_mut(server_id)
            .filter(|slot| slot.generation == generation && slot.state.is_ready())
            .ok_or_else(|| HostError::disconnected(server_id))?;

        if self.inner.settings.collision_policy == CollisionPolicy::Reject {
            // Nothing is shadowed under this policy, so every other owner in
            // the current snapshot is a real conflict.
            if let Some((tool, owner)) = self.registry().find_collision(&tools) {
                let err = HostError::ToolCollision {
                    tool: tool.to_string(),
                    existing_server: owner.to_string(),
                    server_id: server_id.to_string(),
                };
                warn!(server_id, error = %err, "Refreshed tool catalog refused, keeping the previous one");
                return Err(err);
            }
        }

        slot.tools.clone_from(&tools);
        self.rebuild_registry(&servers);

        info!(server_id, tools = tools.len(), "Tool catalog refreshed");
        Ok(tools)
    }

    /// Invoke a tool by name.
    ///
    /// Built-ins run in-process. Server tools must belong to a ready server;
    /// the call waits for a gate slot, is sent with the configured timeout,
    /// and gives the slot back whatever the outcome.
    pub async fn call_tool(&self, call: ToolCall) -> Result<ToolResult, HostError> {
        let ToolCall { name, arguments } = call;
        let arguments = normalize_arguments(&name, arguments)?;

        match self.registry().resolve(&name)? {
            Route::Builtin => {
                // Built-ins do blocking filesystem I/O.
                let builtins = self.inner.builtins.clone();
                let tool = name.clone();
                tokio::task::spawn_blocking(move || builtins.call(&tool, &arguments))
                    .await
                    .map_err(|e| HostError::builtin(&name, format!("task failed: {e}")))?
            }
            Route::Remote(server_id) => self.call_remote(&server_id, name, arguments).await,
        }
    }

    async fn call_remote(
        &self,
        server_id: &str,
        name: String,
        arguments: Value,
    ) -> Result<ToolResult, HostError> {
        let correlator = {
            let servers = self.inner.servers.read().await;
            let slot = servers
                .get(server_id)
                .ok_or_else(|| HostError::ToolNotFound { name: name.clone() })?;
            slot.runtime
                .as_ref()
                .filter(|_| slot.state.is_ready())
                .map(|runtime| Arc::clone(runtime.correlator()))
                .ok_or_else(|| not_ready(server_id, &slot.state))?
        };

        let permit = self.inner.gate.acquire().await;
        let started = Instant::now();
        let result = correlator
            .request(
                METHOD_TOOLS_CALL,
                Some(json!({ "name": name, "arguments": arguments })),
                self.inner.settings.request_timeout,
            )
            .await;
        drop(permit);

        debug!(
            server_id,
            tool = %name,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis(),
            "Tool call finished"
        );
        result.map(|value| ToolResult::from_call_result(&value))
    }
}

fn normalize_arguments(tool: &str, arguments: Value) -> Result<Value, HostError> {
    match arguments {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(arguments),
        other => Err(HostError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("arguments must be a JSON object, got {}", json_type(&other)),
        }),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn not_ready(server_id: &str, state: &ServerState) -> HostError {
    HostError::NotReady {
        server_id: server_id.to_string(),
        state: state.label().to_string(),
    }
}

fn with_stderr_tail(err: HostError, stderr: &StderrLog) -> HostError {
    let tail = stderr.tail(STDERR_TAIL_LINES);
    if tail.is_empty() {
        return err;
    }
    let tail = tail.join("\n");
    match err {
        HostError::Handshake { server_id, reason } => HostError::Handshake {
            server_id,
            reason: format!("{reason}\nstderr:\n{tail}"),
        },
        other => other,
    }
}

/// Routes supervisor callbacks back into the manager without keeping it alive.
struct ManagerObserver {
    inner: Weak<ManagerInner>,
}

impl ManagerObserver {
    fn manager(&self) -> Option<McpManager> {
        self.inner.upgrade().map(|inner| McpManager { inner })
    }
}

#[async_trait]
impl ProcessObserver for ManagerObserver {
    async fn on_exit(&self, server_id: &str, generation: u64, reason: ExitReason) {
        if let Some(manager) = self.manager() {
            manager.handle_exit(server_id, generation, reason).await;
        }
    }

    async fn on_tools_list_changed(&self, server_id: &str, generation: u64) {
        let Some(manager) = self.manager() else {
            return;
        };
        // The refresh needs this server's supervisor task to read the reply.
        let server_id = server_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = manager
                .refresh_generation(&server_id, Some(generation))
                .await
            {
                debug!(server_id = %server_id, error = %e, "Tool list refresh skipped");
            }
        });
    }
}
