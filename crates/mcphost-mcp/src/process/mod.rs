//! Child process management for stdio tool servers.
//!
//! - `resolve` - Locating the executable and building the child `PATH`
//! - `supervisor` - Spawn plus the per-server I/O task
//! - `stderr` - Diagnostic capture of server stderr
//! - `shutdown` - SIGTERM -> SIGKILL escalation

mod resolve;
mod shutdown;
mod stderr;
mod supervisor;

use async_trait::async_trait;

pub use resolve::{
    Attempt, AttemptOutcome, FsProvider, ResolveError, Resolved, SearchContext, SystemFs,
    build_effective_path, resolve_executable,
};
pub use shutdown::shutdown_child;
pub use stderr::{STDERR_CAPACITY, StderrLog, spawn_stderr_reader};
pub use supervisor::{RuntimeHandle, SpawnRequest, spawn_runtime};

/// Why a supervisor task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The owner asked the runtime to stop.
    Stopped,
    /// The process went away on its own (EOF, I/O failure); carries a description.
    Exited(String),
}

/// Receives lifecycle callbacks from supervisor tasks.
///
/// Callbacks run on the supervisor task. `on_tools_list_changed` must not
/// wait for a request to the same server, since the task that would read
/// the response is the one making the call.
#[async_trait]
pub trait ProcessObserver: Send + Sync {
    /// The supervisor task for `generation` of `server_id` has finished.
    async fn on_exit(&self, server_id: &str, generation: u64, reason: ExitReason);

    /// The server sent `notifications/tools/list_changed`.
    async fn on_tools_list_changed(&self, server_id: &str, generation: u64);
}
