//! One supervisor task per running server.
//!
//! The task is the only reader of the child's stdout. Outgoing frames go
//! through an mpsc queue owned by the [`Correlator`] to a separate writer
//! task that owns stdin, so a child that stops reading cannot stall stdout
//! draining or a stop request. Incoming lines go through the [`LineCodec`]
//! and are dispatched to the correlator or the [`ProcessObserver`].

use std::env;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mcphost_core::{HostError, ServerConfig};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::resolve::{SearchContext, SystemFs, build_effective_path, resolve_executable};
use super::shutdown::shutdown_child;
use super::stderr::{StderrLog, spawn_stderr_reader};
use super::{ExitReason, ProcessObserver};
use crate::codec::{Decoded, IncomingMessage, LineCodec};
use crate::correlator::Correlator;
use crate::protocol::{METHOD_PING, NOTIFICATION_TOOLS_LIST_CHANGED, RpcError};

const READ_CHUNK: usize = 8 * 1024;

/// Parameters for launching one server process.
#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest<'a> {
    pub config: &'a ServerConfig,
    /// Start attempt number, echoed back to the observer.
    pub generation: u64,
    pub shutdown_grace: Duration,
}

/// Handle to a running server process and its supervisor task.
///
/// Dropping the handle also stops the process, without waiting for it.
pub struct RuntimeHandle {
    server_id: String,
    generation: u64,
    pid: Option<u32>,
    correlator: Arc<Correlator>,
    stderr: StderrLog,
    protocol_errors: Arc<AtomicU64>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("server_id", &self.server_id)
            .field("generation", &self.generation)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl RuntimeHandle {
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub const fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    pub const fn stderr(&self) -> &StderrLog {
        &self.stderr
    }

    /// Lines discarded or dropped by the codec so far.
    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the process and wait until it has been reaped.
    ///
    /// Pending requests fail with `ServerDisconnected` before the process is
    /// signalled.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(server_id = %self.server_id, error = %e, "Supervisor task failed");
        }
    }
}

/// Spawn a stdio server and its supervisor task.
pub fn spawn_runtime(
    request: SpawnRequest<'_>,
    observer: Arc<dyn ProcessObserver>,
) -> Result<RuntimeHandle, HostError> {
    let config = request.config;
    let server_id = config.id.clone();
    let spawn_err = |reason: String| HostError::spawn(&server_id, reason);

    let path_var = env::var_os("PATH");
    let working_dir = config.working_directory.as_deref().map(Path::new);
    let resolved = resolve_executable(
        &config.command,
        SearchContext {
            working_dir,
            path_extra: config.path_extra.as_deref(),
            path_var: path_var.as_deref(),
        },
        &SystemFs,
    )
    .map_err(|e| spawn_err(e.to_string()))?;

    let effective_path =
        build_effective_path(&resolved.path, config.path_extra.as_deref(), path_var.as_deref())
            .map_err(|e| spawn_err(format!("invalid PATH entry: {e}")))?;

    let mut cmd = Command::new(&resolved.path);
    cmd.args(&config.args)
        .env("PATH", effective_path)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| spawn_err(format!("{}: {e}", resolved.path.display())))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| spawn_err("stdin was not captured".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spawn_err("stdout was not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| spawn_err("stderr was not captured".to_string()))?;

    let pid = child.id();
    info!(
        server_id = %server_id,
        pid = ?pid,
        exe = %resolved.path.display(),
        generation = request.generation,
        "Spawned tool server"
    );

    let stderr_log = StderrLog::default();
    spawn_stderr_reader(server_id.clone(), stderr, stderr_log.clone());

    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let correlator = Arc::new(Correlator::new(server_id.clone(), frame_tx));
    let protocol_errors = Arc::new(AtomicU64::new(0));
    let (stop_tx, stop_rx) = oneshot::channel();

    let supervisor = Supervisor {
        server_id: server_id.clone(),
        generation: request.generation,
        correlator: Arc::clone(&correlator),
        observer,
        shutdown_grace: request.shutdown_grace,
        protocol_errors: Arc::clone(&protocol_errors),
    };
    let pipes = Pipes {
        child,
        stdin,
        stdout,
        frames: frame_rx,
        stop: stop_rx,
    };
    let task = tokio::spawn(supervisor.run(pipes));

    Ok(RuntimeHandle {
        server_id,
        generation: request.generation,
        pid,
        correlator,
        stderr: stderr_log,
        protocol_errors,
        stop_tx: Some(stop_tx),
        task,
    })
}

struct Pipes {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    frames: mpsc::UnboundedReceiver<Vec<u8>>,
    stop: oneshot::Receiver<()>,
}

struct Supervisor {
    server_id: String,
    generation: u64,
    correlator: Arc<Correlator>,
    observer: Arc<dyn ProcessObserver>,
    shutdown_grace: Duration,
    protocol_errors: Arc<AtomicU64>,
}

/// Why the I/O loop ended.
enum LoopEnd {
    Stopped,
    Closed(String),
}

impl Supervisor {
    async fn run(self, pipes: Pipes) {
        let Pipes {
            mut child,
            stdin,
            mut stdout,
            frames,
            mut stop,
        } = pipes;

        let mut writer = tokio::spawn(pump_stdin(stdin, frames));
        let mut codec = LineCodec::new();
        let mut buf = vec![0u8; READ_CHUNK];

        let end = loop {
            tokio::select! {
                // A dropped handle counts as a stop request.
                _ = &mut stop => break LoopEnd::Stopped,

                read = stdout.read(&mut buf) => match read {
                    Ok(0) => break LoopEnd::Closed("stdout closed".to_string()),
                    Ok(n) => {
                        for item in codec.feed(&buf[..n]) {
                            self.dispatch(item).await;
                        }
                    }
                    Err(e) => break LoopEnd::Closed(format!("stdout read failed: {e}")),
                },

                written = &mut writer => break LoopEnd::Closed(match written {
                    Ok(Ok(())) => "stdin queue closed".to_string(),
                    Ok(Err(e)) => format!("stdin write failed: {e}"),
                    Err(e) => format!("stdin writer failed: {e}"),
                }),
            }
        };

        let failed = self.correlator.fail_all();
        // Closes stdin, even mid-write.
        writer.abort();

        let status = match shutdown_child(&mut child, self.shutdown_grace).await {
            Ok(status) => status.to_string(),
            Err(e) => format!("unknown exit status ({e})"),
        };

        let reason = match end {
            LoopEnd::Stopped => {
                info!(server_id = %self.server_id, %status, failed, "Tool server stopped");
                ExitReason::Stopped
            }
            LoopEnd::Closed(why) => {
                warn!(server_id = %self.server_id, %status, failed, reason = %why, "Tool server exited");
                ExitReason::Exited(format!("{why}, {status}"))
            }
        };

        self.observer
            .on_exit(&self.server_id, self.generation, reason)
            .await;
    }

    async fn dispatch(&self, item: Decoded) {
        match item {
            Decoded::Message(IncomingMessage::Response { id, outcome }) => {
                self.correlator.resolve(&id, outcome);
            }
            Decoded::Message(IncomingMessage::Request { id, method, .. }) => {
                trace!(server_id = %self.server_id, %id, %method, "Server request");
                if method == METHOD_PING {
                    self.correlator.respond(&id, Ok(json!({})));
                } else {
                    self.correlator
                        .respond(&id, Err(RpcError::method_not_found(&method)));
                }
            }
            Decoded::Message(IncomingMessage::Notification { method, .. }) => {
                if method == NOTIFICATION_TOOLS_LIST_CHANGED {
                    debug!(server_id = %self.server_id, "Server reported tool list change");
                    self.observer
                        .on_tools_list_changed(&self.server_id, self.generation)
                        .await;
                } else {
                    trace!(server_id = %self.server_id, %method, "Ignoring notification");
                }
            }
            Decoded::Discarded { reason } => {
                self.protocol_errors.fetch_add(1, Ordering::Relaxed);
                debug!(server_id = %self.server_id, %reason, "Discarded stdout line");
            }
            Decoded::Overflow { dropped } => {
                self.protocol_errors.fetch_add(1, Ordering::Relaxed);
                warn!(server_id = %self.server_id, dropped, "Dropped oversized partial message");
            }
        }
    }
}

/// Write queued frames to the child's stdin until the queue closes or a
/// write fails.
async fn pump_stdin(
    mut stdin: ChildStdin,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
) -> std::io::Result<()> {
    while let Some(frame) = frames.recv().await {
        stdin.write_all(&frame).await?;
        stdin.flush().await?;
    }
    Ok(())
}
