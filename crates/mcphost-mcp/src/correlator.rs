//! Request/response correlation for one server runtime.
//!
//! Each request gets a fresh id and a pending entry holding a oneshot
//! sender. The supervisor task resolves entries as responses arrive; the
//! caller's timer removes its own entry on expiry, and a caller that stops
//! waiting removes it on drop. Whoever removes the entry from the table owns
//! its completion, so every request finishes exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mcphost_core::HostError;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, trace};

use crate::codec::encode;
use crate::protocol::{
    INTERNAL_ERROR, JSONRPC_VERSION, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId, RpcError,
};

/// Sender side of a server's stdin frame queue.
pub type FrameSender = mpsc::UnboundedSender<Vec<u8>>;

type Completion = oneshot::Sender<Result<Value, HostError>>;

struct PendingEntry {
    method: String,
    tx: Completion,
}

/// Removes a pending entry when the waiting caller goes away, whether it
/// finished or was cancelled.
struct PendingGuard<'a> {
    correlator: &'a Correlator,
    id: &'a RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.correlator.table().entries.remove(self.id).is_some() {
            trace!(server_id = %self.correlator.server_id, id = %self.id, "Abandoned request removed");
        }
    }
}

#[derive(Default)]
struct PendingTable {
    entries: HashMap<RequestId, PendingEntry>,
    /// Set once the runtime has gone away; no new entries are accepted.
    closed: bool,
}

/// Matches responses from one server to the requests that caused them.
pub struct Correlator {
    server_id: String,
    next_id: AtomicI64,
    pending: Mutex<PendingTable>,
    outbound: FrameSender,
}

impl Correlator {
    pub fn new(server_id: impl Into<String>, outbound: FrameSender) -> Self {
        Self {
            server_id: server_id.into(),
            next_id: AtomicI64::new(1),
            pending: Mutex::new(PendingTable::default()),
            outbound,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    fn table(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.table().entries.len()
    }

    pub fn is_closed(&self) -> bool {
        self.table().closed
    }

    /// Send a request and wait for its outcome.
    ///
    /// Fails with `Timeout` if no response arrives within `timeout`, with
    /// `ServerDisconnected` if the runtime goes away first, or with `Rpc` if
    /// the server answers with an error object.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, HostError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let frame = encode(&JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: &id,
            method,
            params: params.as_ref(),
        })
        .map_err(|e| HostError::Rpc {
            code: INTERNAL_ERROR,
            message: format!("Failed to encode '{method}' request: {e}"),
            data: None,
        })?;

        let (tx, mut rx) = oneshot::channel();
        {
            let mut table = self.table();
            if table.closed {
                return Err(HostError::disconnected(&self.server_id));
            }
            table.entries.insert(
                id.clone(),
                PendingEntry {
                    method: method.to_string(),
                    tx,
                },
            );
        }

        let _guard = PendingGuard {
            correlator: self,
            id: &id,
        };

        if self.outbound.send(frame).is_err() {
            return Err(HostError::disconnected(&self.server_id));
        }
        trace!(server_id = %self.server_id, %id, method, "Request sent");

        match time::timeout(timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(HostError::disconnected(&self.server_id)),
            Err(_) => {
                if self.table().entries.remove(&id).is_none() {
                    // Resolved while the timer fired; the outcome is already queued.
                    if let Ok(outcome) = rx.try_recv() {
                        return outcome;
                    }
                }
                debug!(server_id = %self.server_id, %id, method, "Request timed out");
                Err(HostError::Timeout {
                    server_id: self.server_id.clone(),
                    method: method.to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Send a notification. No response is expected.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), HostError> {
        let frame = encode(&JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION,
            method,
            params: params.as_ref(),
        })
        .map_err(|e| HostError::Rpc {
            code: INTERNAL_ERROR,
            message: format!("Failed to encode '{method}' notification: {e}"),
            data: None,
        })?;

        self.outbound
            .send(frame)
            .map_err(|_| HostError::disconnected(&self.server_id))
    }

    /// Answer a request the server sent to us.
    pub fn respond(&self, id: &RequestId, outcome: Result<Value, RpcError>) {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        match encode(&JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
            error,
        }) {
            Ok(frame) => {
                // A closed queue means the runtime is shutting down.
                let _ = self.outbound.send(frame);
            }
            Err(e) => debug!(server_id = %self.server_id, %id, error = %e, "Failed to encode response"),
        }
    }

    /// Complete the pending entry for `id`. Returns false for orphaned responses.
    pub fn resolve(&self, id: &RequestId, outcome: Result<Value, RpcError>) -> bool {
        let Some(entry) = self.table().entries.remove(id) else {
            debug!(server_id = %self.server_id, %id, "Discarding orphaned response");
            return false;
        };

        let outcome = outcome.map_err(|e| HostError::Rpc {
            code: e.code,
            message: e.message,
            data: e.data,
        });
        trace!(server_id = %self.server_id, %id, method = %entry.method, ok = outcome.is_ok(), "Response matched");
        // The caller may have given up already; nothing to do then.
        let _ = entry.tx.send(outcome);
        true
    }

    /// Fail every pending request with `ServerDisconnected` and refuse new ones.
    ///
    /// Returns the number of requests failed.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<PendingEntry> = {
            let mut table = self.table();
            table.closed = true;
            table.entries.drain().map(|(_, entry)| entry).collect()
        };

        let count = drained.len();
        for entry in drained {
            let _ = entry.tx.send(Err(HostError::disconnected(&self.server_id)));
        }
        if count > 0 {
            debug!(server_id = %self.server_id, count, "Failed pending requests on disconnect");
        }
        count
    }
}
