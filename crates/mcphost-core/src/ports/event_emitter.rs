//! Event emitter trait for host event broadcasting.
//!
//! The manager reports lifecycle changes through this abstraction so that
//! channel types never become part of its public API surface.

use tokio::sync::broadcast;

use crate::events::HostEvent;

/// Default capacity of the broadcast channel behind [`BroadcastEmitter`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Trait for emitting host events.
///
/// # Implementations
///
/// - `NoopEmitter` - For tests and CLI contexts that don't need events
/// - `BroadcastEmitter` - Fan-out to any number of async subscribers
pub trait HostEventEmitter: Send + Sync {
    /// Emit a host event. Must not block.
    fn emit(&self, event: HostEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn HostEventEmitter>;
}

/// A no-op event emitter.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl HostEventEmitter for NoopEmitter {
    fn emit(&self, _event: HostEvent) {}

    fn clone_box(&self) -> Box<dyn HostEventEmitter> {
        Box::new(self.clone())
    }
}

/// Emitter backed by a `tokio::sync::broadcast` channel.
///
/// Events emitted with no live subscriber are dropped. Slow subscribers see
/// `RecvError::Lagged` rather than blocking the host.
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<HostEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl HostEventEmitter for BroadcastEmitter {
    fn emit(&self, event: HostEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    fn clone_box(&self) -> Box<dyn HostEventEmitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_emitter() {
        let emitter = NoopEmitter::new();
        emitter.emit(HostEvent::server_removed("x"));
    }

    #[test]
    fn test_emitter_as_trait_object() {
        let emitter: Arc<dyn HostEventEmitter> = Arc::new(NoopEmitter::new());
        let cloned = emitter.clone_box();
        cloned.emit(HostEvent::tools_changed(3));
    }

    #[tokio::test]
    async fn test_broadcast_emitter_delivers_to_subscribers() {
        let emitter = BroadcastEmitter::new(8);
        let mut rx = emitter.subscribe();
        let boxed = emitter.clone_box();

        boxed.emit(HostEvent::server_added("echo", "Echo"));

        match rx.recv().await.unwrap() {
            HostEvent::ServerAdded { server_id, name } => {
                assert_eq!(server_id, "echo");
                assert_eq!(name, "Echo");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_broadcast_emitter_without_subscribers_is_fine() {
        BroadcastEmitter::default().emit(HostEvent::tools_changed(0));
    }
}
