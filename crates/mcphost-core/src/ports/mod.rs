//! Port definitions shared by the host and its adapters.
//!
//! - `error` - Typed host errors and their UI categories
//! - `event_emitter` - Event fan-out abstraction

mod error;
mod event_emitter;

pub use error::{ErrorCategory, ErrorInfo, HostError};
pub use event_emitter::{BroadcastEmitter, DEFAULT_EVENT_CAPACITY, HostEventEmitter, NoopEmitter};
