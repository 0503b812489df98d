//! Per-session event dispatch tables.
//!
//! Each attached session keeps an explicit dispatch table: event method →
//! ordered list of handler closures, invoked synchronously and in
//! registration order from the multiplexer's event loop.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

use crate::identifiers::SessionId;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Called with the event's `params` for each matching inbound event.
/// Handlers run synchronously on the event-loop task; state they mutate is
/// therefore updated atomically with respect to other suspension points.
pub type CdpEventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

// ============================================================================
// SessionRecord
// ============================================================================

/// Dispatch state for one attached session (or the root session).
pub(crate) struct SessionRecord {
    session_id: Option<SessionId>,
    handlers: Mutex<FxHashMap<String, Vec<CdpEventHandler>>>,
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("session_id", &self.session_id)
            .field("methods", &self.handlers.lock().len())
            .finish()
    }
}

impl SessionRecord {
    /// Creates an empty record for the given session.
    #[must_use]
    pub(crate) fn new(session_id: Option<SessionId>) -> Self {
        Self {
            session_id,
            handlers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Appends a handler to the method's ordered handler list.
    pub(crate) fn register(&self, method: String, handler: CdpEventHandler) {
        self.handlers.lock().entry(method).or_default().push(handler);
    }

    /// Invokes every handler registered for `method`, in registration order.
    ///
    /// The handler list is snapshotted first so a handler may register new
    /// handlers on this same record without deadlocking.
    pub(crate) fn dispatch(&self, method: &str, params: &Value) {
        let handlers: Vec<CdpEventHandler> = self
            .handlers
            .lock()
            .get(method)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            trace!(method, session = ?self.session_id, "No handlers for event");
            return;
        }

        for handler in handlers {
            handler(params);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
