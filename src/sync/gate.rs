//! One-shot synchronization gate.
//!
//! A [`Gate`] starts pending, can be resolved exactly once, and lets any
//! number of waiters suspend until resolution. A pending gate may instead be
//! *superseded* when its owning state machine replaces it before it resolves
//! naturally (a document change swapping in fresh gates); supersession wakes
//! every waiter with a [`GateOutcome::Superseded`] marker rather than an
//! error, so each waiter decides locally whether to log and drop.
//!
//! This is the fundamental suspension primitive of the context lifecycle.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

// ============================================================================
// GateOutcome
// ============================================================================

/// What a waiter observes when a gate finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome<T> {
    /// The gate was resolved with a value.
    Resolved(T),
    /// The gate was abandoned before resolving.
    Superseded,
}

impl<T> GateOutcome<T> {
    /// Returns `true` if the gate resolved normally.
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Returns `true` if the gate was superseded.
    #[inline]
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

// ============================================================================
// Gate
// ============================================================================

enum GateState<T> {
    Pending(Vec<oneshot::Sender<GateOutcome<T>>>),
    Resolved(T),
    Superseded,
}

/// A one-shot gate that any number of tasks can wait on.
///
/// Cloning produces another handle to the same gate. All waiters observe
/// the same outcome.
///
/// # Contract
///
/// - Starts pending.
/// - [`Gate::resolve`] transitions to resolved exactly once; later calls
///   (resolve or supersede) are no-ops.
/// - [`Gate::supersede`] abandons a pending gate; waiters are woken with
///   [`GateOutcome::Superseded`]. Observable only to a logger, never raised.
pub struct Gate<T> {
    state: Arc<Mutex<GateState<T>>>,
    /// Short label used when logging supersession.
    name: &'static str,
}

impl<T> Clone for Gate<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            name: self.name,
        }
    }
}

impl<T> fmt::Debug for Gate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            GateState::Pending(waiters) => format!("pending ({} waiters)", waiters.len()),
            GateState::Resolved(_) => "resolved".to_string(),
            GateState::Superseded => "superseded".to_string(),
        };
        f.debug_struct("Gate")
            .field("name", &self.name)
            .field("state", &state)
            .finish()
    }
}

impl<T: Clone + Send + 'static> Gate<T> {
    /// Creates a new pending gate.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState::Pending(Vec::new()))),
            name,
        }
    }

    /// Resolves the gate, waking all waiters with the value.
    ///
    /// No-op if the gate is already resolved or superseded.
    pub fn resolve(&self, value: T) {
        let waiters = {
            let mut state = self.state.lock();
            match &mut *state {
                GateState::Pending(waiters) => {
                    let waiters = std::mem::take(waiters);
                    *state = GateState::Resolved(value.clone());
                    waiters
                }
                GateState::Resolved(_) | GateState::Superseded => return,
            }
        };

        for tx in waiters {
            let _ = tx.send(GateOutcome::Resolved(value.clone()));
        }
    }

    /// Abandons a pending gate, waking all waiters with a supersede marker.
    ///
    /// No-op if the gate is already resolved or superseded.
    pub fn supersede(&self) {
        let waiters = {
            let mut state = self.state.lock();
            match &mut *state {
                GateState::Pending(waiters) => {
                    let waiters = std::mem::take(waiters);
                    *state = GateState::Superseded;
                    waiters
                }
                GateState::Resolved(_) | GateState::Superseded => return,
            }
        };

        debug!(gate = self.name, waiters = waiters.len(), "Gate superseded");

        for tx in waiters {
            let _ = tx.send(GateOutcome::Superseded);
        }
    }

    /// Suspends until the gate resolves or is superseded.
    ///
    /// Returns immediately if the gate already finished.
    pub async fn wait(&self) -> GateOutcome<T> {
        let rx = {
            let mut state = self.state.lock();
            match &mut *state {
                GateState::Pending(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    rx
                }
                GateState::Resolved(value) => return GateOutcome::Resolved(value.clone()),
                GateState::Superseded => return GateOutcome::Superseded,
            }
        };

        // A dropped sender means the gate itself was dropped while pending;
        // treat it the same as supersession.
        rx.await.unwrap_or(GateOutcome::Superseded)
    }

    /// Returns `true` if the gate is resolved or superseded.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(&*self.state.lock(), GateState::Pending(_))
    }

    /// Returns `true` if the gate resolved normally.
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(&*self.state.lock(), GateState::Resolved(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_wakes_all_waiters_with_same_value() {
        let gate: Gate<u32> = Gate::new("test");

        let w1 = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait().await }
        });
        let w2 = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait().await }
        });

        tokio::task::yield_now().await;
        gate.resolve(7);

        assert_eq!(w1.await.expect("join"), GateOutcome::Resolved(7));
        assert_eq!(w2.await.expect("join"), GateOutcome::Resolved(7));
    }

    #[tokio::test]
    async fn test_wait_after_resolve_returns_immediately() {
        let gate: Gate<&'static str> = Gate::new("test");
        gate.resolve("done");
        assert_eq!(gate.wait().await, GateOutcome::Resolved("done"));
        assert!(gate.is_resolved());
        assert!(gate.is_finished());
    }

    #[tokio::test]
    async fn test_resolve_is_exactly_once() {
        let gate: Gate<u32> = Gate::new("test");
        gate.resolve(1);
        gate.resolve(2);
        assert_eq!(gate.wait().await, GateOutcome::Resolved(1));
    }

    #[tokio::test]
    async fn test_supersede_wakes_waiters_with_marker() {
        let gate: Gate<()> = Gate::new("test");

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait().await }
        });

        tokio::task::yield_now().await;
        gate.supersede();

        let outcome = waiter.await.expect("join");
        assert!(outcome.is_superseded());
        assert!(gate.is_finished());
        assert!(!gate.is_resolved());
    }

    #[tokio::test]
    async fn test_resolve_after_supersede_is_noop() {
        let gate: Gate<u32> = Gate::new("test");
        gate.supersede();
        gate.resolve(9);
        assert_eq!(gate.wait().await, GateOutcome::Superseded);
    }

    #[tokio::test]
    async fn test_supersede_after_resolve_is_noop() {
        let gate: Gate<u32> = Gate::new("test");
        gate.resolve(3);
        gate.supersede();
        assert_eq!(gate.wait().await, GateOutcome::Resolved(3));
    }
}
