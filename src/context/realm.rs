//! Execution realm records and registry.
//!
//! A realm is one script execution environment within a browsing context:
//! the default realm or a named sandbox (isolated world). Realms are
//! registered from upstream `Runtime.executionContextCreated` notifications
//! and destroyed when their execution context goes away, the owning
//! document changes, or the owning context is deleted.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::identifiers::{ContextId, ExecutionContextId, RealmId, SessionId};

// ============================================================================
// Constants
// ============================================================================

/// Navigable id sentinel for realms created before the first commit.
pub const UNKNOWN_NAVIGABLE: &str = "UNKNOWN";

// ============================================================================
// RealmKind
// ============================================================================

/// The kind of execution realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealmKind {
    /// A window realm (the only kind currently surfaced).
    Window,
}

// ============================================================================
// Realm
// ============================================================================

/// One script execution environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Realm {
    /// Globally unique realm id.
    pub realm_id: RealmId,
    /// Owning browsing context.
    pub context_id: ContextId,
    /// Owning context's navigation generation at creation time, or
    /// [`UNKNOWN_NAVIGABLE`].
    pub navigable_id: String,
    /// Session the realm lives on.
    pub session_id: SessionId,
    /// Numeric execution context handle.
    pub execution_context_id: ExecutionContextId,
    /// Serialized origin of the realm.
    pub origin: String,
    /// Realm kind.
    pub kind: RealmKind,
    /// Sandbox name; `None` for the default realm.
    pub sandbox: Option<String>,
}

impl Realm {
    /// Returns `true` if this is the context's default (sandbox-less) realm.
    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.sandbox.is_none()
    }
}

// ============================================================================
// RealmFilter
// ============================================================================

/// Predicate for realm lookup and bulk deletion.
///
/// Unset fields match anything. The sandbox field distinguishes "any
/// sandbox state" (unset) from "default realm only" (`Some(None)`) and
/// "this named sandbox" (`Some(Some(name))`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealmFilter {
    /// Match one realm id.
    pub realm_id: Option<RealmId>,
    /// Match realms owned by a context.
    pub context_id: Option<ContextId>,
    /// Match realms on a session.
    pub session_id: Option<SessionId>,
    /// Match one execution context handle.
    pub execution_context_id: Option<ExecutionContextId>,
    /// Match on sandbox name.
    pub sandbox: Option<Option<String>>,
}

impl RealmFilter {
    /// Creates an all-matching filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the filter to one owning context.
    #[must_use]
    pub fn context(mut self, context_id: ContextId) -> Self {
        self.context_id = Some(context_id);
        self
    }

    /// Restricts the filter to one session.
    #[must_use]
    pub fn session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Restricts the filter to one execution context handle.
    #[must_use]
    pub fn execution_context(mut self, execution_context_id: ExecutionContextId) -> Self {
        self.execution_context_id = Some(execution_context_id);
        self
    }

    /// Restricts the filter to a named sandbox.
    #[must_use]
    pub fn sandbox(mut self, name: impl Into<String>) -> Self {
        self.sandbox = Some(Some(name.into()));
        self
    }

    /// Returns `true` if the realm satisfies every set field.
    #[must_use]
    pub fn matches(&self, realm: &Realm) -> bool {
        if let Some(realm_id) = &self.realm_id
            && realm_id != &realm.realm_id
        {
            return false;
        }
        if let Some(context_id) = &self.context_id
            && context_id != &realm.context_id
        {
            return false;
        }
        if let Some(session_id) = &self.session_id
            && session_id != &realm.session_id
        {
            return false;
        }
        if let Some(execution_context_id) = &self.execution_context_id
            && execution_context_id != &realm.execution_context_id
        {
            return false;
        }
        if let Some(sandbox) = &self.sandbox
            && sandbox != &realm.sandbox
        {
            return false;
        }
        true
    }
}

// ============================================================================
// RealmStorage
// ============================================================================

/// Registry of every live realm, indexed by realm id.
#[derive(Default)]
pub struct RealmStorage {
    realms: Mutex<FxHashMap<RealmId, Realm>>,
}

impl fmt::Debug for RealmStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmStorage")
            .field("realms", &self.realms.lock().len())
            .finish()
    }
}

impl RealmStorage {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a realm.
    ///
    /// A context holds at most one default realm: registering a new
    /// default realm evicts the previous one.
    pub fn add_realm(&self, realm: Realm) {
        let mut realms = self.realms.lock();

        if realm.is_default() {
            let stale: Vec<RealmId> = realms
                .values()
                .filter(|existing| {
                    existing.context_id == realm.context_id && existing.is_default()
                })
                .map(|existing| existing.realm_id.clone())
                .collect();

            for realm_id in stale {
                debug!(realm = %realm_id, context = %realm.context_id, "Replacing default realm");
                realms.remove(&realm_id);
            }
        }

        realms.insert(realm.realm_id.clone(), realm);
    }

    /// Point lookup by realm id.
    #[must_use]
    pub fn get_realm(&self, realm_id: &RealmId) -> Option<Realm> {
        self.realms.lock().get(realm_id).cloned()
    }

    /// Returns every realm matching the filter.
    #[must_use]
    pub fn find_realms(&self, filter: &RealmFilter) -> Vec<Realm> {
        self.realms
            .lock()
            .values()
            .filter(|realm| filter.matches(realm))
            .cloned()
            .collect()
    }

    /// Deletes every realm matching the filter, returning the removed set.
    pub fn delete_realms(&self, filter: &RealmFilter) -> Vec<Realm> {
        let mut realms = self.realms.lock();

        let doomed: Vec<RealmId> = realms
            .values()
            .filter(|realm| filter.matches(realm))
            .map(|realm| realm.realm_id.clone())
            .collect();

        doomed
            .into_iter()
            .filter_map(|realm_id| realms.remove(&realm_id))
            .collect()
    }

    /// Returns the number of live realms.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.realms.lock().len()
    }

    /// Returns `true` if no realms are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.realms.lock().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn realm(id: &str, context: &str, sandbox: Option<&str>) -> Realm {
        Realm {
            realm_id: RealmId::new(id),
            context_id: ContextId::new(context),
            navigable_id: UNKNOWN_NAVIGABLE.to_string(),
            session_id: SessionId::new("S1"),
            execution_context_id: ExecutionContextId::new(1),
            origin: "https://example.com".to_string(),
            kind: RealmKind::Window,
            sandbox: sandbox.map(str::to_string),
        }
    }

    #[test]
    fn test_point_lookup() {
        let storage = RealmStorage::new();
        storage.add_realm(realm("R1", "CTX", None));

        assert!(storage.get_realm(&RealmId::new("R1")).is_some());
        assert!(storage.get_realm(&RealmId::new("R2")).is_none());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_find_by_context_and_sandbox() {
        let storage = RealmStorage::new();
        storage.add_realm(realm("R1", "CTX", None));
        storage.add_realm(realm("R2", "CTX", Some("my-world")));
        storage.add_realm(realm("R3", "OTHER", Some("my-world")));

        let found = storage.find_realms(
            &RealmFilter::new()
                .context(ContextId::new("CTX"))
                .sandbox("my-world"),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].realm_id, RealmId::new("R2"));

        // Default-only lookup.
        let filter = RealmFilter {
            context_id: Some(ContextId::new("CTX")),
            sandbox: Some(None),
            ..RealmFilter::default()
        };
        let defaults = storage.find_realms(&filter);
        assert_eq!(defaults.len(), 1);
        assert!(defaults[0].is_default());
    }

    #[test]
    fn test_bulk_delete_by_context() {
        let storage = RealmStorage::new();
        storage.add_realm(realm("R1", "CTX", None));
        storage.add_realm(realm("R2", "CTX", Some("sb")));
        storage.add_realm(realm("R3", "OTHER", None));

        let removed = storage.delete_realms(&RealmFilter::new().context(ContextId::new("CTX")));
        assert_eq!(removed.len(), 2);
        assert_eq!(storage.len(), 1);
        assert!(storage.get_realm(&RealmId::new("R3")).is_some());
    }

    #[test]
    fn test_delete_by_session_and_execution_context() {
        let storage = RealmStorage::new();
        let mut other = realm("R2", "CTX", None);
        other.execution_context_id = ExecutionContextId::new(2);
        other.sandbox = Some("sb".to_string());
        storage.add_realm(realm("R1", "CTX", None));
        storage.add_realm(other);

        let removed = storage.delete_realms(
            &RealmFilter::new()
                .session(SessionId::new("S1"))
                .execution_context(ExecutionContextId::new(2)),
        );
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].realm_id, RealmId::new("R2"));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_at_most_one_default_realm_per_context() {
        let storage = RealmStorage::new();
        storage.add_realm(realm("R1", "CTX", None));
        storage.add_realm(realm("R2", "CTX", None));

        let filter = RealmFilter {
            context_id: Some(ContextId::new("CTX")),
            sandbox: Some(None),
            ..RealmFilter::default()
        };
        let defaults = storage.find_realms(&filter);
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].realm_id, RealmId::new("R2"));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let storage = RealmStorage::new();
        storage.add_realm(realm("R1", "A", None));
        storage.add_realm(realm("R2", "B", Some("sb")));

        assert_eq!(storage.find_realms(&RealmFilter::new()).len(), 2);
        assert_eq!(storage.delete_realms(&RealmFilter::new()).len(), 2);
        assert!(storage.is_empty());
    }
}
