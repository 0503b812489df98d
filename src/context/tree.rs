//! Context tree index.
//!
//! Flat index of every known browsing context by id. Parent/child edges
//! live on the contexts themselves; the tree answers point lookups for the
//! lifecycle, the subscription ancestor walk, and the outer server.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::context::browsing_context::BrowsingContext;
use crate::error::{Error, Result};
use crate::identifiers::ContextId;

// ============================================================================
// ContextTree
// ============================================================================

/// Index of all known browsing contexts.
#[derive(Default)]
pub struct ContextTree {
    contexts: Mutex<FxHashMap<ContextId, Arc<BrowsingContext>>>,
}

impl fmt::Debug for ContextTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextTree")
            .field("contexts", &self.contexts.lock().len())
            .finish()
    }
}

impl ContextTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the context id is known.
    #[inline]
    #[must_use]
    pub fn has_context(&self, context_id: &ContextId) -> bool {
        self.contexts.lock().contains_key(context_id)
    }

    /// Finds a context without failing.
    #[must_use]
    pub fn find_context(&self, context_id: &ContextId) -> Option<Arc<BrowsingContext>> {
        self.contexts.lock().get(context_id).cloned()
    }

    /// Resolves a context by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownContext`] if the id is not known.
    pub fn get_known_context(&self, context_id: &ContextId) -> Result<Arc<BrowsingContext>> {
        self.find_context(context_id)
            .ok_or_else(|| Error::unknown_context(context_id.clone()))
    }

    /// Finds a context's parent id without failing.
    #[must_use]
    pub fn find_parent_id(&self, context_id: &ContextId) -> Option<ContextId> {
        self.find_context(context_id)
            .and_then(|context| context.parent_id().cloned())
    }

    /// Returns the ids of all known contexts.
    #[must_use]
    pub fn known_context_ids(&self) -> Vec<ContextId> {
        self.contexts.lock().keys().cloned().collect()
    }

    /// Registers a context under its id.
    pub(crate) fn add_context(&self, context: Arc<BrowsingContext>) {
        self.contexts
            .lock()
            .insert(context.context_id().clone(), context);
    }

    /// Removes a context from the index.
    pub(crate) fn remove_context(&self, context_id: &ContextId) {
        self.contexts.lock().remove(context_id);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree_lookups() {
        let tree = ContextTree::new();
        let id = ContextId::new("CTX");

        assert!(!tree.has_context(&id));
        assert!(tree.find_context(&id).is_none());
        assert!(tree.find_parent_id(&id).is_none());
        assert!(tree.known_context_ids().is_empty());

        let err = tree.get_known_context(&id).unwrap_err();
        assert!(matches!(err, Error::UnknownContext { .. }));
    }
}
