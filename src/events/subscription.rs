//! Subscription registry.
//!
//! Tracks which channels are subscribed to which events, per browsing
//! context or globally, and answers "who gets this event, in what order".
//!
//! Every (channel, context, event) triple is assigned a monotonically
//! increasing priority the first time it becomes subscribed. Re-subscribing
//! an active triple keeps its priority; unsubscribing and subscribing again
//! assigns a fresh (higher) one. Delivery order is ascending minimum
//! priority — first-subscribed-wins — with context-specific and global
//! subscriptions compared on equal footing by priority value, not by
//! specificity.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::context::tree::ContextTree;
use crate::identifiers::{Channel, ContextId};
use crate::protocol::event::{EventKind, EventRequest};

// ============================================================================
// Types
// ============================================================================

/// Context `None` means the subscription spans all browsing contexts.
type ContextToEventMap = FxHashMap<Option<ContextId>, FxHashMap<EventKind, u64>>;

// ============================================================================
// SubscriptionManager
// ============================================================================

struct SubscriptionState {
    next_priority: u64,
    /// Channel `None` is the default (unnamed) channel.
    channels: FxHashMap<Option<Channel>, ContextToEventMap>,
}

/// Registry of event subscriptions across channels and contexts.
pub struct SubscriptionManager {
    tree: Arc<ContextTree>,
    state: Mutex<SubscriptionState>,
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("channels", &self.state.lock().channels.len())
            .finish()
    }
}

impl SubscriptionManager {
    /// Creates an empty registry over the given context tree.
    #[must_use]
    pub fn new(tree: Arc<ContextTree>) -> Self {
        Self {
            tree,
            state: Mutex::new(SubscriptionState {
                next_priority: 0,
                channels: FxHashMap::default(),
            }),
        }
    }

    /// Subscribes a channel to an event or a whole domain.
    ///
    /// Domain requests expand to their constituent events. Re-subscribing
    /// an already-active triple is a no-op; its priority is preserved.
    pub fn subscribe(
        &self,
        request: EventRequest,
        context: Option<&ContextId>,
        channel: Option<&Channel>,
    ) {
        for kind in request.kinds() {
            self.subscribe_kind(*kind, context, channel);
        }
    }

    /// Subscribes one concrete event kind.
    pub(crate) fn subscribe_kind(
        &self,
        kind: EventKind,
        context: Option<&ContextId>,
        channel: Option<&Channel>,
    ) {
        let mut state = self.state.lock();
        let state = &mut *state;

        let event_map = state
            .channels
            .entry(channel.cloned())
            .or_default()
            .entry(context.cloned())
            .or_default();

        // Keep the original priority on re-subscription.
        if event_map.contains_key(&kind) {
            return;
        }

        event_map.insert(kind, state.next_priority);
        state.next_priority += 1;
    }

    /// Unsubscribes a channel from an event or a whole domain.
    ///
    /// Removes exactly the (channel, context, event) triples named by the
    /// request; subscriptions on a different (broader or narrower) context
    /// are unaffected.
    pub fn unsubscribe(
        &self,
        request: EventRequest,
        context: Option<&ContextId>,
        channel: Option<&Channel>,
    ) {
        for kind in request.kinds() {
            self.unsubscribe_kind(*kind, context, channel);
        }
    }

    /// Unsubscribes one concrete event kind.
    pub(crate) fn unsubscribe_kind(
        &self,
        kind: EventKind,
        context: Option<&ContextId>,
        channel: Option<&Channel>,
    ) {
        let mut state = self.state.lock();
        let channel_key = channel.cloned();
        let context_key = context.cloned();

        let Some(context_map) = state.channels.get_mut(&channel_key) else {
            return;
        };
        let Some(event_map) = context_map.get_mut(&context_key) else {
            return;
        };

        event_map.remove(&kind);

        // Drop empty shells so channel iteration stays tight.
        if event_map.is_empty() {
            context_map.remove(&context_key);
        }
        if context_map.is_empty() {
            state.channels.remove(&channel_key);
        }
    }

    /// Returns the channels subscribed to `kind` for `context`, ordered by
    /// ascending minimum subscription priority.
    ///
    /// A channel matches through the context itself, any of its ancestors,
    /// or a global (context-less) subscription; channels with no matching
    /// entry are excluded.
    #[must_use]
    pub fn channels_subscribed_to_event(
        &self,
        kind: EventKind,
        context: Option<&ContextId>,
    ) -> Vec<Option<Channel>> {
        let relevant = self.relevant_contexts(context);
        let state = self.state.lock();

        let mut matches: Vec<(u64, Option<Channel>)> = state
            .channels
            .iter()
            .filter_map(|(channel, context_map)| {
                let priority = relevant
                    .iter()
                    .filter_map(|context| context_map.get(context))
                    .filter_map(|event_map| event_map.get(&kind))
                    .min()
                    .copied()?;
                Some((priority, channel.clone()))
            })
            .collect();

        matches.sort_by_key(|(priority, _)| *priority);
        matches.into_iter().map(|(_, channel)| channel).collect()
    }

    /// The global context plus the context's ancestor chain.
    fn relevant_contexts(&self, context: Option<&ContextId>) -> Vec<Option<ContextId>> {
        let mut result = vec![None];
        let mut current = context.cloned();
        while let Some(context_id) = current {
            current = self.tree.find_parent_id(&context_id);
            result.push(Some(context_id));
        }
        result
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::event::EventDomain;

    const SOME_EVENT: EventKind = EventKind::Load;
    const ANOTHER_EVENT: EventKind = EventKind::ContextCreated;

    fn manager() -> SubscriptionManager {
        SubscriptionManager::new(Arc::new(ContextTree::new()))
    }

    fn context(name: &str) -> ContextId {
        ContextId::new(name)
    }

    fn channel(name: &str) -> Channel {
        Channel::new(name)
    }

    fn subscribed(
        manager: &SubscriptionManager,
        kind: EventKind,
        context: Option<&ContextId>,
    ) -> Vec<Option<Channel>> {
        manager.channels_subscribed_to_event(kind, context)
    }

    #[test]
    fn test_global_subscription_matches_any_context() {
        let manager = manager();
        let ch = channel("A");

        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&ch));

        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&context("CTX"))),
            vec![Some(ch)]
        );
    }

    #[test]
    fn test_wrong_event_is_not_matched() {
        let manager = manager();
        let ch = channel("A");

        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&ch));

        assert!(subscribed(&manager, ANOTHER_EVENT, Some(&context("CTX"))).is_empty());
    }

    #[test]
    fn test_unsubscribe_removes_subscription() {
        let manager = manager();
        let ch = channel("A");

        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&ch));
        manager.unsubscribe(EventRequest::Event(SOME_EVENT), None, Some(&ch));

        assert!(subscribed(&manager, SOME_EVENT, Some(&context("CTX"))).is_empty());
    }

    #[test]
    fn test_unsubscribe_global_keeps_context_specific() {
        let manager = manager();
        let ch = channel("A");
        let ctx = context("CTX");

        manager.subscribe(EventRequest::Event(SOME_EVENT), Some(&ctx), Some(&ch));
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&ch));
        manager.unsubscribe(EventRequest::Event(SOME_EVENT), None, Some(&ch));

        assert_eq!(subscribed(&manager, SOME_EVENT, Some(&ctx)), vec![Some(ch)]);
    }

    #[test]
    fn test_unsubscribe_context_specific_keeps_global() {
        let manager = manager();
        let ch = channel("A");
        let ctx = context("CTX");

        manager.subscribe(EventRequest::Event(SOME_EVENT), Some(&ctx), Some(&ch));
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&ch));
        manager.unsubscribe(EventRequest::Event(SOME_EVENT), Some(&ctx), Some(&ch));

        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&ctx)),
            vec![Some(ch.clone())]
        );
        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&context("OTHER"))),
            vec![Some(ch)]
        );
    }

    #[test]
    fn test_channels_ordered_by_subscription_time() {
        let manager = manager();
        let a = channel("A");
        let b = channel("B");

        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&a));
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&b));

        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&context("CTX"))),
            vec![Some(a), Some(b)]
        );
    }

    #[test]
    fn test_resubscribe_moves_channel_to_the_back() {
        let manager = manager();
        let a = channel("A");
        let b = channel("B");

        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&a));
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&b));
        manager.unsubscribe(EventRequest::Event(SOME_EVENT), None, Some(&a));
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&a));

        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&context("CTX"))),
            vec![Some(b), Some(a)]
        );
    }

    #[test]
    fn test_noop_resubscribe_keeps_order() {
        let manager = manager();
        let a = channel("A");
        let b = channel("B");

        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&a));
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&b));
        // Still subscribed: priority is preserved, not bumped.
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&a));

        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&context("CTX"))),
            vec![Some(a), Some(b)]
        );
    }

    #[test]
    fn test_context_specific_and_global_compared_by_priority() {
        let manager = manager();
        let a = channel("A");
        let b = channel("B");
        let ctx = context("CTX");

        manager.subscribe(EventRequest::Event(SOME_EVENT), Some(&ctx), Some(&a));
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&b));

        // The context-specific subscription came first, so A leads for CTX.
        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&ctx)),
            vec![Some(a), Some(b.clone())]
        );
        // Other contexts only match the global subscription.
        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&context("OTHER"))),
            vec![Some(b)]
        );
    }

    #[test]
    fn test_minimum_priority_wins_for_a_channel() {
        let manager = manager();
        let a = channel("A");
        let b = channel("B");
        let ctx = context("CTX");

        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&a));
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&b));
        // A later context-specific entry must not demote channel A.
        manager.subscribe(EventRequest::Event(SOME_EVENT), Some(&ctx), Some(&a));

        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&ctx)),
            vec![Some(a), Some(b)]
        );
    }

    #[test]
    fn test_domain_request_equals_constituent_subscription() {
        let by_domain = manager();
        let by_event = manager();
        let ch = channel("A");

        by_domain.subscribe(
            EventRequest::Domain(EventDomain::BrowsingContext),
            None,
            Some(&ch),
        );
        by_event.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&ch));

        for kind in EventDomain::BrowsingContext.events() {
            assert_eq!(
                subscribed(&by_domain, *kind, Some(&context("CTX"))),
                vec![Some(ch.clone())]
            );
        }
        assert_eq!(
            subscribed(&by_domain, SOME_EVENT, Some(&context("CTX"))),
            subscribed(&by_event, SOME_EVENT, Some(&context("CTX")))
        );
    }

    #[test]
    fn test_domain_unsubscribe_mirrors_expansion() {
        let manager = manager();
        let ch = channel("A");

        manager.subscribe(
            EventRequest::Domain(EventDomain::BrowsingContext),
            None,
            Some(&ch),
        );
        manager.unsubscribe(
            EventRequest::Domain(EventDomain::BrowsingContext),
            None,
            Some(&ch),
        );

        for kind in EventDomain::BrowsingContext.events() {
            assert!(subscribed(&manager, *kind, Some(&context("CTX"))).is_empty());
        }
    }

    #[test]
    fn test_default_channel_is_a_channel_too() {
        let manager = manager();

        manager.subscribe(EventRequest::Event(SOME_EVENT), None, None);
        manager.subscribe(EventRequest::Event(SOME_EVENT), None, Some(&channel("A")));

        assert_eq!(
            subscribed(&manager, SOME_EVENT, Some(&context("CTX"))),
            vec![None, Some(channel("A"))]
        );
    }
}
