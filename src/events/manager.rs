//! Event manager.
//!
//! Wraps every derived protocol event with a fresh monotonic id and its
//! owning context, buffers replay-eligible kinds per (kind, context), and
//! fans events out to subscribed channels in subscription-priority order.
//! Outbound messages are enqueued onto a single serialized processor, so
//! each channel observes its events strictly in id order.
//!
//! An event payload may itself depend on unfinished async work
//! ([`EventManager::register_promise_event`]); the payload future is shared
//! between the buffer and every channel delivery.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::context::tree::ContextTree;
use crate::error::Result;
use crate::identifiers::{Channel, ContextId};
use crate::protocol::event::{EventKind, EventMessage, EventRequest};
use crate::sync::buffer::Buffer;
use crate::sync::queue::ProcessingQueue;

// ============================================================================
// Constants
// ============================================================================

/// Default replay-buffer capacity per event kind.
///
/// Kinds absent from the table are not buffered at all.
fn default_buffer_config() -> FxHashMap<EventKind, usize> {
    FxHashMap::from_iter([(EventKind::EntryAdded, 100)])
}

// ============================================================================
// Types
// ============================================================================

/// A deferred event payload, shareable between buffer and deliveries.
pub type PendingEvent = Shared<BoxFuture<'static, EventMessage>>;

// ============================================================================
// OutgoingMessage
// ============================================================================

/// One resolved event bound for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    /// The resolved event payload.
    pub message: EventMessage,
    /// Destination channel (`None` = default channel).
    pub channel: Option<Channel>,
}

// ============================================================================
// EventWrapper
// ============================================================================

/// A registered event: monotonic id, owning context, deferred payload.
#[derive(Clone)]
struct EventWrapper {
    id: u64,
    context: Option<ContextId>,
    event: PendingEvent,
}

// ============================================================================
// EventManager
// ============================================================================

struct EventManagerState {
    next_event_id: u64,
    /// Replay buffers keyed by (kind, context). Channel-agnostic.
    buffers: FxHashMap<(EventKind, Option<ContextId>), Buffer<EventWrapper>>,
    /// Contexts that ever buffered an event of a kind; used to merge
    /// per-context buffers into global (context-less) replays.
    event_contexts: FxHashMap<EventKind, FxHashSet<Option<ContextId>>>,
    /// Highest delivered event id per (kind, context, channel); prevents
    /// re-delivery across unsubscribe/resubscribe cycles.
    last_sent: FxHashMap<(EventKind, Option<ContextId>, Option<Channel>), u64>,
}

/// Buffered, priority-ordered event fan-out.
pub struct EventManager {
    tree: Arc<ContextTree>,
    subscriptions: super::subscription::SubscriptionManager,
    state: Mutex<EventManagerState>,
    outgoing: ProcessingQueue<OutgoingMessage>,
    buffer_config: FxHashMap<EventKind, usize>,
}

impl EventManager {
    /// Creates a manager with the default buffer configuration.
    ///
    /// `processor` receives every outbound message, in order; it is the
    /// seam to the outer protocol server's channel queues.
    #[must_use]
    pub fn new<P>(tree: Arc<ContextTree>, processor: P) -> Self
    where
        P: FnMut(OutgoingMessage) -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        Self::with_buffer_config(tree, default_buffer_config(), processor)
    }

    /// Creates a manager with an explicit per-kind buffer capacity table.
    #[must_use]
    pub fn with_buffer_config<P>(
        tree: Arc<ContextTree>,
        buffer_config: FxHashMap<EventKind, usize>,
        processor: P,
    ) -> Self
    where
        P: FnMut(OutgoingMessage) -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        Self {
            subscriptions: super::subscription::SubscriptionManager::new(Arc::clone(&tree)),
            tree,
            state: Mutex::new(EventManagerState {
                next_event_id: 1,
                buffers: FxHashMap::default(),
                event_contexts: FxHashMap::default(),
                last_sent: FxHashMap::default(),
            }),
            outgoing: ProcessingQueue::new(processor),
            buffer_config,
        }
    }

    /// Returns the subscription registry.
    #[inline]
    #[must_use]
    pub fn subscriptions(&self) -> &super::subscription::SubscriptionManager {
        &self.subscriptions
    }

    /// Registers a ready event.
    pub fn register_event(&self, event: EventMessage, context: Option<&ContextId>) {
        let kind = event.method;
        self.register_promise_event(std::future::ready(event), context, kind);
    }

    /// Registers an event whose payload is still being produced.
    ///
    /// The event occupies its place in the id order now; the payload is
    /// awaited by the outbound queue, which preserves that order.
    pub fn register_promise_event<F>(&self, event: F, context: Option<&ContextId>, kind: EventKind)
    where
        F: Future<Output = EventMessage> + Send + 'static,
    {
        let event: PendingEvent = event.boxed().shared();

        let wrapper = {
            let mut state = self.state.lock();
            let id = state.next_event_id;
            state.next_event_id += 1;
            EventWrapper {
                id,
                context: context.cloned(),
                event,
            }
        };

        let channels = self.subscriptions.channels_subscribed_to_event(kind, context);

        self.buffer_event(&wrapper, kind);

        // Send to channels in subscription-priority order.
        for channel in channels {
            self.emit_outgoing(wrapper.event.clone(), channel.clone());
            self.mark_event_sent(&wrapper, channel.as_ref(), kind);
        }
    }

    /// Subscribes a channel to the cross product of `events` × `contexts`,
    /// replaying buffered events the channel has not seen yet.
    ///
    /// Pairs naming a non-null context unknown to the tree are silently
    /// skipped: there is no such context to subscribe to.
    pub fn subscribe(
        &self,
        events: &[EventRequest],
        contexts: &[Option<ContextId>],
        channel: Option<&Channel>,
    ) {
        for request in events {
            for kind in request.kinds() {
                for context in contexts {
                    let context = context.as_ref();

                    if let Some(context_id) = context
                        && !self.tree.has_context(context_id)
                    {
                        debug!(context = %context_id, "Subscribe to unknown context skipped");
                        continue;
                    }

                    self.subscriptions.subscribe_kind(*kind, context, channel);

                    // Replay strictly in ascending id order.
                    for wrapper in self.buffered_events(*kind, context, channel) {
                        self.emit_outgoing(wrapper.event.clone(), channel.cloned());
                        self.mark_event_sent(&wrapper, channel, *kind);
                    }
                }
            }
        }
    }

    /// Unsubscribes a channel from the cross product of `events` × `contexts`.
    pub fn unsubscribe(
        &self,
        events: &[EventRequest],
        contexts: &[Option<ContextId>],
        channel: Option<&Channel>,
    ) {
        for request in events {
            for context in contexts {
                self.subscriptions
                    .unsubscribe(*request, context.as_ref(), channel);
            }
        }
    }

    /// Enqueues one delivery onto the serialized outbound queue.
    fn emit_outgoing(&self, event: PendingEvent, channel: Option<Channel>) {
        self.outgoing.add(async move {
            Ok(OutgoingMessage {
                message: event.await,
                channel,
            })
        });
    }

    /// Buffers the event if its kind is replay-eligible.
    fn buffer_event(&self, wrapper: &EventWrapper, kind: EventKind) {
        let Some(&capacity) = self.buffer_config.get(&kind) else {
            return;
        };

        let mut state = self.state.lock();
        state
            .buffers
            .entry((kind, wrapper.context.clone()))
            .or_insert_with(|| Buffer::new(capacity))
            .push(wrapper.clone());
        state
            .event_contexts
            .entry(kind)
            .or_default()
            .insert(wrapper.context.clone());
    }

    /// Records the event as delivered to the channel, if replay-eligible.
    fn mark_event_sent(&self, wrapper: &EventWrapper, channel: Option<&Channel>, kind: EventKind) {
        if !self.buffer_config.contains_key(&kind) {
            return;
        }

        let key = (kind, wrapper.context.clone(), channel.cloned());
        self.state
            .lock()
            .last_sent
            .entry(key)
            .and_modify(|last| *last = (*last).max(wrapper.id))
            .or_insert(wrapper.id);
    }

    /// Returns buffered events not yet delivered to the channel, sorted by
    /// ascending id. A global (context-less) lookup merges the buffers of
    /// every context that recorded events of this kind.
    fn buffered_events(
        &self,
        kind: EventKind,
        context: Option<&ContextId>,
        channel: Option<&Channel>,
    ) -> Vec<EventWrapper> {
        let state = self.state.lock();

        let mut result = Self::undelivered(&state, kind, context, channel);

        if context.is_none() {
            let contexts: Vec<Option<ContextId>> = state
                .event_contexts
                .get(&kind)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();

            for buffered_context in contexts {
                // Context-less events are already in the result.
                if buffered_context.is_none() {
                    continue;
                }
                result.extend(Self::undelivered(
                    &state,
                    kind,
                    buffered_context.as_ref(),
                    channel,
                ));
            }
        }

        result.sort_by_key(|wrapper| wrapper.id);
        result
    }

    /// Buffered events for one (kind, context) past the channel's marker.
    fn undelivered(
        state: &EventManagerState,
        kind: EventKind,
        context: Option<&ContextId>,
        channel: Option<&Channel>,
    ) -> Vec<EventWrapper> {
        let last_sent = state
            .last_sent
            .get(&(kind, context.cloned(), channel.cloned()))
            .copied();

        state
            .buffers
            .get(&(kind, context.cloned()))
            .map(|buffer| {
                buffer
                    .iter()
                    .filter(|wrapper| last_sent.is_none_or(|last| wrapper.id > last))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
