//! BiDi event kinds and messages.
//!
//! Events produced by the bridge for clients follow the BiDi
//! `module.eventName` format and are grouped into domains. A subscription
//! request may name one concrete event or a whole domain ("all events in
//! the domain"), which expands to its constituents.
//!
//! # Event Kinds
//!
//! | Domain | Events |
//! |--------|--------|
//! | `browsingContext` | `contextCreated`, `contextDestroyed`, `domContentLoaded`, `load` |
//! | `log` | `entryAdded` |
//! | `cdp` | `eventReceived` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::Error;

// ============================================================================
// EventDomain
// ============================================================================

/// A group of related event kinds ("module" in protocol terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventDomain {
    /// Browsing-context lifecycle events.
    BrowsingContext,
    /// Console/log entry events.
    Log,
    /// Raw upstream protocol event forwarding.
    Cdp,
}

impl EventDomain {
    /// Returns the domain's wire name.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BrowsingContext => "browsingContext",
            Self::Log => "log",
            Self::Cdp => "cdp",
        }
    }

    /// Returns every concrete event kind in this domain.
    #[must_use]
    pub const fn events(self) -> &'static [EventKind] {
        match self {
            Self::BrowsingContext => &[
                EventKind::ContextCreated,
                EventKind::ContextDestroyed,
                EventKind::DomContentLoaded,
                EventKind::Load,
            ],
            Self::Log => &[EventKind::EntryAdded],
            Self::Cdp => &[EventKind::EventReceived],
        }
    }
}

impl fmt::Display for EventDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// A concrete event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `browsingContext.contextCreated`
    ContextCreated,
    /// `browsingContext.contextDestroyed`
    ContextDestroyed,
    /// `browsingContext.domContentLoaded`
    DomContentLoaded,
    /// `browsingContext.load`
    Load,
    /// `log.entryAdded`
    EntryAdded,
    /// `cdp.eventReceived`
    EventReceived,
}

impl EventKind {
    /// Returns the event's wire method name.
    #[inline]
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::ContextCreated => "browsingContext.contextCreated",
            Self::ContextDestroyed => "browsingContext.contextDestroyed",
            Self::DomContentLoaded => "browsingContext.domContentLoaded",
            Self::Load => "browsingContext.load",
            Self::EntryAdded => "log.entryAdded",
            Self::EventReceived => "cdp.eventReceived",
        }
    }

    /// Returns the domain this event belongs to.
    #[inline]
    #[must_use]
    pub const fn domain(self) -> EventDomain {
        match self {
            Self::ContextCreated
            | Self::ContextDestroyed
            | Self::DomContentLoaded
            | Self::Load => EventDomain::BrowsingContext,
            Self::EntryAdded => EventDomain::Log,
            Self::EventReceived => EventDomain::Cdp,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.method())
    }
}

// ============================================================================
// EventRequest
// ============================================================================

/// One element of a subscribe/unsubscribe request.
///
/// Either a single concrete event or a whole domain; domain requests expand
/// to their constituent events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventRequest {
    /// All events in a domain.
    Domain(EventDomain),
    /// One concrete event.
    Event(EventKind),
}

impl EventRequest {
    /// Returns the concrete event kinds this request expands to.
    #[must_use]
    pub fn kinds(self) -> &'static [EventKind] {
        match self {
            Self::Domain(domain) => domain.events(),
            Self::Event(kind) => match kind {
                EventKind::ContextCreated => &[EventKind::ContextCreated],
                EventKind::ContextDestroyed => &[EventKind::ContextDestroyed],
                EventKind::DomContentLoaded => &[EventKind::DomContentLoaded],
                EventKind::Load => &[EventKind::Load],
                EventKind::EntryAdded => &[EventKind::EntryAdded],
                EventKind::EventReceived => &[EventKind::EventReceived],
            },
        }
    }
}

impl FromStr for EventRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "browsingContext" => Ok(Self::Domain(EventDomain::BrowsingContext)),
            "log" => Ok(Self::Domain(EventDomain::Log)),
            "cdp" => Ok(Self::Domain(EventDomain::Cdp)),
            "browsingContext.contextCreated" => Ok(Self::Event(EventKind::ContextCreated)),
            "browsingContext.contextDestroyed" => Ok(Self::Event(EventKind::ContextDestroyed)),
            "browsingContext.domContentLoaded" => Ok(Self::Event(EventKind::DomContentLoaded)),
            "browsingContext.load" => Ok(Self::Event(EventKind::Load)),
            "log.entryAdded" => Ok(Self::Event(EventKind::EntryAdded)),
            "cdp.eventReceived" => Ok(Self::Event(EventKind::EventReceived)),
            other => Err(Error::unknown_event(other)),
        }
    }
}

// ============================================================================
// EventMessage
// ============================================================================

/// A derived BiDi event message.
///
/// # Format
///
/// ```json
/// { "method": "browsingContext.load", "params": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMessage {
    /// Event kind (serialized as the wire method name).
    pub method: EventKind,

    /// Event-specific payload.
    pub params: Value,
}

impl EventMessage {
    /// Creates a new event message.
    #[inline]
    #[must_use]
    pub fn new(method: EventKind, params: Value) -> Self {
        Self { method, params }
    }
}

// ============================================================================
// Tests
// ============================================================================
