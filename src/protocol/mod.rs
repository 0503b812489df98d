//! Protocol message types.
//!
//! This module defines the wire-shaped values on both sides of the bridge:
//! the low-level CDP messages exchanged with the browser and the high-level
//! BiDi values produced for clients.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`CdpRequest`] | Bridge → Browser | Command request |
//! | [`CdpIncomingMessage`] | Browser → Bridge | Response or event |
//! | [`EventMessage`] | Bridge → Client | Derived BiDi event |
//!
//! Command naming follows the CDP `Domain.method` format
//! (`Page.navigate`, `Runtime.enable`); BiDi event naming follows the
//! `module.eventName` format (`browsingContext.load`).
//!
//! Only the handful of commands and events the coordination core drives are
//! given typed parameter structs; everything else travels as
//! `serde_json::Value`, with the peer as the authority on shape.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | CDP request/response/event wire messages |
//! | `event` | BiDi event kinds, domains and event messages |
//! | `browsing_context` | Navigation readiness, results and context info |

// ============================================================================
// Submodules
// ============================================================================

/// CDP wire message types.
pub mod message;

/// BiDi event kinds and messages.
pub mod event;

/// Browsing-context protocol values.
pub mod browsing_context;

// ============================================================================
// Re-exports
// ============================================================================

pub use browsing_context::{BrowsingContextInfo, NavigateResult, ReadinessState};
pub use event::{EventDomain, EventKind, EventMessage, EventRequest};
pub use message::{CdpErrorPayload, CdpIncomingMessage, CdpRequest};
