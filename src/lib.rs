//! BiDi Bridge - CDP to WebDriver BiDi protocol bridge core.
//!
//! This library is the coordination core of a bridge that translates a
//! low-level, session-multiplexed remote-debugging protocol (CDP) into a
//! higher-level browser-automation protocol (BiDi).
//!
//! # Architecture
//!
//! Data flows one way through three subsystems:
//!
//! - **Session multiplexer** ([`cdp`]): one duplex transport, many logical
//!   sessions; request ids, response correlation, per-session event routing
//! - **Context lifecycle** ([`context`]): a tree of per-frame state
//!   machines tracking navigations, readiness gates and execution realms
//! - **Event delivery** ([`events`]): subscription registry with priority
//!   ordering, replay buffers, and serialized outbound fan-out
//!
//! Key design principles:
//!
//! - Single-threaded cooperative concurrency: state mutation happens in
//!   synchronous handler runs and between suspension points, never under
//!   parallel mutation
//! - Gates instead of callbacks: lifecycle waits suspend on one-shot
//!   [`sync::Gate`]s that a document change supersedes rather than failing
//! - The peer is authoritative: late responses and unknown sessions are
//!   dropped, never crashes
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bidi_bridge::{
//!     BrowsingContext, CdpConnection, ChannelTransport, ContextTree, EventManager,
//!     RealmStorage, ReadinessState, Result,
//! };
//! use futures_util::FutureExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // The wire side hands the bridge one duplex transport.
//!     let (transport, _peer) = ChannelTransport::pair();
//!     let connection = CdpConnection::new(transport);
//!
//!     let tree = Arc::new(ContextTree::new());
//!     let realms = Arc::new(RealmStorage::new());
//!     let events = Arc::new(EventManager::new(Arc::clone(&tree), |outgoing| {
//!         async move {
//!             println!("-> {:?} {:?}", outgoing.channel, outgoing.message);
//!             Ok(())
//!         }
//!         .boxed()
//!     }));
//!
//!     // Attach notifications create sessions; targets become contexts.
//!     let session_id = "SESSION".into();
//!     let client = connection.session_client(&session_id)?;
//!     let context = BrowsingContext::create_target_context(
//!         "TARGET".into(),
//!         None,
//!         client,
//!         session_id,
//!         Arc::clone(&tree),
//!         Arc::clone(&realms),
//!         Arc::clone(&events),
//!     );
//!
//!     context.navigate("https://example.com", ReadinessState::Complete).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cdp`] | Session multiplexer: connection, clients, transport boundary |
//! | [`context`] | Browsing-context tree, state machines, realm registry |
//! | [`events`] | Subscriptions, buffering and outbound fan-out |
//! | [`sync`] | Gates, replay buffers, serialized processing |
//! | [`protocol`] | Wire-shaped message and event types |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |

// ============================================================================
// Modules
// ============================================================================

/// Session multiplexer.
///
/// - [`CdpConnection`] - owns the transport and the event loop
/// - [`CdpClient`] - per-session command/event handle
pub mod cdp;

/// Browsing-context lifecycle.
///
/// - [`BrowsingContext`] - per-context state machine
/// - [`ContextTree`] - context index
/// - [`RealmStorage`] - execution realm registry
pub mod context;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Event delivery subsystem.
///
/// - [`EventManager`] - buffering, replay and fan-out
/// - [`SubscriptionManager`] - priority-ordered subscriptions
pub mod events;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Protocol message types.
///
/// Wire-shaped values for both the CDP and the BiDi side.
pub mod protocol;

/// Cooperative synchronization primitives.
///
/// Gates, bounded replay buffers and serialized async processing.
pub mod sync;

// ============================================================================
// Re-exports
// ============================================================================

// Multiplexer types
pub use cdp::{CdpClient, CdpConnection, ChannelTransport, Transport};

// Context types
pub use context::{BrowsingContext, ContextTree, Realm, RealmFilter, RealmKind, RealmStorage};

// Event delivery types
pub use events::{EventManager, OutgoingMessage, PendingEvent, SubscriptionManager};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{
    Channel, CommandId, ContextId, ExecutionContextId, NavigationId, RealmId, SessionId,
};

// Protocol types
pub use protocol::{
    BrowsingContextInfo, CdpIncomingMessage, CdpRequest, EventDomain, EventKind, EventMessage,
    EventRequest, NavigateResult, ReadinessState,
};

// Synchronization primitives
pub use sync::{Buffer, Gate, GateOutcome, ProcessingQueue};
