//! CDP session multiplexer.
//!
//! Single point of contact with the browser transport. One duplex
//! transport carries every logical session's traffic; this module assigns
//! request ids, correlates responses, and demultiplexes unsolicited events
//! to per-session handler sets.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                        ┌──────────────────┐
//! │  Bridge (Rust)   │                        │  Browser         │
//! │                  │      one transport     │                  │
//! │  CdpConnection ──┼───────────────────────►│  root session    │
//! │   ├ CdpClient    │   requests / events    │  session "A"     │
//! │   ├ CdpClient A  │◄───────────────────────┼  session "B"     │
//! │   └ CdpClient B  │                        │  ...             │
//! └──────────────────┘                        └──────────────────┘
//! ```
//!
//! Session records are created on `Target.attachedToTarget` and destroyed
//! on `Target.detachedFromTarget`, transparently to callers. On transport
//! close every outstanding request is rejected with a disconnect error.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `transport` | Transport trait boundary and in-process transport |
//! | `session` | Per-session event dispatch tables |
//! | `connection` | Connection, correlation and the event loop |

// ============================================================================
// Submodules
// ============================================================================

/// Transport boundary.
pub mod transport;

/// Session records and dispatch tables.
pub mod session;

/// Connection and event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{CdpClient, CdpConnection};
pub use session::CdpEventHandler;
pub use transport::{ChannelTransport, Transport};
