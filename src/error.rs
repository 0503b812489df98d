//! Error types for the bridge core.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use bidi_bridge::{Result, Error};
//!
//! async fn example(context: &BrowsingContext) -> Result<()> {
//!     context.navigate("https://example.com", ReadinessState::Complete).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Session | [`Error::UnknownSession`], [`Error::Disconnected`] |
//! | Command | [`Error::CommandFailed`] |
//! | Context | [`Error::UnknownContext`] |
//! | Navigation | [`Error::NavigationFailed`], [`Error::UnsupportedReadiness`] |
//! | Script | [`Error::SandboxCreationFailed`], [`Error::MissingDefaultRealm`] |
//! | External | [`Error::Json`], [`Error::ChannelClosed`] |
//!
//! Propagation policy: multiplexer failures (disconnect, unknown session)
//! are local to the affected request or session. Everything else propagates
//! to the immediate caller; nothing is retried automatically.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::{ContextId, SessionId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Session Errors
    // ========================================================================
    /// No session record exists for the given session id.
    ///
    /// Fatal to the specific lookup, not to the process.
    #[error("Unknown CDP session: {session_id}")]
    UnknownSession {
        /// The unknown session id.
        session_id: SessionId,
    },

    /// The transport closed.
    ///
    /// Every outstanding request is rejected with this error; no partial
    /// retries are attempted.
    #[error("Disconnected")]
    Disconnected,

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// The peer answered a command with an error payload.
    #[error("Command failed ({code}): {message}")]
    CommandFailed {
        /// Upstream error code.
        code: i64,
        /// Upstream error text.
        message: String,
    },

    // ========================================================================
    // Context Errors
    // ========================================================================
    /// No browsing context is known under the given id.
    #[error("Unknown browsing context: {context_id}")]
    UnknownContext {
        /// The unknown context id.
        context_id: ContextId,
    },

    // ========================================================================
    // Navigation Errors
    // ========================================================================
    /// The upstream reported an error string while navigating.
    #[error("Navigation failed: {message}")]
    NavigationFailed {
        /// Error text reported by the upstream.
        message: String,
    },

    /// A readiness value outside the defined enum.
    ///
    /// Produced at the parsing boundary; the in-crate enum is closed.
    #[error("Unsupported readiness state: {value}")]
    UnsupportedReadiness {
        /// The unrecognized readiness value.
        value: String,
    },

    // ========================================================================
    // Script Errors
    // ========================================================================
    /// Sandbox creation did not yield exactly one matching realm.
    #[error("Sandbox '{sandbox}' wasn't created (found {found} realms)")]
    SandboxCreationFailed {
        /// The requested sandbox name.
        sandbox: String,
        /// Number of realms found after the creation command completed.
        found: usize,
    },

    /// A default realm was required before the context has one.
    #[error("No default realm for browsing context {context_id}")]
    MissingDefaultRealm {
        /// The context lacking a default realm.
        context_id: ContextId,
    },

    // ========================================================================
    // Subscription Errors
    // ========================================================================
    /// An event name that matches neither a known event nor a domain.
    #[error("Unknown event: {name}")]
    UnknownEvent {
        /// The unrecognized event name.
        name: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal response channel closed before a reply arrived.
    ///
    /// Observed when the multiplexer event loop terminates mid-request;
    /// equivalent to a disconnect from the caller's point of view.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an unknown session error.
    #[inline]
    pub fn unknown_session(session_id: impl Into<SessionId>) -> Self {
        Self::UnknownSession {
            session_id: session_id.into(),
        }
    }

    /// Creates an unknown context error.
    #[inline]
    pub fn unknown_context(context_id: impl Into<ContextId>) -> Self {
        Self::UnknownContext {
            context_id: context_id.into(),
        }
    }

    /// Creates a command failed error.
    #[inline]
    pub fn command_failed(code: i64, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            code,
            message: message.into(),
        }
    }

    /// Creates a navigation failed error.
    #[inline]
    pub fn navigation_failed(message: impl Into<String>) -> Self {
        Self::NavigationFailed {
            message: message.into(),
        }
    }

    /// Creates an unsupported readiness error.
    #[inline]
    pub fn unsupported_readiness(value: impl Into<String>) -> Self {
        Self::UnsupportedReadiness {
            value: value.into(),
        }
    }

    /// Creates a sandbox creation failed error.
    #[inline]
    pub fn sandbox_creation_failed(sandbox: impl Into<String>, found: usize) -> Self {
        Self::SandboxCreationFailed {
            sandbox: sandbox.into(),
            found,
        }
    }

    /// Creates a missing default realm error.
    #[inline]
    pub fn missing_default_realm(context_id: impl Into<ContextId>) -> Self {
        Self::MissingDefaultRealm {
            context_id: context_id.into(),
        }
    }

    /// Creates an unknown event error.
    #[inline]
    pub fn unknown_event(name: impl Into<String>) -> Self {
        Self::UnknownEvent { name: name.into() }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error signals a closed transport.
    #[inline]
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected | Self::ChannelClosed(_))
    }

    /// Returns `true` if this is a navigation error.
    #[inline]
    #[must_use]
    pub fn is_navigation_error(&self) -> bool {
        matches!(
            self,
            Self::NavigationFailed { .. } | Self::UnsupportedReadiness { .. }
        )
    }

    /// Returns `true` if this is a script/realm error.
    #[inline]
    #[must_use]
    pub fn is_realm_error(&self) -> bool {
        matches!(
            self,
            Self::SandboxCreationFailed { .. } | Self::MissingDefaultRealm { .. }
        )
    }

    /// Returns `true` if this error is local to a single lookup or request
    /// rather than process-wide.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Disconnected | Self::ChannelClosed(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
