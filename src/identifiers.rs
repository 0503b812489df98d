//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//! All string-backed identifiers are assigned by the upstream browser
//! (context ids, session ids, realm ids, loader ids) or by the client
//! (channel names); [`CommandId`] is the only locally-assigned one.
//!
//! | Identifier | Backing | Assigned by |
//! |------------|---------|-------------|
//! | [`CommandId`] | `u64` | this crate (increasing per connection) |
//! | [`SessionId`] | `String` | upstream (`Target.attachedToTarget`) |
//! | [`ContextId`] | `String` | upstream (target/frame id) |
//! | [`NavigationId`] | `String` | upstream (loader id) |
//! | [`RealmId`] | `String` | upstream (execution context unique id) |
//! | [`ExecutionContextId`] | `u32` | upstream (numeric realm handle) |
//! | [`Channel`] | `String` | client (subscription channel name) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Macro
// ============================================================================

/// Generates a string-backed identifier newtype.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// CDP session identifier.
    ///
    /// Identifies one attached debugging session on the shared transport.
    /// The root (browser-level) session has no id and is represented as
    /// `Option<SessionId>::None` throughout the crate.
    SessionId
}

string_id! {
    /// Browsing context identifier (one navigable frame or tab).
    ContextId
}

string_id! {
    /// Navigation generation identifier (a loader id).
    ///
    /// Identifies the current document load within a context. A context has
    /// no navigation id until its first commit.
    NavigationId
}

string_id! {
    /// Script execution realm identifier.
    RealmId
}

string_id! {
    /// Outbound delivery channel name.
    ///
    /// Channels are client-chosen subscription streams, independent of
    /// browsing contexts. The default (unnamed) channel is represented as
    /// `Option<Channel>::None`.
    Channel
}

// ============================================================================
// CommandId
// ============================================================================

/// Outgoing CDP command identifier.
///
/// Assigned by the session multiplexer, unique and increasing per
/// connection. Used to correlate responses with pending requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Creates a command id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ExecutionContextId
// ============================================================================

/// Numeric execution context handle assigned by the upstream runtime.
///
/// Distinct from [`RealmId`]: the realm id is a globally unique string,
/// while this handle is a small integer scoped to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContextId(u32);

impl ExecutionContextId {
    /// Creates an execution context id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ExecutionContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_id_round_trip() {
        let id = ContextId::new("CTX-1");
        assert_eq!(id.as_str(), "CTX-1");
        assert_eq!(id.to_string(), "CTX-1");
        assert_eq!(id.clone().into_inner(), "CTX-1");
    }

    #[test]
    fn test_string_id_serde_transparent() {
        let id = SessionId::new("session-7");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"session-7\"");

        let back: SessionId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_command_id_serde_numeric() {
        let id = CommandId::new(42);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "42");

        let back: CommandId = serde_json::from_str("42").expect("deserialize");
        assert_eq!(back, id);
        assert_eq!(back.value(), 42);
    }

    #[test]
    fn test_execution_context_id() {
        let id = ExecutionContextId::new(3);
        assert_eq!(id.value(), 3);
        assert_eq!(id.to_string(), "3");
    }

    #[test]
    fn test_ids_are_distinct_types() {
        // Compile-time property: a ContextId cannot be compared to a RealmId.
        let context = ContextId::new("A");
        let realm = RealmId::new("A");
        assert_eq!(context.as_str(), realm.as_str());
    }
}
