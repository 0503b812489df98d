//! Browsing-context protocol values.
//!
//! Navigation readiness states, navigation results, and the bounded-depth
//! context info record returned to clients.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::identifiers::{ContextId, NavigationId};

// ============================================================================
// ReadinessState
// ============================================================================

/// How long a navigation call waits before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessState {
    /// Return as soon as the navigation request is issued.
    None,
    /// Wait until the document is interactive (DOM ready).
    Interactive,
    /// Wait until the document finished loading.
    Complete,
}

impl ReadinessState {
    /// Returns the wire name of this readiness state.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Interactive => "interactive",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadinessState {
    type Err = Error;

    /// Parses a readiness value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedReadiness`] for any value outside the
    /// defined enum — a contract error on the caller's side.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "interactive" => Ok(Self::Interactive),
            "complete" => Ok(Self::Complete),
            other => Err(Error::unsupported_readiness(other)),
        }
    }
}

// ============================================================================
// NavigateResult
// ============================================================================

/// Result of a navigation operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigateResult {
    /// The resulting navigation generation, or `None` for a purely
    /// same-document navigation.
    pub navigation: Option<NavigationId>,

    /// The requested URL.
    pub url: String,
}

// ============================================================================
// BrowsingContextInfo
// ============================================================================

/// Bounded-depth serialization of a browsing context.
///
/// Depth 0 omits children (`children` is `null` on the wire); each
/// recursive level omits its own `parent` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowsingContextInfo {
    /// The context id.
    pub context: ContextId,

    /// Current URL.
    pub url: String,

    /// Child infos, or `None` when the requested depth is exhausted.
    pub children: Option<Vec<BrowsingContextInfo>>,

    /// Parent id; present only at the top serialized level.
    ///
    /// `None` = field omitted, `Some(None)` = explicit `null` (root
    /// context), `Some(Some(id))` = parent id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Option<ContextId>>,
}

// ============================================================================
// Tests
// ============================================================================
