//! CDP wire message types.
//!
//! Defines the message format exchanged with the browser over the shared
//! transport: outgoing command requests and the loosely-parsed incoming
//! message that may be a response or an unsolicited event.
//!
//! # Format
//!
//! Outgoing:
//! ```json
//! { "id": 12, "method": "Page.navigate", "params": { ... }, "sessionId": "..." }
//! ```
//!
//! Incoming response:
//! ```json
//! { "id": 12, "result": { ... }, "sessionId": "..." }
//! { "id": 12, "error": { "code": -32000, "message": "..." } }
//! ```
//!
//! Incoming event:
//! ```json
//! { "method": "Page.lifecycleEvent", "params": { ... }, "sessionId": "..." }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{CommandId, SessionId};

// ============================================================================
// CdpRequest
// ============================================================================

/// An outgoing CDP command request.
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Unique identifier for request/response correlation.
    pub id: CommandId,

    /// Command method in `Domain.method` format.
    pub method: String,

    /// Command parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Target session; absent for browser-level commands.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl CdpRequest {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(
        id: CommandId,
        method: impl Into<String>,
        params: Option<Value>,
        session_id: Option<SessionId>,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            session_id,
        }
    }
}

// ============================================================================
// CdpErrorPayload
// ============================================================================

/// Error payload carried by a failed CDP response.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorPayload {
    /// Upstream error code.
    #[serde(default)]
    pub code: i64,

    /// Upstream error text.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// CdpIncomingMessage
// ============================================================================

/// A loosely-parsed inbound CDP message.
///
/// The peer is authoritative: unknown fields are ignored, missing fields
/// default, and a message that fits neither classification is dropped by
/// the multiplexer rather than failing the connection.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpIncomingMessage {
    /// Response correlation id, if this is a response.
    pub id: Option<CommandId>,

    /// Event method, if this is an event.
    pub method: Option<String>,

    /// Event parameters.
    #[serde(default)]
    pub params: Option<Value>,

    /// Successful response payload.
    #[serde(default)]
    pub result: Option<Value>,

    /// Error response payload.
    #[serde(default)]
    pub error: Option<CdpErrorPayload>,

    /// Originating session; absent for browser-level traffic.
    #[serde(rename = "sessionId")]
    pub session_id: Option<SessionId>,
}

impl CdpIncomingMessage {
    /// Returns `true` if this message is a command response.
    #[inline]
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.id.is_some()
    }

    /// Returns `true` if this message is an unsolicited event.
    #[inline]
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }

    /// Takes the event parameters, defaulting to an empty object.
    #[inline]
    #[must_use]
    pub fn params_or_default(&self) -> Value {
        self.params.clone().unwrap_or_else(|| Value::Object(Default::default()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = CdpRequest::new(
            CommandId::new(5),
            "Page.navigate",
            Some(json!({"url": "https://example.com", "frameId": "F1"})),
            Some(SessionId::new("S1")),
        );

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["id"], 5);
        assert_eq!(value["method"], "Page.navigate");
        assert_eq!(value["params"]["url"], "https://example.com");
        assert_eq!(value["sessionId"], "S1");
    }

    #[test]
    fn test_request_omits_absent_fields() {
        let request = CdpRequest::new(CommandId::new(1), "Runtime.enable", None, None);
        let json = serde_json::to_string(&request).expect("serialize");
        assert!(!json.contains("params"));
        assert!(!json.contains("sessionId"));
    }

    #[test]
    fn test_incoming_response_classification() {
        let message: CdpIncomingMessage =
            serde_json::from_str(r#"{"id": 3, "result": {"loaderId": "L1"}}"#).expect("parse");
        assert!(message.is_response());
        assert!(!message.is_event());
        assert_eq!(message.result.expect("result")["loaderId"], "L1");
    }

    #[test]
    fn test_incoming_error_response() {
        let message: CdpIncomingMessage = serde_json::from_str(
            r#"{"id": 3, "error": {"code": -32000, "message": "No target"}}"#,
        )
        .expect("parse");
        assert!(message.is_response());
        let error = message.error.expect("error");
        assert_eq!(error.code, -32000);
        assert_eq!(error.message, "No target");
    }

    #[test]
    fn test_incoming_event_classification() {
        let message: CdpIncomingMessage = serde_json::from_str(
            r#"{"method": "Page.lifecycleEvent", "params": {"name": "load"}, "sessionId": "S1"}"#,
        )
        .expect("parse");
        assert!(message.is_event());
        assert!(!message.is_response());
        assert_eq!(message.session_id, Some(SessionId::new("S1")));
        assert_eq!(message.params_or_default()["name"], "load");
    }

    #[test]
    fn test_incoming_event_without_params_defaults_to_empty_object() {
        let message: CdpIncomingMessage =
            serde_json::from_str(r#"{"method": "Inspector.detached"}"#).expect("parse");
        assert!(message.is_event());
        assert_eq!(message.params_or_default(), json!({}));
    }
}
