//! CDP connection and event loop.
//!
//! This module owns the single transport to the browser, including
//! request/response correlation and per-session event routing.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming messages from the browser (responses, events)
//! - Outgoing commands from the bridge
//! - Request/response correlation by command id
//! - Session attach/detach bookkeeping
//!
//! The peer is authoritative: responses for unknown ids and events for
//! unknown sessions are dropped without failing the connection.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, to_string};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SessionId};
use crate::protocol::message::{CdpIncomingMessage, CdpRequest};

use super::session::{CdpEventHandler, SessionRecord};
use super::transport::Transport;

// ============================================================================
// Constants
// ============================================================================

/// Inbound event announcing a newly attached session.
const ATTACHED_TO_TARGET: &str = "Target.attachedToTarget";

/// Inbound event announcing a detached session.
const DETACHED_FROM_TARGET: &str = "Target.detachedFromTarget";

// ============================================================================
// Types
// ============================================================================

/// Map of command ids to response channels.
type CorrelationMap = FxHashMap<CommandId, oneshot::Sender<Result<Value>>>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and register its pending-completion record.
    Send {
        request: CdpRequest,
        response_tx: oneshot::Sender<Result<Value>>,
    },
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// ConnectionState
// ============================================================================

/// State shared between the handles and the event loop.
struct ConnectionState {
    /// Pending-completion records, keyed by command id.
    correlation: Mutex<CorrelationMap>,
    /// Attached sessions, keyed by session id.
    sessions: Mutex<FxHashMap<SessionId, Arc<SessionRecord>>>,
    /// The root (browser-level) session.
    root_session: Arc<SessionRecord>,
    /// Next outgoing command id.
    next_id: AtomicU64,
}

// ============================================================================
// CdpConnection
// ============================================================================

/// Connection to the browser over a single duplex transport.
///
/// Handles request/response correlation and session demultiplexing. The
/// connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `CdpConnection` is cheaply cloneable and can be shared across tasks.
pub struct CdpConnection {
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    state: Arc<ConnectionState>,
}

impl Clone for CdpConnection {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl std::fmt::Debug for CdpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpConnection")
            .field("pending", &self.state.correlation.lock().len())
            .field("sessions", &self.state.sessions.lock().len())
            .finish()
    }
}

impl CdpConnection {
    /// Creates a new connection over the given transport.
    ///
    /// Spawns the event loop task internally.
    #[must_use]
    pub fn new<T: Transport>(transport: T) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ConnectionState {
            correlation: Mutex::new(CorrelationMap::default()),
            sessions: Mutex::new(FxHashMap::default()),
            root_session: Arc::new(SessionRecord::new(None)),
            next_id: AtomicU64::new(0),
        });

        tokio::spawn(Self::run_event_loop(
            transport,
            command_rx,
            Arc::clone(&state),
        ));

        Self { command_tx, state }
    }

    /// Returns a client bound to the root (browser-level) session.
    #[must_use]
    pub fn browser_client(&self) -> CdpClient {
        CdpClient {
            connection: self.clone(),
            session_id: None,
            record: Arc::clone(&self.state.root_session),
        }
    }

    /// Returns a client bound to an attached session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSession`] if no session record exists for
    /// the given id.
    pub fn session_client(&self, session_id: &SessionId) -> Result<CdpClient> {
        let record = self
            .state
            .sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::unknown_session(session_id.clone()))?;

        Ok(CdpClient {
            connection: self.clone(),
            session_id: Some(session_id.clone()),
            record,
        })
    }

    /// Returns `true` if a session record exists for the given id.
    #[inline]
    #[must_use]
    pub fn has_session(&self, session_id: &SessionId) -> bool {
        self.state.sessions.lock().contains_key(session_id)
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.correlation.lock().len()
    }

    /// Shuts down the connection.
    ///
    /// Every outstanding request is rejected with
    /// [`Error::Disconnected`] and all session state is cleared.
    pub fn close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles transport I/O.
    async fn run_event_loop<T: Transport>(
        mut transport: T,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        state: Arc<ConnectionState>,
    ) {
        loop {
            tokio::select! {
                // Incoming messages from the browser
                message = transport.receive() => {
                    match message {
                        Some(text) => Self::handle_incoming_message(&text, &state),
                        None => {
                            debug!("Transport closed by remote");
                            break;
                        }
                    }
                }

                // Commands from the bridge
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut transport,
                                &state,
                            ).await;
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Reject all pending requests and forget every session.
        Self::fail_pending_requests(&state);
        state.sessions.lock().clear();

        debug!("Event loop terminated");
    }

    /// Handles an incoming text message from the browser.
    fn handle_incoming_message(text: &str, state: &Arc<ConnectionState>) {
        let message: CdpIncomingMessage = match from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse incoming message");
                return;
            }
        };

        trace!(
            id = ?message.id,
            method = message.method.as_deref(),
            session = ?message.session_id,
            "received"
        );

        // Update the session map first if a session attached or detached.
        match message.method.as_deref() {
            Some(ATTACHED_TO_TARGET) => {
                if let Some(session_id) = Self::event_session_id(&message) {
                    debug!(session = %session_id, "Session attached");
                    state.sessions.lock().insert(
                        session_id.clone(),
                        Arc::new(SessionRecord::new(Some(session_id))),
                    );
                }
            }
            Some(DETACHED_FROM_TARGET) => {
                if let Some(session_id) = Self::event_session_id(&message) {
                    debug!(session = %session_id, "Session detached");
                    state.sessions.lock().remove(&session_id);
                }
            }
            _ => {}
        }

        if let Some(id) = message.id {
            // Command response: resolve or reject the pending record.
            let pending = state.correlation.lock().remove(&id);

            match pending {
                Some(tx) => {
                    let reply = match message.error {
                        Some(error) => Err(Error::command_failed(error.code, error.message)),
                        None => Ok(message.result.unwrap_or(Value::Null)),
                    };
                    let _ = tx.send(reply);
                }
                // Duplicate or late response; the peer is authoritative.
                None => trace!(id = %id, "Response for unknown request"),
            }
        } else if let Some(method) = message.method.as_deref() {
            // Unsolicited event: route to the session's handler set,
            // falling back to the root session.
            let record = match &message.session_id {
                Some(session_id) => state.sessions.lock().get(session_id).cloned(),
                None => Some(Arc::clone(&state.root_session)),
            };

            match record {
                Some(record) => record.dispatch(method, &message.params_or_default()),
                None => debug!(
                    method,
                    session = ?message.session_id,
                    "Event for unknown session"
                ),
            }
        }
    }

    /// Extracts `params.sessionId` from an attach/detach notification.
    fn event_session_id(message: &CdpIncomingMessage) -> Option<SessionId> {
        message
            .params
            .as_ref()
            .and_then(|params| params.get("sessionId"))
            .and_then(|value| value.as_str())
            .map(SessionId::new)
    }

    /// Handles a send command from the bridge.
    async fn handle_send_command<T: Transport>(
        request: CdpRequest,
        response_tx: oneshot::Sender<Result<Value>>,
        transport: &mut T,
        state: &Arc<ConnectionState>,
    ) {
        let id = request.id;

        let json = match to_string(&request) {
            Ok(json) => json,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Register the pending record before the frame is written.
        state.correlation.lock().insert(id, response_tx);

        if let Err(e) = transport.send(json).await {
            // Reject immediately; the record never had a chance.
            if let Some(tx) = state.correlation.lock().remove(&id) {
                let _ = tx.send(Err(e));
            }
            return;
        }

        trace!(id = %id, method = %request.method, "Request sent");
    }

    /// Rejects all pending requests with a disconnect error.
    fn fail_pending_requests(state: &Arc<ConnectionState>) {
        let pending: Vec<_> = state.correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::Disconnected));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// CdpClient
// ============================================================================

/// A command/event handle bound to one session.
///
/// Obtained from [`CdpConnection::browser_client`] or
/// [`CdpConnection::session_client`]. Cloning is cheap; clones share the
/// underlying session record.
#[derive(Clone)]
pub struct CdpClient {
    connection: CdpConnection,
    session_id: Option<SessionId>,
    record: Arc<SessionRecord>,
}

impl std::fmt::Debug for CdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpClient")
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl CdpClient {
    /// Returns the bound session id (`None` = root session).
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Sends a command on this client's session and awaits the response.
    ///
    /// # Errors
    ///
    /// - [`Error::Disconnected`] if the transport closed before a response
    /// - [`Error::CommandFailed`] if the peer answered with an error payload
    pub async fn send_command(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = CommandId::new(self.connection.state.next_id.fetch_add(1, Ordering::Relaxed));
        let request = CdpRequest::new(id, method, params, self.session_id.clone());

        let (response_tx, response_rx) = oneshot::channel();

        self.connection
            .command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::Disconnected)?;

        response_rx.await?
    }

    /// Registers an event handler for the given method on this session.
    ///
    /// Handlers are invoked synchronously, in registration order, from the
    /// connection's event loop.
    pub fn on(&self, method: impl Into<String>, handler: impl Fn(&Value) + Send + Sync + 'static) {
        let handler: CdpEventHandler = Arc::new(handler);
        self.record.register(method.into(), handler);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use crate::cdp::transport::ChannelTransport;

    /// Reads the next request the connection put on the wire.
    async fn next_request(peer: &mut ChannelTransport) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(1), peer.receive())
            .await
            .expect("request within timeout")
            .expect("transport open");
        serde_json::from_str(&text).expect("valid request json")
    }

    /// Polls until a session record exists (events race the assertion).
    async fn wait_for_session(connection: &CdpConnection, session_id: &SessionId) {
        for _ in 0..100 {
            if connection.has_session(session_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("session {session_id} never attached");
    }

    fn attach_event(session_id: &str) -> String {
        json!({
            "method": "Target.attachedToTarget",
            "params": {
                "sessionId": session_id,
                "targetInfo": {"targetId": "T1", "type": "page"},
                "waitingForDebugger": true
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_send_command_correlates_response() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let client = connection.browser_client();

        let task = tokio::spawn(async move {
            client
                .send_command("Target.getTargets", None)
                .await
        });

        let request = next_request(&mut peer).await;
        assert_eq!(request["method"], "Target.getTargets");

        let id = request["id"].as_u64().expect("numeric id");
        peer.send(json!({"id": id, "result": {"targetInfos": []}}).to_string())
            .await
            .expect("send response");

        let result = task.await.expect("join").expect("command ok");
        assert_eq!(result["targetInfos"], json!([]));
    }

    #[tokio::test]
    async fn test_error_response_rejects_pending_record() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let client = connection.browser_client();

        let task = tokio::spawn(async move {
            client.send_command("Page.navigate", Some(json!({"url": "x"}))).await
        });

        let request = next_request(&mut peer).await;
        let id = request["id"].as_u64().expect("numeric id");
        peer.send(
            json!({"id": id, "error": {"code": -32000, "message": "Not allowed"}}).to_string(),
        )
        .await
        .expect("send response");

        let err = task.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::CommandFailed { code: -32000, .. }));
    }

    #[tokio::test]
    async fn test_command_ids_are_unique_and_increasing() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let client = connection.browser_client();

        let c1 = client.clone();
        let t1 = tokio::spawn(async move { c1.send_command("Runtime.enable", None).await });
        let first = next_request(&mut peer).await;
        let c2 = client.clone();
        let t2 = tokio::spawn(async move { c2.send_command("Page.enable", None).await });
        let second = next_request(&mut peer).await;

        assert!(second["id"].as_u64() > first["id"].as_u64());

        for request in [first, second] {
            let id = request["id"].as_u64().expect("id");
            peer.send(json!({"id": id, "result": {}}).to_string())
                .await
                .expect("respond");
        }
        t1.await.expect("join").expect("ok");
        t2.await.expect("join").expect("ok");
    }

    #[tokio::test]
    async fn test_unmatched_response_is_dropped_silently() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let client = connection.browser_client();

        // A response nobody asked for must not break the connection.
        peer.send(json!({"id": 9999, "result": {}}).to_string())
            .await
            .expect("send stray response");

        let task = tokio::spawn(async move { client.send_command("Browser.getVersion", None).await });
        let request = next_request(&mut peer).await;
        let id = request["id"].as_u64().expect("id");
        peer.send(json!({"id": id, "result": {"product": "test"}}).to_string())
            .await
            .expect("respond");

        let result = task.await.expect("join").expect("still works");
        assert_eq!(result["product"], "test");
    }

    #[tokio::test]
    async fn test_events_route_to_root_session_without_session_id() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let client = connection.browser_client();

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        client.on("Target.targetCreated", move |params| {
            let _ = seen_tx.send(params.clone());
        });

        peer.send(
            json!({"method": "Target.targetCreated", "params": {"targetInfo": {"targetId": "T9"}}})
                .to_string(),
        )
        .await
        .expect("send event");

        let params = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .expect("event within timeout")
            .expect("params");
        assert_eq!(params["targetInfo"]["targetId"], "T9");
    }

    #[tokio::test]
    async fn test_attach_creates_session_and_routes_by_session_id() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let session_id = SessionId::new("S1");

        peer.send(attach_event("S1")).await.expect("send attach");
        wait_for_session(&connection, &session_id).await;

        let client = connection.session_client(&session_id).expect("session client");
        assert_eq!(client.session_id(), Some(&session_id));

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        client.on("Page.lifecycleEvent", move |params| {
            let _ = seen_tx.send(params["name"].as_str().unwrap_or_default().to_string());
        });

        peer.send(
            json!({
                "method": "Page.lifecycleEvent",
                "params": {"name": "load", "frameId": "F1", "loaderId": "L1"},
                "sessionId": "S1"
            })
            .to_string(),
        )
        .await
        .expect("send event");

        let name = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .expect("event within timeout")
            .expect("name");
        assert_eq!(name, "load");
    }

    #[tokio::test]
    async fn test_detach_destroys_session_record() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let session_id = SessionId::new("S1");

        peer.send(attach_event("S1")).await.expect("send attach");
        wait_for_session(&connection, &session_id).await;

        peer.send(
            json!({
                "method": "Target.detachedFromTarget",
                "params": {"sessionId": "S1"}
            })
            .to_string(),
        )
        .await
        .expect("send detach");

        for _ in 0..100 {
            if !connection.has_session(&session_id) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let err = connection.session_client(&session_id).unwrap_err();
        assert!(matches!(err, Error::UnknownSession { .. }));
    }

    #[tokio::test]
    async fn test_event_for_unknown_session_is_dropped() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let client = connection.browser_client();

        peer.send(
            json!({
                "method": "Page.lifecycleEvent",
                "params": {"name": "load"},
                "sessionId": "GHOST"
            })
            .to_string(),
        )
        .await
        .expect("send event");

        // Connection still functional afterwards.
        let task = tokio::spawn(async move { client.send_command("Browser.getVersion", None).await });
        let request = next_request(&mut peer).await;
        let id = request["id"].as_u64().expect("id");
        peer.send(json!({"id": id, "result": {}}).to_string())
            .await
            .expect("respond");
        task.await.expect("join").expect("ok");
    }

    #[tokio::test]
    async fn test_close_rejects_outstanding_requests() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let client = connection.browser_client();

        let task = tokio::spawn(async move { client.send_command("Page.navigate", None).await });

        // Wait for the request to be registered, then close without replying.
        let _ = next_request(&mut peer).await;
        connection.close();

        let err = task.await.expect("join").unwrap_err();
        assert!(err.is_disconnected());
    }

    #[tokio::test]
    async fn test_transport_close_rejects_outstanding_requests() {
        let (transport, mut peer) = ChannelTransport::pair();
        let connection = CdpConnection::new(transport);
        let client = connection.browser_client();

        let task = tokio::spawn(async move { client.send_command("Page.navigate", None).await });
        let _ = next_request(&mut peer).await;

        drop(peer);

        let err = task.await.expect("join").unwrap_err();
        assert!(err.is_disconnected());
        assert_eq!(connection.pending_count(), 0);
    }
}
