//! Per-context state machine.
//!
//! Each browsing context tracks its navigation generation, readiness gates,
//! children and owned realms, driven by upstream events from its bound
//! session. Two creation modes exist:
//!
//! - **frame context**: a same-process iframe, immediately unblocked.
//! - **target context**: an out-of-process target requiring an unblock
//!   handshake (enable runtime and page domains, lifecycle events,
//!   auto-attach, then resume). Creation announces `contextCreated`
//!   before the handshake completes, so subscribers learn of the context
//!   before it is interactive.
//!
//! # Gates
//!
//! Readiness is modeled as gates: `target-unblocked` plus a per-document
//! bundle {document-initialized, same-document-navigated, DOM-ready,
//! load-complete}. A document change supersedes the pending document gates
//! and installs a fresh bundle under a bumped generation counter, so code
//! resuming from an await can re-read the current gates instead of
//! trusting a stale capture.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::cdp::connection::CdpClient;
use crate::context::realm::{Realm, RealmFilter, RealmKind, RealmStorage, UNKNOWN_NAVIGABLE};
use crate::context::tree::ContextTree;
use crate::error::{Error, Result};
use crate::events::manager::EventManager;
use crate::identifiers::{ContextId, ExecutionContextId, NavigationId, RealmId, SessionId};
use crate::protocol::browsing_context::{BrowsingContextInfo, NavigateResult, ReadinessState};
use crate::protocol::event::{EventKind, EventMessage};
use crate::sync::gate::Gate;

// ============================================================================
// Constants
// ============================================================================

/// Initial URL of every context before its first navigation.
const ABOUT_BLANK: &str = "about:blank";

// ============================================================================
// DocumentGates
// ============================================================================

/// The document-phase gate bundle for one navigation generation.
#[derive(Debug, Clone)]
struct DocumentGates {
    /// Bumped on every replacement; lets resumed code detect staleness.
    generation: u64,
    document_initialized: Gate<()>,
    navigated_within_document: Gate<()>,
    dom_content_loaded: Gate<()>,
    load: Gate<()>,
}

impl DocumentGates {
    fn fresh(generation: u64) -> Self {
        Self {
            generation,
            document_initialized: Gate::new("document-initialized"),
            navigated_within_document: Gate::new("same-document-navigated"),
            dom_content_loaded: Gate::new("dom-content-loaded"),
            load: Gate::new("load-complete"),
        }
    }

    /// Supersedes whatever is still pending in this bundle.
    fn supersede_pending(&self) {
        self.document_initialized.supersede();
        self.navigated_within_document.supersede();
        self.dom_content_loaded.supersede();
        self.load.supersede();
    }
}

// ============================================================================
// ContextState
// ============================================================================

/// Mutable state of one context; every field may change across a document
/// change or session rebind.
struct ContextState {
    url: String,
    /// Current navigation generation; `None` until the first commit.
    navigation_id: Option<NavigationId>,
    children: FxHashSet<ContextId>,
    session_id: SessionId,
    client: CdpClient,
    /// Id of the context's default (sandbox-less) realm, if known.
    default_realm: Option<RealmId>,
    unblocked: Gate<()>,
    document: DocumentGates,
}

// ============================================================================
// BrowsingContext
// ============================================================================

/// One navigable frame or tab in the context tree.
pub struct BrowsingContext {
    context_id: ContextId,
    parent_id: Option<ContextId>,
    tree: Arc<ContextTree>,
    realms: Arc<RealmStorage>,
    events: Arc<EventManager>,
    /// Handle to self for listeners; a deleted context's handlers fail to
    /// upgrade and become no-ops.
    weak_self: Weak<BrowsingContext>,
    state: Mutex<ContextState>,
}

impl std::fmt::Debug for BrowsingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BrowsingContext")
            .field("context_id", &self.context_id)
            .field("parent_id", &self.parent_id)
            .field("url", &state.url)
            .field("navigation_id", &state.navigation_id)
            .field("children", &state.children.len())
            .finish()
    }
}

impl BrowsingContext {
    // ========================================================================
    // Creation
    // ========================================================================

    fn new(
        context_id: ContextId,
        parent_id: Option<ContextId>,
        client: CdpClient,
        session_id: SessionId,
        tree: Arc<ContextTree>,
        realms: Arc<RealmStorage>,
        events: Arc<EventManager>,
    ) -> Arc<Self> {
        let context = Arc::new_cyclic(|weak_self| Self {
            context_id: context_id.clone(),
            parent_id,
            tree: Arc::clone(&tree),
            realms,
            events,
            weak_self: weak_self.clone(),
            state: Mutex::new(ContextState {
                url: ABOUT_BLANK.to_string(),
                navigation_id: None,
                children: FxHashSet::default(),
                session_id,
                client: client.clone(),
                default_realm: None,
                unblocked: Gate::new("target-unblocked"),
                document: DocumentGates::fresh(0),
            }),
        });

        context.init_listeners(&client);
        tree.add_context(Arc::clone(&context));

        if let Some(parent_id) = &context.parent_id {
            match tree.find_context(parent_id) {
                Some(parent) => parent.add_child(context_id),
                None => warn!(
                    context = %context.context_id,
                    parent = %parent_id,
                    "Parent context not in tree"
                ),
            }
        }

        context
    }

    /// Creates a same-process iframe context.
    ///
    /// Frame contexts share their parent's target and need no handshake;
    /// they are unblocked immediately.
    pub fn create_frame_context(
        context_id: ContextId,
        parent_id: Option<ContextId>,
        client: CdpClient,
        session_id: SessionId,
        tree: Arc<ContextTree>,
        realms: Arc<RealmStorage>,
        events: Arc<EventManager>,
    ) -> Arc<Self> {
        let context = Self::new(
            context_id, parent_id, client, session_id, tree, realms, events,
        );

        let unblocked = context.state.lock().unblocked.clone();
        unblocked.resolve(());

        context.announce(EventKind::ContextCreated);
        context
    }

    /// Creates an out-of-process target context.
    ///
    /// The unblock handshake runs concurrently; `contextCreated` is
    /// announced before it completes.
    pub fn create_target_context(
        context_id: ContextId,
        parent_id: Option<ContextId>,
        client: CdpClient,
        session_id: SessionId,
        tree: Arc<ContextTree>,
        realms: Arc<RealmStorage>,
        events: Arc<EventManager>,
    ) -> Arc<Self> {
        let context = Self::new(
            context_id, parent_id, client, session_id, tree, realms, events,
        );

        tokio::spawn(Self::unblock_attached_target(Arc::clone(&context)));

        context.announce(EventKind::ContextCreated);
        context
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the context id.
    #[inline]
    #[must_use]
    pub fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    /// Returns the parent id, if any.
    #[inline]
    #[must_use]
    pub fn parent_id(&self) -> Option<&ContextId> {
        self.parent_id.as_ref()
    }

    /// Returns the current URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    /// Returns the current navigation generation, or `None` before the
    /// first commit.
    #[must_use]
    pub fn navigation_id(&self) -> Option<NavigationId> {
        self.state.lock().navigation_id.clone()
    }

    /// Returns the bound session id.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.state.lock().session_id.clone()
    }

    /// Returns the ids of this context's children.
    #[must_use]
    pub fn children(&self) -> Vec<ContextId> {
        self.state.lock().children.iter().cloned().collect()
    }

    pub(crate) fn add_child(&self, child_id: ContextId) {
        self.state.lock().children.insert(child_id);
    }

    pub(crate) fn remove_child(&self, child_id: &ContextId) {
        self.state.lock().children.remove(child_id);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Deletes this context and its whole subtree.
    ///
    /// Order matters so observers never see a dangling reference: children
    /// first, then owned realms, then the parent's child set, then the
    /// destruction announcement, then the tree index.
    pub fn delete(&self) {
        debug!(context = %self.context_id, "Deleting context");

        self.remove_child_contexts();
        self.clear_owned_realms();

        if let Some(parent_id) = &self.parent_id
            && let Some(parent) = self.tree.find_context(parent_id)
        {
            parent.remove_child(&self.context_id);
        }

        self.announce(EventKind::ContextDestroyed);
        self.tree.remove_context(&self.context_id);
    }

    /// Deletes every current child context.
    fn remove_child_contexts(&self) {
        let children = self.children();
        for child_id in children {
            if let Some(child) = self.tree.find_context(&child_id) {
                child.delete();
            }
        }
    }

    /// Drops every realm owned by this context, clearing the default slot
    /// if it went with them.
    fn clear_owned_realms(&self) {
        let removed = self
            .realms
            .delete_realms(&RealmFilter::new().context(self.context_id.clone()));
        self.forget_removed_default(&removed);
    }

    fn forget_removed_default(&self, removed: &[Realm]) {
        if removed.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        if let Some(default_realm) = &state.default_realm
            && removed.iter().any(|realm| &realm.realm_id == default_realm)
        {
            state.default_realm = None;
        }
    }

    /// Rebinds a frame context onto its own freshly-attached target.
    ///
    /// A rare, second-class transition: the frame moved out of process, so
    /// the context gets the new session's client, fresh listeners, a reset
    /// unblocked gate and a new unblock handshake.
    pub fn convert_frame_to_target(&self, client: CdpClient, session_id: SessionId) {
        debug!(
            context = %self.context_id,
            session = %session_id,
            "Converting frame to target context"
        );

        {
            let mut state = self.state.lock();
            state.unblocked.supersede();
            state.unblocked = Gate::new("target-unblocked");
            state.client = client.clone();
            state.session_id = session_id;
        }

        self.init_listeners(&client);
        if let Some(this) = self.weak_self.upgrade() {
            tokio::spawn(Self::unblock_attached_target(this));
        }
    }

    /// Runs the unblock handshake and resolves the unblocked gate.
    async fn unblock_attached_target(self: Arc<Self>) {
        let (client, unblocked) = {
            let state = self.state.lock();
            (state.client.clone(), state.unblocked.clone())
        };

        match Self::run_unblock_sequence(&client).await {
            Ok(()) => unblocked.resolve(()),
            // The gate stays pending; a failed handshake means the session
            // is gone and everything waiting on it is abandoned with it.
            Err(e) => warn!(
                context = %self.context_id,
                error = %e,
                "Target unblock sequence failed"
            ),
        }
    }

    async fn run_unblock_sequence(client: &CdpClient) -> Result<()> {
        client.send_command("Runtime.enable", None).await?;
        client.send_command("Page.enable", None).await?;
        client
            .send_command(
                "Page.setLifecycleEventsEnabled",
                Some(json!({"enabled": true})),
            )
            .await?;
        client
            .send_command(
                "Target.setAutoAttach",
                Some(json!({
                    "autoAttach": true,
                    "waitForDebuggerOnStart": true,
                    "flatten": true
                })),
            )
            .await?;
        client
            .send_command("Runtime.runIfWaitingForDebugger", None)
            .await?;
        Ok(())
    }

    /// Suspends until the target-unblocked gate resolves.
    ///
    /// A session rebind supersedes and replaces the gate; the wait re-reads
    /// the current gate and keeps waiting on the replacement.
    pub async fn await_unblocked(&self) {
        loop {
            let unblocked = self.state.lock().unblocked.clone();
            if unblocked.wait().await.is_resolved() {
                return;
            }
        }
    }

    /// Suspends until the current document finished loading.
    ///
    /// Returns `false` if the awaited document was superseded first.
    pub async fn await_loaded(&self) -> bool {
        let load = self.state.lock().document.load.clone();
        load.wait().await.is_resolved()
    }

    // ========================================================================
    // Document change
    // ========================================================================

    /// Replaces the document gate bundle for a genuinely new generation.
    ///
    /// Exactly-once per new generation id and idempotent on repeats: a
    /// matching id returns without touching the gates. Pending gates of the
    /// old document are superseded, never left dangling.
    fn document_changed(&self, navigation_id: NavigationId) {
        let mut state = self.state.lock();
        if state.navigation_id.as_ref() == Some(&navigation_id) {
            return;
        }

        debug!(
            context = %self.context_id,
            navigation = %navigation_id,
            "Document changed"
        );

        state.document.supersede_pending();
        let generation = state.document.generation + 1;
        state.document = DocumentGates::fresh(generation);
        state.navigation_id = Some(navigation_id);
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigates this context to `url`, waiting per the readiness state.
    ///
    /// # Errors
    ///
    /// - [`Error::NavigationFailed`] if the upstream reported an error text
    /// - [`Error::Disconnected`] / [`Error::CommandFailed`] from the
    ///   underlying command
    pub async fn navigate(&self, url: &str, wait: ReadinessState) -> Result<NavigateResult> {
        debug!(context = %self.context_id, url, wait = %wait, "Navigating");

        self.await_unblocked().await;

        let client = self.state.lock().client.clone();
        let result = client
            .send_command(
                "Page.navigate",
                Some(json!({
                    "url": url,
                    "frameId": self.context_id.as_str(),
                })),
            )
            .await?;

        if let Some(error_text) = result
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
        {
            return Err(Error::navigation_failed(error_text));
        }

        // No loader id means a same-document navigation.
        let navigation_id = result
            .get("loaderId")
            .and_then(Value::as_str)
            .map(NavigationId::new);

        if let Some(navigation_id) = &navigation_id {
            let is_new = self.state.lock().navigation_id.as_ref() != Some(navigation_id);
            if is_new {
                self.document_changed(navigation_id.clone());
            }
        }

        // Re-read the gates after the command await; a concurrent document
        // change may have replaced the bundle captured before it.
        let gate = {
            let state = self.state.lock();
            match (wait, &navigation_id) {
                (ReadinessState::None, _) => None,
                (_, None) => Some(state.document.navigated_within_document.clone()),
                (ReadinessState::Interactive, Some(_)) => {
                    Some(state.document.dom_content_loaded.clone())
                }
                (ReadinessState::Complete, Some(_)) => Some(state.document.load.clone()),
            }
        };

        if let Some(gate) = gate
            && gate.wait().await.is_superseded()
        {
            debug!(
                context = %self.context_id,
                url,
                "Readiness gate superseded by a newer document"
            );
        }

        Ok(NavigateResult {
            navigation: navigation_id,
            url: url.to_string(),
        })
    }

    // ========================================================================
    // Sandboxes
    // ========================================================================

    /// Resolves a sandbox name to a realm, creating the isolated world on
    /// demand.
    ///
    /// An empty or absent name resolves to the context's default realm.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingDefaultRealm`] if the default realm is requested
    ///   before it exists
    /// - [`Error::SandboxCreationFailed`] if the post-creation lookup does
    ///   not yield exactly one realm
    pub async fn get_or_create_sandbox(&self, sandbox: Option<&str>) -> Result<Realm> {
        let Some(sandbox) = sandbox.filter(|name| !name.is_empty()) else {
            return self.default_realm();
        };

        let filter = RealmFilter::new()
            .context(self.context_id.clone())
            .sandbox(sandbox);

        let mut realms = self.realms.find_realms(&filter);

        if realms.is_empty() {
            let client = self.state.lock().client.clone();
            client
                .send_command(
                    "Page.createIsolatedWorld",
                    Some(json!({
                        "frameId": self.context_id.as_str(),
                        "worldName": sandbox,
                    })),
                )
                .await?;
            // The realm-created notification arrives on the same ordered
            // stream as the command response, so the registry is current.
            realms = self.realms.find_realms(&filter);
        }

        if realms.len() != 1 {
            return Err(Error::sandbox_creation_failed(sandbox, realms.len()));
        }
        Ok(realms.remove(0))
    }

    /// Returns the context's default realm.
    fn default_realm(&self) -> Result<Realm> {
        let default_realm = self.state.lock().default_realm.clone();
        default_realm
            .and_then(|realm_id| self.realms.get_realm(&realm_id))
            .ok_or_else(|| Error::missing_default_realm(self.context_id.clone()))
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Serializes this context to a bounded-depth info record.
    ///
    /// Depth 0 omits children; nested levels omit their own parent field.
    #[must_use]
    pub fn serialize_to_info(&self, max_depth: u32) -> BrowsingContextInfo {
        self.serialize_inner(max_depth, true)
    }

    fn serialize_inner(&self, max_depth: u32, add_parent: bool) -> BrowsingContextInfo {
        let (url, children_ids) = {
            let state = self.state.lock();
            (
                state.url.clone(),
                state.children.iter().cloned().collect::<Vec<_>>(),
            )
        };

        let children = (max_depth > 0).then(|| {
            children_ids
                .iter()
                .filter_map(|child_id| self.tree.find_context(child_id))
                .map(|child| child.serialize_inner(max_depth - 1, false))
                .collect()
        });

        BrowsingContextInfo {
            context: self.context_id.clone(),
            url,
            children,
            parent: add_parent.then(|| self.parent_id.clone()),
        }
    }

    /// Registers a context lifecycle announcement with the event manager.
    fn announce(&self, kind: EventKind) {
        let info = self.serialize_to_info(0);
        let params = serde_json::to_value(&info).unwrap_or(Value::Null);
        self.events
            .register_event(EventMessage::new(kind, params), Some(&self.context_id));
    }

    // ========================================================================
    // Upstream listeners
    // ========================================================================

    /// Installs this context's handlers on the given client's session.
    ///
    /// Called at construction and again after a session rebind. Handlers
    /// hold only a weak handle, so a deleted context's handlers turn into
    /// no-ops instead of keeping the context alive.
    fn init_listeners(&self, client: &CdpClient) {
        self.listen_target_info_changed(client);
        self.listen_frame_navigated(client);
        self.listen_navigated_within_document(client);
        self.listen_lifecycle_events(client);
        self.listen_execution_context_created(client);
        self.listen_execution_context_destroyed(client);
    }

    fn listen_target_info_changed(&self, client: &CdpClient) {
        let weak = self.weak_self.clone();
        client.on("Target.targetInfoChanged", move |params| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            let Some(info) = params.get("targetInfo") else {
                return;
            };
            if info.get("targetId").and_then(Value::as_str) != Some(this.context_id.as_str()) {
                return;
            }
            if let Some(url) = info.get("url").and_then(Value::as_str) {
                this.state.lock().url = url.to_string();
            }
        });
    }

    fn listen_frame_navigated(&self, client: &CdpClient) {
        let weak = self.weak_self.clone();
        client.on("Page.frameNavigated", move |params| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            let Some(frame) = params.get("frame") else {
                return;
            };
            if frame.get("id").and_then(Value::as_str) != Some(this.context_id.as_str()) {
                return;
            }

            let url = frame.get("url").and_then(Value::as_str).unwrap_or_default();
            let fragment = frame
                .get("urlFragment")
                .and_then(Value::as_str)
                .unwrap_or_default();
            this.state.lock().url = format!("{url}{fragment}");

            // A full-document navigation detaches the old document's
            // iframes upstream; mirror that here.
            this.remove_child_contexts();
            this.clear_owned_realms();
        });
    }

    fn listen_navigated_within_document(&self, client: &CdpClient) {
        let weak = self.weak_self.clone();
        client.on("Page.navigatedWithinDocument", move |params| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            if params.get("frameId").and_then(Value::as_str) != Some(this.context_id.as_str()) {
                return;
            }

            let url = params
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let gate = {
                let mut state = this.state.lock();
                state.url = url;
                state.document.navigated_within_document.clone()
            };
            gate.resolve(());
        });
    }

    fn listen_lifecycle_events(&self, client: &CdpClient) {
        let weak = self.weak_self.clone();
        client.on("Page.lifecycleEvent", move |params| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            if params.get("frameId").and_then(Value::as_str) != Some(this.context_id.as_str()) {
                return;
            }
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return;
            };
            let Some(loader_id) = params.get("loaderId").and_then(Value::as_str) else {
                return;
            };
            let navigation_id = NavigationId::new(loader_id);

            match name {
                "init" => {
                    this.document_changed(navigation_id);
                    let gate = this.state.lock().document.document_initialized.clone();
                    gate.resolve(());
                }
                "commit" => {
                    this.state.lock().navigation_id = Some(navigation_id);
                }
                phase => {
                    // Phases of a stale generation are ignored.
                    let (gate, url) = {
                        let state = this.state.lock();
                        if state.navigation_id.as_ref() != Some(&navigation_id) {
                            return;
                        }
                        let gate = match phase {
                            "DOMContentLoaded" => state.document.dom_content_loaded.clone(),
                            "load" => state.document.load.clone(),
                            _ => return,
                        };
                        (gate, state.url.clone())
                    };

                    gate.resolve(());

                    let kind = if phase == "load" {
                        EventKind::Load
                    } else {
                        EventKind::DomContentLoaded
                    };
                    this.events.register_event(
                        EventMessage::new(
                            kind,
                            json!({
                                "context": this.context_id.as_str(),
                                "navigation": navigation_id.as_str(),
                                "url": url,
                            }),
                        ),
                        Some(&this.context_id),
                    );
                }
            }
        });
    }

    fn listen_execution_context_created(&self, client: &CdpClient) {
        let weak = self.weak_self.clone();
        client.on("Runtime.executionContextCreated", move |params| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            let Some(description) = params.get("context") else {
                return;
            };
            let aux = description.get("auxData").cloned().unwrap_or(Value::Null);
            if aux.get("frameId").and_then(Value::as_str) != Some(this.context_id.as_str()) {
                return;
            }

            let context_type = aux.get("type").and_then(Value::as_str).unwrap_or_default();
            if context_type != "default" && context_type != "isolated" {
                return;
            }
            let is_sandbox = context_type == "isolated";

            let Some(realm_id) = description
                .get("uniqueId")
                .and_then(Value::as_str)
                .map(RealmId::new)
            else {
                return;
            };
            let Some(execution_context_id) = description
                .get("id")
                .and_then(Value::as_u64)
                .map(|id| ExecutionContextId::new(id as u32))
            else {
                return;
            };

            let upstream_origin = description
                .get("origin")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let origin = this.resolve_origin(upstream_origin, is_sandbox);

            let sandbox = is_sandbox.then(|| {
                description
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            });

            let (navigable_id, session_id) = {
                let state = this.state.lock();
                (
                    state
                        .navigation_id
                        .clone()
                        .map(NavigationId::into_inner)
                        .unwrap_or_else(|| UNKNOWN_NAVIGABLE.to_string()),
                    state.session_id.clone(),
                )
            };

            this.realms.add_realm(Realm {
                realm_id: realm_id.clone(),
                context_id: this.context_id.clone(),
                navigable_id,
                session_id,
                execution_context_id,
                origin,
                kind: RealmKind::Window,
                sandbox,
            });

            // The default slot follows the upstream's word, not ours.
            if aux.get("isDefault").and_then(Value::as_bool).unwrap_or(false) {
                this.state.lock().default_realm = Some(realm_id);
            }
        });
    }

    fn listen_execution_context_destroyed(&self, client: &CdpClient) {
        let weak = self.weak_self.clone();
        client.on("Runtime.executionContextDestroyed", move |params| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            let Some(execution_context_id) =
                params.get("executionContextId").and_then(Value::as_u64)
            else {
                return;
            };

            let session_id = this.state.lock().session_id.clone();
            let removed = this.realms.delete_realms(
                &RealmFilter::new()
                    .session(session_id)
                    .execution_context(ExecutionContextId::new(execution_context_id as u32)),
            );
            this.forget_removed_default(&removed);
        });
    }

    /// Resolves a realm's origin from the upstream value.
    ///
    /// A sandbox shares its document's origin, but the upstream reports an
    /// opaque one; inherit from the default realm in that case. Otherwise
    /// the upstream value passes through, with the opaque serialization
    /// mapped to the literal `"null"`.
    fn resolve_origin(&self, upstream: &str, is_sandbox: bool) -> String {
        let degenerate = upstream.is_empty() || upstream == "://";

        if is_sandbox && degenerate {
            let default_realm = self.state.lock().default_realm.clone();
            if let Some(realm) =
                default_realm.and_then(|realm_id| self.realms.get_realm(&realm_id))
            {
                return realm.origin;
            }
            warn!(
                context = %self.context_id,
                "Sandbox realm created before the default realm"
            );
            return "null".to_string();
        }

        if degenerate {
            "null".to_string()
        } else {
            upstream.to_string()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
