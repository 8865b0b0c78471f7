//! The connection bridge: exposes a locally-hosted database engine to one
//! remote peer over a persistent WebSocket.
//!
//! For a given identifier the bridge obtains the engine instance from the
//! [`InstanceRegistry`], opens a socket to the endpoint derived from that
//! identifier, and relays raw protocol frames bidirectionally for the
//! lifetime of the socket. Protocol payloads are opaque: the bridge moves
//! bytes between the socket and the engine's raw-protocol entry point and
//! never inspects them.
//!
//! One connection is active at a time. Calling [`ConnectionBridge::connect`]
//! while a session is live closes the existing session first, then proceeds.
//! Connection status is published through a `tokio::sync::watch` channel so
//! external observers (the UI/state layer) see every transition without
//! holding a long-lived call into the bridge.

mod endpoint;
mod error;
mod relay;

pub use endpoint::EndpointResolver;
pub use error::BridgeError;

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use uuid::Uuid;
use viaduct_engine::InstanceRegistry;
use viaduct_types::{BridgeStatus, ConnectionState};

/// Capacity of the per-session shutdown channel. One pending shutdown is all
/// a session can ever act on.
const SHUTDOWN_CHANNEL_CAPACITY: usize = 1;

/// Status publication shared between the bridge and its relay tasks.
///
/// Transitions carry the session id that produced them; a transition from a
/// session that is no longer current is stale and discarded, so a replaced
/// relay's late close/error events can never clobber the status of the
/// session that replaced it.
pub(crate) struct StatusShared {
    status_tx: watch::Sender<BridgeStatus>,
    /// Sync lock for a brief id comparison only; never held across an await.
    current: Mutex<Option<Uuid>>,
}

impl StatusShared {
    fn new() -> Self {
        Self {
            status_tx: watch::channel(BridgeStatus::default()).0,
            current: Mutex::new(None),
        }
    }

    /// Makes `session_id` the current session and publishes `connecting`.
    fn begin(&self, session_id: Uuid, database_id: &str) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = Some(session_id);
        self.status_tx.send_modify(|status| {
            *status = BridgeStatus {
                state: ConnectionState::Connecting,
                database_id: Some(database_id.to_string()),
                connected_at: None,
            };
        });
    }

    /// Publishes a state transition for `session_id`, ignoring stale sessions.
    /// Terminal transitions clear the exposed `database_id`.
    pub(crate) fn transition(&self, session_id: Uuid, state: ConnectionState) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match *current {
            Some(active) if active == session_id => {}
            _ => {
                tracing::debug!(
                    session_id = %session_id,
                    state = state.as_str(),
                    "dropping status transition from stale session"
                );
                return;
            }
        }

        if state.is_terminal() {
            *current = None;
        }

        self.status_tx.send_modify(|status| {
            status.state = state;
            if state == ConnectionState::Open {
                status.connected_at = Some(Utc::now());
            } else if state.is_terminal() {
                status.database_id = None;
                status.connected_at = None;
            }
        });
    }
}

/// Handle to one spawned relay session.
struct ActiveSession {
    session_id: Uuid,
    database_id: String,
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

/// Bridges one locally-hosted database at a time to a remote peer.
pub struct ConnectionBridge {
    registry: Arc<InstanceRegistry>,
    resolver: EndpointResolver,
    shared: Arc<StatusShared>,
    /// The single replaceable connection slot. The async mutex serializes
    /// connect/disconnect so teardown-before-replace is race-free.
    session: tokio::sync::Mutex<Option<ActiveSession>>,
}

impl ConnectionBridge {
    /// Creates a bridge over an explicitly injected registry.
    pub fn new(registry: Arc<InstanceRegistry>, resolver: EndpointResolver) -> Self {
        Self {
            registry,
            resolver,
            shared: Arc::new(StatusShared::new()),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Connects the database named by `id` to its remote peer and starts
    /// relaying frames.
    ///
    /// If another session is open or connecting it is closed first
    /// (teardown-before-replace). On return the relay is registered for
    /// inbound delivery and the status reads `open`; subsequent lifecycle
    /// changes are observed via [`subscribe`](Self::subscribe) or
    /// [`status`](Self::status), not through this call.
    ///
    /// # Errors
    ///
    /// Setup failures are returned directly: engine resolution errors as
    /// [`BridgeError::Engine`] (status reverts to `closed`), handshake
    /// failures as [`BridgeError::Transport`] (status reads `errored`).
    pub async fn connect(&self, id: &str) -> Result<(), BridgeError> {
        viaduct_types::validate_database_id(id).map_err(viaduct_engine::EngineError::from)?;

        let mut session = self.session.lock().await;

        if let Some(active) = session.take() {
            tracing::info!(
                old = %active.database_id,
                new = %id,
                "closing existing connection before replacement"
            );
            teardown(active).await;
        }

        let session_id = Uuid::new_v4();
        self.shared.begin(session_id, id);

        let instance = match self.registry.get_instance(id).await {
            Ok(instance) => instance,
            Err(e) => {
                self.shared.transition(session_id, ConnectionState::Closed);
                return Err(e.into());
            }
        };

        let endpoint = match self.resolver.resolve(id) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.shared.transition(session_id, ConnectionState::Closed);
                return Err(e);
            }
        };

        tracing::info!(database_id = %id, endpoint = %endpoint, "opening bridge socket");
        let (ws, _response) = match connect_async(endpoint.as_str()).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(database_id = %id, endpoint = %endpoint, "transport handshake failed: {}", e);
                self.shared.transition(session_id, ConnectionState::Errored);
                return Err(BridgeError::Transport(e));
            }
        };

        let (shutdown_tx, shutdown_rx) = mpsc::channel(SHUTDOWN_CHANNEL_CAPACITY);
        let relay = relay::RelaySession::new(
            session_id,
            id.to_string(),
            instance,
            self.shared.clone(),
            shutdown_rx,
        );
        let task = tokio::spawn(relay.run(ws));

        self.shared.transition(session_id, ConnectionState::Open);
        tracing::info!(database_id = %id, session_id = %session_id, "bridge connection open");

        *session = Some(ActiveSession {
            session_id,
            database_id: id.to_string(),
            shutdown_tx,
            task,
        });

        Ok(())
    }

    /// Proactively closes the active connection. Idempotent: with no active
    /// connection this is a no-op.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        match session.take() {
            Some(active) => {
                tracing::info!(
                    database_id = %active.database_id,
                    session_id = %active.session_id,
                    "disconnect requested"
                );
                teardown(active).await;
            }
            None => {
                tracing::debug!("disconnect requested with no active connection");
            }
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> BridgeStatus {
        self.shared.status_tx.borrow().clone()
    }

    /// Subscribes to status transitions. Every transport event is published
    /// to this channel in the same task step that observes it.
    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Whether a relay session is currently established.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Identifier of the connected database, if any.
    pub fn database_id(&self) -> Option<String> {
        self.status().database_id
    }
}

impl std::fmt::Debug for ConnectionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionBridge")
            .field("proxy_domain", &self.resolver.proxy_domain())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Stops a session's relay task and waits for it to exit.
async fn teardown(active: ActiveSession) {
    // The relay may already have exited on a remote close or error, in which
    // case the receiver is gone and the send fails; that is fine.
    let _ = active.shutdown_tx.send(()).await;
    if let Err(e) = active.task.await {
        tracing::error!(
            database_id = %active.database_id,
            "relay task join failed: {}",
            e
        );
    }
}
