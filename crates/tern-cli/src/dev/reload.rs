//! Live-reload broadcast channel.
//!
//! Browsers connect over WebSocket to a second listener on `port + 1`. When a
//! watched file changes every connected client receives the literal message
//! `reload`. A client that cannot take the message is dropped from the
//! registry; the others are unaffected.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{CliError, Result};

/// Message sent to every client on a change.
pub const RELOAD_MESSAGE: &str = "reload";

/// Messages buffered per client before it counts as stalled.
const CLIENT_BUFFER: usize = 16;

/// Clients are keyed by their peer address; a reconnect from the same
/// address replaces the earlier entry.
pub type ClientId = SocketAddr;

/// Why a message did not reach a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The connection task has gone away.
    Closed,
    /// The client stopped draining its queue.
    Stalled,
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendFailure::Closed => f.write_str("connection closed"),
            SendFailure::Stalled => f.write_str("client queue full"),
        }
    }
}

/// Outcome of one [`ReloadHub::notify_all`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<ClientId>,
    pub failed: Vec<(ClientId, SendFailure)>,
}

impl BroadcastReport {
    /// True when every registered client got the message.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Log the broadcast: `info` always, one `warn` if anything failed.
    pub fn log(&self) {
        info!(
            delivered = self.delivered.len(),
            failed = self.failed.len(),
            "reload broadcast"
        );
        if !self.is_clean() {
            let failures = self
                .failed
                .iter()
                .map(|(client, reason)| format!("{client} ({reason})"))
                .collect::<Vec<_>>()
                .join(", ");
            warn!("dropped reload clients: {}", failures);
        }
    }
}

/// Registry of connected reload clients.
#[derive(Default)]
pub struct ReloadHub {
    clients: RwLock<HashMap<ClientId, mpsc::Sender<String>>>,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client, replacing any earlier one with the same id.
    pub fn register(&self, id: ClientId, sender: mpsc::Sender<String>) {
        if self.clients.write().insert(id, sender).is_some() {
            debug!(client = %id, "replaced reload client");
        }
    }

    /// Register `id` with a fresh channel and hand back its receiving end.
    pub fn connect(&self, id: ClientId) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.register(id, tx);
        rx
    }

    pub fn unregister(&self, id: ClientId) -> bool {
        self.clients.write().remove(&id).is_some()
    }

    /// Remove `id` only if it is still registered with `sender`'s channel,
    /// so a closing connection never removes the one that replaced it.
    pub fn release(&self, id: ClientId, sender: &mpsc::WeakSender<String>) {
        let Some(sender) = sender.upgrade() else {
            return;
        };
        let mut clients = self.clients.write();
        if clients.get(&id).is_some_and(|current| current.same_channel(&sender)) {
            clients.remove(&id);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Drop every client, ending their connections.
    pub fn close_all(&self) {
        self.clients.write().clear();
    }

    /// Send [`RELOAD_MESSAGE`] to every client.
    ///
    /// Never fails: each attempt is recorded in the report and clients that
    /// could not be reached are unregistered before returning.
    pub fn notify_all(&self) -> BroadcastReport {
        let clients: Vec<(ClientId, mpsc::Sender<String>)> = self
            .clients
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, tx) in clients {
            match tx.try_send(RELOAD_MESSAGE.to_string()) {
                Ok(()) => report.delivered.push(id),
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    report.failed.push((id, SendFailure::Closed))
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    report.failed.push((id, SendFailure::Stalled))
                }
            }
        }

        if !report.failed.is_empty() {
            let mut clients = self.clients.write();
            for (id, _) in &report.failed {
                clients.remove(id);
            }
        }

        report
    }
}

/// Router for the reload listener: every path accepts a WebSocket upgrade.
pub fn reload_router(hub: Arc<ReloadHub>) -> Router {
    Router::new().fallback(handle_upgrade).with_state(hub)
}

/// Serve the reload listener on `addr` until `shutdown` resolves.
pub async fn serve_reload(
    hub: Arc<ReloadHub>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CliError::Server(format!("Failed to bind reload socket {}: {}", addr, e)))?;

    debug!(%addr, "reload listener bound");

    axum::serve(
        listener,
        reload_router(hub).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| CliError::Server(format!("Reload server error: {}", e)))
}

async fn handle_upgrade(
    State(hub): State<Arc<ReloadHub>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, hub))
}

async fn handle_socket(mut socket: WebSocket, addr: SocketAddr, hub: Arc<ReloadHub>) {
    let (tx, mut rx) = mpsc::channel(CLIENT_BUFFER);
    let handle = tx.downgrade();
    hub.register(addr, tx);
    debug!(client = %addr, "reload client connected");

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some(text) = outgoing else { break };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Anything else the client says is ignored.
                Some(Ok(_)) => {}
            }
        }
    }

    hub.release(addr, &handle);
    debug!(client = %addr, "reload client disconnected");
}
