//! Reconnecting client for a collaborative session.
//!
//! [`SyncAgent`] maintains a long-lived WebSocket connection to the relay,
//! sends local edits outward, dispatches inbound messages to registered
//! handlers, and reconnects automatically after a fixed delay.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::domain::{Language, SessionId};
use crate::ws::messages::{MessageKind, WireMessage};

/// Delay before each reconnect attempt after the transport drops.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// How long an inbound `code_change` echo is suppressed after a local
/// edit. A timing heuristic, not a causal barrier: the window is fixed
/// regardless of network round-trip, so a genuinely concurrent remote
/// edit landing inside it is dropped too (last-writer-wins makes that
/// acceptable).
pub const LOCAL_EDIT_WINDOW: Duration = Duration::from_millis(100);

/// Callback invoked for inbound messages of a subscribed kind.
pub type Handler = Box<dyn Fn(&WireMessage) + Send + Sync + 'static>;

/// Token identifying one registered handler, used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct HandlerRegistry {
    handlers: HashMap<MessageKind, Vec<(HandlerId, Handler)>>,
}

impl HandlerRegistry {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    fn add(&mut self, kind: MessageKind, id: HandlerId, handler: Handler) {
        self.handlers.entry(kind).or_default().push((id, handler));
    }

    fn remove(&mut self, kind: MessageKind, id: HandlerId) -> bool {
        let Some(entries) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Invokes every handler registered for the message's kind, in
    /// registration order.
    fn dispatch(&self, message: &WireMessage) {
        if let Some(entries) = self.handlers.get(&message.kind()) {
            for (_, handler) in entries {
                handler(message);
            }
        }
    }
}

struct AgentShared {
    url: String,
    handlers: std::sync::Mutex<HandlerRegistry>,
    next_handler_id: AtomicU64,
    connected: AtomicBool,
    participants: AtomicUsize,
    local_edit_in_flight: AtomicBool,
    outbound: std::sync::Mutex<Option<mpsc::UnboundedSender<WireMessage>>>,
}

impl AgentShared {
    fn new(url: String) -> Self {
        Self {
            url,
            handlers: std::sync::Mutex::new(HandlerRegistry::new()),
            next_handler_id: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            participants: AtomicUsize::new(0),
            local_edit_in_flight: AtomicBool::new(false),
            outbound: std::sync::Mutex::new(None),
        }
    }

    /// Parses and dispatches one inbound text frame.
    fn handle_frame(&self, text: &str) {
        let message = match serde_json::from_str::<WireMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed inbound frame");
                return;
            }
        };

        if let WireMessage::Participants { count } = message {
            self.participants.store(count, Ordering::Relaxed);
        }

        if matches!(message, WireMessage::CodeChange { .. })
            && self.local_edit_in_flight.load(Ordering::Relaxed)
        {
            tracing::debug!("suppressing code_change echo during local edit window");
            return;
        }

        if let Ok(registry) = self.handlers.lock() {
            registry.dispatch(&message);
        }
    }

    fn queue(&self, message: WireMessage) -> bool {
        if let Ok(outbound) = self.outbound.lock()
            && let Some(tx) = outbound.as_ref()
        {
            return tx.send(message).is_ok();
        }
        false
    }
}

/// Handle to a running session connection.
///
/// Spawned by [`SyncAgent::connect`]. Dropping the agent (or calling
/// [`SyncAgent::close`]) shuts the connection task down; until then the
/// task reconnects after every transport drop with a fresh join handshake,
/// so the relay re-sends the full `init` snapshot on each reconnect.
pub struct SyncAgent {
    shared: Arc<AgentShared>,
    shutdown: watch::Sender<bool>,
}

impl fmt::Debug for SyncAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncAgent")
            .field("url", &self.shared.url)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SyncAgent {
    /// Opens a persistent connection to `session_id` on the relay at
    /// `server_url` (e.g. `ws://127.0.0.1:3000`).
    #[must_use]
    pub fn connect(server_url: &str, session_id: &SessionId) -> Self {
        let url = format!("{server_url}/ws/{session_id}");
        let shared = Arc::new(AgentShared::new(url));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(run_agent(Arc::clone(&shared), shutdown_rx));

        Self {
            shared,
            shutdown: shutdown_tx,
        }
    }

    /// Returns `true` while the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }

    /// Returns the latest participant count pushed by the relay.
    #[must_use]
    pub fn participants(&self) -> usize {
        self.shared.participants.load(Ordering::Relaxed)
    }

    /// Transmits a message to the relay.
    ///
    /// No-ops with a warning when not connected: the message is dropped,
    /// not queued. The editor view keeps the authoritative local text and
    /// resyncs from the `init` snapshot on reconnect.
    pub fn send(&self, message: WireMessage) {
        if !self.is_connected() || !self.shared.queue(message) {
            tracing::warn!("sync agent is not connected; message dropped");
        }
    }

    /// Sends a local edit, suppressing the inbound echo window.
    ///
    /// Marks the local-change flag before the message leaves, then clears
    /// it after [`LOCAL_EDIT_WINDOW`] so remote edits flow again.
    pub fn send_code_change(&self, code: String) {
        self.shared
            .local_edit_in_flight
            .store(true, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(LOCAL_EDIT_WINDOW).await;
            shared.local_edit_in_flight.store(false, Ordering::Relaxed);
        });
        self.send(WireMessage::CodeChange { code });
    }

    /// Sends a local language switch.
    pub fn send_language_change(&self, language: Language) {
        self.send(WireMessage::LanguageChange { language });
    }

    /// Registers a handler for one inbound message kind.
    ///
    /// Multiple handlers per kind are allowed and run in registration
    /// order. Returns the id to pass to [`SyncAgent::off`].
    pub fn on<F>(&self, kind: MessageKind, handler: F) -> HandlerId
    where
        F: Fn(&WireMessage) + Send + Sync + 'static,
    {
        let id = HandlerId(self.shared.next_handler_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut registry) = self.shared.handlers.lock() {
            registry.add(kind, id, Box::new(handler));
        }
        id
    }

    /// Unregisters a handler. Returns `true` if it was registered.
    pub fn off(&self, kind: MessageKind, id: HandlerId) -> bool {
        match self.shared.handlers.lock() {
            Ok(mut registry) => registry.remove(kind, id),
            Err(_) => false,
        }
    }

    /// Closes the connection and stops reconnecting.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for SyncAgent {
    fn drop(&mut self) {
        // Dropping the watch sender also wakes the task; the explicit send
        // covers agents cloned into long-lived views.
        let _ = self.shutdown.send(true);
    }
}

/// Connection loop: connect, pump until the transport drops, wait, retry.
async fn run_agent(shared: Arc<AgentShared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match connect_async(shared.url.as_str()).await {
            Ok((stream, _)) => {
                tracing::debug!(url = %shared.url, "sync agent connected");
                run_session(&shared, stream, &mut shutdown).await;
            }
            Err(e) => {
                tracing::warn!(url = %shared.url, error = %e, "sync agent connect failed");
            }
        }

        shared.connected.store(false, Ordering::Relaxed);
        if let Ok(mut outbound) = shared.outbound.lock() {
            *outbound = None;
        }

        if *shutdown.borrow() {
            break;
        }

        // Exactly one scheduled reconnect per drop, repeated until closed.
        tokio::select! {
            () = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = shutdown.changed() => break,
        }
    }
    shared.connected.store(false, Ordering::Relaxed);
}

/// Pumps one live connection until it drops or the agent is closed.
async fn run_session<S>(shared: &AgentShared, stream: S, shutdown: &mut watch::Receiver<bool>)
where
    S: futures_util::Sink<Message> + futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let (mut ws_tx, mut ws_rx) = stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WireMessage>();
    if let Ok(mut outbound) = shared.outbound.lock() {
        *outbound = Some(out_tx);
    }
    shared.connected.store(true, Ordering::Relaxed);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                return;
            }
            outgoing = out_rx.recv() => {
                let Some(message) = outgoing else { return };
                let Ok(json) = serde_json::to_string(&message) else {
                    continue;
                };
                if ws_tx.send(Message::text(json)).await.is_err() {
                    return;
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => shared.handle_frame(&text),
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "sync agent transport error");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}
