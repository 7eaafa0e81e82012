//! Connection manager for one WebSocket to Gremlin Server.
//!
//! The socket itself lives in a spawned I/O task that connects, writes
//! outbound frames from a channel, and reports everything it sees as
//! [`ConnectionEvent`]s. [`Connection`] is the owner-side half: it holds the
//! lifecycle state and changes it only in [`Transport::observe`], so the
//! state the dispatcher reads always matches the events it has processed.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{GremlinError, Result};

/// Lifecycle of the underlying socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Ready to send and receive.
    Open,
    /// Close requested, waiting for the socket to finish.
    Closing,
    /// Not connected (never opened, closed, or failed).
    #[default]
    Closed,
}

impl ConnectionState {
    /// Whether frames can be sent.
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// What happened on the socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEventKind {
    /// The handshake completed.
    Opened,
    /// One inbound frame.
    Message(Bytes),
    /// A transport failure; a `Closed` event follows.
    Error(String),
    /// The socket is gone.
    Closed,
}

/// A socket event tagged with the connection generation that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionEvent {
    /// Incremented on every `open()`; stale events are ignored.
    pub generation: u64,
    /// The event.
    pub kind: ConnectionEventKind,
}

/// The seam between the dispatcher and a socket.
pub trait Transport {
    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// Start connecting. No-op while open or connecting.
    fn open(&mut self);

    /// Request shutdown. No-op if never opened or already closed.
    fn close(&mut self);

    /// Queue one binary frame. Fails unless the state is `Open`.
    fn send(&mut self, payload: Bytes) -> Result<()>;

    /// Apply an event to the lifecycle state.
    ///
    /// Returns `false` if the event belongs to a replaced connection and
    /// should be ignored.
    fn observe(&mut self, event: &ConnectionEvent) -> bool;
}

/// WebSocket transport backed by `tokio-tungstenite`.
pub struct Connection {
    url: Url,
    state: ConnectionState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    events: mpsc::Sender<ConnectionEvent>,
}

impl Connection {
    /// Create an unopened connection that will report to `events`.
    pub fn new(url: Url, events: mpsc::Sender<ConnectionEvent>) -> Self {
        if url.scheme() == "wss" {
            install_tls_provider();
        }
        Self {
            url,
            state: ConnectionState::Closed,
            generation: 0,
            outbound: None,
            events,
        }
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Generation of the most recent `open()` (0 if never opened).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the socket is open.
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Whether the handshake is in progress.
    pub fn is_connecting(&self) -> bool {
        self.state == ConnectionState::Connecting
    }
}

impl Transport for Connection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Open | ConnectionState::Connecting
        ) {
            return;
        }
        self.generation += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);
        self.state = ConnectionState::Connecting;
        info!(url = %self.url, generation = self.generation, "opening connection");
        // Detached: the task ends on its own once the socket closes.
        let _ = tokio::spawn(io_loop(
            self.url.clone(),
            self.generation,
            rx,
            self.events.clone(),
        ));
    }

    fn close(&mut self) {
        let Some(outbound) = self.outbound.take() else {
            return;
        };
        debug!(generation = self.generation, "closing connection");
        self.state = ConnectionState::Closing;
        // Dropping `outbound` after the close frame lets the I/O task finish.
        let _ = outbound.send(Message::Close(None));
    }

    fn send(&mut self, payload: Bytes) -> Result<()> {
        if !self.state.is_open() {
            return Err(GremlinError::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(GremlinError::NotConnected)?;
        outbound
            .send(Message::Binary(payload))
            .map_err(|_| GremlinError::Transport("connection task has exited".into()))
    }

    fn observe(&mut self, event: &ConnectionEvent) -> bool {
        if event.generation != self.generation {
            return false;
        }
        match event.kind {
            ConnectionEventKind::Opened => {
                // A close() issued during the handshake wins.
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Open;
                }
            }
            ConnectionEventKind::Closed => {
                self.state = ConnectionState::Closed;
                self.outbound = None;
            }
            ConnectionEventKind::Message(_) | ConnectionEventKind::Error(_) => {}
        }
        true
    }
}

/// Make ring the process-wide rustls provider unless one is already set.
fn install_tls_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        // Err means another provider was installed first.
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

/// Socket I/O for one connection generation.
///
/// Always ends by emitting `Closed`, preceded by `Error` on failure.
async fn io_loop(
    url: Url,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::Sender<ConnectionEvent>,
) {
    let emit = |kind| ConnectionEvent { generation, kind };

    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            warn!(%url, generation, error = %e, "connection failed");
            let _ = events.send(emit(ConnectionEventKind::Error(e.to_string()))).await;
            let _ = events.send(emit(ConnectionEventKind::Closed)).await;
            return;
        }
    };
    if events.send(emit(ConnectionEventKind::Opened)).await.is_err() {
        return;
    }

    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut closing = false;

    loop {
        tokio::select! {
            msg = outbound.recv(), if !closing => {
                match msg {
                    Some(msg) => {
                        let is_close = matches!(msg, Message::Close(_));
                        if let Err(e) = ws_tx.send(msg).await {
                            let _ = events.send(emit(ConnectionEventKind::Error(e.to_string()))).await;
                            break;
                        }
                        closing = is_close;
                    }
                    // Owner dropped without an explicit close.
                    None => {
                        let _ = ws_tx.close().await;
                        closing = true;
                    }
                }
            }
            frame = ws_rx.next() => {
                let kind = match frame {
                    Some(Ok(Message::Binary(data))) => ConnectionEventKind::Message(data),
                    Some(Ok(Message::Text(text))) => {
                        ConnectionEventKind::Message(Bytes::copy_from_slice(text.as_bytes()))
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping/pong are answered by tungstenite.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let _ = events.send(emit(ConnectionEventKind::Error(e.to_string()))).await;
                        break;
                    }
                };
                if events.send(emit(kind)).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = events.send(emit(ConnectionEventKind::Closed)).await;
}
