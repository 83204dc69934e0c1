//! Connection lifecycle management.
//!
//! `ConnectionManager` owns the single persistent WebSocket for a session:
//! it attaches the bearer credential to the upgrade request, heartbeats the
//! transport in both directions, and reconnects with a fixed delay for as
//! long as the session lives. Everything else in the crate observes it
//! through a [`ConnectionHandle`] (connected-state plus outbound sends) and
//! the [`ConnectionEvent`] stream.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{Bytes, protocol::Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::config::ClientConfig;
use crate::wire::{ClientFrame, ServerFrame};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Lifecycle events consumed by dependents (resubscription, UI state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a live session ended.
enum SessionEnd {
    /// `disconnect()` was requested.
    Shutdown,
    /// Transport error, peer close, or heartbeat timeout.
    Dropped,
    /// The connect attempt itself failed.
    ConnectFailed,
}

/// Cheap clone handed to the subscription registry and the publish path.
///
/// The outbound slot holds the sender of the *current* session only; it is
/// cleared the moment a session dies, so a frame handed in while disconnected
/// is dropped rather than queued for later delivery.
#[derive(Clone)]
pub struct ConnectionHandle {
    connected: watch::Receiver<bool>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>>,
}

impl ConnectionHandle {
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Watch receiver for connected-state transitions.
    pub fn connected_watch(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Fire-and-forget send. Returns `false` if the frame was dropped
    /// because no session is live.
    pub async fn send(&self, frame: ClientFrame) -> bool {
        let outbound = self.outbound.lock().await;
        match outbound.as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Handle backed by plain channels, for unit tests that need no socket.
    #[cfg(test)]
    pub(crate) fn for_test() -> (
        Self,
        watch::Sender<bool>,
        mpsc::UnboundedReceiver<ClientFrame>,
    ) {
        let (connected_tx, connected_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let handle = Self {
            connected: connected_rx,
            outbound: Arc::new(Mutex::new(Some(outbound_tx))),
        };
        (handle, connected_tx, outbound_rx)
    }
}

/// Owns the persistent connection for one user session.
///
/// Exactly one instance per session; created at session start, disposed at
/// session end, passed by reference to dependents.
pub struct ConnectionManager {
    ws_url: String,
    token: String,
    reconnect_delay: Duration,
    heartbeat_interval: Duration,
    idle_timeout: Duration,
    state: Arc<Mutex<ConnectionState>>,
    connected_tx: watch::Sender<bool>,
    connected_rx: watch::Receiver<bool>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>>,
    inbound_tx: mpsc::UnboundedSender<ServerFrame>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<ServerFrame>>>,
    shutdown_tx: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(config: &ClientConfig) -> Self {
        let (connected_tx, connected_rx) = watch::channel(false);
        let (events_tx, _) = broadcast::channel(32);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            ws_url: config.ws_url.clone(),
            token: config.token.clone(),
            reconnect_delay: config.reconnect_delay,
            heartbeat_interval: config.heartbeat_interval,
            idle_timeout: config.idle_timeout,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            connected_tx,
            connected_rx,
            events_tx,
            outbound: Arc::new(Mutex::new(None)),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            shutdown_tx,
            driver: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            connected: self.connected_rx.clone(),
            outbound: self.outbound.clone(),
        }
    }

    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events_tx.subscribe()
    }

    pub fn connected_watch(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Take the inbound frame stream. There is a single consumer (the
    /// dispatch loop); subsequent calls return `None`.
    pub async fn take_inbound(&self) -> Option<mpsc::UnboundedReceiver<ServerFrame>> {
        self.inbound_rx.lock().await.take()
    }

    /// Open the connection and keep it open until `disconnect()`.
    ///
    /// Idempotent: a call while a driver is already live (CONNECTING,
    /// CONNECTED, or RECONNECTING) is a no-op.
    pub async fn connect(&self) {
        {
            let mut state = self.state.lock().await;
            if *state != ConnectionState::Disconnected {
                tracing::debug!("connect() ignored: connection is {:?}", *state);
                return;
            }
            *state = ConnectionState::Connecting;
        }
        self.shutdown_tx.send_replace(false);

        let driver = Driver {
            ws_url: self.ws_url.clone(),
            token: self.token.clone(),
            reconnect_delay: self.reconnect_delay,
            heartbeat_interval: self.heartbeat_interval,
            idle_timeout: self.idle_timeout,
            state: self.state.clone(),
            connected_tx: self.connected_tx.clone(),
            events_tx: self.events_tx.clone(),
            outbound: self.outbound.clone(),
            inbound_tx: self.inbound_tx.clone(),
            shutdown_rx: self.shutdown_tx.subscribe(),
        };
        let handle = tokio::spawn(driver.run());
        *self.driver.lock().await = Some(handle);
    }

    /// Tear the connection down and stop reconnecting.
    ///
    /// Always safe to call, including when already disconnected.
    pub async fn disconnect(&self) {
        self.shutdown_tx.send_replace(true);
        if let Some(handle) = self.driver.lock().await.take()
            && handle.await.is_err()
        {
            tracing::warn!("connection driver ended abnormally");
        }
        *self.state.lock().await = ConnectionState::Disconnected;
    }
}

/// Reconnect loop plus session pump, running as one spawned task.
struct Driver {
    ws_url: String,
    token: String,
    reconnect_delay: Duration,
    heartbeat_interval: Duration,
    idle_timeout: Duration,
    state: Arc<Mutex<ConnectionState>>,
    connected_tx: watch::Sender<bool>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>>,
    inbound_tx: mpsc::UnboundedSender<ServerFrame>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }
            match self.open_session().await {
                SessionEnd::Shutdown => break,
                SessionEnd::Dropped | SessionEnd::ConnectFailed => {
                    if *self.shutdown_rx.borrow() {
                        break;
                    }
                    *self.state.lock().await = ConnectionState::Reconnecting;
                    tracing::info!(
                        "reconnecting in {} ms",
                        self.reconnect_delay.as_millis()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                        _ = self.shutdown_rx.changed() => {}
                    }
                }
            }
        }
        *self.state.lock().await = ConnectionState::Disconnected;
    }

    /// One connect attempt followed by the session pump if it succeeds.
    async fn open_session(&mut self) -> SessionEnd {
        let mut request = match self.ws_url.clone().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("invalid WebSocket URL '{}': {}", self.ws_url, e);
                return SessionEnd::ConnectFailed;
            }
        };
        match HeaderValue::from_str(&format!("Bearer {}", self.token)) {
            Ok(value) => {
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(e) => {
                tracing::error!("credential is not a valid header value: {}", e);
                return SessionEnd::ConnectFailed;
            }
        }

        match connect_async(request).await {
            Ok((ws, _response)) => {
                *self.state.lock().await = ConnectionState::Connected;
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                *self.outbound.lock().await = Some(outbound_tx);
                self.connected_tx.send_replace(true);
                let _ = self.events_tx.send(ConnectionEvent::Connected);
                tracing::info!("connected to {}", self.ws_url);

                let end = self.run_session(ws, outbound_rx).await;

                *self.outbound.lock().await = None;
                self.connected_tx.send_replace(false);
                let _ = self.events_tx.send(ConnectionEvent::Disconnected);
                end
            }
            Err(e) => {
                tracing::warn!("connect to {} failed: {}", self.ws_url, e);
                SessionEnd::ConnectFailed
            }
        }
    }

    /// Pump one live session: outbound frames, inbound frames, heartbeats.
    async fn run_session(
        &mut self,
        ws: WsStream,
        mut outbound_rx: mpsc::UnboundedReceiver<ClientFrame>,
    ) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let mut ping = interval(self.heartbeat_interval);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        match serde_json::from_str::<ServerFrame>(&text) {
                            Ok(frame) => {
                                let _ = self.inbound_tx.send(frame);
                            }
                            // A malformed push is non-fatal: skip it.
                            Err(e) => tracing::warn!("ignoring malformed frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        last_seen = Instant::now();
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            return SessionEnd::Dropped;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("server closed the connection");
                        return SessionEnd::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        return SessionEnd::Dropped;
                    }
                },
                frame = outbound_rx.recv() => match frame {
                    Some(frame) => match serde_json::to_string(&frame) {
                        Ok(json) => {
                            if sink.send(Message::Text(json.into())).await.is_err() {
                                return SessionEnd::Dropped;
                            }
                        }
                        Err(e) => tracing::error!("failed to serialize outbound frame: {}", e),
                    },
                    // The slot was cleared underneath us; treat as teardown.
                    None => return SessionEnd::Dropped,
                },
                _ = ping.tick() => {
                    if last_seen.elapsed() > self.idle_timeout {
                        tracing::warn!(
                            "no inbound traffic for {} ms, dropping connection",
                            self.idle_timeout.as_millis()
                        );
                        return SessionEnd::Dropped;
                    }
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        return SessionEnd::Dropped;
                    }
                }
            }
        }
    }
}
