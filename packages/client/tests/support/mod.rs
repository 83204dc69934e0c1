//! In-process broker for integration tests.
//!
//! Speaks just enough of the backend's protocol to exercise the client:
//! bearer-checked WebSocket upgrade, SUBSCRIBE/UNSUBSCRIBE bookkeeping,
//! echo of sent chat messages to the room channel, typing forwarding, and a
//! REST history endpoint. `kick_all` drops every socket without a close
//! frame to simulate a dirty network failure.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{any, get},
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;

use tsunagi_client::types::{ChatMessage, MessageType, RoomId, TypingSignal};
use tsunagi_client::wire::{ClientFrame, ServerEvent, ServerFrame, room_channel};

pub const TEST_TOKEN: &str = "test-token";

struct BrokerState {
    next_conn_id: AtomicU64,
    next_message_id: AtomicI64,
    channels: Mutex<HashMap<String, Vec<(u64, mpsc::UnboundedSender<String>)>>>,
    published: Mutex<Vec<ClientFrame>>,
    history: Mutex<HashMap<RoomId, Vec<ChatMessage>>>,
    kick: broadcast::Sender<()>,
}

impl BrokerState {
    async fn broadcast_to(&self, channel: &str, text: String) {
        let channels = self.channels.lock().await;
        if let Some(subscribers) = channels.get(channel) {
            for (_, tx) in subscribers {
                let _ = tx.send(text.clone());
            }
        }
    }
}

pub struct Broker {
    addr: SocketAddr,
    state: Arc<BrokerState>,
    server: JoinHandle<()>,
}

impl Broker {
    pub async fn start() -> Self {
        let (kick, _) = broadcast::channel(4);
        let state = Arc::new(BrokerState {
            next_conn_id: AtomicU64::new(1),
            next_message_id: AtomicI64::new(1),
            channels: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            history: Mutex::new(HashMap::new()),
            kick,
        });

        let app = Router::new()
            .route("/ws", any(ws_handler))
            .route("/api/chat/rooms/{room_id}/messages", get(history_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test broker");
        let addr = listener.local_addr().expect("broker local addr");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test broker serve");
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Push an event to every subscriber of a channel.
    pub async fn publish(&self, channel: &str, event: ServerEvent) {
        let frame = ServerFrame {
            channel: channel.to_string(),
            event,
        };
        let text = serde_json::to_string(&frame).expect("serialize server frame");
        self.state.broadcast_to(channel, text).await;
    }

    /// Push a raw text frame to every subscriber of a channel.
    pub async fn publish_raw(&self, channel: &str, text: &str) {
        self.state.broadcast_to(channel, text.to_string()).await;
    }

    /// Drop every live socket without a close handshake.
    pub fn kick_all(&self) {
        let _ = self.state.kick.send(());
    }

    /// Every SEND frame received so far.
    pub async fn published(&self) -> Vec<ClientFrame> {
        self.state.published.lock().await.clone()
    }

    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.state
            .channels
            .lock()
            .await
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub async fn set_history(&self, room_id: RoomId, messages: Vec<ChatMessage>) {
        self.state.history.lock().await.insert(room_id, messages);
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {TEST_TOKEN}"))
        .unwrap_or(false)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BrokerState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(ws.on_upgrade(|socket| handle_socket(socket, state)))
}

async fn history_handler(
    State(state): State<Arc<BrokerState>>,
    Path(room_id): Path<RoomId>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let history = state.history.lock().await;
    Ok(Json(history.get(&room_id).cloned().unwrap_or_default()))
}

async fn handle_socket(socket: WebSocket, state: Arc<BrokerState>) {
    let conn_id = state.next_conn_id.fetch_add(1, Ordering::SeqCst);
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut kick = state.kick.subscribe();

    loop {
        tokio::select! {
            // Dirty drop: no close frame, the TCP stream just goes away.
            _ = kick.recv() => break,
            outbound = rx.recv() => match outbound {
                Some(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => handle_frame(&state, conn_id, &tx, frame).await,
                        Err(e) => tracing::warn!("broker: unparseable frame: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }

    let mut channels = state.channels.lock().await;
    for subscribers in channels.values_mut() {
        subscribers.retain(|(id, _)| *id != conn_id);
    }
}

async fn handle_frame(
    state: &Arc<BrokerState>,
    conn_id: u64,
    tx: &mpsc::UnboundedSender<String>,
    frame: ClientFrame,
) {
    match frame {
        ClientFrame::Subscribe { channel } => {
            let mut channels = state.channels.lock().await;
            let subscribers = channels.entry(channel).or_default();
            if !subscribers.iter().any(|(id, _)| *id == conn_id) {
                subscribers.push((conn_id, tx.clone()));
            }
        }
        ClientFrame::Unsubscribe { channel } => {
            let mut channels = state.channels.lock().await;
            if let Some(subscribers) = channels.get_mut(&channel) {
                subscribers.retain(|(id, _)| *id != conn_id);
            }
        }
        ClientFrame::Send { destination, body } => {
            state.published.lock().await.push(ClientFrame::Send {
                destination: destination.clone(),
                body: body.clone(),
            });
            if let Some(room_id) = destination
                .strip_prefix("chat.sendMessage/")
                .and_then(|id| id.parse::<RoomId>().ok())
            {
                let message = ChatMessage {
                    id: state.next_message_id.fetch_add(1, Ordering::SeqCst),
                    room_id,
                    sender_id: body["senderId"].as_i64().unwrap_or(0),
                    sender_name: body["senderName"].as_str().unwrap_or("someone").to_string(),
                    content: body["content"].as_str().unwrap_or_default().to_string(),
                    message_type: MessageType::Chat,
                    created_at: 1_700_000_000_000,
                    is_read: false,
                };
                let frame = ServerFrame {
                    channel: room_channel(room_id),
                    event: ServerEvent::Message(message),
                };
                let text = serde_json::to_string(&frame).expect("serialize echo");
                state.broadcast_to(&room_channel(room_id), text).await;
            } else if let Some(room_id) = destination
                .strip_prefix("chat.typing/")
                .and_then(|id| id.parse::<RoomId>().ok())
            {
                if let Ok(signal) = serde_json::from_value::<TypingSignal>(body) {
                    let frame = ServerFrame {
                        channel: room_channel(room_id),
                        event: ServerEvent::Typing(signal),
                    };
                    let text = serde_json::to_string(&frame).expect("serialize typing");
                    state.broadcast_to(&room_channel(room_id), text).await;
                }
            }
        }
    }
}
