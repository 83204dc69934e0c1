//! Wire protocol over the persistent connection.
//!
//! Logical channels are string-keyed destinations multiplexed over the one
//! WebSocket. Inbound frames carry the channel they belong to plus a typed
//! event; outbound frames are either channel control (subscribe/unsubscribe)
//! or fire-and-forget sends to an application destination.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Notification, RoomId, StatusUpdate, TypingSignal, UserId};

/// Broadcast channel carrying online/offline updates for all users.
pub const PRESENCE_CHANNEL: &str = "presence";

/// Per-room channel delivering MESSAGE and TYPING events.
pub fn room_channel(room_id: RoomId) -> String {
    format!("room/{room_id}")
}

/// Per-user channel delivering NOTIFICATION events.
pub fn notifications_channel(user_id: UserId) -> String {
    format!("user/{user_id}/notifications")
}

pub fn join_room_destination(room_id: RoomId) -> String {
    format!("chat.joinRoom/{room_id}")
}

pub fn leave_room_destination(room_id: RoomId) -> String {
    format!("chat.leaveRoom/{room_id}")
}

pub fn send_message_destination(room_id: RoomId) -> String {
    format!("chat.sendMessage/{room_id}")
}

pub fn typing_destination(room_id: RoomId) -> String {
    format!("chat.typing/{room_id}")
}

/// Client-to-server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Send {
        destination: String,
        body: serde_json::Value,
    },
}

/// Server-to-client frame: one event delivered on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub channel: String,
    pub event: ServerEvent,
}

/// Typed payloads pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    Message(ChatMessage),
    Typing(TypingSignal),
    Notification(Notification),
    UserStatus(StatusUpdate),
}
