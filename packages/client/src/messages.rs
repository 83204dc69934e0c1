//! Per-room message log.
//!
//! Merges REST-fetched history with pushed events. History loads replace a
//! room's buffer; pushes append with id-level dedup, which covers
//! re-delivery after a reconnect-triggered re-subscription and the overlap
//! between a just-completed history load and in-flight pushes. The buffer is
//! never re-sorted: the backend is trusted to deliver in createdAt order per
//! room, and a violation is preserved as-is.

use std::collections::HashMap;

use tokio::sync::{Mutex, broadcast};

use crate::types::{ChatMessage, RoomId};

/// Update emitted whenever a room's buffer changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagesChanged {
    pub room_id: RoomId,
}

pub struct MessageStore {
    rooms: Mutex<HashMap<RoomId, Vec<ChatMessage>>>,
    updates: broadcast::Sender<MessagesChanged>,
}

impl MessageStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            rooms: Mutex::new(HashMap::new()),
            updates,
        }
    }

    /// Subscribe to buffer-change updates for reactive consumers.
    pub fn updates(&self) -> broadcast::Receiver<MessagesChanged> {
        self.updates.subscribe()
    }

    /// Replace a room's buffer with REST-loaded history.
    pub async fn replace_history(&self, room_id: RoomId, messages: Vec<ChatMessage>) {
        self.rooms.lock().await.insert(room_id, messages);
        let _ = self.updates.send(MessagesChanged { room_id });
    }

    /// Append a pushed message. A message whose id is already present in the
    /// room's buffer is ignored.
    pub async fn on_pushed_message(&self, message: ChatMessage) {
        let room_id = message.room_id;
        {
            let mut rooms = self.rooms.lock().await;
            let buffer = rooms.entry(room_id).or_default();
            if buffer.iter().any(|m| m.id == message.id) {
                tracing::debug!("duplicate message {} in room {}, ignoring", message.id, room_id);
                return;
            }
            buffer.push(message);
        }
        let _ = self.updates.send(MessagesChanged { room_id });
    }

    /// Current buffer for a room, in append order.
    pub async fn messages(&self, room_id: RoomId) -> Vec<ChatMessage> {
        self.rooms
            .lock()
            .await
            .get(&room_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Discard the buffer for a room (used on leave, to bound memory).
    pub async fn clear(&self, room_id: RoomId) {
        self.rooms.lock().await.remove(&room_id);
        let _ = self.updates.send(MessagesChanged { room_id });
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}
