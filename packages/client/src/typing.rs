//! Typing indicators.
//!
//! [`TypingIndicatorTracker`] is a per-(room, user) timer state machine for
//! inbound signals: a user enters the typing set on `isTyping=true` and
//! leaves it on `isTyping=false`, or automatically when the expiry window
//! elapses without a refresh. Timers live in an explicit table so re-arming
//! is an atomic cancel-and-reschedule, never an accumulation of orphaned
//! callbacks.
//!
//! [`TypingDebouncer`] is the caller-side outbound counterpart: it limits
//! publishes to one `true` per burst of composer activity and one `false`
//! after the idle window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::types::{RoomId, TypingSignal, UserId};

/// Update emitted whenever a room's typing set changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingChanged {
    pub room_id: RoomId,
}

/// One member of a room's typing set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingUser {
    pub user_id: UserId,
    pub user_name: String,
}

struct TypingEntry {
    user_name: String,
    timer: JoinHandle<()>,
}

type TypingTable = HashMap<RoomId, HashMap<UserId, TypingEntry>>;

pub struct TypingIndicatorTracker {
    local_user_id: UserId,
    expiry: Duration,
    rooms: Arc<Mutex<TypingTable>>,
    updates: broadcast::Sender<TypingChanged>,
}

impl TypingIndicatorTracker {
    pub fn new(local_user_id: UserId, expiry: Duration) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            local_user_id,
            expiry,
            rooms: Arc::new(Mutex::new(HashMap::new())),
            updates,
        }
    }

    pub fn updates(&self) -> broadcast::Receiver<TypingChanged> {
        self.updates.subscribe()
    }

    /// Apply an inbound typing signal. Signals from the local user are
    /// ignored: self-typing is never reflected back to self.
    pub async fn on_typing_signal(&self, signal: TypingSignal) {
        if signal.user_id == self.local_user_id {
            return;
        }
        if signal.is_typing {
            self.arm(signal).await;
        } else {
            self.remove(signal.room_id, signal.user_id).await;
        }
    }

    /// Add the user to the room's typing set and (re)start its expiry
    /// timer, cancelling any prior timer for the same user.
    async fn arm(&self, signal: TypingSignal) {
        let room_id = signal.room_id;
        let user_id = signal.user_id;
        {
            let mut rooms = self.rooms.lock().await;
            let entries = rooms.entry(room_id).or_default();
            if let Some(previous) = entries.remove(&user_id) {
                previous.timer.abort();
            }
            let timer = tokio::spawn(expire_after(
                self.rooms.clone(),
                self.updates.clone(),
                self.expiry,
                room_id,
                user_id,
            ));
            entries.insert(
                user_id,
                TypingEntry {
                    user_name: signal.user_name,
                    timer,
                },
            );
        }
        let _ = self.updates.send(TypingChanged { room_id });
    }

    async fn remove(&self, room_id: RoomId, user_id: UserId) {
        let removed = {
            let mut rooms = self.rooms.lock().await;
            let removed = match rooms.get_mut(&room_id) {
                Some(entries) => match entries.remove(&user_id) {
                    Some(entry) => {
                        entry.timer.abort();
                        true
                    }
                    None => false,
                },
                None => false,
            };
            if let Some(entries) = rooms.get(&room_id)
                && entries.is_empty()
            {
                rooms.remove(&room_id);
            }
            removed
        };
        if removed {
            let _ = self.updates.send(TypingChanged { room_id });
        }
    }

    /// Current typing set for a room, sorted by user id. The local user is
    /// never present.
    pub async fn typing_users(&self, room_id: RoomId) -> Vec<TypingUser> {
        let rooms = self.rooms.lock().await;
        let mut users: Vec<TypingUser> = rooms
            .get(&room_id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(user_id, entry)| TypingUser {
                        user_id: *user_id,
                        user_name: entry.user_name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        users.sort_by_key(|user| user.user_id);
        users
    }
}

/// Expiry task: after the window elapses, drop the entry if it is still the
/// live one (a re-arm aborts this task first).
async fn expire_after(
    rooms: Arc<Mutex<TypingTable>>,
    updates: broadcast::Sender<TypingChanged>,
    expiry: Duration,
    room_id: RoomId,
    user_id: UserId,
) {
    tokio::time::sleep(expiry).await;
    let mut rooms = rooms.lock().await;
    if let Some(entries) = rooms.get_mut(&room_id)
        && entries.remove(&user_id).is_some()
    {
        if entries.is_empty() {
            rooms.remove(&room_id);
        }
        tracing::debug!("typing indicator for user {} in room {} expired", user_id, room_id);
        let _ = updates.send(TypingChanged { room_id });
    }
}

/// Outbound debounce helper for the composer.
///
/// `note_activity` emits `(room, true)` on the first activity of a burst and
/// schedules `(room, false)` for when the idle window elapses; further
/// activity re-arms the idle timer without re-emitting `true`. `stop` emits
/// `false` immediately (message sent, composer cleared).
pub struct TypingDebouncer {
    idle: Duration,
    signals: mpsc::UnboundedSender<(RoomId, bool)>,
    bursts: Arc<Mutex<HashMap<RoomId, JoinHandle<()>>>>,
}

impl TypingDebouncer {
    pub fn new(idle: Duration) -> (Self, mpsc::UnboundedReceiver<(RoomId, bool)>) {
        let (signals, receiver) = mpsc::unbounded_channel();
        (
            Self {
                idle,
                signals,
                bursts: Arc::new(Mutex::new(HashMap::new())),
            },
            receiver,
        )
    }

    /// Record composer activity in a room.
    pub async fn note_activity(&self, room_id: RoomId) {
        let mut bursts = self.bursts.lock().await;
        let burst_start = !bursts.contains_key(&room_id);
        if let Some(previous) = bursts.remove(&room_id) {
            previous.abort();
        }
        if burst_start {
            let _ = self.signals.send((room_id, true));
        }
        let bursts_ref = self.bursts.clone();
        let signals = self.signals.clone();
        let idle = self.idle;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if bursts_ref.lock().await.remove(&room_id).is_some() {
                let _ = signals.send((room_id, false));
            }
        });
        bursts.insert(room_id, timer);
    }

    /// End the burst immediately (message sent).
    pub async fn stop(&self, room_id: RoomId) {
        if let Some(timer) = self.bursts.lock().await.remove(&room_id) {
            timer.abort();
            let _ = self.signals.send((room_id, false));
        }
    }
}
