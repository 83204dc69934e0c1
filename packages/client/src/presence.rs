//! Online-status tracking.
//!
//! Pure set membership over USER_STATUS broadcasts. No timeouts: staleness
//! from a missed OFFLINE event is accepted, the backend's session tracking
//! is the authority.

use std::collections::HashSet;

use tokio::sync::{Mutex, broadcast};

use crate::types::{StatusUpdate, UserId, UserStatus};

/// Update emitted whenever the online set changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceChanged;

pub struct PresenceTracker {
    online: Mutex<HashSet<UserId>>,
    updates: broadcast::Sender<PresenceChanged>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            online: Mutex::new(HashSet::new()),
            updates,
        }
    }

    pub fn updates(&self) -> broadcast::Receiver<PresenceChanged> {
        self.updates.subscribe()
    }

    pub async fn on_presence_event(&self, update: StatusUpdate) {
        let changed = {
            let mut online = self.online.lock().await;
            match update.status {
                UserStatus::Online => online.insert(update.user_id),
                UserStatus::Offline => online.remove(&update.user_id),
            }
        };
        if changed {
            let _ = self.updates.send(PresenceChanged);
        }
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.online.lock().await.contains(&user_id)
    }

    /// Snapshot of everyone currently online, sorted by id.
    pub async fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.online.lock().await.iter().copied().collect();
        users.sort_unstable();
        users
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
