//! Realtime client facade.
//!
//! `RealtimeClient` owns one connection, one subscription registry, and the
//! stores fed by them, and exposes the room-level command surface
//! (join/leave/send/typing) plus read access to the stores. Wiring rules:
//! the inbound dispatch loop and the connection-event loop are spawned by
//! `start()` before the first connect attempt, so no early event can be
//! missed; on every Connected event the registry re-issues its
//! subscriptions and the per-user base channels (notifications, presence)
//! are ensured.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use crate::error::ClientError;
use crate::messages::MessageStore;
use crate::notifications::{NoopNotifier, NotificationInbox, Notifier};
use crate::presence::PresenceTracker;
use crate::rest::{ChatApi, NotificationApi, RestClient};
use crate::subscription::SubscriptionRegistry;
use crate::typing::{TypingDebouncer, TypingIndicatorTracker};
use crate::types::{RoomId, TypingSignal};
use crate::wire::{
    PRESENCE_CHANNEL, ServerEvent, join_room_destination, leave_room_destination,
    notifications_channel, room_channel, send_message_destination, typing_destination,
};

pub struct RealtimeClient {
    config: ClientConfig,
    connection: Arc<ConnectionManager>,
    registry: Arc<SubscriptionRegistry>,
    store: Arc<MessageStore>,
    typing: Arc<TypingIndicatorTracker>,
    inbox: Arc<NotificationInbox>,
    presence: Arc<PresenceTracker>,
    chat_api: Arc<dyn ChatApi>,
    debouncer: TypingDebouncer,
    debounce_rx: Mutex<Option<mpsc::UnboundedReceiver<(RoomId, bool)>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RealtimeClient {
    /// Build a client backed by the real REST API and no notification hook.
    pub fn new(config: ClientConfig) -> Self {
        let rest = Arc::new(RestClient::new(
            config.api_url.clone(),
            config.token.clone(),
        ));
        Self::with_dependencies(config, rest.clone(), rest, Arc::new(NoopNotifier))
    }

    /// Build a client with explicit API and notifier implementations.
    pub fn with_dependencies(
        config: ClientConfig,
        chat_api: Arc<dyn ChatApi>,
        notification_api: Arc<dyn NotificationApi>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let connection = Arc::new(ConnectionManager::new(&config));
        let registry = Arc::new(SubscriptionRegistry::new(connection.handle()));
        let (debouncer, debounce_rx) = TypingDebouncer::new(config.typing_idle);
        Self {
            connection,
            registry,
            store: Arc::new(MessageStore::new()),
            typing: Arc::new(TypingIndicatorTracker::new(
                config.user_id,
                config.typing_expiry,
            )),
            inbox: Arc::new(NotificationInbox::new(notification_api, notifier)),
            presence: Arc::new(PresenceTracker::new()),
            chat_api,
            debouncer,
            debounce_rx: Mutex::new(Some(debounce_rx)),
            tasks: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Spawn the wiring loops and open the connection.
    ///
    /// Call once per session; the connection then lives until `stop()`.
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;

        if let Some(mut inbound) = self.connection.take_inbound().await {
            let registry = self.registry.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(frame) = inbound.recv().await {
                    registry.dispatch(frame).await;
                }
            }));
        }

        // Base-channel handlers live for the whole session; re-subscription
        // after a reconnect reuses the same sending halves.
        let (notif_tx, mut notif_rx) = mpsc::unbounded_channel();
        let inbox = self.inbox.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = notif_rx.recv().await {
                match event {
                    ServerEvent::Notification(notification) => {
                        inbox.on_pushed_notification(notification).await;
                    }
                    other => tracing::debug!("unexpected event on notifications: {:?}", other),
                }
            }
        }));

        let (presence_tx, mut presence_rx) = mpsc::unbounded_channel();
        let presence = self.presence.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = presence_rx.recv().await {
                match event {
                    ServerEvent::UserStatus(update) => {
                        presence.on_presence_event(update).await;
                    }
                    other => tracing::debug!("unexpected event on presence: {:?}", other),
                }
            }
        }));

        let mut events = self.connection.events();
        let registry = self.registry.clone();
        let user_id = self.config.user_id;
        tasks.push(tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if event != ConnectionEvent::Connected {
                    continue;
                }
                registry.resubscribe_all().await;
                let notifications = notifications_channel(user_id);
                if !registry.is_subscribed(&notifications).await
                    && let Err(e) = registry.subscribe(&notifications, notif_tx.clone()).await
                {
                    tracing::warn!("failed to open notifications channel: {}", e);
                }
                if !registry.is_subscribed(PRESENCE_CHANNEL).await
                    && let Err(e) = registry
                        .subscribe(PRESENCE_CHANNEL, presence_tx.clone())
                        .await
                {
                    tracing::warn!("failed to open presence channel: {}", e);
                }
            }
        }));

        if let Some(mut debounce_rx) = self.debounce_rx.lock().await.take() {
            let registry = self.registry.clone();
            let user_id = self.config.user_id;
            let user_name = self.config.user_name.clone();
            tasks.push(tokio::spawn(async move {
                while let Some((room_id, is_typing)) = debounce_rx.recv().await {
                    let signal = TypingSignal {
                        room_id,
                        user_id,
                        user_name: user_name.clone(),
                        is_typing,
                    };
                    match serde_json::to_value(&signal) {
                        Ok(body) => registry.publish(&typing_destination(room_id), body).await,
                        Err(e) => tracing::error!("failed to serialize typing signal: {}", e),
                    }
                }
            }));
        }

        drop(tasks);
        self.connection.connect().await;
    }

    /// Close the connection and drop all subscriptions and loops.
    pub async fn stop(&self) {
        self.registry.clear().await;
        self.connection.disconnect().await;
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }

    /// Subscribe to a room and announce the join. Joining a room twice is a
    /// no-op; joining while disconnected is an error and registers nothing.
    pub async fn join_room(&self, room_id: RoomId) -> Result<(), ClientError> {
        let channel = room_channel(room_id);
        if self.registry.is_subscribed(&channel).await {
            tracing::debug!("already joined room {}", room_id);
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.registry.subscribe(&channel, tx).await?;

        let store = self.store.clone();
        let typing = self.typing.clone();
        let room_loop = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ServerEvent::Message(message) => store.on_pushed_message(message).await,
                    ServerEvent::Typing(signal) => typing.on_typing_signal(signal).await,
                    other => tracing::debug!("unexpected event on room channel: {:?}", other),
                }
            }
        });
        self.tasks.lock().await.push(room_loop);

        self.registry
            .publish(
                &join_room_destination(room_id),
                serde_json::json!({"roomId": room_id}),
            )
            .await;
        tracing::info!("joined room {}", room_id);
        Ok(())
    }

    /// Fetch history over REST and install it as the room's buffer.
    ///
    /// A response arriving after the room was left is discarded, so a slow
    /// fetch cannot resurrect a cleared buffer.
    pub async fn load_history(&self, room_id: RoomId) -> Result<(), ClientError> {
        let history = self.chat_api.history(room_id).await?;
        if !self.registry.is_subscribed(&room_channel(room_id)).await {
            tracing::debug!("history for room {} arrived after leave, discarding", room_id);
            return Ok(());
        }
        self.store.replace_history(room_id, history).await;
        Ok(())
    }

    /// Announce the leave, drop the subscription, discard the buffer.
    pub async fn leave_room(&self, room_id: RoomId) {
        let channel = room_channel(room_id);
        if self.registry.is_subscribed(&channel).await {
            self.registry.unsubscribe_channel(&channel).await;
            self.registry
                .publish(
                    &leave_room_destination(room_id),
                    serde_json::json!({"roomId": room_id}),
                )
                .await;
        }
        self.store.clear(room_id).await;
        tracing::info!("left room {}", room_id);
    }

    /// Publish a chat message. No local append: the room subscription's
    /// echo is the single source of message order, and a send while
    /// disconnected is silently dropped.
    pub async fn send_message(&self, room_id: RoomId, content: &str) {
        self.debouncer.stop(room_id).await;
        self.registry
            .publish(
                &send_message_destination(room_id),
                serde_json::json!({
                    "roomId": room_id,
                    "content": content,
                    "messageType": "CHAT",
                }),
            )
            .await;
    }

    /// Publish an explicit typing signal, bypassing the debouncer.
    pub async fn set_typing(&self, room_id: RoomId, is_typing: bool) {
        let signal = TypingSignal {
            room_id,
            user_id: self.config.user_id,
            user_name: self.config.user_name.clone(),
            is_typing,
        };
        match serde_json::to_value(&signal) {
            Ok(body) => {
                self.registry
                    .publish(&typing_destination(room_id), body)
                    .await;
            }
            Err(e) => tracing::error!("failed to serialize typing signal: {}", e),
        }
    }

    /// Record local composer activity; the debouncer turns bursts into at
    /// most one start/stop signal pair.
    pub async fn note_typing_activity(&self, room_id: RoomId) {
        self.debouncer.note_activity(room_id).await;
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub fn connected_watch(&self) -> watch::Receiver<bool> {
        self.connection.connected_watch()
    }

    pub fn messages(&self) -> &MessageStore {
        &self.store
    }

    pub fn typing(&self) -> &TypingIndicatorTracker {
        &self.typing
    }

    pub fn inbox(&self) -> &NotificationInbox {
        &self.inbox
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn chat_api(&self) -> &dyn ChatApi {
        self.chat_api.as_ref()
    }
}
