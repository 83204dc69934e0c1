//! Channel subscription registry.
//!
//! Sole owner of the channel→handler map. A handler is the sending half of
//! an unbounded channel; inbound frames are routed to it by [`dispatch`].
//! After a reconnect, [`resubscribe_all`] restores server-side parity for
//! every channel that was registered before the drop.
//!
//! [`dispatch`]: SubscriptionRegistry::dispatch
//! [`resubscribe_all`]: SubscriptionRegistry::resubscribe_all

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::connection::ConnectionHandle;
use crate::error::ClientError;
use crate::wire::{ClientFrame, ServerEvent, ServerFrame};

/// Cancellation handle returned from `subscribe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    channel: String,
}

impl SubscriptionHandle {
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

pub struct SubscriptionRegistry {
    connection: ConnectionHandle,
    channels: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<ServerEvent>>>>,
}

impl SubscriptionRegistry {
    pub fn new(connection: ConnectionHandle) -> Self {
        Self {
            connection,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a handler for a channel and open the subscription.
    ///
    /// At most one live subscription per channel key: if one already exists
    /// the existing handle is returned and `handler` is dropped. If the
    /// connection is down the request is dropped and the caller must retry
    /// after the next connect; nothing is queued.
    pub async fn subscribe(
        &self,
        channel: &str,
        handler: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<SubscriptionHandle, ClientError> {
        let mut channels = self.channels.lock().await;
        if channels.contains_key(channel) {
            tracing::debug!("already subscribed to '{}'", channel);
            return Ok(SubscriptionHandle {
                channel: channel.to_string(),
            });
        }
        if !self.connection.is_connected() {
            tracing::debug!("dropping subscribe to '{}': not connected", channel);
            return Err(ClientError::NotConnected);
        }
        channels.insert(channel.to_string(), handler);
        self.connection
            .send(ClientFrame::Subscribe {
                channel: channel.to_string(),
            })
            .await;
        tracing::debug!("subscribed to '{}'", channel);
        Ok(SubscriptionHandle {
            channel: channel.to_string(),
        })
    }

    /// Cancel a subscription by handle.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.unsubscribe_channel(&handle.channel).await;
    }

    /// Cancel a subscription by channel key; no-op if not registered.
    pub async fn unsubscribe_channel(&self, channel: &str) {
        let removed = self.channels.lock().await.remove(channel).is_some();
        if !removed {
            return;
        }
        if self.connection.is_connected() {
            self.connection
                .send(ClientFrame::Unsubscribe {
                    channel: channel.to_string(),
                })
                .await;
        }
        tracing::debug!("unsubscribed from '{}'", channel);
    }

    pub async fn is_subscribed(&self, channel: &str) -> bool {
        self.channels.lock().await.contains_key(channel)
    }

    /// Registered channel keys, sorted for stable output.
    pub async fn channels(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.channels.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop every registration without telling the server (connection
    /// teardown path).
    pub async fn clear(&self) {
        self.channels.lock().await.clear();
    }

    /// Re-issue SUBSCRIBE for every registered channel. Called after a
    /// reconnect to restore parity without double-registering locally.
    pub async fn resubscribe_all(&self) {
        let keys: Vec<String> = self.channels.lock().await.keys().cloned().collect();
        for channel in keys {
            self.connection
                .send(ClientFrame::Subscribe {
                    channel: channel.clone(),
                })
                .await;
            tracing::debug!("re-subscribed to '{}'", channel);
        }
    }

    /// Fire-and-forget publish; silently dropped when not connected.
    pub async fn publish(&self, destination: &str, body: serde_json::Value) {
        if !self.connection.is_connected() {
            tracing::debug!("dropping publish to '{}': not connected", destination);
            return;
        }
        self.connection
            .send(ClientFrame::Send {
                destination: destination.to_string(),
                body,
            })
            .await;
    }

    /// Route one inbound frame to its channel's handler. Frames for unknown
    /// channels are dropped.
    pub async fn dispatch(&self, frame: ServerFrame) {
        let channels = self.channels.lock().await;
        match channels.get(&frame.channel) {
            Some(handler) => {
                if handler.send(frame.event).is_err() {
                    tracing::debug!("handler for '{}' is gone", frame.channel);
                }
            }
            None => {
                tracing::debug!("no subscription for '{}', dropping event", frame.channel);
            }
        }
    }
}
