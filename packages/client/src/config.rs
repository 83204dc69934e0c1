//! Client configuration.

use std::time::Duration;

use crate::types::UserId;

/// Delay between reconnect attempts after a dropped connection.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Interval between outgoing liveness pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(4);
/// Inbound silence longer than this is treated as a dead connection.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10);
/// A typing indicator not refreshed within this window expires.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(3);
/// Local composer inactivity after which a "stopped typing" signal is sent.
pub const TYPING_IDLE: Duration = Duration::from_secs(1);

/// Configuration for one client session.
///
/// Created at session start with the session's bearer token and user
/// identity; the timing fields default to the production constants and are
/// only overridden by tests.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://host/ws`
    pub ws_url: String,
    /// REST API base, e.g. `http://host/api`
    pub api_url: String,
    /// Bearer token attached to the upgrade request and to REST calls
    pub token: String,
    /// The session user's id (used for the notification channel and
    /// self-typing suppression)
    pub user_id: UserId,
    /// The session user's display name (carried in typing signals)
    pub user_name: String,
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
    pub idle_timeout: Duration,
    pub typing_expiry: Duration,
    pub typing_idle: Duration,
}

impl ClientConfig {
    /// Create a configuration with the default timing constants.
    pub fn new(
        ws_url: impl Into<String>,
        api_url: impl Into<String>,
        token: impl Into<String>,
        user_id: UserId,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            api_url: api_url.into(),
            token: token.into(),
            user_id,
            user_name: user_name.into(),
            reconnect_delay: RECONNECT_DELAY,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            idle_timeout: IDLE_TIMEOUT,
            typing_expiry: TYPING_EXPIRY,
            typing_idle: TYPING_IDLE,
        }
    }
}
