//! Realtime client for the storefront chat and notification backend.
//!
//! One persistent WebSocket per session carries every realtime concern:
//! room messages, typing indicators, user notifications, and presence.
//! [`RealtimeClient`] is the facade; the modules underneath are usable on
//! their own (the connection manager, the subscription registry, and the
//! per-concern stores).

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod notifications;
pub mod presence;
pub mod rest;
pub mod subscription;
pub mod types;
pub mod typing;
pub mod wire;

pub use client::RealtimeClient;
pub use config::ClientConfig;
pub use error::ClientError;
