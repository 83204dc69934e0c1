//! Error types for the realtime client.

use thiserror::Error;

/// Errors surfaced across the realtime client's public API.
///
/// Transport drops are not represented here: the connection recovers on its
/// own and only exposes `connected = false` while it does. Everything in this
/// enum is a caller-visible failure of a caller-initiated operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The operation requires a live connection and there is none.
    /// The caller is expected to retry after the next connect.
    #[error("not connected")]
    NotConnected,

    /// Connection-level failure description.
    #[error("connection error: {0}")]
    Connection(String),

    /// A REST round-trip failed; local state was left unchanged.
    #[error("request failed: {0}")]
    Rest(#[from] reqwest::Error),
}
