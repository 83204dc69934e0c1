//! Shared utilities for the tsunagi realtime chat client.
//!
//! Holds the pieces that are useful to both the library crate and its
//! binaries: timestamp formatting and logging setup.

pub mod logger;
pub mod time;
