//! Room-chat gateway client library
//!
//! A stateful client that bridges a WebSocket room-chat server to a
//! generic bot-callback model: it keeps a live mirror of the
//! server-pushed room state, exposes synchronous-looking room and
//! roster operations over the asynchronous transport, and normalizes
//! inbound events into messages, mentions and presence changes.
//!
//! # Architecture
//! Four cooperating tasks around shared state:
//! - a write task draining outbound frames to the socket
//! - a read task parsing inbound frames
//! - the event router, sole writer of the [`roster::Roster`] mirror,
//!   which also resolves correlated request/reply futures
//! - a dispatcher delivering normalized events to the
//!   [`ChatListener`] in order
//!
//! Blocking request/reply calls (`list_room_members`, `list_all_users`)
//! are futures resolved by the router task, so they are safe to issue
//! from listener callbacks.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use parlor::{serve, ChatListener, Config};
//!
//! struct Quiet;
//!
//! #[async_trait]
//! impl ChatListener for Quiet {}
//!
//! #[tokio::main]
//! async fn main() -> Result<(), parlor::GatewayError> {
//!     let config = Config::from_env()?;
//!     serve(&config, Arc::new(Quiet)).await
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod listener;
pub mod roster;
pub mod router;
pub mod session;
pub mod wire;

// Re-export main types for convenience
pub use client::{serve, GatewayClient};
pub use config::Config;
pub use error::{ConfigError, GatewayError};
pub use identity::{
    extract_mentions, resolve_identifier, Identifier, Identity, Person, Room, RoomOccupant,
};
pub use listener::{ChatListener, ChatMessage, Presence, Recipient};
pub use roster::{ConnectionState, Roster, SharedRoster};
pub use session::SessionHandle;
