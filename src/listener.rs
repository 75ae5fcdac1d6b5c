//! Callback seam toward the bot framework
//!
//! The gateway normalizes wire events into [`ChatMessage`] and
//! presence changes, then hands them to whatever implements
//! [`ChatListener`]. Implementations get a [`GatewayClient`] reference
//! so replies can flow straight back out.

use async_trait::async_trait;

use crate::client::GatewayClient;
use crate::identity::{Identifier, Person, Room, RoomOccupant};

/// Presence of a person in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The person entered a room
    Online,
    /// The person left a room
    Away,
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Presence::Online => write!(f, "online"),
            Presence::Away => write!(f, "away"),
        }
    }
}

/// Where a normalized message was addressed
#[derive(Debug, Clone, PartialEq)]
pub enum Recipient {
    /// Directed at a specific occupant (the bot, on the mention path)
    Occupant(RoomOccupant),
    /// Broadcast to the originating room
    Room(Room),
}

/// A normalized inbound message
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Who sent it, scoped to the room it arrived in
    pub sender: RoomOccupant,
    /// The bot's identity when mentioned, the room otherwise
    pub recipient: Recipient,
    /// Message body with mentions rewritten to canonical form
    pub body: String,
    /// Mentions extracted from the body, in order
    pub mentions: Vec<Identifier>,
}

impl ChatMessage {
    /// Whether this message was directed at the bot
    pub fn is_directed(&self) -> bool {
        matches!(self.recipient, Recipient::Occupant(_))
    }

    /// Id of the room the message arrived in
    pub fn room_id(&self) -> &str {
        self.sender.room_id()
    }
}

/// Callbacks the gateway invokes on the bot-framework collaborator
///
/// All methods default to no-ops; implement the ones you care about.
/// Callbacks run on a dispatcher task, in arrival order, so an
/// implementation may freely issue blocking gateway calls (including
/// the request/reply operations) without stalling event delivery.
#[async_trait]
pub trait ChatListener: Send + Sync {
    /// The session became ready (first roster received)
    async fn on_connect(&self, _client: &GatewayClient) {}

    /// The session is going away
    async fn on_disconnect(&self, _client: &GatewayClient) {}

    /// A message arrived in a room
    async fn on_message(&self, _client: &GatewayClient, _msg: &ChatMessage) {}

    /// A message carrying mentions arrived; fires after `on_message`
    async fn on_mention(
        &self,
        _client: &GatewayClient,
        _msg: &ChatMessage,
        _mentions: &[Identifier],
    ) {
    }

    /// Someone entered or left a room
    async fn on_presence(&self, _client: &GatewayClient, _person: &Person, _status: Presence) {}
}
