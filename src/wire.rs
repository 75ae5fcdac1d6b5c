//! Wire protocol definitions
//!
//! JSON-based bidirectional event protocol using Serde's tagged enums
//! for type-safe serialization/deserialization. Every frame is
//! `{"event": <name>, "data": <payload>}` with an optional `"id"`
//! correlation field that the server echoes back on replies.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frame envelope carrying one event in either direction
///
/// `id` is set on outbound requests that expect a reply; the matching
/// inbound frame carries the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<T> {
    /// Correlation id for request/reply traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// The event name and payload
    #[serde(flatten)]
    pub event: T,
}

impl<T> Frame<T> {
    /// Wrap an event with no correlation id (one-way traffic)
    pub fn event(event: T) -> Self {
        Self { id: None, event }
    }

    /// Wrap an event with a correlation id (request/reply traffic)
    pub fn request(id: Uuid, event: T) -> Self {
        Self { id: Some(id), event }
    }
}

/// Client → Server event
///
/// All events the gateway emits. Event names follow the server's
/// `namespace:action` convention.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Ask the server who this session is authenticated as
    #[serde(rename = "account:whoami")]
    WhoAmI,
    /// Request the full room roster
    #[serde(rename = "rooms:list")]
    ListRooms,
    /// Post a message into a room
    #[serde(rename = "messages:create")]
    CreateMessage(MessageDraft),
    /// Join a room by id
    #[serde(rename = "rooms:join")]
    JoinRoom { id: String },
    /// Leave a room by id
    #[serde(rename = "rooms:leave")]
    LeaveRoom { id: String },
    /// Create a new room with the given slug
    #[serde(rename = "rooms:create")]
    CreateRoom { slug: String },
    /// Archive a room by id
    #[serde(rename = "rooms:archive")]
    ArchiveRoom { id: String },
    /// Rename a room
    #[serde(rename = "rooms:update")]
    UpdateRoom { id: String, name: String },
    /// Request the member list of a room
    #[serde(rename = "rooms:users")]
    RoomUsers { id: String },
    /// Request the server-wide user list
    #[serde(rename = "users:list")]
    ListUsers,
}

/// Server → Client event
///
/// Replies reuse the event name of the request that triggered them;
/// pushes arrive without a correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Identity confirmation for the authenticated session
    #[serde(rename = "account:whoami")]
    Identity(UserData),
    /// Full roster listing reply
    #[serde(rename = "rooms:list")]
    RoomList(Vec<RoomData>),
    /// A room was created (push, or reply to `rooms:create`)
    #[serde(rename = "rooms:new")]
    RoomCreated(RoomData),
    /// A room was archived
    #[serde(rename = "rooms:archived")]
    RoomArchived(RoomRef),
    /// A room's fields changed
    #[serde(rename = "rooms:updated")]
    RoomUpdated(RoomData),
    /// Confirmation that this session joined a room
    #[serde(rename = "rooms:join")]
    JoinConfirmed(RoomData),
    /// A user entered a room
    #[serde(rename = "users:join")]
    UserJoined(PresenceData),
    /// A user left a room
    #[serde(rename = "users:leave")]
    UserLeft(PresenceData),
    /// A message was posted
    #[serde(rename = "messages:new")]
    MessageCreated(MessageData),
    /// Member list reply for one room
    #[serde(rename = "rooms:users")]
    RoomUsers(Vec<UserData>),
    /// Server-wide user list reply
    #[serde(rename = "users:list")]
    UserList(Vec<UserData>),
}

/// Outbound message payload: `{room: <room-id>, text: <string>}`
#[derive(Debug, Clone, Serialize)]
pub struct MessageDraft {
    /// Target room id
    pub room: String,
    /// Message body
    pub text: String,
}

/// Room as described by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomData {
    pub id: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Bare room reference inside event payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRef {
    pub id: String,
}

/// User as described by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub username: String,
}

/// Payload of the `users:join` / `users:leave` presence pushes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceData {
    pub room: RoomRef,
    pub user: UserData,
}

/// Payload of the `messages:new` push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub room: RoomRef,
    pub owner: UserData,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_serialize() {
        let frame = Frame::event(ClientEvent::CreateMessage(MessageDraft {
            room: "r1".to_string(),
            text: "hello".to_string(),
        }));
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"event\":\"messages:create\""));
        assert!(json.contains("\"room\":\"r1\""));
        assert!(json.contains("\"text\":\"hello\""));
        // One-way frames carry no correlation id
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_unit_variant_serializes_without_data() {
        let json = serde_json::to_string(&Frame::event(ClientEvent::WhoAmI)).unwrap();
        assert_eq!(json, "{\"event\":\"account:whoami\"}");
    }

    #[test]
    fn test_request_frame_carries_id() {
        let id = Uuid::new_v4();
        let frame = Frame::request(id, ClientEvent::ListUsers);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(&id.to_string()));
    }

    #[test]
    fn test_server_event_deserialize() {
        let json = r#"{"event":"messages:new","data":{"room":{"id":"r1"},"owner":{"username":"alice"},"text":"hi"}}"#;
        let frame: Frame<ServerEvent> = serde_json::from_str(json).unwrap();
        assert!(frame.id.is_none());
        match frame.event {
            ServerEvent::MessageCreated(msg) => {
                assert_eq!(msg.room.id, "r1");
                assert_eq!(msg.owner.username, "alice");
                assert_eq!(msg.text, "hi");
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_reply_frame_round_trips_id() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"event":"users:list","id":"{}","data":[{{"username":"bob"}}]}}"#,
            id
        );
        let frame: Frame<ServerEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(frame.id, Some(id));
        assert_eq!(
            frame.event,
            ServerEvent::UserList(vec![UserData {
                username: "bob".to_string()
            }])
        );
    }

    #[test]
    fn test_unknown_payload_fields_are_ignored() {
        // Servers send richer room objects than the mirror keeps
        let json = r#"{"event":"rooms:archived","data":{"id":"r2","slug":"old","owner":"u9","lastActive":"yesterday"}}"#;
        let frame: Frame<ServerEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(frame.event, ServerEvent::RoomArchived(RoomRef { id: "r2".to_string() }));
    }

    #[test]
    fn test_room_data_optional_fields() {
        let json = r#"{"event":"rooms:new","data":{"id":"r3","slug":"dev"}}"#;
        let frame: Frame<ServerEvent> = serde_json::from_str(json).unwrap();
        match frame.event {
            ServerEvent::RoomCreated(room) => {
                assert_eq!(room.slug, "dev");
                assert!(room.name.is_none());
                assert!(room.description.is_none());
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }
}
