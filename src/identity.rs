//! Identity model
//!
//! Value types for a person, a room, and a person-scoped-to-a-room,
//! plus resolution of textual references like `@alice` and
//! `@alice#general` against the roster.

use std::fmt;

use regex::Regex;
use tracing::debug;

use crate::error::GatewayError;
use crate::roster::Roster;

/// Common surface of the identity value types
pub trait Identity {
    /// The bare username
    fn username(&self) -> &str;

    /// Canonical mention rendering, `@username`
    fn mention(&self) -> String {
        format!("@{}", self.username())
    }
}

/// A chat participant, independent of room context
///
/// Two persons are equal when their usernames match; any room context
/// is ignored.
#[derive(Debug, Clone)]
pub struct Person {
    username: String,
    room_id: Option<String>,
}

impl Person {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            room_id: None,
        }
    }

    /// A person carrying the room they were last seen in
    pub fn in_room(username: &str, room_id: &str) -> Self {
        Self {
            username: username.to_string(),
            room_id: Some(room_id.to_string()),
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }
}

impl Identity for Person {
    fn username(&self) -> &str {
        &self.username
    }
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Eq for Person {}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.username)
    }
}

/// A person scoped to a specific room
///
/// Equality requires both the username and the room id. The room
/// itself is derived on demand, never owned.
#[derive(Debug, Clone)]
pub struct RoomOccupant {
    username: String,
    room_id: String,
}

impl RoomOccupant {
    pub fn new(username: &str, room_id: &str) -> Self {
        Self {
            username: username.to_string(),
            room_id: room_id.to_string(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Resolve the occupant's room via the roster (weak reference:
    /// None once the room has been archived)
    pub fn room(&self, roster: &Roster) -> Option<Room> {
        Room::by_id(&self.room_id, roster).ok()
    }

    /// Drop the room scope
    pub fn person(&self) -> Person {
        Person::in_room(&self.username, &self.room_id)
    }
}

impl Identity for RoomOccupant {
    fn username(&self) -> &str {
        &self.username
    }
}

impl PartialEq for RoomOccupant {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username && self.room_id == other.room_id
    }
}

impl Eq for RoomOccupant {}

impl fmt::Display for RoomOccupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}#{}", self.username, self.room_id)
    }
}

/// A room known to the session
///
/// Constructed from one anchor (slug or id); the other side is
/// resolved from the roster at construction. Equality is structural
/// on the id.
#[derive(Debug, Clone)]
pub struct Room {
    id: String,
    slug: Option<String>,
    name: Option<String>,
}

impl Room {
    /// Resolve a room by slug. Fails when the slug is not in the roster.
    pub fn by_slug(slug: &str, roster: &Roster) -> Result<Self, GatewayError> {
        let entry = roster
            .find_by_slug(slug)
            .ok_or_else(|| GatewayError::RoomDoesNotExist(slug.to_string()))?;
        Ok(Self {
            id: entry.id.clone(),
            slug: Some(entry.slug.clone()),
            name: entry.name.clone(),
        })
    }

    /// Resolve a room by id. Fails when the id is not in the roster.
    pub fn by_id(id: &str, roster: &Roster) -> Result<Self, GatewayError> {
        let entry = roster
            .find_by_id(id)
            .ok_or_else(|| GatewayError::RoomDoesNotExist(id.to_string()))?;
        Ok(Self {
            id: entry.id.clone(),
            slug: Some(entry.slug.clone()),
            name: entry.name.clone(),
        })
    }

    /// Fallback for rooms referenced by events but absent from the
    /// roster: id only, nothing derived.
    pub fn from_wire(id: &str) -> Self {
        Self {
            id: id.to_string(),
            slug: None,
            name: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for Room {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Room {}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slug {
            Some(slug) => write!(f, "#{}", slug),
            None => write!(f, "#{}", self.id),
        }
    }
}

/// A resolved textual reference: either a bare person or an occupant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Person(Person),
    Occupant(RoomOccupant),
}

impl Identity for Identifier {
    fn username(&self) -> &str {
        match self {
            Identifier::Person(p) => p.username(),
            Identifier::Occupant(o) => o.username(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Person(p) => write!(f, "{}", p),
            Identifier::Occupant(o) => write!(f, "{}", o),
        }
    }
}

/// Parse a textual reference into an identity
///
/// `@name` is a bare person; `@name#slug` is an occupant of the room
/// with that slug (the roster must know it). Anything else is
/// unrecognized.
pub fn resolve_identifier(text: &str, roster: &Roster) -> Result<Identifier, GatewayError> {
    let text = text.trim();

    if text.contains('#') {
        let (user_part, slug) = match text.split_once('#') {
            Some(parts) => parts,
            None => return Err(GatewayError::UnrecognizedIdentifier(text.to_string())),
        };
        let username = match user_part.strip_prefix('@') {
            Some(name) if !name.is_empty() && !slug.is_empty() => name,
            _ => return Err(GatewayError::UnrecognizedIdentifier(text.to_string())),
        };
        let entry = roster
            .find_by_slug(slug)
            .ok_or_else(|| GatewayError::RoomDoesNotExist(slug.to_string()))?;
        return Ok(Identifier::Occupant(RoomOccupant::new(username, &entry.id)));
    }

    if let Some(name) = text.strip_prefix('@') {
        if !name.is_empty() {
            return Ok(Identifier::Person(Person::new(name)));
        }
    }

    Err(GatewayError::UnrecognizedIdentifier(text.to_string()))
}

/// Scan free-form text for mentions and resolve them
///
/// Each `@name` or `@name#slug` token is resolved independently;
/// failures are swallowed per token and the literal text kept.
/// Recognized tokens are rewritten to the canonical `@username` form.
/// Returns the rewritten text and the resolved identities in order,
/// duplicates preserved.
pub fn extract_mentions(text: &str, roster: &Roster) -> (String, Vec<Identifier>) {
    let Ok(pattern) = Regex::new(r"@[A-Za-z0-9]+(?:#[A-Za-z0-9][A-Za-z0-9_-]*)?") else {
        return (text.to_string(), Vec::new());
    };

    let mut mentioned = Vec::new();
    let mut rewritten = String::with_capacity(text.len());
    let mut last_end = 0;

    for token in pattern.find_iter(text) {
        rewritten.push_str(&text[last_end..token.start()]);
        match resolve_identifier(token.as_str(), roster) {
            Ok(identifier) => {
                rewritten.push_str(&identifier.mention());
                mentioned.push(identifier);
            }
            Err(e) => {
                debug!("skipping mention token '{}': {}", token.as_str(), e);
                rewritten.push_str(token.as_str());
            }
        }
        last_end = token.end();
    }
    rewritten.push_str(&text[last_end..]);

    (rewritten, mentioned)
}
