//! Server state cache
//!
//! In-memory mirror of the room/membership state the server pushes at
//! us. The event router is the only writer apart from the optimistic
//! removal in `leave_room`; everyone else gets synchronous reads that
//! never touch the wire.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::wire::RoomData;

/// Lifecycle of the session's connection
///
/// Transitions are monotonic: `Connecting -> Connected` on the first
/// roster listing, `-> Failed` once and for all when the transport dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Failed,
}

/// One mirrored room
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEntry {
    pub id: String,
    pub slug: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl From<RoomData> for RoomEntry {
    fn from(data: RoomData) -> Self {
        Self {
            id: data.id,
            slug: data.slug,
            name: data.name,
            description: data.description,
        }
    }
}

/// The mirrored server state
///
/// Rooms are keyed by id, so the roster cannot hold duplicate ids.
/// Archived rooms are removed outright, never flagged. The joined set
/// is always a subset of the roster keys.
#[derive(Debug)]
pub struct Roster {
    rooms: HashMap<String, RoomEntry>,
    joined: HashSet<String>,
    identity: Option<String>,
    state: ConnectionState,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            joined: HashSet::new(),
            identity: None,
            state: ConnectionState::Connecting,
        }
    }

    /// Record the authenticated username. The first write wins.
    pub fn set_identity(&mut self, username: &str) {
        if self.identity.is_none() {
            self.identity = Some(username.to_string());
        }
    }

    /// The authenticated username, once confirmed
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Replace the entire roster from a listing reply
    ///
    /// Clears and repopulates atomically from the caller's point of
    /// view (done under the write lock). Joined ids that no longer
    /// exist are pruned. The first listing marks the session connected.
    pub fn replace(&mut self, entries: Vec<RoomEntry>) {
        self.rooms = entries.into_iter().map(|e| (e.id.clone(), e)).collect();
        let rooms = &self.rooms;
        self.joined.retain(|id| rooms.contains_key(id));
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
        }
    }

    /// Idempotent insert: a room already known by id is left untouched
    pub fn insert(&mut self, entry: RoomEntry) {
        self.rooms.entry(entry.id.clone()).or_insert(entry);
    }

    /// Drop a room (archive). No-op when the id is unknown.
    pub fn remove(&mut self, id: &str) {
        self.rooms.remove(id);
        self.joined.remove(id);
    }

    /// Patch the name/description of a room. No-op when the id is unknown.
    pub fn patch(&mut self, id: &str, name: Option<String>, description: Option<String>) {
        if let Some(entry) = self.rooms.get_mut(id) {
            entry.name = name;
            entry.description = description;
        }
    }

    /// Record a confirmed join
    ///
    /// A confirmation for a room missing from the roster is silently
    /// dropped, keeping the joined set a subset of the roster.
    pub fn mark_joined(&mut self, id: &str) {
        if self.rooms.contains_key(id) {
            self.joined.insert(id.to_string());
        } else {
            debug!("join confirmation for unknown room {}, dropped", id);
        }
    }

    /// Forget a membership (the optimistic half of leave)
    pub fn leave(&mut self, id: &str) {
        self.joined.remove(id);
    }

    pub fn find_by_id(&self, id: &str) -> Option<&RoomEntry> {
        self.rooms.get(id)
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&RoomEntry> {
        self.rooms.values().find(|e| e.slug == slug)
    }

    /// Ids of the rooms this session has joined
    pub fn list_joined(&self) -> Vec<String> {
        self.joined.iter().cloned().collect()
    }

    pub fn is_joined(&self, id: &str) -> bool {
        self.joined.contains(id)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Mark the connection dead. Terminal: the state never leaves Failed.
    pub fn fail(&mut self) {
        self.state = ConnectionState::Failed;
    }
}

/// Shared, lock-guarded handle to the roster
///
/// Read guards give the synchronous query surface; the write guard is
/// taken by the router task and by the optimistic leave.
#[derive(Debug, Clone, Default)]
pub struct SharedRoster(Arc<RwLock<Roster>>);

impl SharedRoster {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(Roster::new())))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Roster> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Roster> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, slug: &str) -> RoomEntry {
        RoomEntry {
            id: id.to_string(),
            slug: slug.to_string(),
            name: None,
            description: None,
        }
    }

    #[test]
    fn test_new_roster_is_connecting_and_empty() {
        let roster = Roster::new();
        assert_eq!(roster.state(), ConnectionState::Connecting);
        assert!(!roster.is_connected());
        assert!(roster.list_joined().is_empty());
        assert!(roster.identity().is_none());
    }

    #[test]
    fn test_first_listing_marks_connected() {
        let mut roster = Roster::new();
        roster.replace(vec![entry("1", "general"), entry("2", "random")]);
        assert!(roster.is_connected());
        assert!(roster.find_by_id("1").is_some());
        assert!(roster.find_by_slug("random").is_some());
        // Joined set stays empty until confirmations arrive
        assert!(roster.list_joined().is_empty());
    }

    #[test]
    fn test_replace_swaps_roster_wholesale() {
        let mut roster = Roster::new();
        roster.replace(vec![entry("1", "general")]);
        roster.mark_joined("1");
        roster.replace(vec![entry("2", "random")]);
        assert!(roster.find_by_id("1").is_none());
        assert!(roster.find_by_id("2").is_some());
        // Memberships of vanished rooms are pruned
        assert!(roster.list_joined().is_empty());
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut roster = Roster::new();
        roster.insert(entry("1", "general"));
        let mut renamed = entry("1", "general");
        renamed.name = Some("General".to_string());
        roster.insert(renamed);
        assert_eq!(roster.find_by_id("1").map(|e| e.name.clone()), Some(None));
    }

    #[test]
    fn test_remove_drops_room_and_membership() {
        let mut roster = Roster::new();
        roster.replace(vec![entry("1", "general")]);
        roster.mark_joined("1");
        roster.remove("1");
        assert!(roster.find_by_id("1").is_none());
        assert!(roster.find_by_slug("general").is_none());
        assert!(!roster.is_joined("1"));
        // Removing again is a no-op
        roster.remove("1");
    }

    #[test]
    fn test_patch_updates_known_room_only() {
        let mut roster = Roster::new();
        roster.replace(vec![entry("1", "general")]);
        roster.patch("1", Some("General".to_string()), Some("main room".to_string()));
        let room = roster.find_by_id("1").unwrap();
        assert_eq!(room.name.as_deref(), Some("General"));
        assert_eq!(room.description.as_deref(), Some("main room"));
        // Unknown id: silently ignored
        roster.patch("9", Some("ghost".to_string()), None);
        assert!(roster.find_by_id("9").is_none());
    }

    #[test]
    fn test_join_of_unknown_room_is_dropped() {
        let mut roster = Roster::new();
        roster.replace(vec![entry("1", "general")]);
        roster.mark_joined("9");
        assert!(roster.list_joined().is_empty());
        roster.mark_joined("1");
        assert_eq!(roster.list_joined(), vec!["1".to_string()]);
    }

    #[test]
    fn test_leave_is_unconditional() {
        let mut roster = Roster::new();
        roster.replace(vec![entry("1", "general")]);
        roster.mark_joined("1");
        roster.leave("1");
        assert!(!roster.is_joined("1"));
        // Leaving a room we never joined is fine
        roster.leave("1");
    }

    #[test]
    fn test_identity_first_write_wins() {
        let mut roster = Roster::new();
        roster.set_identity("bot");
        roster.set_identity("impostor");
        assert_eq!(roster.identity(), Some("bot"));
    }

    #[test]
    fn test_failed_state_is_terminal() {
        let mut roster = Roster::new();
        roster.fail();
        assert_eq!(roster.state(), ConnectionState::Failed);
        // A late listing reply cannot resurrect the session
        roster.replace(vec![entry("1", "general")]);
        assert_eq!(roster.state(), ConnectionState::Failed);
        assert!(!roster.is_connected());
    }

    #[test]
    fn test_shared_roster_read_write() {
        let shared = SharedRoster::new();
        shared.write().replace(vec![entry("1", "general")]);
        assert!(shared.read().is_connected());
    }
}
