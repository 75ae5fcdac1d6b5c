//! Gateway client façade
//!
//! Combines the transport session and the roster into the surface the
//! bot framework drives: room operations, message sends, roster
//! queries, and the serve lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::GatewayError;
use crate::identity::{Identity, Person, Room, RoomOccupant};
use crate::listener::{ChatListener, ChatMessage, Recipient};
use crate::roster::{ConnectionState, SharedRoster};
use crate::router::{dispatch, EventRouter, Notification};
use crate::session::{self, SessionHandle};
use crate::wire::{ClientEvent, MessageDraft, ServerEvent};

/// How often the serve loop re-checks readiness
const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Buffer size for the notification channel
const NOTIFY_BUFFER_SIZE: usize = 64;

/// The stateful gateway client
///
/// Cheap to clone; all clones share the session and the roster.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    session: SessionHandle,
    roster: SharedRoster,
}

impl GatewayClient {
    pub fn new(session: SessionHandle, roster: SharedRoster) -> Self {
        Self { session, roster }
    }

    /// Block until the session is ready
    ///
    /// Re-polls the connection state at `poll` intervals until the
    /// first roster listing lands, or fails once the transport is gone.
    pub async fn wait_ready(&self, poll: Duration) -> Result<(), GatewayError> {
        loop {
            {
                let roster = self.roster.read();
                if roster.is_connected() {
                    return Ok(());
                }
                if roster.state() == ConnectionState::Failed {
                    return Err(GatewayError::ConnectionFailed);
                }
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Post a message into a room
    ///
    /// Best-effort: transport failures are logged and never surface to
    /// the caller. No acknowledgement is awaited.
    pub async fn send_message(&self, room_id: &str, text: &str) {
        let draft = MessageDraft {
            room: room_id.to_string(),
            text: text.to_string(),
        };
        if let Err(e) = self.session.emit(ClientEvent::CreateMessage(draft)).await {
            error!("failed to send message to {}: {}", room_id, e);
        }
    }

    /// Reply to a normalized message
    ///
    /// The reply lands in the sender's room. Replies to broadcast
    /// (room-addressed) messages are prefixed with the sender's
    /// mention so they read as addressed in the group.
    pub async fn reply(&self, msg: &ChatMessage, text: &str) {
        let body = match &msg.recipient {
            Recipient::Room(_) => format!("{} {}", msg.sender.mention(), text),
            Recipient::Occupant(_) => text.to_string(),
        };
        self.send_message(msg.room_id(), &body).await;
    }

    /// Ask to join a room
    ///
    /// Fire-and-forget: the joined set is updated only when the
    /// server's confirmation flows through the event router.
    pub async fn join_room(&self, room_id: &str) -> Result<(), GatewayError> {
        self.session
            .emit(ClientEvent::JoinRoom {
                id: room_id.to_string(),
            })
            .await
            .map_err(|e| GatewayError::Room(format!("join {}: {}", room_id, e)))
    }

    /// Leave a room
    ///
    /// The membership is dropped locally before the wire call goes
    /// out; leave is assumed to always succeed. (Deliberately
    /// asymmetric with `join_room`, which waits for confirmation.)
    pub async fn leave_room(&self, room_id: &str) -> Result<(), GatewayError> {
        self.roster.write().leave(room_id);
        self.session
            .emit(ClientEvent::LeaveRoom {
                id: room_id.to_string(),
            })
            .await
            .map_err(|e| GatewayError::Room(format!("leave {}: {}", room_id, e)))
    }

    /// Create a room with the given slug
    pub async fn create_room(&self, slug: &str) -> Result<(), GatewayError> {
        self.session
            .emit(ClientEvent::CreateRoom {
                slug: slug.to_string(),
            })
            .await
            .map_err(|e| GatewayError::Room(format!("create {}: {}", slug, e)))
    }

    /// Archive a room already present in the roster
    ///
    /// Unknown ids are a logged no-op; nothing goes on the wire.
    pub async fn archive_room(&self, room_id: &str) -> Result<(), GatewayError> {
        if self.roster.read().find_by_id(room_id).is_none() {
            debug!("archive of unknown room {} skipped", room_id);
            return Ok(());
        }
        self.session
            .emit(ClientEvent::ArchiveRoom {
                id: room_id.to_string(),
            })
            .await
            .map_err(|e| GatewayError::Room(format!("archive {}: {}", room_id, e)))
    }

    /// Rename a room already present in the roster
    ///
    /// Unknown ids are a logged no-op; nothing goes on the wire.
    pub async fn rename_room(&self, room_id: &str, name: &str) -> Result<(), GatewayError> {
        if self.roster.read().find_by_id(room_id).is_none() {
            debug!("rename of unknown room {} skipped", room_id);
            return Ok(());
        }
        self.session
            .emit(ClientEvent::UpdateRoom {
                id: room_id.to_string(),
                name: name.to_string(),
            })
            .await
            .map_err(|e| GatewayError::Room(format!("rename {}: {}", room_id, e)))
    }

    /// Fetch the member list of a room
    ///
    /// Awaits the server's correlated reply with no timeout; a server
    /// that never acknowledges leaves the caller waiting forever.
    pub async fn list_room_members(
        &self,
        room_id: &str,
    ) -> Result<Vec<RoomOccupant>, GatewayError> {
        let reply = self
            .session
            .request(ClientEvent::RoomUsers {
                id: room_id.to_string(),
            })
            .await?;
        match reply {
            ServerEvent::RoomUsers(users) => Ok(users
                .into_iter()
                .map(|u| RoomOccupant::new(&u.username, room_id))
                .collect()),
            other => Err(GatewayError::Protocol(format!(
                "expected rooms:users reply, got {:?}",
                other
            ))),
        }
    }

    /// Fetch the server-wide user list
    ///
    /// Awaits the server's correlated reply with no timeout; a server
    /// that never acknowledges leaves the caller waiting forever.
    pub async fn list_all_users(&self) -> Result<Vec<Person>, GatewayError> {
        let reply = self.session.request(ClientEvent::ListUsers).await?;
        match reply {
            ServerEvent::UserList(users) => {
                Ok(users.into_iter().map(|u| Person::new(&u.username)).collect())
            }
            other => Err(GatewayError::Protocol(format!(
                "expected users:list reply, got {:?}",
                other
            ))),
        }
    }

    /// Look a user up by name in the server-wide list
    pub async fn find_user(&self, username: &str) -> Result<Person, GatewayError> {
        self.list_all_users()
            .await?
            .into_iter()
            .find(|p| p.username() == username)
            .ok_or_else(|| GatewayError::UserDoesNotExist(username.to_string()))
    }

    /// Resolve a room by slug against the roster
    pub fn room_by_slug(&self, slug: &str) -> Result<Room, GatewayError> {
        Room::by_slug(slug, &self.roster.read())
    }

    /// Resolve a room by id against the roster
    pub fn room_by_id(&self, id: &str) -> Result<Room, GatewayError> {
        Room::by_id(id, &self.roster.read())
    }

    /// Ids of the rooms this session has joined
    pub fn list_joined(&self) -> Vec<String> {
        self.roster.read().list_joined()
    }

    pub fn is_connected(&self) -> bool {
        self.roster.read().is_connected()
    }

    /// The authenticated identity, once the server has confirmed it
    pub fn identity(&self) -> Option<Person> {
        self.roster.read().identity().map(Person::new)
    }

    /// Join every configured room, resolving slugs via the roster
    async fn join_configured_rooms(&self, slugs: &[String]) {
        for slug in slugs {
            match self.room_by_slug(slug) {
                Ok(room) => {
                    if let Err(e) = self.join_room(room.id()).await {
                        warn!("could not join {}: {}", slug, e);
                    }
                }
                Err(e) => warn!("could not join {}: {}", slug, e),
            }
        }
    }
}

/// Run the gateway until interrupted or disconnected
///
/// Connects, spawns the router and dispatcher, waits for readiness,
/// joins the configured rooms, then blocks until ctrl-c or the
/// transport closes. The listener's `on_disconnect` fires during
/// teardown either way.
pub async fn serve(config: &Config, listener: Arc<dyn ChatListener>) -> Result<(), GatewayError> {
    let (session, inbound) = session::connect(config).await?;
    let roster = SharedRoster::new();
    let client = GatewayClient::new(session.clone(), roster.clone());

    let (note_tx, note_rx) = mpsc::channel::<Notification>(NOTIFY_BUFFER_SIZE);
    let dispatcher = tokio::spawn(dispatch(note_rx, Arc::clone(&listener), client.clone()));
    let router = EventRouter::new(roster, session, note_tx);
    let mut router_task = tokio::spawn(router.run(inbound));

    let ready = client.wait_ready(READY_POLL_INTERVAL).await;
    let result = match ready {
        Ok(()) => {
            client.join_configured_rooms(&config.rooms).await;
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                }
                _ = &mut router_task => {
                    warn!("server connection closed");
                }
            }
            Ok(())
        }
        Err(e) => {
            error!("session never became ready: {}", e);
            Err(e)
        }
    };

    listener.on_disconnect(&client).await;

    router_task.abort();
    dispatcher.abort();
    info!("gateway shut down");

    result
}
