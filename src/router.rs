//! Event router
//!
//! The single task through which every inbound frame flows. Each wire
//! event maps to exactly one handler: cache mutation first, then
//! resolution of any correlated request, then a normalized
//! notification for the dispatcher. Nothing else writes the roster
//! (the optimistic leave excepted).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::client::GatewayClient;
use crate::identity::{extract_mentions, Identity, Person, Room, RoomOccupant};
use crate::listener::{ChatListener, ChatMessage, Presence, Recipient};
use crate::roster::SharedRoster;
use crate::session::SessionHandle;
use crate::wire::{ClientEvent, Frame, MessageData, PresenceData, RoomData, RoomRef, ServerEvent};

/// Normalized event handed to the dispatcher
#[derive(Debug)]
pub enum Notification {
    /// The session became ready (first roster listing arrived)
    Connected,
    /// A message was posted in a room
    Message(ChatMessage),
    /// Someone's presence changed
    Presence(Person, Presence),
}

/// Routes inbound frames to cache mutations and notifications
pub struct EventRouter {
    roster: SharedRoster,
    session: SessionHandle,
    notify: mpsc::Sender<Notification>,
}

impl EventRouter {
    pub fn new(
        roster: SharedRoster,
        session: SessionHandle,
        notify: mpsc::Sender<Notification>,
    ) -> Self {
        Self {
            roster,
            session,
            notify,
        }
    }

    /// Drain the inbound frame stream until the transport closes
    ///
    /// On close, the connection state goes terminal and outstanding
    /// request slots are aborted so no caller waits on a dead socket.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Frame<ServerEvent>>) {
        info!("event router started");

        while let Some(frame) = inbound.recv().await {
            self.handle_frame(frame).await;
        }

        self.roster.write().fail();
        self.session.abort_pending();
        info!("event router stopped");
    }

    /// Process a single frame
    async fn handle_frame(&mut self, frame: Frame<ServerEvent>) {
        let Frame { id, event } = frame;

        self.apply(&event).await;

        // Cache effects land before the requester wakes up
        if let Some(id) = id {
            if !self.session.resolve(id, event) {
                debug!("reply with unknown correlation id {}", id);
            }
        }
    }

    async fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Identity(user) => self.on_identity(&user.username).await,
            ServerEvent::RoomList(rooms) => self.on_room_list(rooms).await,
            ServerEvent::RoomCreated(room) => self.on_room_created(room),
            ServerEvent::RoomArchived(room) => self.on_room_archived(room),
            ServerEvent::RoomUpdated(room) => self.on_room_updated(room),
            ServerEvent::JoinConfirmed(room) => self.on_join_confirmed(room),
            ServerEvent::UserJoined(presence) => {
                self.on_presence_change(presence, Presence::Online).await
            }
            ServerEvent::UserLeft(presence) => {
                self.on_presence_change(presence, Presence::Away).await
            }
            ServerEvent::MessageCreated(message) => self.on_message(message).await,
            // Reply-only events; no cache effect, resolved by id above
            ServerEvent::RoomUsers(_) | ServerEvent::UserList(_) => {}
        }
    }

    /// Identity confirmation: record who we are, then refresh the roster
    async fn on_identity(&mut self, username: &str) {
        info!("authenticated as {}", username);
        self.roster.write().set_identity(username);

        if let Err(e) = self.session.emit(ClientEvent::ListRooms).await {
            error!("failed to request roster listing: {}", e);
        }
    }

    /// Listing reply: replace the roster wholesale
    async fn on_room_list(&mut self, rooms: &[RoomData]) {
        let newly_connected = {
            let mut roster = self.roster.write();
            let was_connected = roster.is_connected();
            roster.replace(rooms.iter().cloned().map(Into::into).collect());
            !was_connected && roster.is_connected()
        };
        debug!("roster replaced with {} rooms", rooms.len());

        if newly_connected {
            self.send(Notification::Connected).await;
        }
    }

    fn on_room_created(&mut self, room: &RoomData) {
        debug!("room created: {}", room.slug);
        self.roster.write().insert(room.clone().into());
    }

    fn on_room_archived(&mut self, room: &RoomRef) {
        debug!("room archived: {}", room.id);
        self.roster.write().remove(&room.id);
    }

    fn on_room_updated(&mut self, room: &RoomData) {
        debug!("room updated: {}", room.id);
        self.roster
            .write()
            .patch(&room.id, room.name.clone(), room.description.clone());
    }

    fn on_join_confirmed(&mut self, room: &RoomData) {
        info!("joined {}", room.slug);
        self.roster.write().mark_joined(&room.id);
    }

    async fn on_presence_change(&mut self, presence: &PresenceData, status: Presence) {
        let person = Person::in_room(&presence.user.username, &presence.room.id);
        self.send(Notification::Presence(person, status)).await;
    }

    /// Message push: extract mentions, decide the recipient, notify
    ///
    /// The bot's own mention routes the message to the bot identity
    /// (directed path); everything else goes to the originating room.
    async fn on_message(&mut self, message: &MessageData) {
        let chat = {
            let roster = self.roster.read();
            let (body, mentions) = extract_mentions(&message.text, &roster);
            let sender = RoomOccupant::new(&message.owner.username, &message.room.id);

            let recipient = match roster.identity() {
                Some(bot) if mentions.iter().any(|m| m.username() == bot) => {
                    Recipient::Occupant(RoomOccupant::new(bot, &message.room.id))
                }
                _ => Recipient::Room(
                    Room::by_id(&message.room.id, &roster)
                        .unwrap_or_else(|_| Room::from_wire(&message.room.id)),
                ),
            };

            ChatMessage {
                sender,
                recipient,
                body,
                mentions,
            }
        };

        self.send(Notification::Message(chat)).await;
    }

    async fn send(&self, notification: Notification) {
        if self.notify.send(notification).await.is_err() {
            debug!("dispatcher gone, notification dropped");
        }
    }
}

/// Deliver notifications to the listener, in arrival order
///
/// Runs on its own task so a callback issuing blocking request/reply
/// calls never stalls the router draining the transport.
pub async fn dispatch(
    mut notifications: mpsc::Receiver<Notification>,
    listener: Arc<dyn ChatListener>,
    client: GatewayClient,
) {
    while let Some(notification) = notifications.recv().await {
        match notification {
            Notification::Connected => listener.on_connect(&client).await,
            Notification::Message(msg) => {
                listener.on_message(&client, &msg).await;
                if !msg.mentions.is_empty() {
                    listener.on_mention(&client, &msg, &msg.mentions).await;
                }
            }
            Notification::Presence(person, status) => {
                listener.on_presence(&client, &person, status).await
            }
        }
    }
    debug!("dispatcher ended");
}
