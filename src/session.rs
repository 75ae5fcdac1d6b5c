//! Transport session
//!
//! Owns the WebSocket connection to the chat server: a write task
//! draining outbound frames and a read task parsing inbound frames.
//! `SessionHandle` is the cheap, cloneable surface the rest of the
//! gateway emits through.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::GatewayError;
use crate::wire::{ClientEvent, Frame, ServerEvent};

/// Buffer size for the outbound and inbound frame channels
const CHANNEL_BUFFER_SIZE: usize = 64;

type PendingMap = HashMap<Uuid, oneshot::Sender<ServerEvent>>;

/// Handle for emitting frames and issuing correlated requests
#[derive(Debug, Clone)]
pub struct SessionHandle {
    out_tx: mpsc::Sender<Frame<ClientEvent>>,
    pending: Arc<Mutex<PendingMap>>,
}

impl SessionHandle {
    /// Build a handle around an outbound frame channel
    ///
    /// `connect` wires this to a real socket; tests hand it a bare
    /// channel and inspect the frames themselves.
    pub fn new(out_tx: mpsc::Sender<Frame<ClientEvent>>) -> Self {
        Self {
            out_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Emit a one-way event
    pub async fn emit(&self, event: ClientEvent) -> Result<(), GatewayError> {
        self.out_tx
            .send(Frame::event(event))
            .await
            .map_err(|_| GatewayError::ChannelClosed)
    }

    /// Emit a request and await its correlated reply
    ///
    /// Blocks until the server echoes the correlation id back. There is
    /// no timeout: a server that never acknowledges leaves the caller
    /// waiting forever.
    pub async fn request(&self, event: ClientEvent) -> Result<ServerEvent, GatewayError> {
        let id = Uuid::new_v4();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.lock_pending().insert(id, reply_tx);

        if self.out_tx.send(Frame::request(id, event)).await.is_err() {
            self.lock_pending().remove(&id);
            return Err(GatewayError::ChannelClosed);
        }

        reply_rx.await.map_err(|_| GatewayError::ChannelClosed)
    }

    /// Complete the pending request matching this correlation id
    ///
    /// Returns false when no request is waiting on the id (already
    /// resolved, or the server invented one).
    pub(crate) fn resolve(&self, id: Uuid, event: ServerEvent) -> bool {
        match self.lock_pending().remove(&id) {
            Some(reply_tx) => reply_tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Drop all outstanding request slots, waking their callers with
    /// an error. Called on teardown.
    pub(crate) fn abort_pending(&self) {
        self.lock_pending().clear();
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Establish the WebSocket session
///
/// Connects to the configured endpoint, spawns the write and read
/// tasks, and emits the identity query. Returns the handle plus the
/// inbound frame stream for the event router. Failure to establish
/// the transport is terminal; there is no automatic reconnect.
pub async fn connect(
    config: &Config,
) -> Result<(SessionHandle, mpsc::Receiver<Frame<ServerEvent>>), GatewayError> {
    let url = config.endpoint_url();
    info!("connecting to {}", config.display_endpoint());

    let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (out_tx, mut out_rx) = mpsc::channel::<Frame<ClientEvent>>(CHANNEL_BUFFER_SIZE);
    let (in_tx, in_rx) = mpsc::channel::<Frame<ServerEvent>>(CHANNEL_BUFFER_SIZE);

    // Write task (outbound frames -> WebSocket)
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("failed to serialize frame: {}", e);
                    // Continue - don't kill the session on one bad frame
                }
            }
        }
        debug!("write task ended");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Read task (WebSocket -> inbound frames)
    tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<Frame<ServerEvent>>(&text) {
                        Ok(frame) => {
                            if in_tx.send(frame).await.is_err() {
                                debug!("router gone, ending read task");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("unparseable frame from server: {}", e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("server sent close frame");
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Pong is handled automatically by tungstenite
                }
                Ok(_) => {
                    // Binary or other message types - ignore
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            }
        }
        debug!("read task ended");
    });

    let handle = SessionHandle::new(out_tx);

    // Ask who we are; the reply kicks off the roster refresh.
    handle.emit(ClientEvent::WhoAmI).await?;

    Ok((handle, in_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::UserData;

    #[tokio::test]
    async fn test_emit_sends_plain_frame() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = SessionHandle::new(tx);

        handle.emit(ClientEvent::ListRooms).await.unwrap();

        let frame = rx.recv().await.unwrap();
        assert!(frame.id.is_none());
        assert!(matches!(frame.event, ClientEvent::ListRooms));
    }

    #[tokio::test]
    async fn test_request_resolves_on_matching_id() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = SessionHandle::new(tx);

        let requester = handle.clone();
        let task = tokio::spawn(async move { requester.request(ClientEvent::ListUsers).await });

        let frame = rx.recv().await.unwrap();
        let id = frame.id.expect("request frame must carry an id");

        let reply = ServerEvent::UserList(vec![UserData {
            username: "alice".to_string(),
        }]);
        assert!(handle.resolve(id, reply.clone()));

        let got = task.await.unwrap().unwrap();
        assert_eq!(got, reply);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_is_false() {
        let (tx, _rx) = mpsc::channel(8);
        let handle = SessionHandle::new(tx);
        assert!(!handle.resolve(Uuid::new_v4(), ServerEvent::UserList(vec![])));
    }

    #[tokio::test]
    async fn test_request_fails_when_transport_gone() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let handle = SessionHandle::new(tx);
        let result = handle.request(ClientEvent::ListUsers).await;
        assert!(matches!(result, Err(GatewayError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_abort_pending_wakes_requester_with_error() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = SessionHandle::new(tx);

        let requester = handle.clone();
        let task = tokio::spawn(async move { requester.request(ClientEvent::ListUsers).await });

        // Wait for the request frame so the slot is registered
        let _ = rx.recv().await.unwrap();
        handle.abort_pending();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(GatewayError::ChannelClosed)));
    }
}
