use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{RoomId, UserId},
    dto::ws::{RoomInboundMessage, RoomOutboundMessage, SessionAck},
    services::presence_service,
    state::{SharedState, hub::RoomEvent},
};

/// The writer task is gone; the session must end.
#[derive(Debug, Error)]
#[error("connection closed")]
struct ConnectionClosed;

/// Handle the full lifecycle of one listener session in a room.
///
/// The session counts as active from the acknowledgement until the socket
/// closes; every room event is forwarded to the client as it is published.
pub async fn handle_socket(state: SharedState, socket: WebSocket, room_id: RoomId, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Subscribe first so the client also sees its own arrival.
    let events = state.hub().subscribe(room_id);
    let session_id = Uuid::new_v4().simple().to_string();
    let active_users =
        match presence_service::connect(&state, room_id, session_id.clone(), user_id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(room_id = %room_id, user_id = %user_id, error = %err, "websocket session refused");
                let _ = outbound_tx.send(Message::Close(None));
                finalize(writer_task, outbound_tx).await;
                return;
            }
        };

    let ack = SessionAck {
        session_id: session_id.clone(),
        room_id,
        active_users,
    };
    if send_message_to_websocket(&outbound_tx, &ack).is_err() {
        presence_service::disconnect(&state, room_id, &session_id).await;
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let forward_task = spawn_forwarder(events, outbound_tx.clone());

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_inbound(&state, room_id, user_id, &text).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "websocket error");
                break;
            }
        }
    }

    forward_task.abort();
    presence_service::disconnect(&state, room_id, &session_id).await;
    finalize(writer_task, outbound_tx).await;
}

async fn handle_inbound(state: &SharedState, room_id: RoomId, user_id: UserId, text: &str) {
    let message = match serde_json::from_str::<RoomInboundMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(room_id = %room_id, error = %err, "failed to parse room message");
            return;
        }
    };

    let outcome = match message {
        RoomInboundMessage::TimeSync(payload) => {
            if let Err(err) = payload.validate() {
                warn!(room_id = %room_id, error = %err, "invalid time sync payload");
                return;
            }
            presence_service::time_sync(state, room_id, user_id, payload).await
        }
        RoomInboundMessage::SyncRequest => {
            presence_service::request_sync(state, room_id, user_id).await
        }
        RoomInboundMessage::Unknown => {
            debug!(room_id = %room_id, "ignoring unknown room message");
            Ok(())
        }
    };
    if let Err(err) = outcome {
        warn!(room_id = %room_id, user_id = %user_id, error = %err, "room message rejected");
    }
}

/// Forward room events to the socket until the room channel closes.
fn spawn_forwarder(
    mut events: broadcast::Receiver<RoomEvent>,
    outbound_tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let data = match serde_json::from_str(&event.data) {
                        Ok(data) => data,
                        Err(err) => {
                            warn!(topic = %event.topic, error = %err, "dropping malformed room event");
                            continue;
                        }
                    };
                    let message = RoomOutboundMessage {
                        topic: event.topic.to_string(),
                        data,
                    };
                    if send_message_to_websocket(&outbound_tx, &message).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging behind room events");
                }
                Err(RecvError::Closed) => {
                    info!("room channel closed, ending websocket session");
                    let _ = outbound_tx.send(Message::Close(None));
                    break;
                }
            }
        }
    })
}

/// Serialize a payload and push it onto the writer channel; fails once the writer is gone.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
