use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::{
    dao::models::{RoomId, UserId},
    error::ServiceError,
    services::room_service,
    state::{SharedState, hub::RoomEvent},
};

/// Subscribe a room member to the event stream of the room.
///
/// Streams are read-only observers: they are not counted as active listeners.
pub async fn subscribe_room(
    state: &SharedState,
    room_id: RoomId,
    user_id: UserId,
) -> Result<broadcast::Receiver<RoomEvent>, ServiceError> {
    room_service::require_member(state, room_id, user_id).await?;
    Ok(state.hub().subscribe(room_id))
}

/// Convert a room receiver into an SSE response, forwarding events until the
/// client disconnects or the room closes.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<RoomEvent>,
    room_id: RoomId,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let event = Event::default()
                                .event(payload.topic.as_str())
                                .data(payload.data);
                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // Skip lagged messages but keep the stream alive.
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }
        info!(room_id = %room_id, "room SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
