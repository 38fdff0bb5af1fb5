use std::fmt;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::dao::models::RoomId;

/// Purpose of a room-scoped event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Full ordered song list of the room.
    Songs,
    /// Song now playing (or none).
    CurrentSong,
    /// A song finished and the queue moved on.
    SongEnded,
    /// Number of live sessions in the room.
    ActiveUsers,
    /// Room lifecycle notices such as the creator leaving.
    Status,
    /// Playback position relayed from the creator.
    TimeSync,
    /// A listener asks the creator to resend its playback position.
    SyncRequest,
}

impl Topic {
    /// Wire name of the topic, used as the SSE event name.
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Songs => "songs",
            Topic::CurrentSong => "current_song",
            Topic::SongEnded => "song_ended",
            Topic::ActiveUsers => "active_users",
            Topic::Status => "status",
            Topic::TimeSync => "time_sync",
            Topic::SyncRequest => "sync_request",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized payload published on a room topic.
#[derive(Clone, Debug)]
pub struct RoomEvent {
    pub topic: Topic,
    pub data: String,
}

impl RoomEvent {
    /// Serialize `payload` as the JSON data of an event on `topic`.
    pub fn json<T: Serialize>(topic: Topic, payload: &T) -> Result<Self, BroadcastError> {
        Ok(Self {
            topic,
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to serialize event payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Fan-out channel delivering events to every subscriber of a room.
///
/// Publishing never blocks; it returns how many subscribers were reached.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, room_id: RoomId, event: RoomEvent) -> usize;
}

/// Per-room broadcast channels created on first subscription.
pub struct RoomHub {
    rooms: DashMap<RoomId, broadcast::Sender<RoomEvent>>,
    capacity: usize,
}

impl RoomHub {
    /// Create a hub whose channels buffer `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a subscriber to every subsequent event of `room_id`.
    pub fn subscribe(&self, room_id: RoomId) -> broadcast::Receiver<RoomEvent> {
        self.rooms
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Close the room channel; subscribers observe the end of their stream.
    pub fn remove_room(&self, room_id: RoomId) {
        self.rooms.remove(&room_id);
    }

    /// Number of rooms with an open channel.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Broadcaster for RoomHub {
    fn publish(&self, room_id: RoomId, event: RoomEvent) -> usize {
        let topic = event.topic;
        let delivered = match self.rooms.get(&room_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            self.rooms
                .remove_if(&room_id, |_, sender| sender.receiver_count() == 0);
        }
        debug!(room_id = %room_id, %topic, delivered, "room event published");
        delivered
    }
}
