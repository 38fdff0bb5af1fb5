use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{RoomId, SongEntity, SongId, UserId},
    dto::{
        events::{
            ActiveUsersEvent, CurrentSongEvent, RoomStatus, SongListEvent, StatusEvent,
            SyncRequestEvent, TimeSyncPayload,
        },
        song::{SongEndedResponse, SongSummary},
    },
    state::hub::{Broadcaster, RoomEvent, Topic},
};

/// Broadcast the ordered song list of a room.
pub fn broadcast_songs(hub: &dyn Broadcaster, room_id: RoomId, ordered: &[SongEntity]) {
    let payload = SongListEvent {
        songs: summaries(ordered),
    };
    send_room_event(hub, room_id, Topic::Songs, &payload);
}

/// Broadcast the song now playing, or its absence.
pub fn broadcast_current_song(hub: &dyn Broadcaster, room_id: RoomId, current: Option<&SongEntity>) {
    let payload = CurrentSongEvent {
        song: current.cloned().map(SongSummary::from),
    };
    send_room_event(hub, room_id, Topic::CurrentSong, &payload);
}

/// Broadcast that `ended` finished, with the order that follows.
pub fn broadcast_song_ended(
    hub: &dyn Broadcaster,
    room_id: RoomId,
    ended: SongId,
    ordered: &[SongEntity],
) -> SongEndedResponse {
    let payload = song_ended_payload(ended, ordered);
    send_room_event(hub, room_id, Topic::SongEnded, &payload);
    payload
}

pub fn broadcast_active_users(hub: &dyn Broadcaster, room_id: RoomId, active_users: usize) {
    send_room_event(hub, room_id, Topic::ActiveUsers, &ActiveUsersEvent { active_users });
}

pub fn broadcast_status(hub: &dyn Broadcaster, room_id: RoomId, status: RoomStatus) {
    send_room_event(hub, room_id, Topic::Status, &StatusEvent { status });
}

pub fn broadcast_time_sync(hub: &dyn Broadcaster, room_id: RoomId, payload: TimeSyncPayload) {
    send_room_event(hub, room_id, Topic::TimeSync, &payload);
}

pub fn broadcast_sync_request(hub: &dyn Broadcaster, room_id: RoomId, requested_by: UserId) {
    send_room_event(hub, room_id, Topic::SyncRequest, &SyncRequestEvent { requested_by });
}

pub fn song_ended_payload(ended: SongId, ordered: &[SongEntity]) -> SongEndedResponse {
    SongEndedResponse {
        ended_song_id: ended,
        new_song_order: ordered.iter().map(|song| song.id).collect::<Vec<Uuid>>(),
    }
}

fn summaries(ordered: &[SongEntity]) -> Vec<SongSummary> {
    ordered.iter().cloned().map(SongSummary::from).collect()
}

/// Delivery is fire-and-forget: failures are logged and never reach the caller.
fn send_room_event(hub: &dyn Broadcaster, room_id: RoomId, topic: Topic, payload: &impl Serialize) {
    match RoomEvent::json(topic, payload) {
        Ok(event) => {
            hub.publish(room_id, event);
        }
        Err(err) => warn!(room_id = %room_id, %topic, error = %err, "failed to serialize room event"),
    }
}
