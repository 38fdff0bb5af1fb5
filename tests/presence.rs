mod common;

use std::sync::Arc;

use jukebox_back::{
    config::CreatorDeparturePolicy,
    dao::{room_store::MemoryRoomStore, vote_cache::MemoryVoteCache},
    services::{metadata::LinkOnlyResolver, presence_service, room_service},
    state::{AppState, hub::Topic},
};
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test]
async fn sessions_are_counted_per_connection_not_per_user() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 1).await;
    let room_id = fixture.room.id;
    let guest = fixture.guests[0];

    presence_service::connect(&state, room_id, "tab-1".into(), guest).await.unwrap();
    presence_service::connect(&state, room_id, "tab-2".into(), guest).await.unwrap();
    let count = presence_service::connect(&state, room_id, "host".into(), fixture.creator)
        .await
        .unwrap();
    assert_eq!(count, 3);

    let removal = presence_service::disconnect(&state, room_id, "tab-1").await;
    assert!(removal.removed);
    assert_eq!(removal.remaining, 2);
    assert!(!removal.creator_presence_lost);
}

#[tokio::test]
async fn disconnecting_twice_changes_nothing_the_second_time() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 1).await;
    let room_id = fixture.room.id;
    presence_service::connect(&state, room_id, "a".into(), fixture.guests[0]).await.unwrap();
    presence_service::connect(&state, room_id, "b".into(), fixture.creator).await.unwrap();

    let mut events = state.hub().subscribe(room_id);
    let first = presence_service::disconnect(&state, room_id, "a").await;
    let second = presence_service::disconnect(&state, room_id, "a").await;

    assert!(first.removed);
    assert!(!second.removed);
    assert_eq!(second.remaining, 1);
    assert_eq!(presence_service::active_users(&state, room_id), 1);

    assert_eq!(events.try_recv().unwrap().topic, Topic::ActiveUsers);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn disconnect_everywhere_reaches_every_room_of_the_session() {
    let state = common::memory_state();
    let first = common::room_with_guests(&state, 0).await;
    let second = common::room_with_guests(&state, 0).await;
    presence_service::connect(&state, first.room.id, "shared".into(), first.creator)
        .await
        .unwrap();
    let token = room_service::generate_shareable_link(&state, second.room.id, second.creator)
        .await
        .unwrap();
    room_service::join_room(&state, &token, first.creator).await.unwrap();
    presence_service::connect(&state, second.room.id, "shared".into(), first.creator)
        .await
        .unwrap();

    let removals = presence_service::disconnect_everywhere(&state, "shared").await;
    assert_eq!(removals.len(), 2);
    assert_eq!(presence_service::active_users(&state, first.room.id), 0);
    assert_eq!(presence_service::active_users(&state, second.room.id), 0);
}

#[tokio::test]
async fn creator_departure_can_reset_the_room_votes() {
    let mut config = common::test_config();
    config.creator_departure = CreatorDeparturePolicy::ResetVotes;
    let state = AppState::new(
        config,
        Arc::new(MemoryRoomStore::new()),
        Arc::new(MemoryVoteCache::new()),
        Arc::new(LinkOnlyResolver),
    );
    let fixture = common::room_with_guests(&state, 2).await;
    let room_id = fixture.room.id;
    let song_id = common::add_song(&state, room_id, fixture.creator, "partySong01").await;
    for guest in &fixture.guests {
        state.votes().cast_vote(song_id, *guest).await.unwrap();
    }

    presence_service::connect(&state, room_id, "host-1".into(), fixture.creator).await.unwrap();
    presence_service::connect(&state, room_id, "host-2".into(), fixture.creator).await.unwrap();

    let mut events = state.hub().subscribe(room_id);
    let removal = presence_service::disconnect(&state, room_id, "host-1").await;
    assert!(!removal.creator_presence_lost);
    assert_eq!(common::song(&state, song_id).await.upvotes, 2);

    let removal = presence_service::disconnect(&state, room_id, "host-2").await;
    assert!(removal.creator_presence_lost);
    assert_eq!(common::song(&state, song_id).await.upvotes, 0);
    assert_eq!(state.store().count_votes(song_id).await.unwrap(), 0);

    let topics: Vec<Topic> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| event.topic)
        .collect();
    assert_eq!(
        topics,
        vec![Topic::ActiveUsers, Topic::ActiveUsers, Topic::Status, Topic::Songs]
    );
}

#[tokio::test]
async fn creator_departure_keeps_votes_by_default() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 1).await;
    let room_id = fixture.room.id;
    let song_id = common::add_song(&state, room_id, fixture.creator, "keepSong001").await;
    state.votes().cast_vote(song_id, fixture.guests[0]).await.unwrap();

    presence_service::connect(&state, room_id, "host".into(), fixture.creator).await.unwrap();
    let removal = presence_service::disconnect(&state, room_id, "host").await;
    assert!(removal.creator_presence_lost);
    assert_eq!(common::song(&state, song_id).await.upvotes, 1);
}

#[tokio::test]
async fn closing_a_room_drops_sessions_and_ends_subscriptions() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 1).await;
    let room_id = fixture.room.id;
    let song_id = common::add_song(&state, room_id, fixture.creator, "finalSong01").await;
    state.votes().cast_vote(song_id, fixture.guests[0]).await.unwrap();
    presence_service::connect(&state, room_id, "guest".into(), fixture.guests[0]).await.unwrap();

    let mut events = state.hub().subscribe(room_id);
    room_service::close_room(&state, room_id, fixture.creator).await.unwrap();

    assert_eq!(presence_service::active_users(&state, room_id), 0);
    assert!(state.store().find_song(song_id).await.unwrap().is_none());
    assert_eq!(state.ledger().count(song_id).await.unwrap(), None);
    assert!(
        room_service::rooms_for_user(&state, fixture.guests[0])
            .await
            .unwrap()
            .is_empty()
    );

    let status = events.recv().await.unwrap();
    assert_eq!(status.topic, Topic::Status);
    assert_eq!(status.data, r#"{"status":"CLOSED"}"#);
    assert!(events.recv().await.is_err());
}
