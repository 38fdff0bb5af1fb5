mod common;

use jukebox_back::{error::ServiceError, state::hub::Topic};
use uuid::Uuid;

#[tokio::test]
async fn song_ended_promotes_the_most_voted_song_and_recycles_the_old_one() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 5).await;
    let room_id = fixture.room.id;
    let a = common::add_song(&state, room_id, fixture.creator, "songAAAAAAA").await;
    let b = common::add_song(&state, room_id, fixture.creator, "songBBBBBBB").await;
    let c = common::add_song(&state, room_id, fixture.creator, "songCCCCCCC").await;
    state.queue().set_current(a, fixture.creator).await.unwrap();

    for guest in &fixture.guests[..3] {
        state.votes().cast_vote(b, *guest).await.unwrap();
    }
    for guest in &fixture.guests {
        state.votes().cast_vote(c, *guest).await.unwrap();
    }

    let mut events = state.hub().subscribe(room_id);
    let ended = state.queue().song_ended(room_id, a).await.unwrap();
    assert_eq!(ended.ended_song_id, a);
    assert_eq!(ended.new_song_order, vec![c, b, a]);

    let promoted = common::song(&state, c).await;
    assert!(promoted.is_current);
    assert_eq!(promoted.queue_position, None);
    assert_eq!(promoted.upvotes, 0);
    assert_eq!(state.store().count_votes(c).await.unwrap(), 0);
    assert_eq!(state.ledger().count(c).await.unwrap(), None);

    let kept = common::song(&state, b).await;
    assert_eq!((kept.upvotes, kept.queue_position), (3, Some(0)));
    let recycled = common::song(&state, a).await;
    assert_eq!((recycled.upvotes, recycled.queue_position), (0, Some(1)));
    assert!(!recycled.is_current);

    let topics: Vec<Topic> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| event.topic)
        .collect();
    assert_eq!(topics, vec![Topic::Songs, Topic::CurrentSong, Topic::SongEnded]);
}

#[tokio::test]
async fn last_song_ending_leaves_the_room_without_current_song() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 0).await;
    let only = common::add_song(&state, fixture.room.id, fixture.creator, "lonelySong1").await;
    state.queue().play_now(only, fixture.creator).await.unwrap();

    let ended = state.queue().song_ended(fixture.room.id, only).await.unwrap();
    assert_eq!(ended.new_song_order, vec![only]);
    assert_eq!(common::current_count(&state, fixture.room.id).await, 0);
    assert_eq!(common::queued_positions(&state, fixture.room.id).await, vec![0]);
}

#[tokio::test]
async fn ties_keep_entry_order_until_votes_break_them() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 1).await;
    let room_id = fixture.room.id;
    let first = common::add_song(&state, room_id, fixture.creator, "firstSong01").await;
    let second = common::add_song(&state, room_id, fixture.creator, "secondSong2").await;

    let ordered: Vec<Uuid> = state
        .queue()
        .ordered_songs(room_id)
        .await
        .unwrap()
        .iter()
        .map(|song| song.id)
        .collect();
    assert_eq!(ordered, vec![first, second]);

    state.votes().cast_vote(second, fixture.guests[0]).await.unwrap();
    assert_eq!(common::song(&state, second).await.queue_position, Some(0));
    assert_eq!(common::song(&state, first).await.queue_position, Some(1));
}

#[tokio::test]
async fn play_now_discards_votes_while_set_current_keeps_them() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 2).await;
    let room_id = fixture.room.id;
    let forced = common::add_song(&state, room_id, fixture.creator, "forcedSong1").await;
    let picked = common::add_song(&state, room_id, fixture.creator, "pickedSong1").await;
    for guest in &fixture.guests {
        state.votes().cast_vote(forced, *guest).await.unwrap();
        state.votes().cast_vote(picked, *guest).await.unwrap();
    }

    let playing = state.queue().play_now(forced, fixture.creator).await.unwrap();
    assert_eq!(playing.upvotes, 0);
    assert_eq!(state.store().count_votes(forced).await.unwrap(), 0);

    let playing = state.queue().set_current(picked, fixture.creator).await.unwrap();
    assert_eq!(playing.id, picked);
    assert_eq!(playing.upvotes, 2);
    assert_eq!(common::current_count(&state, room_id).await, 1);
    assert_eq!(common::song(&state, forced).await.queue_position, Some(0));
}

#[tokio::test]
async fn creator_only_transitions_reject_other_members() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 1).await;
    let guest = fixture.guests[0];
    let song_id = common::add_song(&state, fixture.room.id, guest, "guestSong01").await;

    assert!(matches!(
        state.queue().play_now(song_id, guest).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        state.queue().set_current(song_id, guest).await,
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        state.queue().remove_song(song_id, guest).await,
        Err(ServiceError::Forbidden(_))
    ));
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 0).await;
    let room_id = fixture.room.id;
    let playing = common::add_song(&state, room_id, fixture.creator, "playingSong").await;
    let queued = common::add_song(&state, room_id, fixture.creator, "queuedSong1").await;
    state.queue().play_now(playing, fixture.creator).await.unwrap();

    assert!(matches!(
        state.queue().play_now(playing, fixture.creator).await,
        Err(ServiceError::InvalidState(_))
    ));
    assert!(matches!(
        state.queue().remove_song(playing, fixture.creator).await,
        Err(ServiceError::InvalidState(_))
    ));
    assert!(matches!(
        state.queue().song_ended(room_id, queued).await,
        Err(ServiceError::InvalidState(_))
    ));
    assert!(matches!(
        state
            .queue()
            .add_song(room_id, fixture.creator, "https://youtu.be/queuedSong1".into())
            .await,
        Err(ServiceError::InvalidState(_))
    ));
    assert!(matches!(
        state
            .queue()
            .add_song(room_id, fixture.creator, "https://example.com/video".into())
            .await,
        Err(ServiceError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn removing_a_song_purges_its_votes_and_frees_its_link() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 2).await;
    let room_id = fixture.room.id;
    let doomed = common::add_song(&state, room_id, fixture.creator, "doomedSong1").await;
    let other = common::add_song(&state, room_id, fixture.creator, "otherSong01").await;
    for guest in &fixture.guests {
        state.votes().cast_vote(doomed, *guest).await.unwrap();
    }

    state.queue().remove_song(doomed, fixture.creator).await.unwrap();
    assert!(state.store().find_song(doomed).await.unwrap().is_none());
    assert_eq!(state.store().count_votes(doomed).await.unwrap(), 0);
    assert!(state.ledger().voters(doomed).await.unwrap().is_empty());
    assert!(!state.ledger().has_voter(doomed, fixture.guests[0]).await.unwrap());
    assert_eq!(common::queued_positions(&state, room_id).await, vec![0]);
    assert_eq!(common::song(&state, other).await.queue_position, Some(0));

    let receipt = state.votes().cast_vote(other, fixture.guests[0]).await.unwrap();
    assert_eq!(receipt.upvotes, 1);
    assert_eq!(common::song(&state, other).await.upvotes, 1);
    assert_eq!(state.ledger().count(other).await.unwrap(), Some(1));

    let again = common::add_song(&state, room_id, fixture.creator, "doomedSong1").await;
    let receipt = state.votes().cast_vote(again, fixture.guests[0]).await.unwrap();
    assert_eq!(receipt.upvotes, 1);
}

#[tokio::test]
async fn positions_stay_dense_across_mixed_operations() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 3).await;
    let room_id = fixture.room.id;

    let mut songs = Vec::new();
    for n in 0..6 {
        songs.push(common::add_song(&state, room_id, fixture.creator, &format!("denseSong_{n}")).await);
        assert_eq!(
            common::queued_positions(&state, room_id).await,
            (0..=n as u32).collect::<Vec<_>>()
        );
    }

    state.votes().cast_vote(songs[4], fixture.guests[0]).await.unwrap();
    state.votes().cast_vote(songs[4], fixture.guests[1]).await.unwrap();
    state.votes().cast_vote(songs[2], fixture.guests[2]).await.unwrap();
    state.queue().play_now(songs[5], fixture.creator).await.unwrap();
    assert_eq!(common::queued_positions(&state, room_id).await, vec![0, 1, 2, 3, 4]);

    state.queue().remove_song(songs[0], fixture.creator).await.unwrap();
    assert_eq!(common::queued_positions(&state, room_id).await, vec![0, 1, 2, 3]);

    let ended = state.queue().song_ended(room_id, songs[5]).await.unwrap();
    assert_eq!(ended.new_song_order[0], songs[4]);
    assert_eq!(common::queued_positions(&state, room_id).await, vec![0, 1, 2, 3]);
    assert_eq!(common::current_count(&state, room_id).await, 1);

    state.queue().reset_votes(room_id).await.unwrap();
    assert_eq!(common::queued_positions(&state, room_id).await, vec![0, 1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_promotions_leave_exactly_one_current_song() {
    let state = common::memory_state();
    let fixture = common::room_with_guests(&state, 4).await;
    let room_id = fixture.room.id;

    let mut songs = Vec::new();
    for n in 0..8 {
        songs.push(common::add_song(&state, room_id, fixture.creator, &format!("raceSong_{n}")).await);
    }

    let mut handles = Vec::new();
    for (n, &song_id) in songs.iter().enumerate() {
        let state = state.clone();
        let creator = fixture.creator;
        handles.push(tokio::spawn(async move {
            if n % 2 == 0 {
                state.queue().play_now(song_id, creator).await.map(|_| ())
            } else {
                state.queue().set_current(song_id, creator).await.map(|_| ())
            }
        }));
    }
    for (n, &guest) in fixture.guests.iter().enumerate() {
        let state = state.clone();
        let song_id = songs[n];
        handles.push(tokio::spawn(async move {
            // A vote may land on a song that just became current.
            match state.votes().cast_vote(song_id, guest).await {
                Ok(_) | Err(ServiceError::InvalidState(_)) => Ok(()),
                Err(err) => Err(err),
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(common::current_count(&state, room_id).await, 1);
    assert_eq!(common::queued_positions(&state, room_id).await, (0..7).collect::<Vec<u32>>());
}
