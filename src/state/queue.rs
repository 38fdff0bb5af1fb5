//! Pure planning of queue transitions for one room.
//!
//! [`plan`] takes a snapshot of every song in a room plus a [`QueueEvent`] and
//! returns the full set of row writes that bring the room to its next state.
//! Ordering is always re-derived from scratch: queued songs sort by upvotes
//! (descending) then by the sequence number they entered the queue with, and
//! positions are renumbered `0..N-1`.

use std::cmp::Reverse;

use indexmap::IndexMap;
use thiserror::Error;

use crate::dao::models::{SongEntity, SongId, SongWrite};

/// Mutation requested on a room queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    /// Recompute positions from the current vote counts.
    Rerank,
    /// The current song finished playing; recycle it and promote the best queued song.
    SongEnded(SongId),
    /// Force a song to play now, discarding votes of both the old and new current song.
    PlayNow(SongId),
    /// Pick the next song by hand, keeping vote counts.
    SetCurrent(SongId),
    /// Delete a queued song.
    Remove(SongId),
    /// Drop every vote in the room and recompute the queue.
    ResetVotes,
}

/// Reasons a [`QueueEvent`] cannot be applied to the snapshot it was planned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("song `{0}` is not part of this room")]
    SongNotInRoom(SongId),
    #[error("song `{0}` is already playing")]
    AlreadyCurrent(SongId),
    #[error("song `{0}` is not the current song")]
    NotCurrent(SongId),
    #[error("song `{0}` is playing and cannot be removed")]
    CurrentNotRemovable(SongId),
}

/// Outcome of planning a [`QueueEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePlan {
    /// Row writes to commit atomically. Only rows that change are listed.
    pub writes: Vec<SongWrite>,
    /// Songs whose votes are discarded by the writes (reset or deleted).
    pub cleared: Vec<SongId>,
    /// Expected room state after commit: the current song first, then the queue in order.
    pub ordered: Vec<SongEntity>,
    /// Current song before the transition.
    pub current_before: Option<SongId>,
    /// Current song after the transition.
    pub current_after: Option<SongId>,
}

impl QueuePlan {
    /// Whether committing the plan would change nothing.
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty()
    }

    /// Whether the transition changes which song is playing.
    pub fn current_changed(&self) -> bool {
        self.current_before != self.current_after
    }

    /// Song playing after the transition, if any.
    pub fn current(&self) -> Option<&SongEntity> {
        self.ordered.first().filter(|song| song.is_current)
    }

    /// Replace the planned rows with the rows the store returned from the commit,
    /// so versions in the ordered list match the stored ones.
    pub fn with_committed(mut self, committed: Vec<SongEntity>) -> Self {
        let committed: IndexMap<SongId, SongEntity> =
            committed.into_iter().map(|song| (song.id, song)).collect();
        for song in &mut self.ordered {
            if let Some(stored) = committed.get(&song.id) {
                *song = stored.clone();
            }
        }
        self
    }
}

struct Working {
    song: SongEntity,
    clear_votes: bool,
    deleted: bool,
}

/// Plan `event` against `songs`, the complete song list of one room.
pub fn plan(songs: &[SongEntity], event: QueueEvent) -> Result<QueuePlan, TransitionError> {
    let mut working: IndexMap<SongId, Working> = songs
        .iter()
        .map(|song| {
            (
                song.id,
                Working {
                    song: song.clone(),
                    clear_votes: false,
                    deleted: false,
                },
            )
        })
        .collect();

    let current_before = songs.iter().find(|song| song.is_current).map(|song| song.id);
    let next_seq = songs
        .iter()
        .map(|song| song.enqueued_seq)
        .max()
        .unwrap_or(0)
        + 1;

    match event {
        QueueEvent::Rerank => {}
        QueueEvent::SongEnded(id) => {
            let ended = lookup(&working, id)?;
            if !ended.song.is_current {
                return Err(TransitionError::NotCurrent(id));
            }
            let next = best_candidate(&working, id);

            if let Some(ended) = working.get_mut(&id) {
                demote(ended, next_seq);
                reset(ended);
            }
            if let Some(next) = next.and_then(|next| working.get_mut(&next)) {
                promote(next);
                reset(next);
            }
        }
        QueueEvent::PlayNow(id) => {
            if lookup(&working, id)?.song.is_current {
                return Err(TransitionError::AlreadyCurrent(id));
            }
            if let Some(previous) = current_before.and_then(|prev| working.get_mut(&prev)) {
                demote(previous, next_seq);
                reset(previous);
            }
            if let Some(target) = working.get_mut(&id) {
                promote(target);
                reset(target);
            }
        }
        QueueEvent::SetCurrent(id) => {
            if lookup(&working, id)?.song.is_current {
                return Err(TransitionError::AlreadyCurrent(id));
            }
            if let Some(previous) = current_before.and_then(|prev| working.get_mut(&prev)) {
                demote(previous, next_seq);
            }
            if let Some(target) = working.get_mut(&id) {
                promote(target);
            }
        }
        QueueEvent::Remove(id) => {
            if lookup(&working, id)?.song.is_current {
                return Err(TransitionError::CurrentNotRemovable(id));
            }
            if let Some(target) = working.get_mut(&id) {
                target.deleted = true;
            }
        }
        QueueEvent::ResetVotes => {
            for entry in working.values_mut() {
                reset(entry);
            }
        }
    }

    let ordered = rank(&mut working);
    let current_after = ordered
        .first()
        .filter(|song| song.is_current)
        .map(|song| song.id);

    let mut writes = Vec::new();
    let mut cleared = Vec::new();
    for (original, entry) in songs.iter().zip(working.values()) {
        if entry.deleted {
            writes.push(SongWrite::Delete {
                id: original.id,
                version: original.version,
            });
            cleared.push(original.id);
        } else if entry.clear_votes || entry.song != *original {
            writes.push(SongWrite::Update {
                song: entry.song.clone(),
                clear_votes: entry.clear_votes,
            });
            if entry.clear_votes {
                cleared.push(original.id);
            }
        }
    }

    Ok(QueuePlan {
        writes,
        cleared,
        ordered,
        current_before,
        current_after,
    })
}

fn lookup(working: &IndexMap<SongId, Working>, id: SongId) -> Result<&Working, TransitionError> {
    working.get(&id).ok_or(TransitionError::SongNotInRoom(id))
}

/// Queued song with the most votes, ties going to the lowest position.
fn best_candidate(working: &IndexMap<SongId, Working>, excluded: SongId) -> Option<SongId> {
    working
        .values()
        .filter(|entry| !entry.song.is_current && entry.song.id != excluded)
        .min_by_key(|entry| {
            (
                Reverse(entry.song.upvotes),
                entry.song.queue_position.unwrap_or(u32::MAX),
                entry.song.enqueued_seq,
            )
        })
        .map(|entry| entry.song.id)
}

fn promote(entry: &mut Working) {
    entry.song.is_current = true;
    entry.song.queue_position = None;
}

fn demote(entry: &mut Working, seq: u64) {
    entry.song.is_current = false;
    entry.song.enqueued_seq = seq;
}

fn reset(entry: &mut Working) {
    entry.song.upvotes = 0;
    entry.clear_votes = true;
}

/// Renumber queued songs densely and return the room in display order.
fn rank(working: &mut IndexMap<SongId, Working>) -> Vec<SongEntity> {
    let mut queued: Vec<&mut Working> = working
        .values_mut()
        .filter(|entry| !entry.deleted && !entry.song.is_current)
        .collect();
    queued.sort_by_key(|entry| {
        (
            Reverse(entry.song.upvotes),
            entry.song.enqueued_seq,
            entry.song.created_at,
        )
    });
    for (position, entry) in queued.iter_mut().enumerate() {
        entry.song.queue_position = Some(position as u32);
    }

    let mut ordered: Vec<SongEntity> = working
        .values()
        .filter(|entry| !entry.deleted && entry.song.is_current)
        .map(|entry| entry.song.clone())
        .collect();
    let mut rest: Vec<SongEntity> = working
        .values()
        .filter(|entry| !entry.deleted && !entry.song.is_current)
        .map(|entry| entry.song.clone())
        .collect();
    rest.sort_by_key(|song| song.queue_position);
    ordered.extend(rest);
    ordered
}
