//! Exactly-once vote application with the cache kept consistent with the store.
//!
//! Votes on one song are applied one at a time under that song's lock; votes on
//! different songs never wait on each other. The cache voter set is claimed
//! before the durable write and released again if the write does not happen,
//! so the cache can never claim a vote the store does not hold for longer than
//! one failed compensation. Reconciliation repairs whatever remains.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    dao::{
        models::{RoomEntity, RoomId, SongEntity, SongId, SongWrite, UserId, VoteEntity},
        room_store::RoomStore,
        storage::{CacheError, StorageError},
    },
    error::ServiceError,
    services::{
        queue_manager::QueueManager, retry::RetryPolicy, vote_cache_sync::VoteCacheSync,
        vote_ledger::VoteLedger,
    },
    state::locks::{KeyedGuard, KeyedLocks},
};

/// Outcome of a committed vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub song_id: SongId,
    pub room_id: RoomId,
    pub upvotes: u32,
}

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    /// Songs whose cache entries were overwritten from the store.
    pub cache_repaired: usize,
    /// Songs whose stored counter disagreed with their vote records.
    pub store_repaired: usize,
    /// Songs whose check failed; they are retried on the next pass.
    pub failed: usize,
}

enum SongCheck {
    Gone,
    Checked {
        room_id: RoomId,
        cache_repaired: bool,
        store_repaired: bool,
    },
}

pub struct VoteCoordinator {
    store: Arc<dyn RoomStore>,
    ledger: VoteLedger,
    vote_cache: VoteCacheSync,
    song_locks: Arc<KeyedLocks<SongId>>,
    queue: Arc<QueueManager>,
    retry: RetryPolicy,
    vote_timeout: Duration,
}

impl VoteCoordinator {
    pub fn new(
        store: Arc<dyn RoomStore>,
        ledger: VoteLedger,
        vote_cache: VoteCacheSync,
        song_locks: Arc<KeyedLocks<SongId>>,
        queue: Arc<QueueManager>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            vote_cache,
            song_locks,
            queue,
            retry: config.vote_retry.into(),
            vote_timeout: config.vote_timeout(),
        }
    }

    /// Record an upvote from `user_id` on `song_id` and return the new count.
    pub async fn cast_vote(
        &self,
        song_id: SongId,
        user_id: UserId,
    ) -> Result<VoteReceipt, ServiceError> {
        // Fail fast before queueing behind other voters.
        self.load_votable(song_id, user_id).await?;

        let guard = self.lock_song(song_id).await?;
        let (_, room) = self.load_votable(song_id, user_id).await?;

        let claimed = match self.ledger.claim(song_id, user_id).await {
            Ok(true) => true,
            Ok(false) => {
                debug!(song_id = %song_id, user_id = %user_id, "vote rejected by cache");
                return Err(ServiceError::AlreadyVoted);
            }
            Err(cache_err) => {
                warn!(song_id = %song_id, error = %cache_err, "vote cache unavailable; checking store");
                match self.store.has_vote(song_id, user_id).await {
                    Ok(true) => return Err(ServiceError::AlreadyVoted),
                    Ok(false) => false,
                    Err(store_err) => {
                        warn!(song_id = %song_id, error = %store_err, "vote store unavailable too");
                        return Err(ServiceError::Degraded);
                    }
                }
            }
        };

        let committed = self
            .retry
            .run("cast_vote", |_| self.commit(song_id, user_id))
            .await;

        let song = match committed {
            Ok(song) => song,
            Err(err) => {
                // The store confirms the vote on a duplicate, so the claim stays.
                if claimed && !matches!(err, ServiceError::AlreadyVoted) {
                    self.compensate(song_id, user_id).await;
                }
                return Err(err);
            }
        };

        self.bump_cached_count(&song).await;
        drop(guard);
        debug!(song_id = %song_id, user_id = %user_id, upvotes = song.upvotes, "vote committed");

        // The vote is durable at this point; a failed re-rank is repaired by the next one.
        if let Err(err) = self.queue.rerank(room.id).await {
            warn!(room_id = %room.id, error = %err, "failed to re-rank after vote");
        }

        Ok(VoteReceipt {
            song_id,
            room_id: room.id,
            upvotes: song.upvotes,
        })
    }

    /// Whether either the cache or the store holds a vote from `user_id`.
    pub async fn has_voted(&self, song_id: SongId, user_id: UserId) -> Result<bool, ServiceError> {
        match self.ledger.has_voter(song_id, user_id).await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(err) => warn!(song_id = %song_id, error = %err, "vote cache unavailable; checking store"),
        }
        Ok(self.store.has_vote(song_id, user_id).await?)
    }

    /// Compare every song's vote records with its stored counter and cache
    /// entries, repairing both from the records. Songs are checked one by one;
    /// a failure on one song never stops the pass.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let song_ids = match self.store.list_song_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "reconciliation skipped: cannot list songs");
                return report;
            }
        };

        let mut rooms_to_rerank = BTreeSet::new();
        for song_id in song_ids {
            match self.reconcile_song(song_id).await {
                Ok(SongCheck::Gone) => {}
                Ok(SongCheck::Checked {
                    room_id,
                    cache_repaired,
                    store_repaired,
                }) => {
                    report.checked += 1;
                    if cache_repaired {
                        report.cache_repaired += 1;
                    }
                    if store_repaired {
                        report.store_repaired += 1;
                        rooms_to_rerank.insert(room_id);
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(song_id = %song_id, error = %err, "reconciliation failed for song");
                }
            }
        }

        for room_id in rooms_to_rerank {
            if let Err(err) = self.queue.rerank(room_id).await {
                warn!(room_id = %room_id, error = %err, "failed to re-rank reconciled room");
            }
        }

        if report.cache_repaired > 0 || report.store_repaired > 0 || report.failed > 0 {
            info!(
                checked = report.checked,
                cache_repaired = report.cache_repaired,
                store_repaired = report.store_repaired,
                failed = report.failed,
                "vote reconciliation pass finished"
            );
        }
        report
    }

    async fn reconcile_song(&self, song_id: SongId) -> Result<SongCheck, ServiceError> {
        let _guard = self.lock_song(song_id).await?;
        let Some(song) = self.store.find_song(song_id).await? else {
            return Ok(SongCheck::Gone);
        };
        let voters = self.store.list_voters(song_id).await?;
        let count = self.store.count_votes(song_id).await?;

        let store_repaired = u64::from(song.upvotes) != count;
        if store_repaired {
            warn!(
                song_id = %song_id,
                stored = song.upvotes,
                actual = count,
                "stored vote counter drifted; repairing"
            );
            let mut repaired = song.clone();
            repaired.upvotes = u32::try_from(count).unwrap_or(u32::MAX);
            self.store
                .commit_song_writes(
                    song.room_id,
                    vec![SongWrite::Update {
                        song: repaired,
                        clear_votes: false,
                    }],
                )
                .await?;
        }

        // Membership is compared, not just size: a stale claim and a missed
        // claim can leave two sets of equal length.
        let cache_repaired = self
            .vote_cache
            .repair(song_id, count, &voters)
            .await
            .map_err(cache_failure)?;

        Ok(SongCheck::Checked {
            room_id: song.room_id,
            cache_repaired,
            store_repaired,
        })
    }

    /// One durable write attempt: re-read, re-validate, commit at the read version.
    async fn commit(&self, song_id: SongId, user_id: UserId) -> Result<SongEntity, ServiceError> {
        let (song, _) = self.load_votable(song_id, user_id).await?;
        self.store
            .commit_vote(VoteEntity::upvote(song_id, user_id), song.version)
            .await
            .map_err(|err| match err {
                StorageError::Duplicate { resource: "vote", .. } => ServiceError::AlreadyVoted,
                other => other.into(),
            })
    }

    /// Count the committed upvote in the cache, falling back to the stored
    /// value when the cached counter was cold or out of step.
    async fn bump_cached_count(&self, song: &SongEntity) {
        let stored = i64::from(song.upvotes);
        match self.ledger.bump_count(song.id).await {
            Ok(cached) if cached == stored => {}
            Ok(cached) => {
                debug!(song_id = %song.id, cached, stored, "cached vote count out of step; resetting");
                if let Err(err) = self.ledger.set_count(song.id, u64::from(song.upvotes)).await {
                    warn!(song_id = %song.id, error = %err, "failed to reset cached vote count");
                }
            }
            Err(err) => warn!(song_id = %song.id, error = %err, "failed to update cached vote count"),
        }
    }

    async fn compensate(&self, song_id: SongId, user_id: UserId) {
        match self.ledger.release(song_id, user_id).await {
            Ok(_) => debug!(song_id = %song_id, user_id = %user_id, "released cache claim after failed vote"),
            Err(err) => warn!(
                song_id = %song_id,
                user_id = %user_id,
                error = %err,
                "failed to release cache claim; reconciliation will repair it"
            ),
        }
    }

    /// Load the song and its room, checking the user may vote on it.
    async fn load_votable(
        &self,
        song_id: SongId,
        user_id: UserId,
    ) -> Result<(SongEntity, RoomEntity), ServiceError> {
        let song = self
            .store
            .find_song(song_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("song `{song_id}`")))?;
        let room = self
            .store
            .find_room(song.room_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("room `{}`", song.room_id)))?;
        if !room.is_member(user_id) {
            return Err(ServiceError::NotAMember);
        }
        if song.is_current {
            return Err(ServiceError::InvalidState(
                "the song currently playing cannot be voted on".into(),
            ));
        }
        Ok((song, room))
    }

    async fn lock_song(&self, song_id: SongId) -> Result<KeyedGuard<SongId>, ServiceError> {
        timeout(self.vote_timeout, self.song_locks.lock(song_id))
            .await
            .map_err(|_| ServiceError::Timeout)
    }
}

fn cache_failure(err: CacheError) -> ServiceError {
    debug!(error = %err, "vote cache call failed during reconciliation");
    ServiceError::Degraded
}
