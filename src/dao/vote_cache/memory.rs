use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::dao::{
    storage::{CacheError, CacheResult},
    vote_cache::VoteCache,
};

/// [`VoteCache`] living in process memory, with lazy expiry on access.
#[derive(Clone, Default)]
pub struct MemoryVoteCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

struct CacheEntry {
    value: CacheValue,
    expires_at: Instant,
}

enum CacheValue {
    Counter(i64),
    Set(HashSet<String>),
}

impl CacheEntry {
    fn new(value: CacheValue, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::unavailable(format!("key `{key}` holds a value of another type"))
}

impl MemoryVoteCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys; expired entries are dropped first.
    pub fn len(&self) -> usize {
        self.entries.retain(|_, entry| !entry.is_expired());
        self.entries.len()
    }

    /// Whether no live key remains.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_counter_sync(&self, key: &str) -> CacheResult<Option<i64>> {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        match self.entries.get(key).as_deref() {
            None => Ok(None),
            Some(CacheEntry {
                value: CacheValue::Counter(value),
                ..
            }) => Ok(Some(*value)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn incr_counter_sync(&self, key: String, ttl: Duration) -> CacheResult<i64> {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CacheEntry::new(CacheValue::Counter(1), ttl));
                    return Ok(1);
                }
                match &mut occupied.get_mut().value {
                    CacheValue::Counter(value) => {
                        *value += 1;
                        Ok(*value)
                    }
                    CacheValue::Set(_) => Err(wrong_type(occupied.key())),
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(CacheValue::Counter(1), ttl));
                Ok(1)
            }
        }
    }

    fn set_add_sync(&self, key: String, member: String, ttl: Duration) -> CacheResult<bool> {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CacheEntry::new(
                        CacheValue::Set(HashSet::from([member])),
                        ttl,
                    ));
                    return Ok(true);
                }
                match &mut occupied.get_mut().value {
                    CacheValue::Set(members) => Ok(members.insert(member)),
                    CacheValue::Counter(_) => Err(wrong_type(occupied.key())),
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(
                    CacheValue::Set(HashSet::from([member])),
                    ttl,
                ));
                Ok(true)
            }
        }
    }

    fn set_remove_sync(&self, key: &str, member: &str) -> CacheResult<bool> {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        let removed = match self.entries.get_mut(key).as_deref_mut() {
            None => false,
            Some(CacheEntry {
                value: CacheValue::Set(members),
                ..
            }) => members.remove(member),
            Some(_) => return Err(wrong_type(key)),
        };
        // An empty set does not exist, like in a key/value server.
        self.entries.remove_if(key, |_, entry| {
            matches!(&entry.value, CacheValue::Set(members) if members.is_empty())
        });
        Ok(removed)
    }

    fn set_is_member_sync(&self, key: &str, member: &str) -> CacheResult<bool> {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        match self.entries.get(key).as_deref() {
            None => Ok(false),
            Some(CacheEntry {
                value: CacheValue::Set(members),
                ..
            }) => Ok(members.contains(member)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set_members_sync(&self, key: &str) -> CacheResult<Vec<String>> {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        match self.entries.get(key).as_deref() {
            None => Ok(Vec::new()),
            Some(CacheEntry {
                value: CacheValue::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }
}

impl VoteCache for MemoryVoteCache {
    fn get_counter(&self, key: String) -> BoxFuture<'static, CacheResult<Option<i64>>> {
        let cache = self.clone();
        Box::pin(async move { cache.get_counter_sync(&key) })
    }

    fn set_counter(
        &self,
        key: String,
        value: i64,
        ttl: Duration,
    ) -> BoxFuture<'static, CacheResult<()>> {
        let cache = self.clone();
        Box::pin(async move {
            cache
                .entries
                .insert(key, CacheEntry::new(CacheValue::Counter(value), ttl));
            Ok(())
        })
    }

    fn incr_counter(&self, key: String, ttl: Duration) -> BoxFuture<'static, CacheResult<i64>> {
        let cache = self.clone();
        Box::pin(async move { cache.incr_counter_sync(key, ttl) })
    }

    fn delete(&self, key: String) -> BoxFuture<'static, CacheResult<bool>> {
        let cache = self.clone();
        Box::pin(async move {
            Ok(cache
                .entries
                .remove(&key)
                .is_some_and(|(_, entry)| !entry.is_expired()))
        })
    }

    fn set_add(
        &self,
        key: String,
        member: String,
        ttl: Duration,
    ) -> BoxFuture<'static, CacheResult<bool>> {
        let cache = self.clone();
        Box::pin(async move { cache.set_add_sync(key, member, ttl) })
    }

    fn set_remove(&self, key: String, member: String) -> BoxFuture<'static, CacheResult<bool>> {
        let cache = self.clone();
        Box::pin(async move { cache.set_remove_sync(&key, &member) })
    }

    fn set_is_member(&self, key: String, member: String) -> BoxFuture<'static, CacheResult<bool>> {
        let cache = self.clone();
        Box::pin(async move { cache.set_is_member_sync(&key, &member) })
    }

    fn set_members(&self, key: String) -> BoxFuture<'static, CacheResult<Vec<String>>> {
        let cache = self.clone();
        Box::pin(async move { cache.set_members_sync(&key) })
    }

    fn set_replace(
        &self,
        key: String,
        members: Vec<String>,
        ttl: Duration,
    ) -> BoxFuture<'static, CacheResult<()>> {
        let cache = self.clone();
        Box::pin(async move {
            if members.is_empty() {
                cache.entries.remove(&key);
            } else {
                let members = members.into_iter().collect();
                cache
                    .entries
                    .insert(key, CacheEntry::new(CacheValue::Set(members), ttl));
            }
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, CacheResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
