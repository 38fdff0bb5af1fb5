pub mod memory;

use std::time::Duration;

use futures::future::BoxFuture;

use crate::dao::storage::CacheResult;

pub use memory::MemoryVoteCache;

/// Low-latency key/value and set store with per-key expiry.
///
/// The cache is an accelerator only. Implementations may lose any entry at
/// any time, and callers must treat errors as "no answer".
pub trait VoteCache: Send + Sync {
    fn get_counter(&self, key: String) -> BoxFuture<'static, CacheResult<Option<i64>>>;
    fn set_counter(&self, key: String, value: i64, ttl: Duration)
    -> BoxFuture<'static, CacheResult<()>>;
    /// Increment the counter, creating it at zero first when absent.
    fn incr_counter(&self, key: String, ttl: Duration) -> BoxFuture<'static, CacheResult<i64>>;
    /// Remove the key whatever its type; returns whether something was removed.
    fn delete(&self, key: String) -> BoxFuture<'static, CacheResult<bool>>;

    /// Add `member` to the set, returning `false` when it was already present.
    fn set_add(
        &self,
        key: String,
        member: String,
        ttl: Duration,
    ) -> BoxFuture<'static, CacheResult<bool>>;
    fn set_remove(&self, key: String, member: String) -> BoxFuture<'static, CacheResult<bool>>;
    fn set_is_member(&self, key: String, member: String) -> BoxFuture<'static, CacheResult<bool>>;
    /// Every member of the set, empty when the set is absent.
    fn set_members(&self, key: String) -> BoxFuture<'static, CacheResult<Vec<String>>>;
    /// Replace the whole set in one step.
    fn set_replace(
        &self,
        key: String,
        members: Vec<String>,
        ttl: Duration,
    ) -> BoxFuture<'static, CacheResult<()>>;

    fn health_check(&self) -> BoxFuture<'static, CacheResult<()>>;
}
