/// Record types shared by the storage backends.
pub mod models;
/// Durable store contract for rooms, songs and votes.
pub mod room_store;
/// Error types for storage and cache operations.
pub mod storage;
/// Fast, non-authoritative vote cache contract.
pub mod vote_cache;
