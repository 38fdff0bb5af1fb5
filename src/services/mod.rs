/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Video metadata resolution.
pub mod metadata;
/// Live sessions and playback sync relays.
pub mod presence_service;
/// Queue ordering and current-song transitions.
pub mod queue_manager;
/// Background vote reconciliation loop.
pub mod reconciliation;
/// Bounded retry of optimistic-concurrency conflicts.
pub mod retry;
/// Room event payload building and publishing.
pub mod room_events;
/// Room lifecycle and membership.
pub mod room_service;
/// Server-Sent Events streaming of room events.
pub mod sse_service;
/// Vote cache clears, warm-ups and repairs from the store.
pub mod vote_cache_sync;
/// Serialized, exactly-once vote application.
pub mod vote_coordinator;
/// Vote cache keys and typed access.
pub mod vote_ledger;
/// WebSocket listener sessions.
pub mod websocket_service;
