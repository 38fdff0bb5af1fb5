use dashmap::DashMap;
use indexmap::IndexMap;

use crate::dao::models::{RoomId, UserId};

/// Identifier of one live client connection.
pub type SessionId = String;

/// What the registry knows about a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    pub user_id: UserId,
    pub is_creator: bool,
}

/// Result of [`SessionRegistry::remove_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRemoval {
    pub room_id: RoomId,
    /// Sessions left in the room afterwards.
    pub remaining: usize,
    /// Whether this call actually removed a session.
    pub removed: bool,
    /// Set when the last session of the room creator just went away.
    pub creator_presence_lost: bool,
}

/// Live sessions per room. Rooms with no session have no entry.
#[derive(Default)]
pub struct SessionRegistry {
    rooms: DashMap<RoomId, IndexMap<SessionId, SessionInfo>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session_id` in the room and return the resulting session count.
    ///
    /// Registering the same session again replaces its info.
    pub fn add_session(&self, room_id: RoomId, session_id: SessionId, info: SessionInfo) -> usize {
        let mut sessions = self.rooms.entry(room_id).or_default();
        sessions.insert(session_id, info);
        sessions.len()
    }

    /// Drop `session_id` from the room. Unknown rooms or sessions are a no-op.
    pub fn remove_session(&self, room_id: RoomId, session_id: &str) -> SessionRemoval {
        let mut removal = SessionRemoval {
            room_id,
            remaining: 0,
            removed: false,
            creator_presence_lost: false,
        };

        if let Some(mut sessions) = self.rooms.get_mut(&room_id) {
            if let Some(info) = sessions.shift_remove(session_id) {
                removal.removed = true;
                removal.creator_presence_lost =
                    info.is_creator && !sessions.values().any(|other| other.is_creator);
            }
            removal.remaining = sessions.len();
        }
        self.rooms.remove_if(&room_id, |_, sessions| sessions.is_empty());
        removal
    }

    /// Drop `session_id` from every room it was registered in.
    pub fn remove_session_everywhere(&self, session_id: &str) -> Vec<SessionRemoval> {
        let rooms: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().contains_key(session_id))
            .map(|entry| *entry.key())
            .collect();
        rooms
            .into_iter()
            .map(|room_id| self.remove_session(room_id, session_id))
            .filter(|removal| removal.removed)
            .collect()
    }

    /// Number of live sessions in the room.
    pub fn active_count(&self, room_id: RoomId) -> usize {
        self.rooms
            .get(&room_id)
            .map(|sessions| sessions.len())
            .unwrap_or(0)
    }

    /// Whether the creator has at least one live session in the room.
    pub fn creator_present(&self, room_id: RoomId) -> bool {
        self.rooms
            .get(&room_id)
            .is_some_and(|sessions| sessions.values().any(|info| info.is_creator))
    }

    /// Forget every session of the room, returning how many were dropped.
    pub fn clear_room(&self, room_id: RoomId) -> usize {
        self.rooms
            .remove(&room_id)
            .map(|(_, sessions)| sessions.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn listener() -> SessionInfo {
        SessionInfo {
            user_id: Uuid::new_v4(),
            is_creator: false,
        }
    }

    fn creator(user_id: UserId) -> SessionInfo {
        SessionInfo {
            user_id,
            is_creator: true,
        }
    }

    #[test]
    fn counts_sessions_not_users() {
        let registry = SessionRegistry::new();
        let room = Uuid::new_v4();
        let user = listener();

        assert_eq!(registry.add_session(room, "s1".into(), user), 1);
        assert_eq!(registry.add_session(room, "s2".into(), user), 2);
        assert_eq!(registry.add_session(room, "s2".into(), user), 2);
        assert_eq!(registry.active_count(room), 2);
    }

    #[test]
    fn double_disconnect_is_noop() {
        let registry = SessionRegistry::new();
        let room = Uuid::new_v4();
        registry.add_session(room, "s1".into(), listener());
        registry.add_session(room, "s2".into(), listener());

        let first = registry.remove_session(room, "s1");
        assert!(first.removed);
        assert_eq!(first.remaining, 1);

        let second = registry.remove_session(room, "s1");
        assert!(!second.removed);
        assert_eq!(second.remaining, 1);
        assert_eq!(registry.active_count(room), 1);

        let unknown_room = registry.remove_session(Uuid::new_v4(), "s2");
        assert!(!unknown_room.removed);
        assert_eq!(unknown_room.remaining, 0);
    }

    #[test]
    fn empty_rooms_are_pruned() {
        let registry = SessionRegistry::new();
        let room = Uuid::new_v4();
        registry.add_session(room, "s1".into(), listener());
        registry.remove_session(room, "s1");
        assert!(registry.rooms.is_empty());
    }

    #[test]
    fn creator_presence_lost_only_on_last_creator_session() {
        let registry = SessionRegistry::new();
        let room = Uuid::new_v4();
        let owner = Uuid::new_v4();
        registry.add_session(room, "tab-1".into(), creator(owner));
        registry.add_session(room, "tab-2".into(), creator(owner));
        registry.add_session(room, "guest".into(), listener());

        assert!(!registry.remove_session(room, "tab-1").creator_presence_lost);
        assert!(registry.creator_present(room));
        assert!(!registry.remove_session(room, "guest").creator_presence_lost);

        let last = registry.remove_session(room, "tab-2");
        assert!(last.creator_presence_lost);
        assert_eq!(last.remaining, 0);
        assert!(!registry.remove_session(room, "tab-2").creator_presence_lost);
    }

    #[test]
    fn remove_everywhere_touches_every_room() {
        let registry = SessionRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        registry.add_session(a, "s".into(), listener());
        registry.add_session(b, "s".into(), listener());
        registry.add_session(b, "t".into(), listener());

        let removals = registry.remove_session_everywhere("s");
        assert_eq!(removals.len(), 2);
        assert_eq!(registry.active_count(a), 0);
        assert_eq!(registry.active_count(b), 1);
        assert_eq!(registry.clear_room(b), 1);
    }
}
