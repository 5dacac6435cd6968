use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::models::{Member, NewRoom, Room, RoomCode, RoomSummary};
use crate::{Error, Result};

const MAX_CODE_ATTEMPTS: usize = 32;

type CodeGenerator = Box<dyn FnMut(usize) -> RoomCode + Send>;

/// Directory of active rooms, keyed by upper-case room code.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    code_length: usize,
    generate_code: CodeGenerator,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(code_length: usize) -> Self {
        Self::with_code_generator(code_length, Box::new(RoomCode::generate))
    }

    /// Use a custom code source (tests force collisions with this).
    #[must_use]
    pub fn with_code_generator(code_length: usize, generate_code: CodeGenerator) -> Self {
        Self {
            rooms: HashMap::new(),
            code_length,
            generate_code,
        }
    }

    /// Register a new room with `creator` as its host.
    pub fn create_room(&mut self, new_room: NewRoom, creator: Member, now: DateTime<Utc>) -> Result<&Room> {
        let code = self.unique_code()?;
        let room = Room::new(code.clone(), new_room, creator, now);

        tracing::info!(
            room_code = %code,
            room_id = %room.room_id,
            content_type = room.content.content_type.as_str(),
            content_id = %room.content.content_id,
            private = room.is_private(),
            "Room created"
        );

        Ok(self.rooms.entry(code).or_insert(room))
    }

    fn unique_code(&mut self) -> Result<RoomCode> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = (self.generate_code)(self.code_length);
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
            tracing::debug!(room_code = %code, "Room code collision, retrying");
        }
        Err(Error::Internal(format!(
            "no free room code after {MAX_CODE_ATTEMPTS} attempts"
        )))
    }

    pub fn get(&self, code: &RoomCode) -> Result<&Room> {
        self.rooms
            .get(code)
            .ok_or_else(|| Error::RoomNotFound(code.to_string()))
    }

    pub fn get_mut(&mut self, code: &RoomCode) -> Result<&mut Room> {
        self.rooms
            .get_mut(code)
            .ok_or_else(|| Error::RoomNotFound(code.to_string()))
    }

    #[must_use]
    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    /// Public rooms, newest first.
    #[must_use]
    pub fn list_public(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .values()
            .filter(|room| room.visibility.is_public())
            .map(Room::summary)
            .collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rooms
    }

    /// Remove a room. Destroying an unknown code is a no-op.
    pub fn destroy(&mut self, code: &RoomCode) -> Option<Room> {
        let room = self.rooms.remove(code);
        if room.is_some() {
            tracing::info!(room_code = %code, "Room destroyed");
        }
        room
    }

    /// Rooms with no activity for longer than `ttl`. A zero TTL disables reaping.
    #[must_use]
    pub fn idle_rooms(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<RoomCode> {
        if ttl <= Duration::zero() {
            return Vec::new();
        }
        self.rooms
            .values()
            .filter(|room| now - room.last_activity_at > ttl)
            .map(|room| room.room_code.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &RoomCode> {
        self.rooms.keys()
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("rooms", &self.rooms.len())
            .field("code_length", &self.code_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{creator, public_new_room};
    use std::collections::HashSet;

    #[test]
    fn test_create_room_assigns_code_and_host() {
        let mut registry = RoomRegistry::new(6);
        let room = registry
            .create_room(public_new_room(), creator("s-alice", "Alice"), Utc::now())
            .unwrap();

        assert_eq!(room.room_code.as_str().len(), 6);
        assert_eq!(room.members.len(), 1);
        assert!(room.members[0].is_host);
    }

    #[test]
    fn test_codes_are_unique() {
        let mut registry = RoomRegistry::new(6);
        let now = Utc::now();
        let mut codes = HashSet::new();
        for i in 0..200 {
            let room = registry
                .create_room(public_new_room(), creator(&format!("s{i}"), "Host"), now)
                .unwrap();
            assert!(codes.insert(room.room_code.clone()));
        }
        assert_eq!(registry.len(), 200);
    }

    #[test]
    fn test_collision_is_retried() {
        let mut sequence = vec!["AAAAAA", "AAAAAA", "BBBBBB"].into_iter();
        let mut registry = RoomRegistry::with_code_generator(
            6,
            Box::new(move |_| RoomCode::parse(sequence.next().unwrap_or("ZZZZZZ"))),
        );
        let now = Utc::now();
        let first = registry
            .create_room(public_new_room(), creator("s1", "A"), now)
            .unwrap()
            .room_code
            .clone();
        let second = registry
            .create_room(public_new_room(), creator("s2", "B"), now)
            .unwrap()
            .room_code
            .clone();

        assert_eq!(first.as_str(), "AAAAAA");
        assert_eq!(second.as_str(), "BBBBBB");
    }

    #[test]
    fn test_exhausted_codes_fail() {
        let mut registry =
            RoomRegistry::with_code_generator(6, Box::new(|_| RoomCode::parse("SAME00")));
        let now = Utc::now();
        registry
            .create_room(public_new_room(), creator("s1", "A"), now)
            .unwrap();
        assert!(matches!(
            registry.create_room(public_new_room(), creator("s2", "B"), now),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = RoomRegistry::with_code_generator(6, Box::new(|_| RoomCode::parse("AB12CD")));
        registry
            .create_room(public_new_room(), creator("s1", "A"), Utc::now())
            .unwrap();

        assert!(registry.get(&RoomCode::parse("ab12cd")).is_ok());
        assert!(matches!(
            registry.get(&RoomCode::parse("nope00")),
            Err(Error::RoomNotFound(_))
        ));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut registry = RoomRegistry::new(6);
        let code = registry
            .create_room(public_new_room(), creator("s1", "A"), Utc::now())
            .unwrap()
            .room_code
            .clone();

        assert!(registry.destroy(&code).is_some());
        assert!(registry.destroy(&code).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_public_excludes_private() {
        let mut registry = RoomRegistry::new(6);
        let now = Utc::now();
        registry
            .create_room(public_new_room(), creator("s1", "Alice"), now)
            .unwrap();
        let mut private = public_new_room();
        private.visibility = crate::models::Visibility::Private;
        private.password_hash = Some("$argon2id$stub".to_string());
        registry.create_room(private, creator("s2", "Eve"), now).unwrap();

        let listed = registry.list_public();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].host_username, "Alice");
        assert_eq!(listed[0].user_count, 1);
    }

    #[test]
    fn test_idle_rooms() {
        let mut registry = RoomRegistry::new(6);
        let start = Utc::now();
        let code = registry
            .create_room(public_new_room(), creator("s1", "A"), start)
            .unwrap()
            .room_code
            .clone();

        let later = start + Duration::hours(7);
        assert_eq!(registry.idle_rooms(later, Duration::hours(6)), vec![code]);
        assert!(registry.idle_rooms(later, Duration::zero()).is_empty());
    }
}
