//! Shared fixtures for unit tests.

use chrono::Utc;

use crate::models::{
    ConnectionId, ContentMetadata, ContentRef, Member, MemberProfile, NewRoom, Room, RoomCode,
};

pub fn profile(session: &str, username: &str) -> MemberProfile {
    MemberProfile::parse(session, username, None, None).expect("valid profile")
}

pub fn creator(session: &str, username: &str) -> Member {
    Member::new(
        profile(session, username),
        ConnectionId::from(format!("c-{session}")),
        Utc::now(),
    )
}

pub fn public_new_room() -> NewRoom {
    NewRoom::new(
        ContentRef::parse("movie", "M1", None).expect("valid content"),
        ContentMetadata::new(Some("Movie One"), None, None),
        None,
        None,
        true,
        None,
    )
    .expect("valid room")
}

/// A public room hosted by Alice, plus Alice's connection id.
pub fn room_with_host() -> (Room, ConnectionId) {
    let alice = Member::new(profile("s-alice", "Alice"), ConnectionId::from("c-alice"), Utc::now());
    let room = Room::new(RoomCode::parse("TEST01"), public_new_room(), alice, Utc::now());
    (room, ConnectionId::from("c-alice"))
}
