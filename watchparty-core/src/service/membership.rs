use chrono::{DateTime, Utc};

use crate::models::{ConnectionId, Member, MemberId, MemberProfile, Room, RoomId, SessionId};
use crate::protocol::{Outbox, ServerEvent};
use crate::{Error, Result};

/// Proof about a joiner's room password, established before the event
/// reaches the room.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Credential {
    /// No password was supplied.
    #[default]
    None,
    /// Hash of the password supplied with `room:create`.
    PasswordHash(String),
    /// The supplied password matched the room with this id.
    VerifiedFor(RoomId),
    /// A password was supplied and did not match.
    Rejected,
}

impl Credential {
    #[must_use]
    pub fn admits(&self, room_id: &RoomId) -> bool {
        matches!(self, Self::VerifiedFor(id) if id == room_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// A new member was appended.
    Joined,
    /// An existing session's entry was replaced in place.
    Reconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub kind: JoinKind,
    pub member_id: MemberId,
    /// Member entry that was replaced, when reconnecting.
    pub previous_member_id: Option<MemberId>,
    /// Connection still attached to the replaced entry (session takeover).
    pub displaced_connection: Option<ConnectionId>,
}

/// Admit `profile` into `room`.
///
/// A session already present in the room is replaced in place and skips the
/// password check, since it was admitted before. The returned outbox carries
/// only the notification to existing members; the joiner's snapshot is sent
/// by the caller once every engine has seen the join.
pub fn join(
    room: &mut Room,
    profile: MemberProfile,
    connection_id: ConnectionId,
    credential: &Credential,
    max_members: usize,
    now: DateTime<Utc>,
) -> Result<(JoinOutcome, Outbox)> {
    let mut out = Outbox::new();

    if let Some(index) = room
        .members
        .iter()
        .position(|m| m.session_id == profile.session_id)
    {
        let previous = &room.members[index];
        let displaced_connection = (previous.is_connected
            && previous.connection_id != connection_id)
            .then(|| previous.connection_id.clone());
        let replacement = previous.reconnected(profile, connection_id);
        let previous_member_id = previous.member_id.clone();
        let member_id = replacement.member_id.clone();
        room.members[index] = replacement;

        // Host re-entry is announced by the failover controller.
        let was_host = room.is_host(&previous_member_id)
            || room
                .failover
                .as_ref()
                .is_some_and(|p| p.member_id == previous_member_id);
        if !was_host {
            let event = ServerEvent::UserReconnected {
                user: room.members[index].clone(),
            };
            out.to_many(room.connections_except(&member_id), &event);
        }

        tracing::info!(
            room_code = %room.room_code,
            member_id = %member_id,
            previous_member_id = %previous_member_id,
            takeover = displaced_connection.is_some(),
            "Member reconnected"
        );

        return Ok((
            JoinOutcome {
                kind: JoinKind::Reconnected,
                member_id,
                previous_member_id: Some(previous_member_id),
                displaced_connection,
            },
            out,
        ));
    }

    if room.is_private() && !credential.admits(&room.room_id) {
        tracing::debug!(room_code = %room.room_code, "Join rejected: bad room password");
        return Err(Error::InvalidPassword);
    }
    if room.members.len() >= max_members {
        return Err(Error::RoomFull);
    }

    let member = Member::new(profile, connection_id, now);
    let member_id = member.member_id.clone();
    let event = ServerEvent::UserJoined {
        user: member.clone(),
    };
    out.to_many(room.connections(), &event);
    room.members.push(member);

    tracing::info!(
        room_code = %room.room_code,
        member_id = %member_id,
        members = room.members.len(),
        "Member joined"
    );

    Ok((
        JoinOutcome {
            kind: JoinKind::Joined,
            member_id,
            previous_member_id: None,
            displaced_connection: None,
        },
        out,
    ))
}

/// Remove `member_id` and tell the remaining members.
pub fn leave(room: &mut Room, member_id: &MemberId) -> Result<(Member, Outbox)> {
    let index = room
        .members
        .iter()
        .position(|m| &m.member_id == member_id)
        .ok_or(Error::NotInRoom)?;
    let member = room.members.remove(index);

    let mut out = Outbox::new();
    let event = ServerEvent::UserLeft {
        user_id: member.member_id.clone(),
        username: member.username.clone(),
    };
    out.to_many(room.connections(), &event);

    tracing::info!(
        room_code = %room.room_code,
        member_id = %member.member_id,
        members = room.members.len(),
        "Member left"
    );
    Ok((member, out))
}

/// Host-only: mute or unmute another member.
pub fn set_muted(
    room: &mut Room,
    target: &MemberId,
    is_muted: bool,
    requested_by: &MemberId,
) -> Result<Outbox> {
    if !room.is_host(requested_by) {
        return Err(Error::NotAuthorized(
            "Only the host can mute participants".to_string(),
        ));
    }
    let member = room
        .member_mut(target)
        .ok_or_else(|| Error::InvalidInput("User not found in this room".to_string()))?;
    member.is_muted = is_muted;
    let event = ServerEvent::UserUpdated {
        user: member.clone(),
    };

    let mut out = Outbox::new();
    out.to_many(room.connections(), &event);
    Ok(out)
}

/// Flag a viewer whose connection dropped. The entry stays until its
/// reconnect window closes.
pub fn mark_disconnected(room: &mut Room, member_id: &MemberId) -> Outbox {
    let mut out = Outbox::new();
    if let Some(member) = room.member_mut(member_id) {
        member.is_connected = false;
        let event = ServerEvent::UserUpdated {
            user: member.clone(),
        };
        out.to_many(room.connections(), &event);
        tracing::debug!(room_code = %room.room_code, member_id = %member_id, "Member connection lost");
    }
    out
}

/// Drop a viewer whose reconnect window elapsed. Returns `None` when the
/// session came back or is already gone.
pub fn remove_expired(room: &mut Room, session_id: &SessionId) -> Option<(Member, Outbox)> {
    let member_id = room
        .member_by_session(session_id)
        .filter(|m| !m.is_connected)
        .map(|m| m.member_id.clone())?;
    leave(room, &member_id).ok()
}
