use chrono::{DateTime, Utc};

use crate::models::{ConnectionId, MemberId, Poll, PollId, PollView, Room};
use crate::protocol::{Outbox, ServerEvent};
use crate::{Error, Result};

/// Close every poll whose expiry has passed and announce it.
///
/// Polls expire lazily: this runs before any poll event is handled.
pub fn sweep_expired(room: &mut Room, now: DateTime<Utc>) -> Outbox {
    let connections = room.connections();
    sweep_expired_for(room, now, &connections)
}

/// Closes expired polls and announces them to `connections` only.
pub fn sweep_expired_for(
    room: &mut Room,
    now: DateTime<Utc>,
    connections: &[ConnectionId],
) -> Outbox {
    let mut out = Outbox::new();
    for poll in room.polls.iter_mut().filter(|p| p.is_active && p.is_expired(now)) {
        poll.close();
        tracing::debug!(room_code = %room.room_code, poll_id = %poll.poll_id, "Poll expired");
        out.to_many(
            connections.iter().cloned(),
            &ServerEvent::PollClosed {
                poll_id: poll.poll_id.clone(),
            },
        );
    }
    out
}

pub fn create(
    room: &mut Room,
    issuer: &MemberId,
    question: &str,
    options: &[String],
    expires_in_minutes: Option<u32>,
    now: DateTime<Utc>,
) -> Result<Outbox> {
    if !room.is_host(issuer) {
        return Err(Error::NotAuthorized("Only the host can create polls".to_string()));
    }
    let poll = Poll::new(question, options, expires_in_minutes, issuer.clone(), now)?;
    let view = poll.view();

    tracing::info!(
        room_code = %room.room_code,
        poll_id = %poll.poll_id,
        options = poll.options.len(),
        "Poll created"
    );
    room.polls.push(poll);

    let mut out = Outbox::new();
    out.to_many(room.connections(), &ServerEvent::PollCreated(view));
    Ok(out)
}

fn find_mut<'a>(room: &'a mut Room, poll_id: &PollId) -> Result<&'a mut Poll> {
    room.polls
        .iter_mut()
        .find(|p| &p.poll_id == poll_id)
        .ok_or_else(|| Error::PollNotFound(poll_id.to_string()))
}

/// Cast or move a ballot. Only the new tallies are broadcast.
pub fn vote(
    room: &mut Room,
    member: &MemberId,
    poll_id: &PollId,
    option_id: &str,
    now: DateTime<Utc>,
) -> Result<Outbox> {
    if room.member(member).is_none() {
        return Err(Error::NotInRoom);
    }
    let poll = find_mut(room, poll_id)?;
    if poll.is_expired(now) {
        poll.close();
        return Err(Error::PollClosed);
    }
    poll.vote(member, option_id)?;
    let view = poll.view();

    let mut out = Outbox::new();
    out.to_many(room.connections(), &ServerEvent::PollUpdated(view));
    Ok(out)
}

/// Host-only, irrevocable.
pub fn close(room: &mut Room, issuer: &MemberId, poll_id: &PollId) -> Result<Outbox> {
    if !room.is_host(issuer) {
        return Err(Error::NotAuthorized("Only the host can close polls".to_string()));
    }
    let poll = find_mut(room, poll_id)?;
    if !poll.close() {
        return Err(Error::PollClosed);
    }
    tracing::info!(room_code = %room.room_code, poll_id = %poll_id, "Poll closed");

    let mut out = Outbox::new();
    out.to_many(
        room.connections(),
        &ServerEvent::PollClosed {
            poll_id: poll_id.clone(),
        },
    );
    Ok(out)
}

#[must_use]
pub fn list(room: &Room) -> Vec<PollView> {
    room.poll_views()
}

/// Re-key ballots from a replaced member entry to its successor.
pub fn transfer_ballots(room: &mut Room, from: &MemberId, to: &MemberId) {
    for poll in &mut room.polls {
        poll.transfer_ballot(from, to);
    }
}
