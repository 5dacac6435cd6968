//! Host failover state machine.
//!
//! A room is either stable (`host_member_id` set, no `failover`) or waiting
//! on a dropped host (`host_member_id` empty, `failover` pending). This is
//! the only module that changes a room's host after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Member, MemberId, PendingFailover, Room};
use crate::protocol::{Outbox, ServerEvent};

const HOST_DISCONNECTED_MESSAGE: &str = "Host disconnected. Waiting for them to reconnect...";

/// What a voluntary `room:leave` by the host does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostLeavePolicy {
    /// Same as a dropped connection: hold the role for the grace period.
    #[default]
    GracePeriod,
    /// Hand over (or close the room) at once.
    Immediate,
}

#[derive(Debug)]
pub enum FailoverOutcome {
    /// Nothing was pending; the deadline is stale.
    Stale,
    /// The pending host entry was removed and a successor promoted.
    Promoted {
        departed: Option<Member>,
        out: Outbox,
    },
    /// Nobody connected is left; the room should be destroyed.
    Abandoned { departed: Option<Member> },
}

/// The host's connection dropped (or it left under the grace policy).
///
/// Returns the failover deadline; the caller schedules it.
pub fn host_disconnected(
    room: &mut Room,
    grace: chrono::Duration,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, Outbox)> {
    let host_id = room.host_member_id.take()?;
    let deadline = now + grace;

    let host = room.member_mut(&host_id)?;
    host.is_host = false;
    host.is_connected = false;
    let session_id = host.session_id.clone();
    room.failover = Some(PendingFailover {
        session_id,
        member_id: host_id.clone(),
        deadline,
    });

    let grace_period_ms = u64::try_from(grace.num_milliseconds()).unwrap_or_default();
    let event = ServerEvent::HostDisconnected {
        message: HOST_DISCONNECTED_MESSAGE.to_string(),
        grace_period_ms,
    };
    let mut out = Outbox::new();
    out.to_many(room.connections(), &event);

    tracing::info!(
        room_code = %room.room_code,
        host_id = %host_id,
        grace_period_ms,
        "Host disconnected, failover pending"
    );
    Some((deadline, out))
}

/// A member entry was replaced by its reconnecting session.
///
/// If that entry held (or was pending to regain) the host role, the role
/// moves to the replacement and `room:host-reconnected` goes out.
pub fn on_reconnect(room: &mut Room, previous: &MemberId, replacement: &MemberId) -> Option<Outbox> {
    let pending = room
        .failover
        .as_ref()
        .is_some_and(|p| &p.member_id == previous);
    if !pending && !room.is_host(previous) {
        return None;
    }

    room.failover = None;
    room.host_member_id = Some(replacement.clone());
    let host = room.member_mut(replacement)?;
    host.is_host = true;
    let event = ServerEvent::HostReconnected { user: host.clone() };

    let mut out = Outbox::new();
    out.to_many(room.connections_except(replacement), &event);

    tracing::info!(
        room_code = %room.room_code,
        host_id = %replacement,
        resumed_from_failover = pending,
        "Host reconnected"
    );
    Some(out)
}

/// The grace period elapsed without the host returning.
pub fn resolve(room: &mut Room) -> FailoverOutcome {
    let Some(pending) = room.failover.take() else {
        return FailoverOutcome::Stale;
    };

    let mut out = Outbox::new();
    let departed = room
        .members
        .iter()
        .position(|m| m.member_id == pending.member_id && !m.is_connected)
        .map(|index| room.members.remove(index));
    if let Some(member) = &departed {
        let event = ServerEvent::UserLeft {
            user_id: member.member_id.clone(),
            username: member.username.clone(),
        };
        out.to_many(room.connections(), &event);
    }

    match promote_successor(room, Some(pending.member_id)) {
        Some(promoted) => {
            out.extend(promoted);
            FailoverOutcome::Promoted { departed, out }
        }
        None => {
            tracing::info!(room_code = %room.room_code, "Host did not return and nobody is connected");
            FailoverOutcome::Abandoned { departed }
        }
    }
}

/// Make the longest-tenured connected member host.
///
/// Returns `None` when no connected member remains.
pub fn promote_successor(room: &mut Room, previous_host_id: Option<MemberId>) -> Option<Outbox> {
    let successor_id = room
        .connected_members()
        .min_by_key(|m| m.joined_at)
        .map(|m| m.member_id.clone())?;

    room.failover = None;
    room.host_member_id = Some(successor_id.clone());
    let successor = room.member_mut(&successor_id)?;
    successor.is_host = true;
    let user = successor.clone();

    let mut out = Outbox::new();
    let connections = room.connections();
    out.to_many(
        connections.iter().cloned(),
        &ServerEvent::HostChanged {
            user: user.clone(),
            previous_host_id,
        },
    );
    out.to_many(connections, &ServerEvent::UserUpdated { user });

    tracing::info!(room_code = %room.room_code, host_id = %successor_id, "New host promoted");
    Some(out)
}
