//! Typed dispatch of client events to the room engines.
//!
//! The dispatcher owns all mutable sync state: the room registry, the
//! per-connection table and the deferred actions. It is driven by a single
//! task (see [`crate::runtime`]), so every event is applied to completion
//! before the next one is looked at.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::RoomConfig;
use crate::models::{
    ConnectionId, ContentMetadata, ContentRef, Member, MemberId, MemberProfile, NewRoom, Room,
    RoomCode, RoomId, RoomSummary, SessionId,
};
use crate::notify::{ActivityNotifier, TracingNotifier, WatchActivity};
use crate::protocol::inbound::{RoomCreatePayload, RoomJoinPayload};
use crate::protocol::{ClientEvent, Outbox, ServerEvent};
use crate::service::{
    chat, failover, membership, playback, poll, ContentUpdate, DeferredAction, DeferredActions,
    FailoverOutcome, HostLeavePolicy, JoinKind, PlaybackCommand, PlaybackPolicy, RoomRegistry,
};
use crate::{Error, Result};

pub use crate::service::Credential;

const ROOM_ABANDONED_MESSAGE: &str = "The host did not return. This room has been closed.";
const HOST_LEFT_MESSAGE: &str = "The host left and nobody else is here. This room has been closed.";
const ROOM_IDLE_MESSAGE: &str = "This room was closed due to inactivity.";
const SESSION_TAKEN_OVER_MESSAGE: &str = "Your session was resumed on another connection.";

/// Tunables the engines need, derived from [`RoomConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub grace_period: Duration,
    pub code_length: usize,
    pub max_members: usize,
    pub idle_room_ttl: Duration,
    pub playback_policy: PlaybackPolicy,
    pub host_leave_policy: HostLeavePolicy,
    pub max_chat_length: usize,
}

impl EngineSettings {
    fn grace(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.grace_period).unwrap_or_else(|_| chrono::Duration::seconds(30))
    }
}

impl From<&RoomConfig> for EngineSettings {
    fn from(config: &RoomConfig) -> Self {
        Self {
            grace_period: config.grace_period(),
            code_length: config.code_length,
            max_members: config.max_members,
            idle_room_ttl: config.idle_room_ttl(),
            playback_policy: config.playback_policy,
            host_leave_policy: config.host_leave_policy,
            max_chat_length: config.max_chat_length,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&RoomConfig::default())
    }
}

/// Server-side view of one transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub connection_id: ConnectionId,
    pub room_code: Option<RoomCode>,
    pub member_id: Option<MemberId>,
}

impl ConnectionState {
    #[must_use]
    pub const fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            room_code: None,
            member_id: None,
        }
    }

    fn detach(&mut self) {
        self.room_code = None;
        self.member_id = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub active_rooms: usize,
    pub connections: usize,
    pub connected_members: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    Leave,
    Disconnect,
}

pub struct EventDispatcher {
    settings: EngineSettings,
    clock: Arc<dyn Clock>,
    registry: RoomRegistry,
    connections: HashMap<ConnectionId, ConnectionState>,
    timers: DeferredActions,
    notifier: Arc<dyn ActivityNotifier>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(settings: EngineSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: RoomRegistry::new(settings.code_length),
            settings,
            clock,
            connections: HashMap::new(),
            timers: DeferredActions::new(),
            notifier: Arc::new(TracingNotifier),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ActivityNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: RoomRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn connect(&mut self, connection_id: ConnectionId) {
        tracing::debug!(connection_id = %connection_id, "Connection opened");
        self.connections
            .insert(connection_id.clone(), ConnectionState::new(connection_id));
    }

    /// Handle one client event. Failures become a `room:error` or
    /// `poll:error` for the sender alone.
    pub fn handle(
        &mut self,
        connection_id: &ConnectionId,
        event: ClientEvent,
        credential: Credential,
    ) -> Outbox {
        if !self.connections.contains_key(connection_id) {
            self.connect(connection_id.clone());
        }
        let name = event.name();
        match self.route(connection_id, event, credential) {
            Ok(out) => out,
            Err(err) => {
                tracing::debug!(connection_id = %connection_id, event = name, error = %err, "Event rejected");
                let mut out = Outbox::new();
                out.unicast(connection_id.clone(), err.into_server_event());
                out
            }
        }
    }

    fn route(
        &mut self,
        conn: &ConnectionId,
        event: ClientEvent,
        credential: Credential,
    ) -> Result<Outbox> {
        let policy = self.settings.playback_policy;
        match event {
            ClientEvent::RoomCreate(payload) => self.on_room_create(conn, payload, credential),
            ClientEvent::RoomJoin(payload) => self.on_room_join(conn, payload, &credential),
            ClientEvent::RoomLeave => self.on_room_leave(conn),
            ClientEvent::RoomsList => {
                let mut out = Outbox::new();
                out.unicast(conn.clone(), ServerEvent::RoomsList(self.registry.list_public()));
                Ok(out)
            }

            ClientEvent::ChatMessage(payload) => {
                let max_len = self.settings.max_chat_length;
                self.in_room(conn, |room, member, now| {
                    chat::send_message(room, member, &payload.message, max_len, now)
                })
            }
            ClientEvent::ReactionSend(payload) => self.in_room(conn, |room, member, _| {
                chat::send_reaction(room, member, &payload.emoji)
            }),

            ClientEvent::VideoPlay(p) => self.playback(conn, PlaybackCommand::Play(p.current_time)),
            ClientEvent::VideoPause(p) => self.playback(conn, PlaybackCommand::Pause(p.current_time)),
            ClientEvent::VideoSeek(p) => self.playback(conn, PlaybackCommand::Seek(p.current_time)),
            ClientEvent::VideoPlaybackRate(p) => self.playback(conn, PlaybackCommand::SetRate(p.rate)),
            ClientEvent::VideoSubtitle(p) => self.in_room(conn, |room, member, _| {
                playback::set_subtitle(room, member, p.subtitle_index, policy)
            }),
            ClientEvent::VideoRequestState => self.in_room(conn, |room, _, now| {
                Ok(playback::request_state(room, conn.clone(), now))
            }),
            ClientEvent::VideoChangeContent(p) => {
                let update = ContentUpdate {
                    content_type: p.content_type,
                    content_id: p.content_id,
                    episode_id: p.episode_id,
                    content_title: p.content_title,
                    content_poster: p.content_poster,
                    episode_title: p.episode_title,
                };
                self.in_room(conn, |room, member, now| {
                    playback::change_content(room, member, update, policy, now)
                })
            }

            ClientEvent::VoiceHostMute(p) => self.in_room(conn, |room, member, _| {
                membership::set_muted(room, &p.target_user_id, p.is_muted, member)
            }),

            ClientEvent::PollCreate(p) => self.poll_event(conn, |room, member, now| {
                poll::create(room, member, &p.question, &p.options, p.expires_in_minutes, now)
            }),
            ClientEvent::PollVote(p) => self.poll_event(conn, |room, member, now| {
                poll::vote(room, member, &p.poll_id, &p.option_id, now)
            }),
            ClientEvent::PollClose(p) => {
                self.poll_event(conn, |room, member, _| poll::close(room, member, &p.poll_id))
            }
            ClientEvent::PollGet => self.poll_event(conn, |room, _, _| {
                let mut out = Outbox::new();
                out.unicast(conn.clone(), ServerEvent::PollList(poll::list(room)));
                Ok(out)
            }),
        }
    }

    fn playback(&mut self, conn: &ConnectionId, command: PlaybackCommand) -> Result<Outbox> {
        let policy = self.settings.playback_policy;
        self.in_room(conn, |room, member, now| {
            playback::apply(room, member, command, policy, now)
        })
    }

    /// Run `f` against the sender's room and member.
    fn in_room<F>(&mut self, conn: &ConnectionId, f: F) -> Result<Outbox>
    where
        F: FnOnce(&mut Room, &MemberId, DateTime<Utc>) -> Result<Outbox>,
    {
        let (code, member_id) = self.membership_of(conn)?;
        let now = self.clock.now();
        let room = self.registry.get_mut(&code)?;
        let out = f(room, &member_id, now)?;
        room.touch(now);
        Ok(out)
    }

    /// Like [`Self::in_room`], with lazy poll expiry first. Expiry
    /// announcements go out even when the event itself fails.
    fn poll_event<F>(&mut self, conn: &ConnectionId, f: F) -> Result<Outbox>
    where
        F: FnOnce(&mut Room, &MemberId, DateTime<Utc>) -> Result<Outbox>,
    {
        self.in_room(conn, |room, member, now| {
            let mut out = poll::sweep_expired(room, now);
            match f(room, member, now) {
                Ok(result) => out.extend(result),
                Err(err) => {
                    tracing::debug!(connection_id = %conn, error = %err, "Poll event rejected");
                    out.unicast(conn.clone(), err.into_server_event());
                }
            }
            Ok(out)
        })
    }

    fn membership_of(&self, conn: &ConnectionId) -> Result<(RoomCode, MemberId)> {
        let state = self.connections.get(conn).ok_or(Error::NotInRoom)?;
        match (&state.room_code, &state.member_id) {
            (Some(code), Some(member)) => Ok((code.clone(), member.clone())),
            _ => Err(Error::NotInRoom),
        }
    }

    fn ensure_not_in_room(&self, conn: &ConnectionId) -> Result<()> {
        match self.connections.get(conn) {
            Some(state) if state.room_code.is_some() => Err(Error::InvalidInput(
                "Already in a room. Leave it first.".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn attach(&mut self, conn: &ConnectionId, code: RoomCode, member_id: MemberId) {
        let state = self
            .connections
            .entry(conn.clone())
            .or_insert_with(|| ConnectionState::new(conn.clone()));
        state.room_code = Some(code);
        state.member_id = Some(member_id);
    }

    fn on_room_create(
        &mut self,
        conn: &ConnectionId,
        payload: RoomCreatePayload,
        credential: Credential,
    ) -> Result<Outbox> {
        self.ensure_not_in_room(conn)?;
        if payload.is_public && payload.password.is_some() {
            return Err(Error::InvalidInput(
                "Public rooms cannot have a password".to_string(),
            ));
        }

        let profile = MemberProfile::parse(
            &payload.session_id,
            &payload.username,
            payload.avatar_url.as_deref(),
            payload.auth_user_id.as_deref(),
        )?;
        let content = ContentRef::parse(
            &payload.content_type,
            &payload.content_id,
            payload.episode_id.as_deref(),
        )?;
        let metadata = ContentMetadata::new(
            payload.content_title.as_deref(),
            payload.content_poster.as_deref(),
            payload.episode_title.as_deref(),
        );
        let password_hash = match credential {
            Credential::PasswordHash(hash) => Some(hash),
            _ => None,
        };
        let new_room = NewRoom::new(
            content,
            metadata,
            payload.description.as_deref(),
            payload.scheduled_for.as_deref(),
            payload.is_public,
            password_hash,
        )?;

        let now = self.clock.now();
        let creator = Member::new(profile, conn.clone(), now);
        let member_id = creator.member_id.clone();
        let room = self.registry.create_room(new_room, creator, now)?;
        let code = room.room_code.clone();
        let info = room.info_for(&member_id, now)?;
        let activity = room
            .member(&member_id)
            .and_then(|m| WatchActivity::for_member(room, m));

        self.attach(conn, code, member_id);
        if let Some(activity) = activity {
            self.notifier.watching_started(&activity);
        }

        let mut out = Outbox::new();
        out.unicast(conn.clone(), ServerEvent::RoomCreated(info));
        Ok(out)
    }

    fn on_room_join(
        &mut self,
        conn: &ConnectionId,
        payload: RoomJoinPayload,
        credential: &Credential,
    ) -> Result<Outbox> {
        self.ensure_not_in_room(conn)?;
        let profile = MemberProfile::parse(
            &payload.session_id,
            &payload.username,
            payload.avatar_url.as_deref(),
            payload.auth_user_id.as_deref(),
        )?;
        let session_id = profile.session_id.clone();
        let code = RoomCode::parse(&payload.room_code);
        let now = self.clock.now();
        let max_members = self.settings.max_members;

        let room = match self.registry.get_mut(&code) {
            Ok(room) => room,
            // Unknown codes and private rooms must look the same.
            Err(Error::RoomNotFound(_)) => return Err(Error::InvalidPassword),
            Err(err) => return Err(err),
        };

        let (outcome, mut out) =
            membership::join(room, profile, conn.clone(), credential, max_members, now)?;
        if let Some(previous) = &outcome.previous_member_id {
            poll::transfer_ballots(room, previous, &outcome.member_id);
            if let Some(host_out) = failover::on_reconnect(room, previous, &outcome.member_id) {
                out.extend(host_out);
            }
        }
        room.touch(now);

        // The joiner learns about closed polls from poll:list.
        let others = room.connections_except(&outcome.member_id);
        out.extend(poll::sweep_expired_for(room, now, &others));
        out.unicast(
            conn.clone(),
            ServerEvent::RoomJoined(room.info_for(&outcome.member_id, now)?),
        );
        out.unicast(conn.clone(), ServerEvent::PollList(poll::list(room)));

        let failover_pending = room.failover.is_some();
        let activity = match outcome.kind {
            JoinKind::Joined => room
                .member(&outcome.member_id)
                .and_then(|m| WatchActivity::for_member(room, m)),
            JoinKind::Reconnected => None,
        };

        self.timers
            .cancel(&DeferredAction::MemberReconnect(code.clone(), session_id));
        if !failover_pending {
            self.timers.cancel(&DeferredAction::HostFailover(code.clone()));
        }
        if let Some(displaced) = &outcome.displaced_connection {
            if let Some(state) = self.connections.get_mut(displaced) {
                state.detach();
            }
            out.unicast(
                displaced.clone(),
                ServerEvent::RoomError {
                    message: SESSION_TAKEN_OVER_MESSAGE.to_string(),
                },
            );
        }
        self.attach(conn, code, outcome.member_id);
        if let Some(activity) = activity {
            self.notifier.watching_started(&activity);
        }
        Ok(out)
    }

    fn on_room_leave(&mut self, conn: &ConnectionId) -> Result<Outbox> {
        let (code, member_id) = self.membership_of(conn)?;
        if let Some(state) = self.connections.get_mut(conn) {
            state.detach();
        }
        Ok(self.depart(&code, &member_id, Departure::Leave))
    }

    /// The transport lost a connection.
    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> Outbox {
        let Some(state) = self.connections.remove(connection_id) else {
            return Outbox::new();
        };
        tracing::debug!(connection_id = %connection_id, "Connection closed");
        match (state.room_code, state.member_id) {
            (Some(code), Some(member_id)) => self.depart(&code, &member_id, Departure::Disconnect),
            _ => Outbox::new(),
        }
    }

    fn depart(&mut self, code: &RoomCode, member_id: &MemberId, kind: Departure) -> Outbox {
        let now = self.clock.now();
        let grace = self.settings.grace();
        let Ok(room) = self.registry.get_mut(code) else {
            return Outbox::new();
        };
        let Some(session_id) = room.member(member_id).map(|m| m.session_id.clone()) else {
            return Outbox::new();
        };
        room.touch(now);

        let is_host = room.is_host(member_id);
        let host_holds_role =
            kind == Departure::Disconnect || self.settings.host_leave_policy == HostLeavePolicy::GracePeriod;

        if is_host && host_holds_role {
            return match failover::host_disconnected(room, grace, now) {
                Some((deadline, out)) => {
                    self.timers
                        .schedule(DeferredAction::HostFailover(code.clone()), deadline);
                    out
                }
                None => Outbox::new(),
            };
        }

        if kind == Departure::Disconnect {
            let out = membership::mark_disconnected(room, member_id);
            self.timers.schedule(
                DeferredAction::MemberReconnect(code.clone(), session_id),
                now + grace,
            );
            return out;
        }

        let Ok((member, mut out)) = membership::leave(room, member_id) else {
            return Outbox::new();
        };
        notify_stopped(self.notifier.as_ref(), room, &member);
        self.timers
            .cancel(&DeferredAction::MemberReconnect(code.clone(), session_id));

        if is_host {
            match failover::promote_successor(room, Some(member.member_id)) {
                Some(promoted) => out.extend(promoted),
                None => {
                    out.extend(self.destroy_room(code, HOST_LEFT_MESSAGE));
                    return out;
                }
            }
        }

        if room.members.is_empty() && room.failover.is_none() {
            out.extend(self.destroy_room(code, HOST_LEFT_MESSAGE));
        }
        out
    }

    /// Run every deferred action whose deadline has passed.
    pub fn fire_due(&mut self) -> Outbox {
        let now = self.clock.now();
        let mut out = Outbox::new();
        for action in self.timers.pop_due(now) {
            tracing::debug!(action = ?action, "Deferred action due");
            let result = match &action {
                DeferredAction::HostFailover(code) => self.on_failover_deadline(code),
                DeferredAction::MemberReconnect(code, session) => {
                    self.on_reconnect_deadline(code, session)
                }
            };
            out.extend(result);
        }
        out
    }

    fn on_failover_deadline(&mut self, code: &RoomCode) -> Outbox {
        let Ok(room) = self.registry.get_mut(code) else {
            return Outbox::new();
        };
        match failover::resolve(room) {
            FailoverOutcome::Stale => Outbox::new(),
            FailoverOutcome::Promoted { departed, out } => {
                if let Some(member) = departed {
                    notify_stopped(self.notifier.as_ref(), room, &member);
                }
                out
            }
            FailoverOutcome::Abandoned { departed } => {
                if let Some(member) = departed {
                    notify_stopped(self.notifier.as_ref(), room, &member);
                }
                self.destroy_room(code, ROOM_ABANDONED_MESSAGE)
            }
        }
    }

    fn on_reconnect_deadline(&mut self, code: &RoomCode, session: &SessionId) -> Outbox {
        let Ok(room) = self.registry.get_mut(code) else {
            return Outbox::new();
        };
        let Some((member, mut out)) = membership::remove_expired(room, session) else {
            return Outbox::new();
        };
        notify_stopped(self.notifier.as_ref(), room, &member);

        if room.members.is_empty() && room.failover.is_none() {
            out.extend(self.destroy_room(code, ROOM_ABANDONED_MESSAGE));
        }
        out
    }

    /// Close rooms idle for longer than the configured TTL.
    pub fn reap_idle(&mut self) -> Outbox {
        if self.settings.idle_room_ttl.is_zero() {
            return Outbox::new();
        }
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(self.settings.idle_room_ttl)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let mut out = Outbox::new();
        for code in self.registry.idle_rooms(now, ttl) {
            tracing::info!(room_code = %code, "Reaping idle room");
            out.extend(self.destroy_room(&code, ROOM_IDLE_MESSAGE));
        }
        out
    }

    fn destroy_room(&mut self, code: &RoomCode, message: &str) -> Outbox {
        let mut out = Outbox::new();
        let Some(room) = self.registry.destroy(code) else {
            return out;
        };
        self.timers.cancel_room(code);

        out.to_many(
            room.connections(),
            &ServerEvent::RoomDestroyed {
                message: message.to_string(),
            },
        );
        for member in &room.members {
            notify_stopped(self.notifier.as_ref(), &room, member);
        }
        for state in self.connections.values_mut() {
            if state.room_code.as_ref() == Some(code) {
                state.detach();
            }
        }
        out
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    /// Id and password hash of a private room, for verifying a join
    /// outside the event loop.
    #[must_use]
    pub fn room_secret(&self, code: &RoomCode) -> Option<(RoomId, String)> {
        let room = self.registry.get(code).ok()?;
        room.password_hash
            .clone()
            .map(|hash| (room.room_id.clone(), hash))
    }

    #[must_use]
    pub fn list_public(&self) -> Vec<RoomSummary> {
        self.registry.list_public()
    }

    #[must_use]
    pub fn room(&self, code: &RoomCode) -> Option<&Room> {
        self.registry.get(code).ok()
    }

    #[must_use]
    pub fn connection(&self, conn: &ConnectionId) -> Option<&ConnectionState> {
        self.connections.get(conn)
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        Stats {
            active_rooms: self.registry.len(),
            connections: self.connections.len(),
            connected_members: self
                .registry
                .codes()
                .filter_map(|code| self.registry.get(code).ok())
                .map(Room::connected_count)
                .sum(),
        }
    }
}

fn notify_stopped(notifier: &dyn ActivityNotifier, room: &Room, member: &Member) {
    if let Some(activity) = WatchActivity::for_member(room, member) {
        notifier.watching_stopped(&activity);
    }
}
