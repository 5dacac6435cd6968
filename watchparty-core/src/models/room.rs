use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{normalize_optional, ContentMetadata, ContentRef};
use super::id::{ConnectionId, MemberId, RoomCode, RoomId, SessionId};
use super::member::Member;
use super::playback::{PlaybackSnapshot, PlaybackState};
use super::poll::{Poll, PollView};
use crate::{Error, Result};

const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_SCHEDULED_FOR_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }
}

/// Host that dropped and may still reclaim the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFailover {
    pub session_id: SessionId,
    pub member_id: MemberId,
    pub deadline: DateTime<Utc>,
}

/// Validated parameters for a new room, minus its creator.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub content: ContentRef,
    pub metadata: ContentMetadata,
    pub description: Option<String>,
    pub scheduled_for: Option<String>,
    pub visibility: Visibility,
    pub password_hash: Option<String>,
}

impl NewRoom {
    /// Private rooms must carry a password hash and public rooms must not.
    pub fn new(
        content: ContentRef,
        metadata: ContentMetadata,
        description: Option<&str>,
        scheduled_for: Option<&str>,
        is_public: bool,
        password_hash: Option<String>,
    ) -> Result<Self> {
        let visibility = match (is_public, password_hash.is_some()) {
            (true, false) => Visibility::Public,
            (false, true) => Visibility::Private,
            (true, true) => {
                return Err(Error::InvalidInput(
                    "Public rooms cannot have a password".to_string(),
                ))
            }
            (false, false) => {
                return Err(Error::InvalidInput(
                    "Private rooms require a password".to_string(),
                ))
            }
        };

        let description = normalize_optional(description);
        if description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(Error::InvalidInput(format!(
                "Description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        let scheduled_for = normalize_optional(scheduled_for);
        if scheduled_for
            .as_ref()
            .is_some_and(|s| s.len() > MAX_SCHEDULED_FOR_LEN)
        {
            return Err(Error::InvalidInput("Invalid schedule".to_string()));
        }

        Ok(Self {
            content,
            metadata,
            description,
            scheduled_for,
            visibility,
            password_hash,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub room_id: RoomId,
    pub room_code: RoomCode,
    pub content: ContentRef,
    pub metadata: ContentMetadata,
    pub description: Option<String>,
    pub scheduled_for: Option<String>,
    pub visibility: Visibility,
    pub password_hash: Option<String>,
    /// Ordered by join time.
    pub members: Vec<Member>,
    pub video_state: PlaybackState,
    pub polls: Vec<Poll>,
    pub host_member_id: Option<MemberId>,
    pub failover: Option<PendingFailover>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Room {
    /// Open a room with `creator` as its only member and host.
    #[must_use]
    pub fn new(code: RoomCode, new_room: NewRoom, mut creator: Member, now: DateTime<Utc>) -> Self {
        creator.is_host = true;
        Self {
            room_id: RoomId::new(),
            room_code: code,
            content: new_room.content,
            metadata: new_room.metadata,
            description: new_room.description,
            scheduled_for: new_room.scheduled_for,
            visibility: new_room.visibility,
            password_hash: new_room.password_hash,
            host_member_id: Some(creator.member_id.clone()),
            members: vec![creator],
            video_state: PlaybackState::new(now),
            polls: Vec::new(),
            failover: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    #[must_use]
    pub fn is_private(&self) -> bool {
        !self.visibility.is_public()
    }

    #[must_use]
    pub fn member(&self, member_id: &MemberId) -> Option<&Member> {
        self.members.iter().find(|m| &m.member_id == member_id)
    }

    pub fn member_mut(&mut self, member_id: &MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| &m.member_id == member_id)
    }

    #[must_use]
    pub fn member_by_session(&self, session_id: &SessionId) -> Option<&Member> {
        self.members.iter().find(|m| &m.session_id == session_id)
    }

    #[must_use]
    pub fn is_host(&self, member_id: &MemberId) -> bool {
        self.host_member_id.as_ref() == Some(member_id)
    }

    #[must_use]
    pub fn host(&self) -> Option<&Member> {
        self.host_member_id.as_ref().and_then(|id| self.member(id))
    }

    /// Current host's name, or the pending host's while failover is open.
    #[must_use]
    pub fn host_username(&self) -> Option<&str> {
        self.host()
            .or_else(|| {
                self.failover
                    .as_ref()
                    .and_then(|pending| self.member(&pending.member_id))
            })
            .map(|m| m.username.as_str())
    }

    pub fn connected_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.is_connected)
    }

    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.connected_members().count()
    }

    /// Connections of every attached member.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.connected_members()
            .map(|m| m.connection_id.clone())
            .collect()
    }

    /// Connections of every attached member except `member_id`.
    #[must_use]
    pub fn connections_except(&self, member_id: &MemberId) -> Vec<ConnectionId> {
        self.connected_members()
            .filter(|m| &m.member_id != member_id)
            .map(|m| m.connection_id.clone())
            .collect()
    }

    #[must_use]
    pub fn poll_views(&self) -> Vec<PollView> {
        self.polls.iter().map(Poll::view).collect()
    }

    /// Full snapshot for `member_id`, sent on create and join.
    pub fn info_for(&self, member_id: &MemberId, now: DateTime<Utc>) -> Result<RoomInfo> {
        let user = self
            .member(member_id)
            .cloned()
            .ok_or_else(|| Error::Internal(format!("member {member_id} missing from room")))?;

        Ok(RoomInfo {
            room_id: self.room_id.clone(),
            room_code: self.room_code.clone(),
            content: self.content.clone(),
            metadata: self.metadata.clone(),
            description: self.description.clone(),
            scheduled_for: self.scheduled_for.clone(),
            is_public: self.visibility.is_public(),
            has_password: self.password_hash.is_some(),
            host_id: self.host_member_id.clone(),
            users: self.members.clone(),
            video_state: self.video_state.snapshot(now),
            user,
        })
    }

    #[must_use]
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.room_id.clone(),
            code: self.room_code.clone(),
            host_username: self.host_username().unwrap_or_default().to_string(),
            content: self.content.clone(),
            metadata: self.metadata.clone(),
            user_count: self.connected_count(),
            is_public: self.visibility.is_public(),
            has_password: self.password_hash.is_some(),
            description: self.description.clone(),
            scheduled_for: self.scheduled_for.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub room_code: RoomCode,
    #[serde(flatten)]
    pub content: ContentRef,
    #[serde(flatten)]
    pub metadata: ContentMetadata,
    pub description: Option<String>,
    pub scheduled_for: Option<String>,
    pub is_public: bool,
    pub has_password: bool,
    pub host_id: Option<MemberId>,
    pub users: Vec<Member>,
    pub video_state: PlaybackSnapshot,
    pub user: Member,
}

/// Entry in the public room browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub code: RoomCode,
    pub host_username: String,
    #[serde(flatten)]
    pub content: ContentRef,
    #[serde(flatten)]
    pub metadata: ContentMetadata,
    pub user_count: usize,
    pub is_public: bool,
    pub has_password: bool,
    pub description: Option<String>,
    pub scheduled_for: Option<String>,
    pub created_at: DateTime<Utc>,
}
