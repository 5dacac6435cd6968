use chrono::{DateTime, Utc};
use serde::Serialize;

use super::content::normalize_optional;
use super::id::{ConnectionId, MemberId, SessionId};
use crate::{Error, Result};

pub const MAX_USERNAME_LEN: usize = 50;
pub const MAX_SESSION_ID_LEN: usize = 128;
const MAX_AVATAR_URL_LEN: usize = 2048;

/// A participant in a room.
///
/// `member_id` identifies one connection's membership and is replaced when
/// the same `session_id` reconnects. `joined_at` is the tenure used for host
/// promotion and is carried over on reconnect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(rename = "id")]
    pub member_id: MemberId,
    #[serde(skip)]
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_user_id: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_host: bool,
    pub is_muted: bool,
    pub is_connected: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub joined_at: DateTime<Utc>,
    #[serde(skip)]
    pub connection_id: ConnectionId,
}

impl Member {
    #[must_use]
    pub fn new(profile: MemberProfile, connection_id: ConnectionId, now: DateTime<Utc>) -> Self {
        Self {
            member_id: MemberId::new(),
            session_id: profile.session_id,
            auth_user_id: profile.auth_user_id,
            username: profile.username,
            avatar_url: profile.avatar_url,
            is_host: false,
            is_muted: false,
            is_connected: true,
            joined_at: now,
            connection_id,
        }
    }

    /// Build the entry that replaces `self` when its session reconnects.
    ///
    /// Role, mute and tenure carry over; identity fields come from the new
    /// profile since the display name may have changed.
    #[must_use]
    pub fn reconnected(&self, profile: MemberProfile, connection_id: ConnectionId) -> Self {
        Self {
            member_id: MemberId::new(),
            session_id: profile.session_id,
            auth_user_id: profile.auth_user_id,
            username: profile.username,
            avatar_url: profile.avatar_url,
            is_host: self.is_host,
            is_muted: self.is_muted,
            is_connected: true,
            joined_at: self.joined_at,
            connection_id,
        }
    }
}

/// Identity a client presents when creating or joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberProfile {
    pub session_id: SessionId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub auth_user_id: Option<String>,
}

impl MemberProfile {
    /// Validate and normalize raw client input.
    pub fn parse(
        session_id: &str,
        username: &str,
        avatar_url: Option<&str>,
        auth_user_id: Option<&str>,
    ) -> Result<Self> {
        let session_id = session_id.trim();
        if session_id.is_empty() || session_id.len() > MAX_SESSION_ID_LEN {
            return Err(Error::InvalidInput(format!(
                "Session id must be 1-{MAX_SESSION_ID_LEN} characters"
            )));
        }

        let username = username.trim();
        let name_len = username.chars().count();
        if name_len == 0 || name_len > MAX_USERNAME_LEN {
            return Err(Error::InvalidInput(format!(
                "Username must be 1-{MAX_USERNAME_LEN} characters"
            )));
        }

        let avatar_url = normalize_optional(avatar_url);
        if avatar_url.as_ref().is_some_and(|url| url.len() > MAX_AVATAR_URL_LEN) {
            return Err(Error::InvalidInput("Avatar URL is too long".to_string()));
        }

        Ok(Self {
            session_id: SessionId::from(session_id),
            username: username.to_string(),
            avatar_url,
            auth_user_id: normalize_optional(auth_user_id),
        })
    }
}
