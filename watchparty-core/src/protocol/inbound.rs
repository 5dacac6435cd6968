use serde::Deserialize;

use crate::models::{MemberId, PollId};

/// Events a client may send.
///
/// Wire form is `{"event": "<name>", "data": {...}}`; events without a
/// payload may omit `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "room:create")]
    RoomCreate(RoomCreatePayload),
    #[serde(rename = "room:join")]
    RoomJoin(RoomJoinPayload),
    #[serde(rename = "room:leave")]
    RoomLeave,
    #[serde(rename = "rooms:list")]
    RoomsList,

    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessagePayload),
    #[serde(rename = "reaction:send")]
    ReactionSend(ReactionPayload),

    #[serde(rename = "video:play")]
    VideoPlay(PositionPayload),
    #[serde(rename = "video:pause")]
    VideoPause(PositionPayload),
    #[serde(rename = "video:seek")]
    VideoSeek(PositionPayload),
    #[serde(rename = "video:playbackRate")]
    VideoPlaybackRate(RatePayload),
    #[serde(rename = "video:subtitle")]
    VideoSubtitle(SubtitlePayload),
    #[serde(rename = "video:request-state")]
    VideoRequestState,
    #[serde(rename = "video:change-content")]
    VideoChangeContent(ChangeContentPayload),

    #[serde(rename = "voice:host-mute")]
    VoiceHostMute(HostMutePayload),

    #[serde(rename = "poll:create")]
    PollCreate(PollCreatePayload),
    #[serde(rename = "poll:vote")]
    PollVote(PollVotePayload),
    #[serde(rename = "poll:close")]
    PollClose(PollClosePayload),
    #[serde(rename = "poll:get")]
    PollGet,
}

impl ClientEvent {
    /// Wire name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RoomCreate(_) => "room:create",
            Self::RoomJoin(_) => "room:join",
            Self::RoomLeave => "room:leave",
            Self::RoomsList => "rooms:list",
            Self::ChatMessage(_) => "chat:message",
            Self::ReactionSend(_) => "reaction:send",
            Self::VideoPlay(_) => "video:play",
            Self::VideoPause(_) => "video:pause",
            Self::VideoSeek(_) => "video:seek",
            Self::VideoPlaybackRate(_) => "video:playbackRate",
            Self::VideoSubtitle(_) => "video:subtitle",
            Self::VideoRequestState => "video:request-state",
            Self::VideoChangeContent(_) => "video:change-content",
            Self::VoiceHostMute(_) => "voice:host-mute",
            Self::PollCreate(_) => "poll:create",
            Self::PollVote(_) => "poll:vote",
            Self::PollClose(_) => "poll:close",
            Self::PollGet => "poll:get",
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatePayload {
    pub content_type: String,
    pub content_id: String,
    pub episode_id: Option<String>,
    pub content_title: Option<String>,
    pub content_poster: Option<String>,
    pub episode_title: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub session_id: String,
    pub auth_user_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    pub password: Option<String>,
    pub description: Option<String>,
    pub scheduled_for: Option<String>,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinPayload {
    pub room_code: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub session_id: String,
    pub password: Option<String>,
    pub auth_user_id: Option<String>,
}

// Passwords never reach logs.
impl std::fmt::Debug for RoomCreatePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomCreatePayload")
            .field("content_type", &self.content_type)
            .field("content_id", &self.content_id)
            .field("episode_id", &self.episode_id)
            .field("username", &self.username)
            .field("session_id", &self.session_id)
            .field("is_public", &self.is_public)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RoomJoinPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomJoinPayload")
            .field("room_code", &self.room_code)
            .field("username", &self.username)
            .field("session_id", &self.session_id)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessagePayload {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionPayload {
    pub emoji: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPayload {
    pub current_time: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RatePayload {
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitlePayload {
    pub subtitle_index: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeContentPayload {
    pub content_type: Option<String>,
    pub content_id: Option<String>,
    pub episode_id: Option<String>,
    pub content_title: Option<String>,
    pub content_poster: Option<String>,
    pub episode_title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMutePayload {
    pub target_user_id: MemberId,
    pub is_muted: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCreatePayload {
    pub question: String,
    pub options: Vec<String>,
    pub expires_in_minutes: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollVotePayload {
    pub poll_id: PollId,
    pub option_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollClosePayload {
    pub poll_id: PollId,
}

const fn default_true() -> bool {
    true
}
