use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    ContentMetadata, ContentRef, Member, MemberId, PlaybackSnapshot, PollId, PollView, RoomInfo,
    RoomSummary,
};

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "room:created")]
    RoomCreated(RoomInfo),
    #[serde(rename = "room:joined")]
    RoomJoined(RoomInfo),
    #[serde(rename = "room:user-joined")]
    UserJoined { user: Member },
    #[serde(rename = "room:user-left")]
    UserLeft { user_id: MemberId, username: String },
    #[serde(rename = "room:user-updated")]
    UserUpdated { user: Member },
    #[serde(rename = "room:user-reconnected")]
    UserReconnected { user: Member },
    #[serde(rename = "room:host-disconnected")]
    HostDisconnected { message: String, grace_period_ms: u64 },
    #[serde(rename = "room:host-reconnected")]
    HostReconnected { user: Member },
    #[serde(rename = "room:host-changed")]
    HostChanged {
        user: Member,
        previous_host_id: Option<MemberId>,
    },
    #[serde(rename = "room:destroyed")]
    RoomDestroyed { message: String },
    #[serde(rename = "room:error")]
    RoomError { message: String },
    #[serde(rename = "rooms:list")]
    RoomsList(Vec<RoomSummary>),

    #[serde(rename = "video:sync")]
    VideoSync(PlaybackSnapshot),
    #[serde(rename = "video:subtitle")]
    VideoSubtitle { subtitle_index: i32 },
    #[serde(rename = "content:changed")]
    ContentChanged(ContentChange),

    #[serde(rename = "chat:receive")]
    ChatReceive(ChatMessage),
    #[serde(rename = "reaction:show")]
    ReactionShow(Reaction),

    #[serde(rename = "poll:created")]
    PollCreated(PollView),
    #[serde(rename = "poll:updated")]
    PollUpdated(PollView),
    #[serde(rename = "poll:closed")]
    PollClosed { poll_id: PollId },
    #[serde(rename = "poll:list")]
    PollList(Vec<PollView>),
    #[serde(rename = "poll:error")]
    PollError { message: String },
}

impl ServerEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RoomCreated(_) => "room:created",
            Self::RoomJoined(_) => "room:joined",
            Self::UserJoined { .. } => "room:user-joined",
            Self::UserLeft { .. } => "room:user-left",
            Self::UserUpdated { .. } => "room:user-updated",
            Self::UserReconnected { .. } => "room:user-reconnected",
            Self::HostDisconnected { .. } => "room:host-disconnected",
            Self::HostReconnected { .. } => "room:host-reconnected",
            Self::HostChanged { .. } => "room:host-changed",
            Self::RoomDestroyed { .. } => "room:destroyed",
            Self::RoomError { .. } => "room:error",
            Self::RoomsList(_) => "rooms:list",
            Self::VideoSync(_) => "video:sync",
            Self::VideoSubtitle { .. } => "video:subtitle",
            Self::ContentChanged(_) => "content:changed",
            Self::ChatReceive(_) => "chat:receive",
            Self::ReactionShow(_) => "reaction:show",
            Self::PollCreated(_) => "poll:created",
            Self::PollUpdated(_) => "poll:updated",
            Self::PollClosed { .. } => "poll:closed",
            Self::PollList(_) => "poll:list",
            Self::PollError { .. } => "poll:error",
        }
    }
}

/// New content reference plus the reset playback state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChange {
    #[serde(flatten)]
    pub content: ContentRef,
    #[serde(flatten)]
    pub metadata: ContentMetadata,
    pub video_state: PlaybackSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: MemberId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: String,
    pub user_id: MemberId,
    pub username: String,
    pub emoji: String,
}
