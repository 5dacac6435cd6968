pub mod content;
pub mod id;
pub mod member;
pub mod playback;
pub mod poll;
pub mod room;

pub use content::{ContentMetadata, ContentRef, ContentType};
pub use id::{generate_id, ConnectionId, MemberId, PollId, RoomCode, RoomId, SessionId};
pub use member::{Member, MemberProfile};
pub use playback::{PlaybackSnapshot, PlaybackState, SUBTITLES_OFF};
pub use poll::{Poll, PollOption, PollView};
pub use room::{NewRoom, PendingFailover, Room, RoomInfo, RoomSummary, Visibility};
