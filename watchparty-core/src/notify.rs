//! Outbound hook toward a friends / notification system.
//!
//! Only members with an `auth_user_id` produce activity. Calls happen on the
//! event loop, so implementations must not block; hand the work off to a
//! task or channel if it does I/O.

use crate::models::{ContentRef, Member, Room, RoomCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchActivity {
    pub auth_user_id: String,
    pub username: String,
    pub room_code: RoomCode,
    pub is_public: bool,
    pub content: ContentRef,
    pub content_title: String,
}

impl WatchActivity {
    /// Activity for `member` in `room`, if the member is signed in.
    #[must_use]
    pub fn for_member(room: &Room, member: &Member) -> Option<Self> {
        let auth_user_id = member.auth_user_id.clone()?;
        Some(Self {
            auth_user_id,
            username: member.username.clone(),
            room_code: room.room_code.clone(),
            is_public: room.visibility.is_public(),
            content: room.content.clone(),
            content_title: room.metadata.content_title.clone(),
        })
    }
}

/// Fire-and-forget; failures are the implementor's to swallow.
#[cfg_attr(test, mockall::automock)]
pub trait ActivityNotifier: Send + Sync {
    fn watching_started(&self, activity: &WatchActivity);
    fn watching_stopped(&self, activity: &WatchActivity);
}

/// Default notifier: records activity in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl ActivityNotifier for TracingNotifier {
    fn watching_started(&self, activity: &WatchActivity) {
        tracing::info!(
            user_id = %activity.auth_user_id,
            room_code = %activity.room_code,
            content_id = %activity.content.content_id,
            "User started watching"
        );
    }

    fn watching_stopped(&self, activity: &WatchActivity) {
        tracing::info!(
            user_id = %activity.auth_user_id,
            room_code = %activity.room_code,
            "User stopped watching"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionId, MemberProfile};
    use crate::test_helpers::room_with_host;
    use chrono::Utc;

    #[test]
    fn test_anonymous_members_produce_no_activity() {
        let (room, _) = room_with_host();
        assert!(WatchActivity::for_member(&room, &room.members[0]).is_none());

        let signed_in = Member::new(
            MemberProfile::parse("s-x", "Xena", None, Some("user-42")).unwrap(),
            ConnectionId::new(),
            Utc::now(),
        );
        let activity = WatchActivity::for_member(&room, &signed_in).unwrap();
        assert_eq!(activity.auth_user_id, "user-42");
        assert_eq!(activity.content.content_id, "M1");
    }
}
