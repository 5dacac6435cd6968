use chrono::{DateTime, Utc};

use crate::models::{generate_id, MemberId, Room};
use crate::protocol::{ChatMessage, Outbox, Reaction, ServerEvent};
use crate::{Error, Result};

pub const MAX_EMOJI_LEN: usize = 16;

/// Relay a chat line to the whole room, sender included.
pub fn send_message(
    room: &Room,
    sender: &MemberId,
    message: &str,
    max_len: usize,
    now: DateTime<Utc>,
) -> Result<Outbox> {
    let member = room.member(sender).ok_or(Error::NotInRoom)?;
    let message = message.trim();
    let len = message.chars().count();
    if len == 0 || len > max_len {
        return Err(Error::InvalidInput(format!(
            "Message must be 1-{max_len} characters"
        )));
    }

    let event = ServerEvent::ChatReceive(ChatMessage {
        id: generate_id(),
        user_id: member.member_id.clone(),
        username: member.username.clone(),
        avatar_url: member.avatar_url.clone(),
        message: message.to_string(),
        timestamp: now,
    });
    let mut out = Outbox::new();
    out.to_many(room.connections(), &event);
    Ok(out)
}

pub fn send_reaction(room: &Room, sender: &MemberId, emoji: &str) -> Result<Outbox> {
    let member = room.member(sender).ok_or(Error::NotInRoom)?;
    let emoji = emoji.trim();
    let len = emoji.chars().count();
    if len == 0 || len > MAX_EMOJI_LEN {
        return Err(Error::InvalidInput("Invalid reaction".to_string()));
    }

    let event = ServerEvent::ReactionShow(Reaction {
        id: generate_id(),
        user_id: member.member_id.clone(),
        username: member.username.clone(),
        emoji: emoji.to_string(),
    });
    let mut out = Outbox::new();
    out.to_many(room.connections(), &event);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::room_with_host;

    #[test]
    fn test_message_is_trimmed_and_stamped() {
        let (room, host_conn) = room_with_host();
        let host = room.host_member_id.clone().unwrap();
        let now = Utc::now();
        let out = send_message(&room, &host, "  hello  ", 500, now).unwrap();

        let ServerEvent::ChatReceive(msg) = out.events_for(&host_conn)[0].clone() else {
            panic!("expected chat:receive");
        };
        assert_eq!(msg.message, "hello");
        assert_eq!(msg.username, "Alice");
        assert_eq!(msg.timestamp, now);
    }

    #[test]
    fn test_message_limits() {
        let (room, _) = room_with_host();
        let host = room.host_member_id.clone().unwrap();
        assert!(send_message(&room, &host, "   ", 500, Utc::now()).is_err());
        assert!(send_message(&room, &host, &"x".repeat(501), 500, Utc::now()).is_err());
        assert!(matches!(
            send_message(&room, &MemberId::new(), "hi", 500, Utc::now()),
            Err(Error::NotInRoom)
        ));
    }

    #[test]
    fn test_reaction() {
        let (room, host_conn) = room_with_host();
        let host = room.host_member_id.clone().unwrap();
        let out = send_reaction(&room, &host, "🎉").unwrap();
        assert!(matches!(out.events_for(&host_conn)[0], ServerEvent::ReactionShow(r) if r.emoji == "🎉"));
        assert!(send_reaction(&room, &host, "").is_err());
    }
}
