use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::content::{normalize_optional, validate_content_id};
use crate::models::{ConnectionId, ContentMetadata, ContentRef, MemberId, Room};
use crate::protocol::{ContentChange, Outbox, ServerEvent};
use crate::{Error, Result};

pub const MIN_PLAYBACK_RATE: f64 = 0.25;
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

/// Who may drive playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPolicy {
    #[default]
    HostOnly,
    Everyone,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackCommand {
    Play(f64),
    Pause(f64),
    Seek(f64),
    SetRate(f64),
}

/// Requested content switch. Absent fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct ContentUpdate {
    pub content_type: Option<String>,
    pub content_id: Option<String>,
    pub episode_id: Option<String>,
    pub content_title: Option<String>,
    pub content_poster: Option<String>,
    pub episode_title: Option<String>,
}

#[must_use]
pub fn can_control_playback(room: &Room, member_id: &MemberId, policy: PlaybackPolicy) -> bool {
    match policy {
        PlaybackPolicy::HostOnly => room.is_host(member_id),
        PlaybackPolicy::Everyone => room.member(member_id).is_some_and(|m| m.is_connected),
    }
}

fn authorize(room: &Room, issuer: &MemberId, policy: PlaybackPolicy) -> Result<()> {
    if can_control_playback(room, issuer, policy) {
        Ok(())
    } else {
        Err(Error::NotAuthorized(
            "Only the host can control playback".to_string(),
        ))
    }
}

fn validate_position(current_time: f64) -> Result<f64> {
    if current_time.is_finite() && current_time >= 0.0 {
        Ok(current_time)
    } else {
        Err(Error::InvalidInput("Invalid playback position".to_string()))
    }
}

/// Apply a play/pause/seek/rate command and sync everyone else.
pub fn apply(
    room: &mut Room,
    issuer: &MemberId,
    command: PlaybackCommand,
    policy: PlaybackPolicy,
    now: DateTime<Utc>,
) -> Result<Outbox> {
    authorize(room, issuer, policy)?;

    let state = &mut room.video_state;
    match command {
        PlaybackCommand::Play(t) => state.play(validate_position(t)?, now),
        PlaybackCommand::Pause(t) => state.pause(validate_position(t)?, now),
        PlaybackCommand::Seek(t) => state.seek(validate_position(t)?, now),
        PlaybackCommand::SetRate(rate) => {
            if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
                return Err(Error::InvalidInput(format!(
                    "Playback rate must be between {MIN_PLAYBACK_RATE} and {MAX_PLAYBACK_RATE}"
                )));
            }
            state.set_rate(rate, now);
        }
    }

    tracing::debug!(
        room_code = %room.room_code,
        command = ?command,
        is_playing = room.video_state.is_playing,
        "Playback updated"
    );

    let mut out = Outbox::new();
    out.to_many(
        room.connections_except(issuer),
        &ServerEvent::VideoSync(room.video_state.snapshot(now)),
    );
    Ok(out)
}

pub fn set_subtitle(
    room: &mut Room,
    issuer: &MemberId,
    subtitle_index: i32,
    policy: PlaybackPolicy,
) -> Result<Outbox> {
    authorize(room, issuer, policy)?;
    if subtitle_index < -1 {
        return Err(Error::InvalidInput("Invalid subtitle track".to_string()));
    }
    room.video_state.set_subtitle(subtitle_index);

    let mut out = Outbox::new();
    out.to_many(
        room.connections_except(issuer),
        &ServerEvent::VideoSubtitle { subtitle_index },
    );
    Ok(out)
}

/// Send the live state to one connection only.
#[must_use]
pub fn request_state(room: &Room, requester: ConnectionId, now: DateTime<Utc>) -> Outbox {
    let mut out = Outbox::new();
    out.unicast(requester, ServerEvent::VideoSync(room.video_state.snapshot(now)));
    out
}

/// Switch content and start it from the beginning, paused.
pub fn change_content(
    room: &mut Room,
    issuer: &MemberId,
    update: ContentUpdate,
    policy: PlaybackPolicy,
    now: DateTime<Utc>,
) -> Result<Outbox> {
    authorize(room, issuer, policy)?;
    if update.content_type.is_none() && update.content_id.is_none() && update.episode_id.is_none() {
        return Err(Error::InvalidContent("Nothing to change".to_string()));
    }

    let content_type = match update.content_type.as_deref() {
        Some(raw) => raw.parse()?,
        None => room.content.content_type,
    };
    let content_id = match update.content_id.as_deref() {
        Some(raw) => validate_content_id(raw)?,
        None => room.content.content_id.clone(),
    };
    let same_title = content_id == room.content.content_id && content_type == room.content.content_type;
    let episode_id = normalize_optional(update.episode_id.as_deref());
    let same_episode = same_title && episode_id == room.content.episode_id;

    let previous = &room.metadata;
    let metadata = ContentMetadata::new(
        update
            .content_title
            .as_deref()
            .or_else(|| same_title.then_some(previous.content_title.as_str())),
        update
            .content_poster
            .as_deref()
            .or_else(|| same_title.then(|| previous.content_poster.as_deref()).flatten()),
        update
            .episode_title
            .as_deref()
            .or_else(|| same_episode.then(|| previous.episode_title.as_deref()).flatten()),
    );

    room.content = ContentRef {
        content_type,
        content_id,
        episode_id,
    };
    room.metadata = metadata;
    room.video_state.reset(now);

    tracing::info!(
        room_code = %room.room_code,
        content_type = room.content.content_type.as_str(),
        content_id = %room.content.content_id,
        episode_id = ?room.content.episode_id,
        "Content changed"
    );

    let event = ServerEvent::ContentChanged(ContentChange {
        content: room.content.clone(),
        metadata: room.metadata.clone(),
        video_state: room.video_state.snapshot(now),
    });
    let mut out = Outbox::new();
    out.to_many(room.connections(), &event);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;
    use crate::service::membership::{self, Credential};
    use crate::test_helpers::{profile, room_with_host};
    use chrono::Duration;

    fn with_viewer() -> (Room, MemberId, MemberId) {
        let (mut room, _) = room_with_host();
        let host = room.host_member_id.clone().unwrap();
        let (bob, _) = membership::join(
            &mut room,
            profile("s-bob", "Bob"),
            ConnectionId::from("c-bob"),
            &Credential::None,
            50,
            Utc::now(),
        )
        .unwrap();
        (room, host, bob.member_id)
    }

    #[test]
    fn test_host_play_syncs_others() {
        let (mut room, host, _) = with_viewer();
        let now = Utc::now();
        let out = apply(&mut room, &host, PlaybackCommand::Play(120.0), PlaybackPolicy::HostOnly, now).unwrap();

        assert!(room.video_state.is_playing);
        assert_eq!(out.len(), 1);
        let to_bob = out.events_for(&ConnectionId::from("c-bob"));
        let ServerEvent::VideoSync(snapshot) = to_bob[0] else {
            panic!("expected video:sync");
        };
        assert!((snapshot.state.current_time - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_viewer_cannot_control_under_host_only() {
        let (mut room, _, bob) = with_viewer();
        let before = room.video_state.clone();
        for command in [
            PlaybackCommand::Play(120.0),
            PlaybackCommand::Pause(5.0),
            PlaybackCommand::Seek(60.0),
            PlaybackCommand::SetRate(2.0),
        ] {
            let err = apply(&mut room, &bob, command, PlaybackPolicy::HostOnly, Utc::now()).unwrap_err();
            assert!(matches!(err, Error::NotAuthorized(_)));
        }
        assert_eq!(room.video_state, before);
    }

    #[test]
    fn test_everyone_policy_allows_viewers() {
        let (mut room, _, bob) = with_viewer();
        apply(&mut room, &bob, PlaybackCommand::Play(1.0), PlaybackPolicy::Everyone, Utc::now()).unwrap();
        assert!(room.video_state.is_playing);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let (mut room, host, _) = with_viewer();
        let now = Utc::now();
        for command in [
            PlaybackCommand::Seek(-1.0),
            PlaybackCommand::Play(f64::NAN),
            PlaybackCommand::SetRate(0.1),
            PlaybackCommand::SetRate(8.0),
        ] {
            assert!(matches!(
                apply(&mut room, &host, command, PlaybackPolicy::HostOnly, now),
                Err(Error::InvalidInput(_))
            ));
        }
        assert!(set_subtitle(&mut room, &host, -2, PlaybackPolicy::HostOnly).is_err());
    }

    #[test]
    fn test_subtitle_broadcast_is_narrow() {
        let (mut room, host, _) = with_viewer();
        let out = set_subtitle(&mut room, &host, 2, PlaybackPolicy::HostOnly).unwrap();
        assert_eq!(room.video_state.current_subtitle_index, 2);
        assert!(matches!(
            out.events_for(&ConnectionId::from("c-bob"))[0],
            ServerEvent::VideoSubtitle { subtitle_index: 2 }
        ));
    }

    #[test]
    fn test_request_state_is_unicast() {
        let (room, _, _) = with_viewer();
        let out = request_state(&room, ConnectionId::from("c-bob"), Utc::now());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_change_content_resets_position() {
        let (mut room, host, _) = with_viewer();
        let now = Utc::now();
        apply(&mut room, &host, PlaybackCommand::Play(900.0), PlaybackPolicy::HostOnly, now).unwrap();
        room.video_state.set_subtitle(1);

        let update = ContentUpdate {
            content_type: Some("show".to_string()),
            content_id: Some("S9".to_string()),
            episode_id: Some("E2".to_string()),
            episode_title: Some("Pilot".to_string()),
            ..ContentUpdate::default()
        };
        let out = change_content(&mut room, &host, update, PlaybackPolicy::HostOnly, now + Duration::seconds(5)).unwrap();

        assert_eq!(room.content.content_type, ContentType::Show);
        assert_eq!(room.content.episode_id.as_deref(), Some("E2"));
        assert!(!room.video_state.is_playing);
        assert!(room.video_state.current_time.abs() < f64::EPSILON);
        assert_eq!(room.video_state.current_subtitle_index, -1);
        // New title, so the old title does not carry over.
        assert_eq!(room.metadata.content_title, "Untitled");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_change_episode_keeps_show_title() {
        let (mut room, host, _) = with_viewer();
        let title = room.metadata.content_title.clone();
        let update = ContentUpdate {
            episode_id: Some("E3".to_string()),
            ..ContentUpdate::default()
        };
        change_content(&mut room, &host, update, PlaybackPolicy::HostOnly, Utc::now()).unwrap();
        assert_eq!(room.metadata.content_title, title);
    }

    #[test]
    fn test_change_content_validation() {
        let (mut room, host, bob) = with_viewer();
        assert!(matches!(
            change_content(&mut room, &host, ContentUpdate::default(), PlaybackPolicy::HostOnly, Utc::now()),
            Err(Error::InvalidContent(_))
        ));
        let bad_type = ContentUpdate {
            content_type: Some("podcast".to_string()),
            ..ContentUpdate::default()
        };
        assert!(matches!(
            change_content(&mut room, &host, bad_type, PlaybackPolicy::HostOnly, Utc::now()),
            Err(Error::InvalidContent(_))
        ));
        let update = ContentUpdate {
            content_id: Some("M2".to_string()),
            ..ContentUpdate::default()
        };
        assert!(matches!(
            change_content(&mut room, &bob, update, PlaybackPolicy::HostOnly, Utc::now()),
            Err(Error::NotAuthorized(_))
        ));
    }
}
