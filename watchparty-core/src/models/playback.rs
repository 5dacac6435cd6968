use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::estimate_position;

/// Subtitle index meaning "subtitles off".
pub const SUBTITLES_OFF: i32 = -1;

/// The single authoritative playback state of a room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_time: f64, // seconds, accurate as of `last_update`
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_update: DateTime<Utc>,
    pub playback_rate: f64,
    pub current_subtitle_index: i32,
}

impl PlaybackState {
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            last_update: now,
            playback_rate: 1.0,
            current_subtitle_index: SUBTITLES_OFF,
        }
    }

    pub fn play(&mut self, current_time: f64, now: DateTime<Utc>) {
        self.is_playing = true;
        self.current_time = current_time;
        self.last_update = now;
    }

    pub fn pause(&mut self, current_time: f64, now: DateTime<Utc>) {
        self.is_playing = false;
        self.current_time = current_time;
        self.last_update = now;
    }

    pub fn seek(&mut self, current_time: f64, now: DateTime<Utc>) {
        self.current_time = current_time;
        self.last_update = now;
    }

    /// Change the rate. The position is re-sampled first so the time
    /// already played at the old rate is not re-scaled.
    pub fn set_rate(&mut self, rate: f64, now: DateTime<Utc>) {
        self.current_time = self.estimated_time(now);
        self.playback_rate = rate;
        self.last_update = now;
    }

    pub fn set_subtitle(&mut self, index: i32) {
        self.current_subtitle_index = index;
    }

    /// Fresh position for new content. The playback rate is a viewer
    /// preference and survives.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.is_playing = false;
        self.current_time = 0.0;
        self.last_update = now;
        self.current_subtitle_index = SUBTITLES_OFF;
    }

    #[must_use]
    pub fn estimated_time(&self, now: DateTime<Utc>) -> f64 {
        estimate_position(
            self.current_time,
            self.last_update,
            self.playback_rate,
            self.is_playing,
            now,
        )
    }

    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.clone(),
            estimated_current_time: self.estimated_time(now),
            server_time: now,
        }
    }
}

/// Playback state as sent on the wire, with the derived position attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    #[serde(flatten)]
    pub state: PlaybackState,
    pub estimated_current_time: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub server_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_default_state() {
        let now = Utc::now();
        let state = PlaybackState::new(now);
        assert!(!state.is_playing);
        assert!(state.current_time.abs() < f64::EPSILON);
        assert!((state.playback_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(state.current_subtitle_index, SUBTITLES_OFF);
    }

    #[test]
    fn test_seek_preserves_playing() {
        let now = Utc::now();
        let mut state = PlaybackState::new(now);
        state.play(10.0, now);
        state.seek(300.0, now + Duration::seconds(1));
        assert!(state.is_playing);
        assert!((state.current_time - 300.0).abs() < f64::EPSILON);
        assert_eq!(state.last_update, now + Duration::seconds(1));
    }

    #[test]
    fn test_rate_change_resamples_position() {
        let start = Utc::now();
        let mut state = PlaybackState::new(start);
        state.play(0.0, start);

        let later = start + Duration::seconds(10);
        state.set_rate(2.0, later);
        assert!((state.current_time - 10.0).abs() < 1e-9);

        let even_later = later + Duration::seconds(5);
        assert!((state.estimated_time(even_later) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_position_and_subtitles() {
        let now = Utc::now();
        let mut state = PlaybackState::new(now);
        state.play(1234.0, now);
        state.set_subtitle(2);
        state.reset(now + Duration::seconds(3));

        assert!(!state.is_playing);
        assert!(state.current_time.abs() < f64::EPSILON);
        assert_eq!(state.current_subtitle_index, SUBTITLES_OFF);
    }

    #[test]
    fn test_snapshot_serialization() {
        let now = Utc::now();
        let mut state = PlaybackState::new(now);
        state.play(60.0, now);

        let json = serde_json::to_value(state.snapshot(now + Duration::seconds(2))).unwrap();
        assert_eq!(json["isPlaying"], true);
        assert_eq!(json["currentSubtitleIndex"], -1);
        assert!((json["estimatedCurrentTime"].as_f64().unwrap() - 62.0).abs() < 1e-9);
        assert_eq!(json["lastUpdate"].as_i64().unwrap(), now.timestamp_millis());
    }
}
