//! Clock abstraction and position estimation.
//!
//! The host reports wall-clock playback samples (`current_time` at
//! `last_update`). Everyone else derives the live position from the last
//! sample instead of trusting their own local clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of "now" for the engine and its timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Estimate the live playback position from the last authoritative sample.
///
/// A paused player stays where it was. A playing one has advanced by the
/// elapsed wall time scaled by the playback rate. Samples stamped in the
/// future (clock skew between processes) never move the position backwards.
#[must_use]
pub fn estimate_position(
    current_time: f64,
    last_update: DateTime<Utc>,
    playback_rate: f64,
    is_playing: bool,
    now: DateTime<Utc>,
) -> f64 {
    if !is_playing {
        return current_time;
    }

    let elapsed_ms = (now - last_update).num_milliseconds().max(0);
    #[allow(clippy::cast_precision_loss)]
    let elapsed_secs = elapsed_ms as f64 / 1000.0;
    current_time + elapsed_secs * playback_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_position_does_not_advance() {
        let sample = Utc::now();
        let later = sample + Duration::seconds(30);
        assert!((estimate_position(42.0, sample, 1.0, false, later) - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_playing_position_advances_with_rate() {
        let sample = Utc::now();
        let later = sample + Duration::seconds(10);

        let normal = estimate_position(100.0, sample, 1.0, true, later);
        assert!((normal - 110.0).abs() < 1e-9);

        let fast = estimate_position(100.0, sample, 2.0, true, later);
        assert!((fast - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_future_sample_is_clamped() {
        let now = Utc::now();
        let skewed = now + Duration::seconds(5);
        assert!((estimate_position(10.0, skewed, 1.0, true, now) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::milliseconds(1500));
        assert_eq!(clock.now() - start, Duration::milliseconds(1500));
    }
}
