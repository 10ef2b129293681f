//! Time-control status and playback time samples.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the player is currently doing with time.
///
/// Derived from two engine-driven inputs and never set directly:
///
/// | intends to play | paused for cache | status          |
/// |-----------------|------------------|-----------------|
/// | false           | any              | `Paused`        |
/// | true            | false            | `Playing`       |
/// | true            | true             | `WaitingToPlay` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeControlStatus {
    #[default]
    Paused,
    Playing,
    WaitingToPlay,
}

impl TimeControlStatus {
    pub fn from_inputs(intends_to_play: bool, paused_for_cache: bool) -> Self {
        match (intends_to_play, paused_for_cache) {
            (false, _) => TimeControlStatus::Paused,
            (true, false) => TimeControlStatus::Playing,
            (true, true) => TimeControlStatus::WaitingToPlay,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, TimeControlStatus::Playing)
    }
}

/// A point-in-time sample handed to periodic time observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackTime {
    pub current: Duration,
    pub duration: Duration,
    pub status: TimeControlStatus,
}

impl PlaybackTime {
    /// Fraction of the media played, in `0.0..=1.0`. Zero when the duration
    /// is unknown.
    pub fn progress(&self) -> f64 {
        let total = self.duration.as_secs_f64();
        if total <= 0.0 {
            return 0.0;
        }
        (self.current.as_secs_f64() / total).clamp(0.0, 1.0)
    }
}

/// Convert engine seconds to a `Duration`, mapping negative or non-finite
/// values to zero.
pub(crate) fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_truth_table() {
        assert_eq!(TimeControlStatus::from_inputs(false, false), TimeControlStatus::Paused);
        assert_eq!(TimeControlStatus::from_inputs(false, true), TimeControlStatus::Paused);
        assert_eq!(TimeControlStatus::from_inputs(true, false), TimeControlStatus::Playing);
        assert_eq!(
            TimeControlStatus::from_inputs(true, true),
            TimeControlStatus::WaitingToPlay
        );
        assert!(TimeControlStatus::Playing.is_playing());
        assert!(!TimeControlStatus::WaitingToPlay.is_playing());
    }

    #[test]
    fn test_progress() {
        let sample = PlaybackTime {
            current: Duration::from_secs(30),
            duration: Duration::from_secs(120),
            status: TimeControlStatus::Playing,
        };
        assert!((sample.progress() - 0.25).abs() < f64::EPSILON);

        let unknown = PlaybackTime {
            duration: Duration::ZERO,
            ..sample
        };
        assert_eq!(unknown.progress(), 0.0);
    }

    #[test]
    fn test_seconds_conversion() {
        assert_eq!(seconds(1.5), Duration::from_millis(1500));
        assert_eq!(seconds(-2.0), Duration::ZERO);
        assert_eq!(seconds(f64::NAN), Duration::ZERO);
        assert_eq!(seconds(f64::INFINITY), Duration::ZERO);
    }
}
