//! Playback state types shared by the player, the throttle and the events.

use serde::{Deserialize, Serialize};

/// Transport state.
///
/// `Stopped` and `Paused` are distinct even when `current_time == 0`:
/// only `stop()` (or a fresh load) yields `Stopped`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

impl PlayState {
    pub fn is_playing(self) -> bool {
        self == PlayState::Playing
    }
}

/// Inclusive span of absolute instants (epoch ms).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Span in milliseconds (never negative)
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0) as f64
    }

    /// Clamp both ends into `bounds`
    pub fn clamp_to(&self, bounds: &TimeRange) -> TimeRange {
        TimeRange {
            start: self.start.clamp(bounds.start, bounds.end),
            end: self.end.clamp(bounds.start, bounds.end),
        }
    }
}

/// Snapshot of the transport, as published in `stateChange`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub play_state: PlayState,
    pub is_playing: bool,
    /// Milliseconds since window start, in `[0, total_duration]`
    pub current_time: f64,
    pub speed: f64,
    /// Epoch ms
    pub window_start: i64,
    /// Epoch ms
    pub window_end: i64,
    pub total_duration: f64,
}
