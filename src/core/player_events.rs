//! Events published by the player.
//!
//! One tagged enum carries every payload; [`EventKind`] is its tag and keys
//! the bus dispatch table. Serialized as `{"event": "...", "data": ...}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::sample::Position;
use crate::core::state::PlaybackState;

/// Playback state plus the absolute instant of `current_time`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(flatten)]
    pub state: PlaybackState,
    pub timestamp: String,
}

/// Virtual clock position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeUpdate {
    /// Milliseconds since window start
    pub current_time: f64,
    /// RFC 3339 absolute instant
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// Coarse UI state (throttled)
    StateChange(StateSnapshot),
    /// All entity positions for the current tick
    PositionUpdate(Vec<Position>),
    TimeUpdate(TimeUpdate),
    PlayStateChange(bool),
    SpeedChange(f64),
}

impl PlaybackEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlaybackEvent::StateChange(_) => EventKind::StateChange,
            PlaybackEvent::PositionUpdate(_) => EventKind::PositionUpdate,
            PlaybackEvent::TimeUpdate(_) => EventKind::TimeUpdate,
            PlaybackEvent::PlayStateChange(_) => EventKind::PlayStateChange,
            PlaybackEvent::SpeedChange(_) => EventKind::SpeedChange,
        }
    }
}

/// Event tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChange,
    PositionUpdate,
    TimeUpdate,
    PlayStateChange,
    SpeedChange,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::StateChange,
        EventKind::PositionUpdate,
        EventKind::TimeUpdate,
        EventKind::PlayStateChange,
        EventKind::SpeedChange,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::StateChange => "stateChange",
            EventKind::PositionUpdate => "positionUpdate",
            EventKind::TimeUpdate => "timeUpdate",
            EventKind::PlayStateChange => "playStateChange",
            EventKind::SpeedChange => "speedChange",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    /// Accepts the camelCase event name or its snake_case / lowercase spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['_', '-'], "").to_ascii_lowercase();
        EventKind::ALL
            .into_iter()
            .find(|k| k.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown event '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!("timeUpdate".parse::<EventKind>(), Ok(EventKind::TimeUpdate));
        assert_eq!("position_update".parse::<EventKind>(), Ok(EventKind::PositionUpdate));
        assert_eq!("SPEEDCHANGE".parse::<EventKind>(), Ok(EventKind::SpeedChange));
        assert!("frame".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_event_json_shape() {
        let ev = PlaybackEvent::TimeUpdate(TimeUpdate {
            current_time: 1500.0,
            timestamp: "2024-01-15T10:15:31.500Z".into(),
        });
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "timeUpdate");
        assert_eq!(json["data"]["currentTime"], 1500.0);
        assert_eq!(ev.kind(), EventKind::TimeUpdate);

        let json = serde_json::to_value(PlaybackEvent::PlayStateChange(true)).unwrap();
        assert_eq!(json["event"], "playStateChange");
        assert_eq!(json["data"], true);
    }

    #[test]
    fn test_state_snapshot_is_flat() {
        let snap = StateSnapshot {
            state: PlaybackState {
                speed: 2.0,
                ..Default::default()
            },
            timestamp: "1970-01-01T00:00:00.000Z".into(),
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["speed"], 2.0);
        assert_eq!(json["isPlaying"], false);
        assert_eq!(json["playState"], "stopped");
    }
}
