//! Rate limiter for `stateChange` events.
//!
//! Position and time updates go out every frame, but the coarse transport
//! state only matters to UI widgets. An emission is suppressed when BOTH:
//! 1. less than `min_interval` passed since the last emission, and
//! 2. nothing significant changed since the last emitted snapshot.
//!
//! Significant: play state, speed, window bounds, or a `current_time` jump
//! larger than `jump_ms`.

use std::time::Duration;

use crate::core::state::PlaybackState;

#[derive(Debug, Clone)]
pub struct StateThrottle {
    min_interval: Duration,
    jump_ms: f64,
    /// Last emission: (clock time, snapshot)
    last: Option<(Duration, PlaybackState)>,
}

impl Default for StateThrottle {
    fn default() -> Self {
        Self::new(100, 500.0)
    }
}

impl StateThrottle {
    pub fn new(min_interval_ms: u64, jump_ms: f64) -> Self {
        Self {
            min_interval: Duration::from_millis(min_interval_ms),
            jump_ms,
            last: None,
        }
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval.as_millis() as u64
    }

    /// Decide whether `state` goes out at clock time `now`.
    /// Records the emission when it returns true.
    pub fn should_emit(&mut self, now: Duration, state: &PlaybackState) -> bool {
        let emit = match &self.last {
            None => true,
            Some((at, prev)) => {
                let elapsed = now.saturating_sub(*at);
                elapsed >= self.min_interval || self.is_significant(prev, state)
            }
        };

        if emit {
            self.last = Some((now, state.clone()));
        } else {
            log::trace!("StateThrottle: suppressed stateChange at t={:.1}ms", state.current_time);
        }
        emit
    }

    fn is_significant(&self, prev: &PlaybackState, next: &PlaybackState) -> bool {
        prev.is_playing != next.is_playing
            || prev.play_state != next.play_state
            || prev.speed != next.speed
            || prev.window_start != next.window_start
            || prev.window_end != next.window_end
            || (next.current_time - prev.current_time).abs() > self.jump_ms
    }

    /// Forget the last emission; the next call always emits.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last_emitted(&self) -> Option<&PlaybackState> {
        self.last.as_ref().map(|(_, s)| s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn state(current_time: f64) -> PlaybackState {
        PlaybackState {
            current_time,
            speed: 1.0,
            is_playing: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_always_emits() {
        let mut throttle = StateThrottle::default();
        assert!(throttle.should_emit(at(0), &state(0.0)));
    }

    #[test]
    fn test_small_moves_within_interval_suppressed() {
        let mut throttle = StateThrottle::default();
        assert!(throttle.should_emit(at(0), &state(0.0)));
        assert!(!throttle.should_emit(at(16), &state(16.0)));
        assert!(!throttle.should_emit(at(99), &state(99.0)));
        // interval elapsed
        assert!(throttle.should_emit(at(100), &state(100.0)));
    }

    #[test]
    fn test_significant_changes_bypass_interval() {
        let mut throttle = StateThrottle::default();
        assert!(throttle.should_emit(at(0), &state(0.0)));

        // big jump
        assert!(throttle.should_emit(at(1), &state(600.0)));

        // play state
        let mut paused = state(600.0);
        paused.is_playing = false;
        assert!(throttle.should_emit(at(2), &paused));

        // speed
        let mut fast = paused.clone();
        fast.speed = 4.0;
        assert!(throttle.should_emit(at(3), &fast));

        // window
        let mut windowed = fast.clone();
        windowed.window_end = 10;
        assert!(throttle.should_emit(at(4), &windowed));
        assert!(!throttle.should_emit(at(5), &windowed));
    }

    #[test]
    fn test_jump_measured_from_last_emitted() {
        let mut throttle = StateThrottle::default();
        assert!(throttle.should_emit(at(0), &state(0.0)));
        // 300ms then 600ms total: second crosses the 500ms jump
        assert!(!throttle.should_emit(at(10), &state(300.0)));
        assert!(throttle.should_emit(at(20), &state(600.0)));
        assert_eq!(throttle.last_emitted().map(|s| s.current_time), Some(600.0));
    }

    #[test]
    fn test_reset() {
        let mut throttle = StateThrottle::default();
        assert!(throttle.should_emit(at(0), &state(0.0)));
        throttle.reset();
        assert!(throttle.should_emit(at(1), &state(1.0)));
    }
}
