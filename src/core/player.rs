//! Multi-entity trajectory playback engine.
//!
//! **Architecture**: Player owns every trajectory, index and the current
//! position cache. Time comes from an injected [`Clock`]; frames are
//! requested through an injected [`Scheduler`]. The host calls
//! [`Player::on_frame`] from its per-frame callback, tests call
//! [`Player::tick`] directly.
//!
//! # Timing Model
//!
//! Virtual clock in milliseconds since the window start. Each tick:
//! real elapsed time is capped (`max_frame_delta_ms`), scaled by speed and
//! accumulated; the clock only moves once the accumulator reaches one
//! quantum (~16.67ms). Reaching the window end pauses (never stops).
//!
//! # States
//!
//! - **Stopped**: current_time == 0, not playing (after load / stop)
//! - **Paused**: not playing, any current_time
//! - **Playing**: advancing on every satisfied tick
//!
//! # Events
//!
//! `positionUpdate` + `timeUpdate` every satisfied tick and after every
//! seek/stop/load/range change. `stateChange` goes through [`StateThrottle`].
//! `playStateChange` / `speedChange` once per effective mutator call.
//!
//! After [`Player::destroy`] every call is a silent no-op.

use indexmap::IndexMap;
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::PlayerConfig;
use crate::core::clock::{Clock, FrameScheduler, Scheduler, SystemClock};
use crate::core::event_bus::{EventBus, Listener};
use crate::core::player_events::{EventKind, PlaybackEvent, StateSnapshot, TimeUpdate};
use crate::core::registry::{PlayerRegistry, PlayerToken};
use crate::core::sample::{format_timestamp, parse_timestamp, Position, RawSample, Sample};
use crate::core::state::{PlayState, PlaybackState, TimeRange};
use crate::core::throttle::StateThrottle;
use crate::core::trajectory::Trajectory;

/// Rejected player calls
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// start >= end
    InvalidRange { start: i64, end: i64 },
    /// Range does not overlap the loaded data
    RangeOutsideData { start: i64, end: i64 },
    /// Speed must be finite and > 0
    InvalidSpeed(f64),
    InvalidTimestamp(String),
}

impl std::fmt::Display for PlayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerError::InvalidRange { start, end } => {
                write!(f, "Invalid time range: start {} is not before end {}", start, end)
            }
            PlayerError::RangeOutsideData { start, end } => {
                write!(f, "Time range {}..{} does not overlap loaded data", start, end)
            }
            PlayerError::InvalidSpeed(speed) => write!(f, "Invalid speed: {}", speed),
            PlayerError::InvalidTimestamp(ts) => write!(f, "Invalid timestamp: {}", ts),
        }
    }
}

impl std::error::Error for PlayerError {}

pub struct Player {
    id: Uuid,
    config: PlayerConfig,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    registry: Option<PlayerRegistry>,
    /// Held only so the registry's weak ref stays alive
    token: Option<Arc<PlayerToken>>,
    bus: EventBus,
    throttle: StateThrottle,

    trajectories: IndexMap<String, Trajectory>,
    positions: IndexMap<String, Position>,
    global_range: TimeRange,
    custom_range: Option<TimeRange>,

    state: PlayState,
    /// ms since window start
    current_time: f64,
    speed: f64,
    /// Speed-scaled ms not yet applied to current_time
    accumulator: f64,
    /// Clock time of the previous frame (None until play)
    last_frame_at: Option<Duration>,
    destroyed: bool,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("current_time", &self.current_time)
            .field("speed", &self.speed)
            .field("entities", &self.trajectories.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl Player {
    /// Create a player and register it in `registry`.
    pub fn new(
        config: PlayerConfig,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        registry: &PlayerRegistry,
    ) -> Self {
        let config = config.sanitized();
        let id = Uuid::new_v4();
        let token = Arc::new(PlayerToken { id });
        registry.register(&token);
        info!("Player {} initialized", id);

        Self {
            id,
            throttle: StateThrottle::new(config.state_throttle_ms, config.significant_jump_ms),
            bus: EventBus::with_capacity(config.event_queue_capacity),
            speed: config.default_speed,
            config,
            clock,
            scheduler,
            registry: Some(registry.clone()),
            token: Some(token),
            trajectories: IndexMap::new(),
            positions: IndexMap::new(),
            global_range: TimeRange::default(),
            custom_range: None,
            state: PlayState::Stopped,
            current_time: 0.0,
            accumulator: 0.0,
            last_frame_at: None,
            destroyed: false,
        }
    }

    /// Player on the system clock with its own frame scheduler and registry.
    pub fn standalone(config: PlayerConfig) -> Self {
        let registry = PlayerRegistry::new(Duration::from_millis(config.sweep_interval_ms.max(1)));
        Self::new(
            config,
            Arc::new(SystemClock::new()),
            Arc::new(FrameScheduler::new()),
            &registry,
        )
    }

    // === Accessors ===

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn play_state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// ms since window start
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn global_range(&self) -> TimeRange {
        self.global_range
    }

    pub fn custom_range(&self) -> Option<TimeRange> {
        self.custom_range
    }

    /// Active window: custom range if set, else the global range
    pub fn time_window(&self) -> TimeRange {
        self.custom_range.unwrap_or(self.global_range)
    }

    pub fn total_duration(&self) -> f64 {
        self.time_window().duration()
    }

    /// current_time / total_duration, 0 for an empty window
    pub fn progress(&self) -> f64 {
        let total = self.total_duration();
        if total > 0.0 { self.current_time / total } else { 0.0 }
    }

    /// Absolute instant (epoch ms) of the virtual clock
    pub fn absolute_time(&self) -> f64 {
        self.time_window().start as f64 + self.current_time
    }

    pub fn playback_state(&self) -> PlaybackState {
        let window = self.time_window();
        PlaybackState {
            play_state: self.state,
            is_playing: self.state.is_playing(),
            current_time: self.current_time,
            speed: self.speed,
            window_start: window.start,
            window_end: window.end,
            total_duration: window.duration(),
        }
    }

    /// Current positions in entity load order
    pub fn positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    pub fn position(&self, entity_id: &str) -> Option<Position> {
        self.positions.get(entity_id).cloned()
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.trajectories.keys().cloned().collect()
    }

    pub fn trajectory(&self, entity_id: &str) -> Option<&Trajectory> {
        self.trajectories.get(entity_id)
    }

    /// Interpolated position at an absolute instant, without touching the cache
    pub fn position_at(&self, entity_id: &str, absolute_ms: f64) -> Option<Position> {
        self.trajectories.get(entity_id)?.position_at(absolute_ms)
    }

    /// True while a frame request is outstanding
    pub fn wants_frame(&self) -> bool {
        !self.destroyed && self.scheduler.is_pending()
    }

    // === Events ===

    pub fn subscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        if self.destroyed {
            return false;
        }
        self.bus.subscribe(kind, listener)
    }

    pub fn on<F>(&self, kind: EventKind, callback: F) -> Listener
    where
        F: Fn(&PlaybackEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(callback);
        self.subscribe(kind, &listener);
        listener
    }

    pub fn unsubscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        self.bus.unsubscribe(kind, listener)
    }

    /// Drain the deferred event queue
    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        self.bus.poll()
    }

    // === Data ===

    /// Replace all trajectories. Resets to Stopped at the window start.
    ///
    /// Samples with unparsable timestamps are dropped (warned). Entities
    /// left empty stay loaded but have no position.
    pub fn load_entities<I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = (String, Vec<RawSample>)>,
    {
        if self.destroyed {
            return;
        }
        let was_playing = self.state.is_playing();
        self.scheduler.cancel();

        self.trajectories.clear();
        self.positions.clear();
        let mut kept = 0usize;
        let mut dropped = 0usize;

        for (entity_id, raws) in entities {
            let mut samples = Vec::with_capacity(raws.len());
            for mut raw in raws {
                if raw.entity_id != entity_id {
                    if !raw.entity_id.is_empty() {
                        debug!("Sample entity '{}' listed under '{}', using key", raw.entity_id, entity_id);
                    }
                    raw.entity_id = entity_id.clone();
                }
                let timestamp = raw.timestamp.clone();
                match Sample::from_raw(raw) {
                    Some(sample) => samples.push(sample),
                    None => {
                        warn!("Dropping sample for '{}': invalid timestamp '{}'", entity_id, timestamp);
                        dropped += 1;
                    }
                }
            }
            kept += samples.len();
            if samples.is_empty() {
                warn!("Entity '{}' has no valid samples", entity_id);
            }
            self.trajectories.insert(entity_id, Trajectory::new(samples));
        }

        self.global_range = compute_global_range(&self.trajectories);
        self.custom_range = None;
        self.state = PlayState::Stopped;
        self.current_time = 0.0;
        self.accumulator = 0.0;
        self.last_frame_at = None;
        self.throttle.reset();

        for (entity_id, traj) in &self.trajectories {
            if let Some(first) = traj.first() {
                self.positions.insert(entity_id.clone(), Position::from_sample(first));
            }
        }

        info!(
            "Loaded {} entities: {} samples ({} dropped), range {}..{}",
            self.trajectories.len(),
            kept,
            dropped,
            format_timestamp(self.global_range.start),
            format_timestamp(self.global_range.end)
        );

        self.publish_frame();
        if was_playing {
            self.bus.emit(PlaybackEvent::PlayStateChange(false));
        }
        self.publish_state();
    }

    // === Transport ===

    /// Stopped|Paused -> Playing. No-op if already playing.
    ///
    /// Paused at the very end restarts from the window start.
    pub fn play(&mut self) {
        if self.destroyed || self.state.is_playing() {
            return;
        }

        let total = self.total_duration();
        if total > 0.0 && self.current_time >= total {
            debug!("Play at end of window, rewinding");
            self.current_time = 0.0;
            self.recompute_positions();
            self.publish_frame();
        }

        self.state = PlayState::Playing;
        self.accumulator = 0.0;
        self.last_frame_at = Some(self.clock.now());
        self.scheduler.schedule_next();
        trace!("Playback started at {:.1}ms", self.current_time);

        self.bus.emit(PlaybackEvent::PlayStateChange(true));
        self.publish_state();
    }

    /// Playing -> Paused. No-op otherwise.
    pub fn pause(&mut self) {
        if self.destroyed || !self.state.is_playing() {
            return;
        }
        self.scheduler.cancel();
        self.state = PlayState::Paused;
        self.accumulator = 0.0;
        self.last_frame_at = None;
        trace!("Playback paused at {:.1}ms", self.current_time);

        self.bus.emit(PlaybackEvent::PlayStateChange(false));
        self.publish_state();
    }

    /// Play/pause toggle
    pub fn toggle_play(&mut self) {
        if self.state.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Any state -> Stopped at the window start. Always publishes a final snapshot.
    pub fn stop(&mut self) {
        if self.destroyed {
            return;
        }
        let was_playing = self.state.is_playing();
        self.scheduler.cancel();
        self.state = PlayState::Stopped;
        self.current_time = 0.0;
        self.accumulator = 0.0;
        self.last_frame_at = None;
        trace!("Playback stopped");

        self.recompute_positions();
        self.publish_frame();
        if was_playing {
            self.bus.emit(PlaybackEvent::PlayStateChange(false));
        }
        self.publish_state();
    }

    /// Jump to `time_ms` (ms since window start), clamped to the window.
    ///
    /// Works in any state. A Stopped player seeking past 0 becomes Paused.
    pub fn seek(&mut self, time_ms: f64) {
        if self.destroyed {
            return;
        }
        if !time_ms.is_finite() {
            warn!("Ignoring seek to non-finite time {}", time_ms);
            return;
        }
        self.current_time = time_ms.clamp(0.0, self.total_duration());
        self.accumulator = 0.0;
        if self.state == PlayState::Stopped && self.current_time > 0.0 {
            self.state = PlayState::Paused;
        }
        trace!("Seek to {:.1}ms", self.current_time);

        self.recompute_positions();
        self.publish_frame();
        self.publish_state();
    }

    /// Speed multiplier, applied from the next tick.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), PlayerError> {
        if self.destroyed {
            return Ok(());
        }
        if !(speed.is_finite() && speed > 0.0) {
            warn!("Rejected speed {}", speed);
            return Err(PlayerError::InvalidSpeed(speed));
        }
        self.speed = speed;
        debug!("Speed set to {}x", speed);

        self.bus.emit(PlaybackEvent::SpeedChange(speed));
        self.publish_state();
        Ok(())
    }

    /// Restrict playback to `[start_ms, end_ms]` (epoch ms), clamped to the data.
    ///
    /// Rejected without any state change or event if `start_ms >= end_ms`.
    pub fn set_time_range(&mut self, start_ms: i64, end_ms: i64) -> Result<(), PlayerError> {
        if self.destroyed {
            return Ok(());
        }
        if start_ms >= end_ms {
            warn!("Rejected time range {}..{}: start must precede end", start_ms, end_ms);
            return Err(PlayerError::InvalidRange {
                start: start_ms,
                end: end_ms,
            });
        }
        let clamped = TimeRange::new(start_ms, end_ms).clamp_to(&self.global_range);
        if clamped.start >= clamped.end {
            warn!(
                "Rejected time range {}..{}: outside data {}..{}",
                start_ms, end_ms, self.global_range.start, self.global_range.end
            );
            return Err(PlayerError::RangeOutsideData {
                start: start_ms,
                end: end_ms,
            });
        }

        self.custom_range = Some(clamped);
        debug!(
            "Time window set to {}..{}",
            format_timestamp(clamped.start),
            format_timestamp(clamped.end)
        );
        self.rewind_to_window_start();
        Ok(())
    }

    /// `set_time_range` with RFC 3339 / ISO timestamps.
    pub fn set_time_range_str(&mut self, start: &str, end: &str) -> Result<(), PlayerError> {
        let start_ms = parse_timestamp(start).ok_or_else(|| PlayerError::InvalidTimestamp(start.to_string()))?;
        let end_ms = parse_timestamp(end).ok_or_else(|| PlayerError::InvalidTimestamp(end.to_string()))?;
        self.set_time_range(start_ms, end_ms)
    }

    /// Back to the global range, current_time = 0
    pub fn clear_time_range(&mut self) {
        if self.destroyed {
            return;
        }
        if self.custom_range.take().is_some() {
            debug!("Time window cleared");
        }
        self.rewind_to_window_start();
    }

    fn rewind_to_window_start(&mut self) {
        self.current_time = 0.0;
        self.accumulator = 0.0;
        self.recompute_positions();
        self.publish_frame();
        self.publish_state();
    }

    // === Frame loop ===

    /// Host per-frame callback. Does nothing unless a frame was requested.
    pub fn on_frame(&mut self) {
        if self.destroyed || !self.scheduler.take_pending() {
            return;
        }
        let now = self.clock.now();
        let elapsed_ms = match self.last_frame_at {
            Some(prev) => now.saturating_sub(prev).as_secs_f64() * 1000.0,
            None => 0.0,
        };
        self.last_frame_at = Some(now);

        if let Some(registry) = &self.registry {
            registry.sweep_if_due(now);
        }
        self.tick(elapsed_ms);
    }

    /// Advance the virtual clock by `elapsed_ms` of real time.
    pub fn tick(&mut self, elapsed_ms: f64) {
        if self.destroyed || !self.state.is_playing() {
            return;
        }

        let elapsed = if elapsed_ms.is_finite() {
            elapsed_ms.clamp(0.0, self.config.max_frame_delta_ms)
        } else {
            0.0
        };
        self.accumulator += elapsed * self.speed;

        if self.accumulator < self.config.quantum_ms {
            self.scheduler.schedule_next();
            return;
        }

        let total = self.total_duration();
        self.current_time += self.accumulator;
        self.accumulator = 0.0;

        let reached_end = self.current_time >= total;
        if reached_end {
            self.current_time = total;
            self.state = PlayState::Paused;
            self.last_frame_at = None;
            info!("Reached end of window, paused at {:.1}ms", total);
        }

        // Every entity sees the same current_time
        self.recompute_positions();
        self.publish_frame();
        if reached_end {
            self.bus.emit(PlaybackEvent::PlayStateChange(false));
        }
        self.publish_state();

        if self.state.is_playing() {
            self.scheduler.schedule_next();
        } else {
            self.scheduler.cancel();
        }
    }

    // === Teardown ===

    /// Release everything and unregister. Idempotent; later calls are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.scheduler.cancel();
        self.trajectories.clear();
        self.positions.clear();
        self.custom_range = None;
        self.global_range = TimeRange::default();
        self.state = PlayState::Stopped;
        self.current_time = 0.0;
        self.speed = self.config.default_speed;
        self.accumulator = 0.0;
        self.last_frame_at = None;
        self.throttle.reset();
        self.bus.clear();

        if let Some(registry) = self.registry.take() {
            registry.unregister(self.id);
        }
        self.token = None;
        self.destroyed = true;
        info!("Player {} destroyed", self.id);
    }

    // === Internals ===

    fn recompute_positions(&mut self) {
        let target = self.absolute_time();
        for (entity_id, traj) in &self.trajectories {
            let Some(pos) = traj.position_at(target) else {
                continue;
            };
            match self.positions.get_mut(entity_id) {
                Some(slot) => *slot = pos,
                None => {
                    self.positions.insert(entity_id.clone(), pos);
                }
            }
        }
    }

    /// positionUpdate + timeUpdate, never throttled
    fn publish_frame(&self) {
        self.bus.emit(PlaybackEvent::PositionUpdate(self.positions()));
        self.bus.emit(PlaybackEvent::TimeUpdate(TimeUpdate {
            current_time: self.current_time,
            timestamp: format_timestamp(self.absolute_time().floor() as i64),
        }));
    }

    fn publish_state(&mut self) {
        let state = self.playback_state();
        if !self.throttle.should_emit(self.clock.now(), &state) {
            return;
        }
        let timestamp = format_timestamp(self.absolute_time().floor() as i64);
        self.bus.emit(PlaybackEvent::StateChange(StateSnapshot { state, timestamp }));
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Min of first samples, max of last samples; `[0, 0]` when nothing is valid.
fn compute_global_range(trajectories: &IndexMap<String, Trajectory>) -> TimeRange {
    trajectories
        .values()
        .filter_map(Trajectory::range)
        .reduce(|acc, r| TimeRange::new(acc.start.min(r.start), acc.end.max(r.end)))
        .unwrap_or_default()
}
