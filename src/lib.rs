//! trackplay - multi-entity trajectory playback engine
//!
//! Re-exports all modules for use by the binary target.

// Core engine (index, interpolation, events, player)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod loader;
pub mod runner;

// Re-export commonly used types from core
pub use config::PlayerConfig;
pub use crate::core::clock::{Clock, FrameScheduler, ManualClock, Scheduler, SystemClock};
pub use crate::core::event_bus::{EventBus, Listener};
pub use crate::core::player::{Player, PlayerError};
pub use crate::core::player_events::{EventKind, PlaybackEvent, StateSnapshot, TimeUpdate};
pub use crate::core::registry::PlayerRegistry;
pub use crate::core::sample::{CategoricalState, Position, RawSample, Sample};
pub use crate::core::state::{PlayState, PlaybackState, TimeRange};
