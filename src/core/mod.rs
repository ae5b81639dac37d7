//! Core engine modules - index, interpolation, events, player
//!
//! These modules form the playback engine, independent of any host.

pub mod clock;
pub mod event_bus;
pub mod interpolate;
pub mod player;
pub mod player_events;
pub mod registry;
pub mod sample;
pub mod state;
pub mod temporal_index;
pub mod throttle;
pub mod trajectory;

// Re-exports for convenience
pub use event_bus::EventBus;
pub use player::Player;
pub use registry::PlayerRegistry;
pub use temporal_index::TemporalIndex;
pub use throttle::StateThrottle;
pub use trajectory::Trajectory;
