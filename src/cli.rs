use clap::Parser;
use std::path::PathBuf;

use crate::core::player_events::EventKind;

/// Headless multi-entity trajectory player.
///
/// Reads telemetry samples from a JSON file, plays them back on a virtual
/// clock and prints the player's events to stdout as JSON lines.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON file: { "<entity>": [samples] } or [{ "vehicle_id": ..., "data": [samples] }]
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Playback speed multiplier (> 0)
    #[arg(short = 's', long = "speed", value_name = "X")]
    pub speed: Option<f64>,

    /// Window start (RFC 3339 / ISO timestamp)
    #[arg(long = "start", value_name = "TIME")]
    pub range_start: Option<String>,

    /// Window end (RFC 3339 / ISO timestamp)
    #[arg(long = "end", value_name = "TIME")]
    pub range_end: Option<String>,

    /// Window (shorthand for --start and --end)
    #[arg(long = "range", value_names = ["START", "END"], num_args = 2)]
    pub range: Option<Vec<String>>,

    /// Seek before playing (ms since window start)
    #[arg(long = "seek", value_name = "MS")]
    pub seek: Option<f64>,

    /// Host frame rate
    #[arg(long = "fps", value_name = "N", default_value_t = 60.0)]
    pub fps: f64,

    /// Drive a manual clock instead of sleeping (as fast as possible, deterministic)
    #[arg(long = "offline")]
    pub offline: bool,

    /// Stop after N frames
    #[arg(long = "max-frames", value_name = "N")]
    pub max_frames: Option<u64>,

    /// Events to print, comma separated (default: all)
    #[arg(short = 'e', long = "events", value_name = "LIST", value_delimiter = ',')]
    pub events: Vec<EventKind>,

    /// Enable logging to file (default: trackplay.log in the data dir)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Args {
    /// Requested window as (start, end); either side may be open.
    pub fn window(&self) -> (Option<&str>, Option<&str>) {
        if let Some(range) = &self.range
            && range.len() == 2
        {
            return (Some(range[0].as_str()), Some(range[1].as_str()));
        }
        (self.range_start.as_deref(), self.range_end.as_deref())
    }
}
