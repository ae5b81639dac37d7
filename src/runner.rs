//! Headless runner: wires a player to a frame loop and prints its events.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};

use crate::cli::Args;
use crate::config::{self, PathConfig, PlayerConfig};
use crate::core::clock::{Clock, FrameScheduler, ManualClock, SystemClock};
use crate::core::player::Player;
use crate::core::player_events::{EventKind, PlaybackEvent};
use crate::core::registry::PlayerRegistry;
use crate::core::sample::{format_timestamp, parse_timestamp};
use crate::loader;

/// Shared line-oriented JSON sink
pub type EventSink = Arc<Mutex<dyn Write + Send>>;

/// Frame loop result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub frames: u64,
    pub final_time_ms: f64,
    pub reached_end: bool,
}

/// Run the trackplay CLI with parsed arguments.
pub fn run_app(args: Args) -> Result<()> {
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    debug!("Config path: {}", config::config_file(config::CONFIG_FILE, &path_config).display());

    let mut player_config = PlayerConfig::load(&path_config)?;
    if let Some(speed) = args.speed {
        if !(speed.is_finite() && speed > 0.0) {
            bail!("--speed must be a positive number, got {}", speed);
        }
        player_config.default_speed = speed;
    }
    if !(args.fps.is_finite() && args.fps > 0.0) {
        bail!("--fps must be a positive number, got {}", args.fps);
    }

    let entities = loader::load_file(&args.input)?;
    let sink: EventSink = Arc::new(Mutex::new(io::BufWriter::new(io::stdout())));

    let registry = PlayerRegistry::new(Duration::from_millis(player_config.sweep_interval_ms));
    let scheduler = Arc::new(FrameScheduler::new());
    let manual = args.offline.then(|| Arc::new(ManualClock::new()));
    let clock: Arc<dyn Clock> = match &manual {
        Some(c) => c.clone(),
        None => Arc::new(SystemClock::new()),
    };

    let mut player = Player::new(player_config, clock, scheduler, &registry);
    let kinds = if args.events.is_empty() {
        EventKind::ALL.to_vec()
    } else {
        args.events.clone()
    };
    attach_sink(&player, &kinds, &sink);

    player.load_entities(entities);
    apply_window(&mut player, &args)?;
    if let Some(ms) = args.seek {
        player.seek(ms);
    }

    player.play();
    let frame = Duration::from_secs_f64(1.0 / args.fps);
    let stats = run_frames(&mut player, frame, manual.as_deref(), args.max_frames);

    info!(
        "Played {} frames, stopped at {:.0}ms ({}){}",
        stats.frames,
        stats.final_time_ms,
        format_timestamp(player.absolute_time().floor() as i64),
        if stats.reached_end { ", end of window" } else { "" }
    );

    player.destroy();
    if registry.live_count() > 0 {
        warn!("{} player(s) still registered after shutdown", registry.live_count());
    }
    sink.lock()
        .unwrap_or_else(|e| e.into_inner())
        .flush()
        .context("Failed to flush output")?;
    Ok(())
}

/// Print every event of `kinds` as one JSON line.
pub fn attach_sink(player: &Player, kinds: &[EventKind], sink: &EventSink) {
    for &kind in kinds {
        let sink = Arc::clone(sink);
        player.on(kind, move |ev: &PlaybackEvent| {
            let mut out = sink.lock().unwrap_or_else(|e| e.into_inner());
            let written = serde_json::to_writer(&mut *out, ev)
                .map_err(io::Error::from)
                .and_then(|_| writeln!(out));
            if let Err(e) = written {
                warn!("Failed to write {} event: {}", kind, e);
            }
        });
    }
}

/// Resolve `--range` / `--start` / `--end` against the loaded data.
fn apply_window(player: &mut Player, args: &Args) -> Result<()> {
    let (start, end) = args.window();
    if start.is_none() && end.is_none() {
        return Ok(());
    }
    let bounds = player.global_range();
    let parse = |s: &str| parse_timestamp(s).with_context(|| format!("Invalid timestamp: {}", s));
    let start_ms = start.map(parse).transpose()?.unwrap_or(bounds.start);
    let end_ms = end.map(parse).transpose()?.unwrap_or(bounds.end);
    player.set_time_range(start_ms, end_ms)?;
    Ok(())
}

/// Drive `player` until it stops requesting frames (or `max_frames`).
///
/// With a manual clock the loop advances it by one frame per iteration and
/// never sleeps; otherwise it sleeps to the next frame deadline.
pub fn run_frames(
    player: &mut Player,
    frame: Duration,
    manual: Option<&ManualClock>,
    max_frames: Option<u64>,
) -> RunStats {
    let mut frames = 0u64;
    let mut deadline = Instant::now();

    while player.wants_frame() {
        if let Some(max) = max_frames
            && frames >= max
        {
            debug!("Frame limit {} reached", max);
            break;
        }

        match manual {
            Some(clock) => clock.advance(frame),
            None => {
                deadline += frame;
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                } else {
                    // fell behind; don't try to catch up with a burst
                    deadline = now;
                }
            }
        }

        player.on_frame();
        frames += 1;
    }

    RunStats {
        frames,
        final_time_ms: player.current_time(),
        reached_end: !player.is_playing() && player.total_duration() > 0.0 && player.progress() >= 1.0,
    }
}
