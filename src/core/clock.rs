//! Time source and frame scheduling seams.
//!
//! The player never reads wall-clock time or sleeps on its own. A host wires
//! a [`Clock`] (monotonic "now") and a [`Scheduler`] (one pending frame
//! request) and calls `Player::on_frame()` from its per-frame callback.
//!
//! Production: [`SystemClock`] + [`FrameScheduler`] driven by `runner`.
//! Tests / offline export: [`ManualClock`] advanced by hand.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source. Origin is arbitrary; only differences matter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Per-frame callback request.
///
/// `schedule_next` is idempotent: at most one frame is pending.
pub trait Scheduler: Send + Sync {
    /// Ask the host for one more frame
    fn schedule_next(&self);
    /// Drop any outstanding request
    fn cancel(&self);
    /// Consume the outstanding request, if any
    fn take_pending(&self) -> bool;
    fn is_pending(&self) -> bool;
}

/// Wall clock based on `Instant`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Negative or non-finite amounts are ignored; huge ones saturate.
    pub fn advance_ms(&self, ms: f64) {
        if !(ms.is_finite() && ms > 0.0) {
            return;
        }
        let by = Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX);
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = now.saturating_add(by);
    }

    pub fn set(&self, to: Duration) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Single-slot frame request flag with counters for diagnostics.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    pending: AtomicBool,
    scheduled: AtomicU64,
    cancelled: AtomicU64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total schedule_next() calls
    pub fn scheduled_count(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    /// cancel() calls that actually dropped a pending request
    pub fn cancelled_count(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Scheduler for FrameScheduler {
    fn schedule_next(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        self.pending.store(true, Ordering::SeqCst);
    }

    fn cancel(&self) {
        if self.pending.swap(false, Ordering::SeqCst) {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance_ms(16.5);
        clock.advance(Duration::from_millis(10));
        assert!((clock.now().as_secs_f64() * 1000.0 - 26.5).abs() < 1e-9);
        clock.set(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_manual_clock_ignores_bad_advance() {
        let clock = ManualClock::new();
        clock.advance_ms(10.0);
        clock.advance_ms(f64::INFINITY);
        clock.advance_ms(f64::NAN);
        clock.advance_ms(-5.0);
        assert_eq!(clock.now(), Duration::from_millis(10));

        clock.advance_ms(1e300);
        assert_eq!(clock.now(), Duration::MAX);
    }

    #[test]
    fn test_frame_scheduler_single_slot() {
        let sched = FrameScheduler::new();
        assert!(!sched.take_pending());

        sched.schedule_next();
        sched.schedule_next();
        assert!(sched.is_pending());
        assert!(sched.take_pending());
        assert!(!sched.take_pending());
        assert_eq!(sched.scheduled_count(), 2);
    }

    #[test]
    fn test_cancel_counts_only_real_cancellations() {
        let sched = FrameScheduler::new();
        sched.cancel();
        assert_eq!(sched.cancelled_count(), 0);
        sched.schedule_next();
        sched.cancel();
        assert!(!sched.is_pending());
        assert_eq!(sched.cancelled_count(), 1);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
