//! Position interpolation between bracketing samples.
//!
//! Field policies:
//! - latitude / longitude: smoothstep-eased blend (no velocity kinks at samples)
//! - speed / deviation: linear blend on raw progress
//! - categorical state: snap at progress 0.5
//!
//! Pure functions, no allocation beyond the returned [`Position`].

use crate::core::sample::{format_timestamp, Position, Sample};

/// Progress this close to 0 or 1 counts as sitting on a sample
const EXACT_EPS: f64 = 1e-6;

/// Smoothstep easing: `p²(3-2p)`
#[inline]
pub fn smoothstep(p: f64) -> f64 {
    p * p * (3.0 - 2.0 * p)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Normalized progress of `target` between two instants, clamped to [0, 1].
pub fn progress(before_ms: i64, after_ms: i64, target: f64) -> f64 {
    let span = (after_ms - before_ms) as f64;
    if span <= 0.0 {
        return 0.0;
    }
    ((target - before_ms as f64) / span).clamp(0.0, 1.0)
}

/// Interpolate a position at `target` (epoch ms).
///
/// Returns `None` only when both samples are absent.
pub fn interpolate(before: Option<&Sample>, after: Option<&Sample>, target: f64) -> Option<Position> {
    let (before, after) = match (before, after) {
        (None, None) => return None,
        (None, Some(a)) => return Some(Position::from_sample(a)),
        (Some(b), None) => return Some(Position::from_sample(b)),
        (Some(b), Some(a)) => (b, a),
    };

    // Degenerate bracket: nothing to divide by
    if before.timestamp_ms == after.timestamp_ms {
        return Some(Position::from_sample(before));
    }

    let p = progress(before.timestamp_ms, after.timestamp_ms, target);
    if p <= EXACT_EPS {
        return Some(Position::from_sample(before));
    }
    if p >= 1.0 - EXACT_EPS {
        return Some(Position::from_sample(after));
    }

    let eased = smoothstep(p);
    let snap = if p < 0.5 { before } else { after };

    let deviation = match (before.deviation, after.deviation) {
        (Some(b), Some(a)) => Some(lerp(b, a, p)),
        _ => snap.deviation,
    };

    Some(Position {
        entity_id: before.entity_id.clone(),
        timestamp: format_timestamp(target.floor() as i64),
        latitude: lerp(before.latitude, after.latitude, eased),
        longitude: lerp(before.longitude, after.longitude, eased),
        speed: lerp(before.speed, after.speed, p),
        deviation,
        categorical_state: snap.categorical_state.clone(),
        interpolated: true,
    })
}
