//! Multiplier curve math.
//!
//! Pure functions over elapsed play time. The curve accelerates
//! quadratically from 1.0 toward the round's hidden crash point and is
//! clamped so it can never exceed it.

use rand::Rng;

/// Fraction of the play phase elapsed, clamped to [0, 1].
pub fn progress_at(elapsed_ms: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 1.0;
    }
    (elapsed_ms as f64 / duration_ms as f64).min(1.0)
}

/// Multiplier shown at `elapsed_ms` into the play phase:
/// `1 + progress^2 * (crash_point - 1)`, clamped to the crash point.
pub fn multiplier_at(elapsed_ms: u64, crash_point: f64, duration_ms: u64) -> f64 {
    let progress = progress_at(elapsed_ms, duration_ms);
    let raw = 1.0 + progress * progress * (crash_point - 1.0);
    raw.min(crash_point)
}

/// Whether the round has crashed: the curve reached the crash point or the
/// play phase ran its full duration.
pub fn has_crashed(elapsed_ms: u64, crash_point: f64, duration_ms: u64) -> bool {
    let progress = progress_at(elapsed_ms, duration_ms);
    let raw = 1.0 + progress * progress * (crash_point - 1.0);
    raw >= crash_point || progress >= 1.0
}

/// Draw a crash point uniformly from `[min, max)`. Pass a
/// cryptographically strong RNG; the draw must be unpredictable.
pub fn draw_crash_point<R: Rng>(min: f64, max: f64, rng: &mut R) -> f64 {
    min + rng.gen::<f64>() * (max - min)
}
