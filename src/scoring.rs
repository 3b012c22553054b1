//! Checkpoint scoring function.

use serde::{Deserialize, Serialize};

/// Tuning for the checkpoint reward shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Width constant of the Gaussian distance falloff. Larger values
    /// punish drifting from the track center harder.
    pub track_width: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { track_width: 2.0 }
    }
}

/// Gaussian falloff, 1.0 at the center of the track.
fn distance_falloff(distance: f32, width: f32) -> f32 {
    (-width * distance * distance).exp()
}

/// Compute the fitness delta for one captured checkpoint.
///
/// Three terms:
/// - distance: `ceil(points * exp(-track_width * distance^2))`, clamped to
///   [0, 1000], times 3. Full checkpoint value dead center, Gaussian
///   falloff with lateral drift.
/// - time: `round(1 / elapsed)`, clamped to [0, 100], times 3. Rewards
///   reaching the checkpoint quickly; an `elapsed` of zero (reachable at
///   generation start) counts as instant and clamps to the cap.
/// - collision penalty: `hits * 100`, subtracted without clamping, so the
///   total can go negative.
///
/// Pure and stateless; call once per capture event, never per tick.
pub fn score(points: i32, distance: f32, elapsed: f32, hits: u32, config: &ScoringConfig) -> i32 {
    let distance_score = (points as f32 * distance_falloff(distance, config.track_width))
        .ceil()
        .clamp(0.0, 1000.0) as i32
        * 3;

    let inverse_time = if elapsed > 0.0 {
        1.0 / elapsed
    } else {
        f32::INFINITY
    };
    let time_score = inverse_time.round().clamp(0.0, 100.0) as i32 * 3;

    let hit_penalty = hits as i32 * 100;

    distance_score + time_score - hit_penalty
}
