//! Signal strength blender.
//!
//! The single number fed to tiering and calibration:
//!
//! ```text
//! signal = clamp(round(base × multiplier + urgency) × w_base + poisson × w_poisson)
//! ```

use serde::{Deserialize, Serialize};

use super::temporal::{
    late_goal_intensity, poisson_late_goal_probability, time_multiplier, urgency_bonus,
};
use crate::db::models::MatchStateInput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    /// Weight of the temporally adjusted base score
    pub base: f64,
    /// Weight of the Poisson estimate
    pub poisson: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            base: 0.7,
            poisson: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalStrength {
    /// Blended strength, 0–100
    pub strength: i32,
    pub base_score: i32,
    pub time_multiplier: f64,
    pub urgency_bonus: f64,
    /// `round(base × multiplier + urgency)`, before blending
    pub adjusted_base: i32,
    /// Poisson probability of another goal, 0–100
    pub poisson: i32,
    /// Expected goals per minute at this stage of the match
    pub goal_intensity: f64,
}

/// Score difference seen from the trailing side, so the desperation term
/// applies whenever the match is not level.
pub fn trailing_perspective_diff(input: &MatchStateInput) -> i32 {
    -input.goal_diff().abs()
}

pub fn blend_signal_strength(
    base_score: i32,
    input: &MatchStateInput,
    weights: &BlendWeights,
) -> SignalStrength {
    let diff = trailing_perspective_diff(input);
    let multiplier = time_multiplier(input.minute, diff);
    let urgency = urgency_bonus(input.minute, input.home_score, input.away_score);
    let adjusted_base = (base_score as f64 * multiplier + urgency).round() as i32;
    let poisson = poisson_late_goal_probability(input.total_xg(), input.minute, diff);

    let blended = adjusted_base as f64 * weights.base + poisson as f64 * weights.poisson;
    SignalStrength {
        strength: (blended.round() as i32).clamp(0, 100),
        base_score,
        time_multiplier: multiplier,
        urgency_bonus: urgency,
        adjusted_base,
        poisson,
        goal_intensity: late_goal_intensity(input.total_xg(), input.minute, diff),
    }
}
