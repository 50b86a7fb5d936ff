//! Late-game temporal model.
//!
//! Goals are not evenly spread over ninety minutes: tired legs and a side
//! chasing the game push the scoring rate up towards the end. This module
//! turns that into three numbers:
//! - a phase multiplier on the observed attacking intensity,
//! - a Poisson probability that at least one more goal arrives,
//! - an urgency bonus for the final ten minutes.

use serde::{Deserialize, Serialize};

/// Stoppage-time allowance added to the remaining regulation minutes
pub const STOPPAGE_ALLOWANCE_MINS: f64 = 5.0;

const EARLY_MULTIPLIER: f64 = 0.85;
const MID_MULTIPLIER: f64 = 1.0;
const LATE_MULTIPLIER: f64 = 1.15;
const EXTRA_LATE_MULTIPLIER: f64 = 1.25;
/// Per-minute fatigue increment after minute 75
const FATIGUE_PER_MINUTE: f64 = 0.01;
const FATIGUE_CAP: f64 = 0.20;
const DESPERATION_BONUS: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Early,
    Mid,
    Late,
    ExtraLate,
}

impl MatchPhase {
    pub fn for_minute(minute: i32) -> Self {
        match minute {
            m if m < 15 => MatchPhase::Early,
            m if m < 75 => MatchPhase::Mid,
            m if m < 85 => MatchPhase::Late,
            _ => MatchPhase::ExtraLate,
        }
    }

    fn base_multiplier(self) -> f64 {
        match self {
            MatchPhase::Early => EARLY_MULTIPLIER,
            MatchPhase::Mid => MID_MULTIPLIER,
            MatchPhase::Late => LATE_MULTIPLIER,
            MatchPhase::ExtraLate => EXTRA_LATE_MULTIPLIER,
        }
    }
}

/// Phase multiplier plus fatigue and desperation terms.
///
/// `score_diff` is taken from the observed side's perspective; a negative
/// value means that side is behind and earns the desperation bonus.
pub fn time_multiplier(minute: i32, score_diff: i32) -> f64 {
    let phase = MatchPhase::for_minute(minute).base_multiplier();
    let fatigue = ((minute - 75).max(0) as f64 * FATIGUE_PER_MINUTE).min(FATIGUE_CAP);
    let desperation = if score_diff < 0 { DESPERATION_BONUS } else { 0.0 };
    phase + fatigue + desperation
}

/// Expected goals still to come in the match.
pub fn late_goal_lambda(total_xg: f64, minute: i32, score_diff: i32) -> f64 {
    let remaining = (90.0 - minute as f64 + STOPPAGE_ALLOWANCE_MINS).max(0.0);
    (total_xg.max(0.0) / 90.0) * remaining * time_multiplier(minute, score_diff)
}

/// Probability (0–100) that at least one more goal is scored.
///
/// Not monotone in minute: the phase multiplier steps up while the time
/// left keeps shrinking, so λ can fall from one minute to the next (75' to
/// 76'). [`late_goal_intensity`] is the per-minute rate that only rises.
pub fn poisson_late_goal_probability(total_xg: f64, minute: i32, score_diff: i32) -> i32 {
    let lambda = late_goal_lambda(total_xg, minute, score_diff);
    let p = 1.0 - (-lambda).exp();
    ((p * 100.0).round() as i32).clamp(0, 100)
}

/// Per-minute goal intensity, `(totalXG / 90) × multiplier`.
pub fn late_goal_intensity(total_xg: f64, minute: i32, score_diff: i32) -> f64 {
    (total_xg.max(0.0) / 90.0) * time_multiplier(minute, score_diff)
}

/// Extra points for the closing stages of a match, zero before minute 80.
pub fn urgency_bonus(minute: i32, home_score: i32, away_score: i32) -> f64 {
    if minute < 80 {
        return 0.0;
    }
    let by_diff = match (home_score - away_score).abs() {
        0 => 8.0,
        1 => 12.0,
        2 => 4.0,
        _ => 1.0,
    };
    let time_urgency = ((minute - 80) as f64 * 0.8).min(10.0);
    let scoreless = if minute >= 85 && home_score == 0 && away_score == 0 {
        5.0
    } else {
        0.0
    };
    by_diff + time_urgency + scoreless
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn phases_are_boundary_exact() {
        assert_eq!(MatchPhase::for_minute(14), MatchPhase::Early);
        assert_eq!(MatchPhase::for_minute(15), MatchPhase::Mid);
        assert_eq!(MatchPhase::for_minute(74), MatchPhase::Mid);
        assert_eq!(MatchPhase::for_minute(75), MatchPhase::Late);
        assert_eq!(MatchPhase::for_minute(85), MatchPhase::ExtraLate);
    }

    #[test]
    fn multiplier_components() {
        assert_relative_eq!(time_multiplier(10, 0), 0.85, epsilon = 1e-9);
        assert_relative_eq!(time_multiplier(50, 0), 1.0, epsilon = 1e-9);
        assert_relative_eq!(time_multiplier(80, 0), 1.20, epsilon = 1e-9);
        assert_relative_eq!(time_multiplier(88, -1), 1.25 + 0.13 + 0.10, epsilon = 1e-9);
        // fatigue is capped
        assert_relative_eq!(time_multiplier(120, 0), 1.25 + 0.20, epsilon = 1e-9);
    }

    #[test]
    fn multiplier_never_decreases_with_minute() {
        for diff in [-2, 0, 1] {
            for minute in 0..120 {
                assert!(time_multiplier(minute + 1, diff) >= time_multiplier(minute, diff));
            }
        }
    }

    #[test]
    fn poisson_matches_closed_form() {
        // r = 95 - 60 = 35, λ = (2.0/90) * 35 * 1.0
        let lambda: f64 = 2.0 / 90.0 * 35.0;
        let expected = ((1.0 - (-lambda).exp()) * 100.0).round() as i32;
        assert_eq!(poisson_late_goal_probability(2.0, 60, 0), expected);
    }

    #[test]
    fn poisson_monotone_in_xg() {
        for minute in [20, 60, 80, 89] {
            let mut prev = 0;
            for step in 0..40 {
                let p = poisson_late_goal_probability(step as f64 * 0.1, minute, 0);
                assert!(p >= prev, "xg step {} at {}'", step, minute);
                prev = p;
            }
        }
    }

    #[test]
    fn poisson_not_monotone_in_minute() {
        assert!(
            poisson_late_goal_probability(2.0, 76, 0) < poisson_late_goal_probability(2.0, 75, 0)
        );
    }

    #[test]
    fn intensity_monotone_in_minute() {
        for minute in 0..89 {
            assert!(late_goal_intensity(2.0, minute + 1, 0) >= late_goal_intensity(2.0, minute, 0));
        }
    }

    #[test]
    fn poisson_bounds_and_zero_xg() {
        assert_eq!(poisson_late_goal_probability(0.0, 70, 0), 0);
        assert_eq!(poisson_late_goal_probability(2.0, 120, 0), 0);
        let p = poisson_late_goal_probability(50.0, 1, -1);
        assert!((0..=100).contains(&p));
    }

    #[test]
    fn urgency_grading() {
        assert_eq!(urgency_bonus(79, 0, 1), 0.0);
        let one_down = urgency_bonus(82, 0, 1);
        let level = urgency_bonus(82, 1, 1);
        let two_down = urgency_bonus(82, 0, 2);
        let rout = urgency_bonus(82, 0, 4);
        assert!(one_down > level && level > two_down && two_down > rout);
        // scoreless bonus kicks in at 85
        assert_relative_eq!(urgency_bonus(86, 0, 0), 8.0 + 4.8 + 5.0, epsilon = 1e-9);
        assert_relative_eq!(urgency_bonus(86, 1, 1), 8.0 + 4.8, epsilon = 1e-9);
    }
}
