//! Multi-factor scoring engine.
//!
//! Five independent factors, each scored 0–100, are blended into a weighted
//! total that expresses how likely the match is to produce another goal
//! soon:
//!
//! | factor      | weight | driven by                                   |
//! |-------------|--------|---------------------------------------------|
//! | score state | 0.25   | goal difference, total goals                |
//! | attack      | 0.30   | cumulative xG, shots on target, pressure    |
//! | momentum    | 0.20   | last-15-minute deltas                       |
//! | history     | 0.15   | base rate of goals for the remaining time   |
//! | special     | 0.10   | red cards, recent goals, attacking subs     |
//!
//! A snapshot without statistics cannot be scored; [`score_match`] returns
//! `None` instead of a misleading number.

use serde::{Deserialize, Serialize};

use super::Action;
use crate::db::models::MatchStateInput;

pub const WEIGHT_SCORE_STATE: f64 = 0.25;
pub const WEIGHT_ATTACK: f64 = 0.30;
pub const WEIGHT_MOMENTUM: f64 = 0.20;
pub const WEIGHT_HISTORY: f64 = 0.15;
pub const WEIGHT_SPECIAL: f64 = 0.10;

/// Recommendation cut-offs on the weighted total
const RECOMMEND_BET: i32 = 75;
const RECOMMEND_PREPARE: i32 = 60;
const RECOMMEND_WATCH: i32 = 45;

/// Share of matches with at least one more goal, by minute reached.
/// Rows: (minute from, base rate 0–100).
const LATE_GOAL_BASE_RATE: [(i32, f64); 8] = [
    (0, 72.0),
    (30, 68.0),
    (45, 62.0),
    (60, 58.0),
    (70, 54.0),
    (75, 50.0),
    (80, 46.0),
    (85, 40.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub score_state: f64,
    pub attack: f64,
    pub momentum: f64,
    pub history: f64,
    pub special: f64,
}

impl FactorScores {
    pub fn weighted_total(&self) -> f64 {
        self.score_state * WEIGHT_SCORE_STATE
            + self.attack * WEIGHT_ATTACK
            + self.momentum * WEIGHT_MOMENTUM
            + self.history * WEIGHT_HISTORY
            + self.special * WEIGHT_SPECIAL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub fixture_id: i64,
    pub minute: i32,
    pub factors: FactorScores,
    /// Weighted total, always in 0..=100
    pub total: i32,
    pub alerts: Vec<String>,
    pub recommendation: Action,
    pub is_strong_team_behind: bool,
}

/// Score a match snapshot. Returns `None` when statistics are unavailable.
pub fn score_match(input: &MatchStateInput) -> Option<ScoreResult> {
    if !input.stats_available {
        return None;
    }

    let mut alerts = Vec::new();
    let is_strong_team_behind = strong_team_behind(input);

    let factors = FactorScores {
        score_state: score_state_factor(input),
        attack: attack_factor(input),
        momentum: momentum_factor(input, &mut alerts),
        history: history_factor(input),
        special: special_factor(input, is_strong_team_behind, &mut alerts),
    };

    if input.xg_debt() >= 1.0 {
        alerts.push(format!("xG debt {:.2}", input.xg_debt()));
    }
    if is_strong_team_behind {
        alerts.push("Trailing side dominating".to_string());
    }

    let total = (factors.weighted_total().round() as i32).clamp(0, 100);
    Some(ScoreResult {
        fixture_id: input.fixture_id,
        minute: input.minute,
        factors,
        total,
        alerts,
        recommendation: recommendation_for(total),
        is_strong_team_behind,
    })
}

pub fn recommendation_for(total: i32) -> Action {
    match total {
        t if t >= RECOMMEND_BET => Action::Bet,
        t if t >= RECOMMEND_PREPARE => Action::Prepare,
        t if t >= RECOMMEND_WATCH => Action::Watch,
        _ => Action::Ignore,
    }
}

fn score_state_factor(input: &MatchStateInput) -> f64 {
    // A one-goal game is the most open: the trailing side must commit forward.
    let by_diff = match input.goal_diff().abs() {
        0 => 70.0,
        1 => 80.0,
        2 => 45.0,
        _ => 15.0,
    };
    let goals_bonus = (input.total_goals() as f64 * 3.0).min(15.0);
    (by_diff + goals_bonus).clamp(0.0, 100.0)
}

fn attack_factor(input: &MatchStateInput) -> f64 {
    let xg = (input.total_xg() / 3.0).min(1.0) * 40.0;
    let sot = ((input.home.shots_on_target + input.away.shots_on_target) as f64 / 10.0).min(1.0)
        * 25.0;
    let da_rate = (input.home.dangerous_attacks + input.away.dangerous_attacks) as f64
        / input.minute.max(1) as f64;
    let pressure = (da_rate / 1.5).min(1.0) * 20.0;
    let corners = ((input.home.corners + input.away.corners) as f64 / 12.0).min(1.0) * 15.0;
    (xg + sot + pressure + corners).clamp(0.0, 100.0)
}

fn momentum_factor(input: &MatchStateInput, alerts: &mut Vec<String>) -> f64 {
    let d = &input.deltas_15;
    let xg = (d.xg / 0.8).min(1.0) * 35.0;
    let shots = (d.shots as f64 / 6.0).min(1.0) * 25.0;
    let sot = (d.shots_on_target as f64 / 3.0).min(1.0) * 20.0;
    let da = (d.dangerous_attacks as f64 / 15.0).min(1.0) * 10.0;
    let corners = (d.corners as f64 / 3.0).min(1.0) * 10.0;
    if d.shots >= 6 {
        alerts.push(format!("Surge: {} shots in last 15'", d.shots));
    }
    (xg + shots + sot + da + corners).clamp(0.0, 100.0)
}

fn history_factor(input: &MatchStateInput) -> f64 {
    let base = LATE_GOAL_BASE_RATE
        .iter()
        .rev()
        .find(|(from, _)| input.minute >= *from)
        .map(|(_, rate)| *rate)
        .unwrap_or(LATE_GOAL_BASE_RATE[0].1);
    // Open matches tend to stay open.
    let goals_bonus = (input.total_goals() as f64 * 4.0).min(12.0);
    (base + goals_bonus).clamp(0.0, 100.0)
}

fn special_factor(input: &MatchStateInput, strong_behind: bool, alerts: &mut Vec<String>) -> f64 {
    let mut score = 30.0;
    let reds = input.home_red_cards + input.away_red_cards;
    if reds > 0 {
        score += (reds as f64 * 15.0).min(30.0);
        alerts.push(format!("Red card x{}: numerical imbalance", reds));
    }
    if input.recent_goals > 0 {
        score += (input.recent_goals as f64 * 10.0).min(20.0);
        alerts.push(format!("{} goal(s) in last 15'", input.recent_goals));
    }
    if input.recent_attacking_subs > 0 {
        score += (input.recent_attacking_subs as f64 * 8.0).min(24.0);
        if input.recent_attacking_subs >= 2 {
            alerts.push(format!(
                "{} attacking substitutions",
                input.recent_attacking_subs
            ));
        }
    }
    if strong_behind {
        score += 20.0;
    }
    score.clamp(0.0, 100.0)
}

/// The trailing side out-creating the leader by a clear margin.
fn strong_team_behind(input: &MatchStateInput) -> bool {
    let Some(trailing) = input.trailing_side() else {
        return false;
    };
    let behind = input.side(trailing);
    let leader = input.side(trailing.opponent());
    behind.xg >= leader.xg + 0.5 && behind.possession >= 55.0
}
