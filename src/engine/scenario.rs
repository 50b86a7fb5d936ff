//! Late-game scenario classification.
//!
//! Rules are an ordered table; the first predicate that matches wins, so
//! `BLOWOUT` outranks everything below it. `GENERIC` is returned when no
//! rule matches.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::models::{MatchStateInput, Side, TeamStrengthInput};

/// Strength gap needed for one side to count as "markedly" stronger
pub const STRONG_GAP: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scenario {
    Blowout,
    DeadlockBreak,
    OverSprint,
    StrongBehind,
    WeakDefend,
    BalancedLate,
    Generic,
}

impl Scenario {
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Blowout => "BLOWOUT",
            Scenario::DeadlockBreak => "DEADLOCK_BREAK",
            Scenario::OverSprint => "OVER_SPRINT",
            Scenario::StrongBehind => "STRONG_BEHIND",
            Scenario::WeakDefend => "WEAK_DEFEND",
            Scenario::BalancedLate => "BALANCED_LATE",
            Scenario::Generic => "GENERIC",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts the rules are evaluated against
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioContext {
    pub goal_diff: i32,
    pub total_goals: i32,
    pub total_xg: f64,
    /// Combined xG minus goals scored
    pub xg_debt: f64,
    pub total_shots: i32,
    /// Home-positive strength gap, when strength data was supplied
    pub strength_gap: Option<f64>,
    pub leader: Option<Side>,
    pub leader_possession: f64,
    pub leader_shots: i32,
    pub trailer_shots: i32,
}

impl ScenarioContext {
    pub fn new(input: &MatchStateInput, strength: Option<&TeamStrengthInput>) -> Self {
        let leader = input.trailing_side().map(Side::opponent);
        let (leader_possession, leader_shots, trailer_shots) = match leader {
            Some(side) => (
                input.side(side).possession,
                input.side(side).shots,
                input.side(side.opponent()).shots,
            ),
            None => (50.0, 0, 0),
        };
        Self {
            goal_diff: input.goal_diff(),
            total_goals: input.total_goals(),
            total_xg: input.total_xg(),
            xg_debt: input.xg_debt(),
            total_shots: input.total_shots(),
            strength_gap: strength.map(TeamStrengthInput::strength_gap),
            leader,
            leader_possession,
            leader_shots,
            trailer_shots,
        }
    }

    /// The markedly stronger side, if strength data says there is one.
    pub fn stronger_side(&self) -> Option<Side> {
        match self.strength_gap? {
            g if g >= STRONG_GAP => Some(Side::Home),
            g if g <= -STRONG_GAP => Some(Side::Away),
            _ => None,
        }
    }
}

pub struct ScenarioRule {
    pub scenario: Scenario,
    pub matches: fn(&ScenarioContext) -> bool,
}

fn is_blowout(c: &ScenarioContext) -> bool {
    c.goal_diff.abs() >= 3
}

fn is_deadlock_break(c: &ScenarioContext) -> bool {
    c.total_goals == 0 && c.total_xg >= 1.2
}

fn is_over_sprint(c: &ScenarioContext) -> bool {
    c.total_goals > 1 && c.xg_debt >= 0.8
}

fn is_strong_behind(c: &ScenarioContext) -> bool {
    match (c.stronger_side(), c.leader) {
        (Some(strong), Some(leader)) => strong != leader,
        _ => false,
    }
}

fn is_weak_defend(c: &ScenarioContext) -> bool {
    c.goal_diff.abs() == 1 && (c.leader_possession <= 40.0 || c.trailer_shots >= c.leader_shots + 5)
}

fn is_balanced_late(c: &ScenarioContext) -> bool {
    c.goal_diff.abs() <= 1 && c.total_shots >= 12
}

/// Priority order, highest first.
pub const SCENARIO_RULES: &[ScenarioRule] = &[
    ScenarioRule {
        scenario: Scenario::Blowout,
        matches: is_blowout,
    },
    ScenarioRule {
        scenario: Scenario::DeadlockBreak,
        matches: is_deadlock_break,
    },
    ScenarioRule {
        scenario: Scenario::OverSprint,
        matches: is_over_sprint,
    },
    ScenarioRule {
        scenario: Scenario::StrongBehind,
        matches: is_strong_behind,
    },
    ScenarioRule {
        scenario: Scenario::WeakDefend,
        matches: is_weak_defend,
    },
    ScenarioRule {
        scenario: Scenario::BalancedLate,
        matches: is_balanced_late,
    },
];

pub fn classify_scenario(ctx: &ScenarioContext) -> Scenario {
    SCENARIO_RULES
        .iter()
        .find(|rule| (rule.matches)(ctx))
        .map(|rule| rule.scenario)
        .unwrap_or(Scenario::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{busy_match, quiet_match};

    fn classify(input: &MatchStateInput, strength: Option<&TeamStrengthInput>) -> Scenario {
        classify_scenario(&ScenarioContext::new(input, strength))
    }

    #[test]
    fn blowout_outranks_everything() {
        // 4-0 with a big xG debt would also match OVER_SPRINT
        let mut m = busy_match(85, 4, 0);
        m.home.xg = 6.0;
        assert_eq!(classify(&m, None), Scenario::Blowout);
    }

    #[test]
    fn deadlock_needs_real_chances() {
        assert_eq!(classify(&busy_match(88, 0, 0), None), Scenario::DeadlockBreak);
        // scoreless but sterile falls through
        assert_eq!(classify(&quiet_match(88, 0, 0), None), Scenario::Generic);
    }

    #[test]
    fn over_sprint_on_xg_debt() {
        let mut m = busy_match(80, 1, 1);
        m.home.xg = 2.2;
        m.away.xg = 0.9;
        assert_eq!(classify(&m, None), Scenario::OverSprint);
    }

    #[test]
    fn strong_side_behind_uses_external_strength() {
        let m = busy_match(80, 0, 1);
        let strong_home = TeamStrengthInput {
            home_rank: Some(1),
            away_rank: Some(17),
            home_form: Some(13),
            away_form: Some(4),
            ..Default::default()
        };
        assert_eq!(classify(&m, Some(&strong_home)), Scenario::StrongBehind);

        // same match without strength data is not STRONG_BEHIND
        assert_ne!(classify(&m, None), Scenario::StrongBehind);
    }

    #[test]
    fn weak_defend_and_balanced_fallbacks() {
        let mut m = busy_match(80, 1, 0);
        m.home.possession = 35.0;
        m.away.possession = 65.0;
        assert_eq!(classify(&m, None), Scenario::WeakDefend);

        let m = busy_match(80, 1, 0);
        assert_eq!(classify(&m, None), Scenario::BalancedLate);
    }

    #[test]
    fn rule_table_order_is_explicit() {
        let order: Vec<&str> = SCENARIO_RULES.iter().map(|r| r.scenario.as_str()).collect();
        assert_eq!(
            order,
            [
                "BLOWOUT",
                "DEADLOCK_BREAK",
                "OVER_SPRINT",
                "STRONG_BEHIND",
                "WEAK_DEFEND",
                "BALANCED_LATE"
            ]
        );
    }
}
