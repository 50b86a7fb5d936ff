use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-side cumulative match statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideStats {
    pub shots: i32,
    pub shots_on_target: i32,
    /// Expected goals accumulated so far
    pub xg: f64,
    pub corners: i32,
    /// Ball possession percentage (0–100)
    pub possession: f64,
    pub dangerous_attacks: i32,
}

/// Combined (both sides) changes over the last 15 minutes of play
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingDeltas {
    pub shots: i32,
    pub shots_on_target: i32,
    pub xg: f64,
    pub corners: i32,
    pub dangerous_attacks: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    NotStarted,
    #[default]
    InProgress,
    HalfTime,
    Finished,
}

/// Live match snapshot as produced by the feed each polling cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStateInput {
    pub fixture_id: i64,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    pub minute: i32,
    #[serde(default)]
    pub status: MatchStatus,
    pub home_score: i32,
    pub away_score: i32,
    #[serde(default)]
    pub home: SideStats,
    #[serde(default)]
    pub away: SideStats,
    /// Last-15-minute deltas, both sides combined
    #[serde(default)]
    pub deltas_15: RollingDeltas,
    #[serde(default)]
    pub home_red_cards: i32,
    #[serde(default)]
    pub away_red_cards: i32,
    /// Goals scored in the last 15 minutes
    #[serde(default)]
    pub recent_goals: i32,
    /// Attacking substitutions made in the last 15 minutes
    #[serde(default)]
    pub recent_attacking_subs: i32,
    #[serde(default)]
    pub stats_available: bool,
    #[serde(default)]
    pub events_available: bool,
}

impl MatchStateInput {
    pub fn total_goals(&self) -> i32 {
        self.home_score + self.away_score
    }

    /// Home minus away goals
    pub fn goal_diff(&self) -> i32 {
        self.home_score - self.away_score
    }

    pub fn total_xg(&self) -> f64 {
        self.home.xg + self.away.xg
    }

    pub fn total_shots(&self) -> i32 {
        self.home.shots + self.away.shots
    }

    /// Combined xG not yet converted into goals
    pub fn xg_debt(&self) -> f64 {
        self.total_xg() - self.total_goals() as f64
    }

    /// The trailing side, `None` when level
    pub fn trailing_side(&self) -> Option<Side> {
        match self.goal_diff() {
            d if d < 0 => Some(Side::Home),
            d if d > 0 => Some(Side::Away),
            _ => None,
        }
    }

    pub fn side(&self, side: Side) -> &SideStats {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }
}

/// Current market odds for a fixture (decimal odds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStateInput {
    pub fixture_id: i64,
    /// Over/under goal line, e.g. 2.5
    #[serde(default)]
    pub ou_line: Option<f64>,
    #[serde(default)]
    pub prev_ou_line: Option<f64>,
    #[serde(default)]
    pub over_odds: Option<f64>,
    #[serde(default)]
    pub under_odds: Option<f64>,
    #[serde(default)]
    pub prev_over_odds: Option<f64>,
    #[serde(default)]
    pub prev_under_odds: Option<f64>,
    /// Asian handicap line from the home side's perspective
    #[serde(default)]
    pub ah_line: Option<f64>,
    #[serde(default)]
    pub prev_ah_line: Option<f64>,
    #[serde(default)]
    pub ah_home_odds: Option<f64>,
    #[serde(default)]
    pub ah_away_odds: Option<f64>,
    #[serde(default)]
    pub prev_ah_home_odds: Option<f64>,
    #[serde(default)]
    pub prev_ah_away_odds: Option<f64>,
    #[serde(default)]
    pub home_win_odds: Option<f64>,
    #[serde(default)]
    pub draw_odds: Option<f64>,
    #[serde(default)]
    pub away_win_odds: Option<f64>,
    #[serde(default)]
    pub bookmaker: Option<String>,
    #[serde(default)]
    pub is_live: bool,
    pub captured_at: DateTime<Utc>,
}

impl MarketStateInput {
    /// Change in the over price since the previous capture (negative = shortening)
    pub fn over_odds_move(&self) -> Option<f64> {
        Some(self.over_odds? - self.prev_over_odds?)
    }

    pub fn ou_line_move(&self) -> Option<f64> {
        Some(self.ou_line? - self.prev_ou_line?)
    }

    pub fn ah_odds_move(&self, side: Side) -> Option<f64> {
        match side {
            Side::Home => Some(self.ah_home_odds? - self.prev_ah_home_odds?),
            Side::Away => Some(self.ah_away_odds? - self.prev_ah_away_odds?),
        }
    }
}

/// Optional pre-match strength context for the two sides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamStrengthInput {
    /// League position (1 = top)
    pub home_rank: Option<i32>,
    pub away_rank: Option<i32>,
    pub home_points: Option<i32>,
    pub away_points: Option<i32>,
    /// Points from the last five matches (0–15)
    pub home_form: Option<i32>,
    pub away_form: Option<i32>,
}

impl TeamStrengthInput {
    /// Signed strength gap in [-100, 100]; positive means the home side is stronger.
    pub fn strength_gap(&self) -> f64 {
        let rank = match (self.home_rank, self.away_rank) {
            (Some(h), Some(a)) => ((a - h) as f64 * 2.0).clamp(-40.0, 40.0),
            _ => 0.0,
        };
        let points = match (self.home_points, self.away_points) {
            (Some(h), Some(a)) => ((h - a) as f64 * 0.5).clamp(-30.0, 30.0),
            _ => 0.0,
        };
        let form = match (self.home_form, self.away_form) {
            (Some(h), Some(a)) => ((h - a) as f64 * 2.0).clamp(-30.0, 30.0),
            _ => 0.0,
        };
        (rank + points + form).clamp(-100.0, 100.0)
    }
}

/// One fixture's inputs for a single polling tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickInput {
    #[serde(rename = "match")]
    pub match_state: MatchStateInput,
    #[serde(default)]
    pub market: Option<MarketStateInput>,
    #[serde(default)]
    pub strength: Option<TeamStrengthInput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

/// A goal inferred from a score increment between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalEvent {
    pub fixture_id: i64,
    pub side: Side,
    pub minute: i32,
    /// Score after this goal
    pub home_score: i32,
    pub away_score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    /// Promotion to the high tier from the late-phase module
    LateGoal,
    /// Promotion to the high tier before the late phase starts
    Pressure,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::LateGoal => "LATE_GOAL",
            SignalType::Pressure => "PRESSURE",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LATE_GOAL" => Ok(SignalType::LateGoal),
            "PRESSURE" => Ok(SignalType::Pressure),
            other => anyhow::bail!("unknown signal type '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Pending,
    Hit,
    Miss,
    Expired,
}

impl SignalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalStatus::Pending => "pending",
            SignalStatus::Hit => "hit",
            SignalStatus::Miss => "miss",
            SignalStatus::Expired => "expired",
        }
    }

    pub fn is_settled(self) -> bool {
        self != SignalStatus::Pending
    }
}

impl FromStr for SignalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SignalStatus::Pending),
            "hit" => Ok(SignalStatus::Hit),
            "miss" => Ok(SignalStatus::Miss),
            "expired" => Ok(SignalStatus::Expired),
            other => anyhow::bail!("unknown signal status '{}'", other),
        }
    }
}

/// An emitted signal awaiting (or holding) its settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Stable key: `{fixture_id}:{signal_type}:{created_at millis}`
    pub key: String,
    pub fixture_id: i64,
    pub signal_type: SignalType,
    pub trigger_minute: i32,
    pub trigger_home_score: i32,
    pub trigger_away_score: i32,
    /// Signal strength at emission (0–100)
    pub score: i32,
    pub confidence: i32,
    pub scenario: String,
    pub status: SignalStatus,
    pub goal_minute: Option<i32>,
    pub settlement_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl SignalRecord {
    pub fn make_key(fixture_id: i64, signal_type: SignalType, created_at: DateTime<Utc>) -> String {
        format!(
            "{}:{}:{}",
            fixture_id,
            signal_type.as_str(),
            created_at.timestamp_millis()
        )
    }
}
