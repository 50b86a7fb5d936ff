//! Market odds divergence analyzer.
//!
//! Keeps a bounded, time-pruned history of odds snapshots per fixture and
//! answers three questions about it:
//! - did any price move sharply inside the recent window ([`detect_rapid_changes`])
//! - which way is the money going ([`analyze_money_flow`])
//! - does the market disagree with what is happening on the pitch
//!   ([`detect_divergence`])
//!
//! The analysis functions are pure over a snapshot slice; [`OddsHistory`] is
//! a plain container the caller owns.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::db::models::{MarketStateInput, MatchStateInput, Side};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsConfig {
    /// How far back snapshots are kept
    pub history_window_mins: i64,
    /// Hard cap on snapshots per fixture
    pub max_snapshots: usize,
    /// Window for rapid-change detection
    pub rapid_window_secs: i64,
    /// Minimum absolute move on a handicap price to count as rapid
    pub handicap_threshold: f64,
    /// Minimum absolute move on an over/under price to count as rapid
    pub over_under_threshold: f64,
    /// Weighted total above which divergence is reported regardless of triggers
    pub divergence_threshold: f64,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            history_window_mins: 30,
            max_snapshots: 240,
            rapid_window_secs: 300,
            handicap_threshold: 0.08,
            over_under_threshold: 0.10,
            divergence_threshold: 55.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub captured_at: DateTime<Utc>,
    pub minute: i32,
    pub ah_line: Option<f64>,
    pub ah_home: Option<f64>,
    pub ah_away: Option<f64>,
    pub ou_line: Option<f64>,
    pub over: Option<f64>,
    pub under: Option<f64>,
}

impl OddsSnapshot {
    pub fn from_market(market: &MarketStateInput, minute: i32) -> Self {
        Self {
            captured_at: market.captured_at,
            minute,
            ah_line: market.ah_line,
            ah_home: market.ah_home_odds,
            ah_away: market.ah_away_odds,
            ou_line: market.ou_line,
            over: market.over_odds,
            under: market.under_odds,
        }
    }

    fn field(&self, field: OddsField) -> Option<f64> {
        match field {
            OddsField::HandicapHome => self.ah_home,
            OddsField::HandicapAway => self.ah_away,
            OddsField::Over => self.over,
            OddsField::Under => self.under,
        }
    }

    fn handicap(&self, side: Side) -> Option<f64> {
        match side {
            Side::Home => self.ah_home,
            Side::Away => self.ah_away,
        }
    }
}

/// Per-fixture snapshot history
#[derive(Debug, Clone, Default)]
pub struct OddsHistory {
    by_fixture: HashMap<i64, VecDeque<OddsSnapshot>>,
}

impl OddsHistory {
    /// Append a snapshot and prune anything outside the history window.
    /// A snapshot older than the newest one already held is dropped.
    pub fn record(&mut self, fixture_id: i64, snapshot: OddsSnapshot, cfg: &OddsConfig) {
        let history = self.by_fixture.entry(fixture_id).or_default();
        if history
            .back()
            .is_some_and(|last| snapshot.captured_at < last.captured_at)
        {
            return;
        }
        // same capture replayed: replace rather than duplicate
        if history
            .back()
            .is_some_and(|last| snapshot.captured_at == last.captured_at)
        {
            history.pop_back();
        }
        let cutoff = snapshot.captured_at - Duration::minutes(cfg.history_window_mins);
        history.push_back(snapshot);
        while history.front().is_some_and(|s| s.captured_at < cutoff) {
            history.pop_front();
        }
        while history.len() > cfg.max_snapshots {
            history.pop_front();
        }
    }

    /// Oldest-first view of a fixture's history.
    pub fn snapshots(&mut self, fixture_id: i64) -> &[OddsSnapshot] {
        match self.by_fixture.get_mut(&fixture_id) {
            Some(h) => h.make_contiguous(),
            None => &[],
        }
    }

    pub fn evict(&mut self, fixture_id: i64) {
        self.by_fixture.remove(&fixture_id);
    }

    pub fn fixture_count(&self) -> usize {
        self.by_fixture.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsField {
    HandicapHome,
    HandicapAway,
    Over,
    Under,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RapidChange {
    pub field: OddsField,
    pub from: f64,
    pub to: f64,
    pub change: f64,
    pub elapsed_secs: i64,
}

/// Compare the oldest and newest snapshot inside the rapid window and flag
/// every price whose absolute move exceeds its threshold. The window ends at
/// the newest snapshot's capture time, not the caller's clock.
pub fn detect_rapid_changes(snapshots: &[OddsSnapshot], cfg: &OddsConfig) -> Vec<RapidChange> {
    let Some(newest) = snapshots.last() else {
        return Vec::new();
    };
    let cutoff = newest.captured_at - Duration::seconds(cfg.rapid_window_secs);
    let Some(oldest) = snapshots
        .iter()
        .find(|s| s.captured_at >= cutoff && s.captured_at <= newest.captured_at)
    else {
        return Vec::new();
    };
    if std::ptr::eq(oldest, newest) {
        return Vec::new();
    }

    let elapsed_secs = (newest.captured_at - oldest.captured_at).num_seconds();
    [
        (OddsField::HandicapHome, cfg.handicap_threshold),
        (OddsField::HandicapAway, cfg.handicap_threshold),
        (OddsField::Over, cfg.over_under_threshold),
        (OddsField::Under, cfg.over_under_threshold),
    ]
    .into_iter()
    .filter_map(|(field, threshold)| {
        let from = oldest.field(field)?;
        let to = newest.field(field)?;
        let change = to - from;
        (change.abs() > threshold).then_some(RapidChange {
            field,
            from,
            to,
            change,
            elapsed_secs,
        })
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTrend {
    Accelerating,
    Decelerating,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyFlow {
    /// Odds-implied share of money on the home side, 20–80
    pub home_pct: f64,
    pub away_pct: f64,
    /// Odds-implied share of money on the over, 20–80
    pub over_pct: f64,
    pub trend: FlowTrend,
}

/// Percentage points of flow per unit of odds movement
const FLOW_SENSITIVITY: f64 = 100.0;
const FLOW_STEP_CAP: f64 = 15.0;

fn trend_delta(first: Option<f64>, last: Option<f64>) -> f64 {
    match (first, last) {
        (Some(a), Some(b)) => b - a,
        _ => 0.0,
    }
}

fn flow_points(delta: f64) -> f64 {
    (delta.abs() * FLOW_SENSITIVITY).min(FLOW_STEP_CAP)
}

/// Infer money direction from how both handicap sides and the total line
/// moved across the history. A shortening price means money came in.
pub fn analyze_money_flow(snapshots: &[OddsSnapshot]) -> Option<MoneyFlow> {
    let (first, last) = (snapshots.first()?, snapshots.last()?);
    if snapshots.len() < 2 {
        return None;
    }

    let mut home = 50.0;
    let home_move = trend_delta(first.ah_home, last.ah_home);
    let away_move = trend_delta(first.ah_away, last.ah_away);
    // falling home price or drifting away price: money on home
    home += flow_points(home_move) * -home_move.signum();
    home += flow_points(away_move) * away_move.signum();
    // handicap line moving towards the home side (more negative) backs home too
    let line_move = trend_delta(first.ah_line, last.ah_line);
    home += (line_move.abs() * 20.0).min(10.0) * -line_move.signum();
    let home_pct = home.clamp(20.0, 80.0);

    let mut over = 50.0;
    let over_move = trend_delta(first.over, last.over);
    let under_move = trend_delta(first.under, last.under);
    over += flow_points(over_move) * -over_move.signum();
    over += flow_points(under_move) * under_move.signum();
    let ou_line_move = trend_delta(first.ou_line, last.ou_line);
    over += (ou_line_move.abs() * 20.0).min(10.0) * ou_line_move.signum();
    let over_pct = over.clamp(20.0, 80.0);

    Some(MoneyFlow {
        home_pct,
        away_pct: 100.0 - home_pct,
        over_pct,
        trend: flow_trend(snapshots),
    })
}

/// Most recent step size against the average of the earlier steps.
fn flow_trend(snapshots: &[OddsSnapshot]) -> FlowTrend {
    let steps: Vec<f64> = snapshots
        .windows(2)
        .map(|w| {
            [OddsField::HandicapHome, OddsField::HandicapAway, OddsField::Over]
                .iter()
                .map(|f| trend_delta(w[0].field(*f), w[1].field(*f)).abs())
                .sum()
        })
        .collect();
    let Some((last, earlier)) = steps.split_last() else {
        return FlowTrend::Stable;
    };
    if earlier.is_empty() {
        return FlowTrend::Stable;
    }
    let avg = earlier.iter().sum::<f64>() / earlier.len() as f64;
    if avg <= f64::EPSILON {
        return if *last > 0.02 {
            FlowTrend::Accelerating
        } else {
            FlowTrend::Stable
        };
    }
    if *last > avg * 1.5 {
        FlowTrend::Accelerating
    } else if *last < avg * 0.5 {
        FlowTrend::Decelerating
    } else {
        FlowTrend::Stable
    }
}

// ── Divergence ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceFactor {
    ScoreOddsMismatch,
    TimeWeight,
    PressureMismatch,
    XgMismatch,
    SubstitutionPattern,
    CornerDensity,
}

impl DivergenceFactor {
    pub fn weight(self) -> f64 {
        match self {
            DivergenceFactor::ScoreOddsMismatch => 0.25,
            DivergenceFactor::TimeWeight => 0.10,
            DivergenceFactor::PressureMismatch => 0.20,
            DivergenceFactor::XgMismatch => 0.20,
            DivergenceFactor::SubstitutionPattern => 0.10,
            DivergenceFactor::CornerDensity => 0.15,
        }
    }

    /// Sub-score at which the factor counts as triggered. The time factor
    /// only weights the total and never triggers on its own.
    fn trigger_at(self) -> Option<f64> {
        match self {
            DivergenceFactor::TimeWeight => None,
            DivergenceFactor::SubstitutionPattern | DivergenceFactor::CornerDensity => Some(60.0),
            _ => Some(50.0),
        }
    }

    fn label(self) -> &'static str {
        match self {
            DivergenceFactor::ScoreOddsMismatch => "score/odds mismatch",
            DivergenceFactor::TimeWeight => "time of match",
            DivergenceFactor::PressureMismatch => "pressure mismatch",
            DivergenceFactor::XgMismatch => "xG mismatch",
            DivergenceFactor::SubstitutionPattern => "attacking substitutions",
            DivergenceFactor::CornerDensity => "corner density",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor: DivergenceFactor,
    /// Bounded sub-score, 0–100
    pub score: f64,
    pub triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceResult {
    pub detected: bool,
    /// Weighted total, 0–100
    pub total: f64,
    pub factors: Vec<FactorScore>,
    pub trigger_count: usize,
    pub severity: Option<Severity>,
    pub description: String,
    pub recommendation: String,
}

/// Movement of a price across the history (last − first), `0.0` when unknown
fn price_move(snapshots: &[OddsSnapshot], f: impl Fn(&OddsSnapshot) -> Option<f64>) -> f64 {
    match (snapshots.first(), snapshots.last()) {
        (Some(a), Some(b)) if snapshots.len() >= 2 => trend_delta(f(a), f(b)),
        _ => 0.0,
    }
}

fn score_odds_mismatch(input: &MatchStateInput, snapshots: &[OddsSnapshot]) -> f64 {
    // Leader's price drifting means the market expects the game to turn.
    let Some(leader) = input.trailing_side().map(Side::opponent) else {
        return 0.0;
    };
    let leader_move = price_move(snapshots, |s| s.handicap(leader));
    if leader_move <= 0.0 {
        return 0.0;
    }
    (leader_move / 0.3).min(1.0) * 100.0
}

fn time_weight(minute: i32) -> f64 {
    match minute {
        m if m >= 75 => 100.0,
        m if m >= 60 => 60.0,
        m if m >= 30 => 40.0,
        _ => 20.0,
    }
}

fn pressure_mismatch(input: &MatchStateInput, snapshots: &[OddsSnapshot]) -> f64 {
    let total_da = input.home.dangerous_attacks + input.away.dangerous_attacks;
    if total_da == 0 {
        return 0.0;
    }
    let (side, share) = if input.home.dangerous_attacks >= input.away.dangerous_attacks {
        (Side::Home, input.home.dangerous_attacks as f64 / total_da as f64)
    } else {
        (Side::Away, input.away.dangerous_attacks as f64 / total_da as f64)
    };
    if share < 0.6 {
        return 0.0;
    }
    let drift = price_move(snapshots, |s| s.handicap(side));
    if drift <= 0.0 {
        return 0.0;
    }
    ((share - 0.5) / 0.3).min(1.0) * 60.0 + (drift / 0.2).min(1.0) * 40.0
}

fn xg_mismatch(input: &MatchStateInput, snapshots: &[OddsSnapshot]) -> f64 {
    let diff = input.home.xg - input.away.xg;
    let side = if diff >= 0.0 { Side::Home } else { Side::Away };
    let xg_gap = diff.abs();
    if xg_gap < 0.8 {
        return 0.0;
    }
    let winning = match side {
        Side::Home => input.goal_diff() > 0,
        Side::Away => input.goal_diff() < 0,
    };
    if winning {
        return 0.0;
    }
    let drift = price_move(snapshots, |s| s.handicap(side));
    let odds_part = if drift > 0.0 {
        30.0
    } else if drift.abs() <= 0.02 {
        15.0
    } else {
        0.0
    };
    (xg_gap / 1.5).min(1.0) * 70.0 + odds_part
}

fn substitution_pattern(input: &MatchStateInput, snapshots: &[OddsSnapshot]) -> f64 {
    if input.recent_attacking_subs < 2 {
        return 0.0;
    }
    let over_move = price_move(snapshots, |s| s.over);
    let unpriced = if over_move >= 0.0 { 30.0 } else { 0.0 };
    (input.recent_attacking_subs as f64 / 3.0).min(1.0) * 70.0 + unpriced
}

fn corner_density(input: &MatchStateInput, snapshots: &[OddsSnapshot]) -> f64 {
    let corners = input.deltas_15.corners;
    if corners < 4 {
        return 0.0;
    }
    let over_move = price_move(snapshots, |s| s.over);
    let drifting = if over_move > 0.0 { 30.0 } else { 0.0 };
    (corners as f64 / 6.0).min(1.0) * 70.0 + drifting
}

/// Weighted multi-factor comparison of market pricing against the pitch.
pub fn detect_divergence(
    input: &MatchStateInput,
    snapshots: &[OddsSnapshot],
    cfg: &OddsConfig,
) -> DivergenceResult {
    let raw = [
        (
            DivergenceFactor::ScoreOddsMismatch,
            score_odds_mismatch(input, snapshots),
        ),
        (DivergenceFactor::TimeWeight, time_weight(input.minute)),
        (
            DivergenceFactor::PressureMismatch,
            pressure_mismatch(input, snapshots),
        ),
        (DivergenceFactor::XgMismatch, xg_mismatch(input, snapshots)),
        (
            DivergenceFactor::SubstitutionPattern,
            substitution_pattern(input, snapshots),
        ),
        (
            DivergenceFactor::CornerDensity,
            corner_density(input, snapshots),
        ),
    ];

    let factors: Vec<FactorScore> = raw
        .into_iter()
        .map(|(factor, score)| {
            let score = score.clamp(0.0, 100.0);
            FactorScore {
                factor,
                score,
                triggered: factor.trigger_at().is_some_and(|t| score >= t),
            }
        })
        .collect();

    let total = factors
        .iter()
        .map(|f| f.score * f.factor.weight())
        .sum::<f64>()
        .clamp(0.0, 100.0);
    let trigger_count = factors.iter().filter(|f| f.triggered).count();
    let detected = trigger_count >= 2 || total >= cfg.divergence_threshold;

    let severity = detected.then(|| {
        if total >= 70.0 || trigger_count >= 4 {
            Severity::Strong
        } else if total >= 50.0 || trigger_count >= 3 {
            Severity::Moderate
        } else {
            Severity::Weak
        }
    });

    let triggered_labels: Vec<&str> = factors
        .iter()
        .filter(|f| f.triggered)
        .map(|f| f.factor.label())
        .collect();
    let description = if detected {
        format!(
            "Market diverging from play ({} factor(s): {}; total {:.0})",
            trigger_count,
            triggered_labels.join(", "),
            total
        )
    } else {
        format!("No divergence (total {:.0})", total)
    };
    let recommendation = match severity {
        Some(Severity::Strong) => "Market lagging the pitch: act on the stats side",
        Some(Severity::Moderate) => "Prepare an entry and confirm on the next update",
        Some(Severity::Weak) => "Observe only",
        None => "No action",
    }
    .to_string();

    DivergenceResult {
        detected,
        total,
        factors,
        trigger_count,
        severity,
        description,
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::engine::fixtures::{busy_match, kickoff, shortening_over_market};

    fn snap(secs: i64, ah_home: f64, ah_away: f64, over: f64) -> OddsSnapshot {
        OddsSnapshot {
            captured_at: kickoff() + Duration::seconds(secs),
            minute: 70,
            ah_line: Some(0.0),
            ah_home: Some(ah_home),
            ah_away: Some(ah_away),
            ou_line: Some(2.5),
            over: Some(over),
            under: Some(1.9),
        }
    }

    #[test]
    fn history_prunes_by_window_and_cap() {
        let cfg = OddsConfig {
            history_window_mins: 10,
            max_snapshots: 3,
            ..Default::default()
        };
        let mut h = OddsHistory::default();
        h.record(1, snap(0, 1.9, 1.9, 2.0), &cfg);
        h.record(1, snap(11 * 60, 1.9, 1.9, 2.0), &cfg);
        assert_eq!(h.snapshots(1).len(), 1, "first snapshot aged out");

        for i in 1..=5 {
            h.record(1, snap(11 * 60 + i * 10, 1.9, 1.9, 2.0), &cfg);
        }
        assert_eq!(h.snapshots(1).len(), 3);

        // out-of-order and duplicate captures do not grow history
        h.record(1, snap(0, 1.9, 1.9, 2.0), &cfg);
        h.record(1, snap(11 * 60 + 50, 1.9, 1.9, 2.1), &cfg);
        let s = h.snapshots(1);
        assert_eq!(s.len(), 3);
        assert_eq!(s.last().unwrap().over, Some(2.1));

        h.evict(1);
        assert!(h.snapshots(1).is_empty());
        assert_eq!(h.fixture_count(), 0);
    }

    #[test]
    fn snapshot_from_market() {
        let s = OddsSnapshot::from_market(&shortening_over_market(1), 81);
        assert_eq!(s.over, Some(2.10));
        assert_eq!(s.minute, 81);
    }

    #[test]
    fn rapid_changes_inside_window_only() {
        let cfg = OddsConfig::default();
        let snaps = vec![
            snap(0, 1.70, 2.20, 2.40),    // outside the 5-minute window
            snap(400, 1.90, 1.95, 2.00),  // oldest inside
            snap(700, 1.80, 2.06, 1.95),  // newest
        ];
        let changes = detect_rapid_changes(&snaps, &cfg);
        let fields: Vec<OddsField> = changes.iter().map(|c| c.field).collect();
        assert_eq!(fields, vec![OddsField::HandicapHome, OddsField::HandicapAway]);
        assert_eq!(changes[0].elapsed_secs, 300);
        assert!(changes[0].change < 0.0);

        assert!(detect_rapid_changes(&snaps[..1], &cfg).is_empty());
    }

    #[test]
    fn rapid_window_ends_at_newest_snapshot() {
        let cfg = OddsConfig::default();
        let snaps = vec![snap(0, 1.90, 1.95, 2.00), snap(60, 2.10, 1.70, 2.00)];
        let changes = detect_rapid_changes(&snaps, &cfg);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].elapsed_secs, 60);
        assert_relative_eq!(changes[0].change, 0.20, epsilon = 1e-9);
        assert_relative_eq!(changes[1].change, -0.25, epsilon = 1e-9);
    }

    #[test]
    fn money_flow_follows_shortening_prices() {
        let snaps = vec![snap(0, 2.00, 1.80, 2.2), snap(60, 1.90, 1.90, 2.1)];
        let flow = analyze_money_flow(&snaps).unwrap();
        assert!(flow.home_pct > 50.0);
        assert!(flow.over_pct > 50.0);
        approx::assert_relative_eq!(flow.home_pct + flow.away_pct, 100.0, epsilon = 1e-9);

        // extreme moves stay inside [20, 80]
        let snaps = vec![snap(0, 3.0, 1.2, 4.0), snap(60, 1.2, 3.0, 1.1)];
        let flow = analyze_money_flow(&snaps).unwrap();
        assert_eq!(flow.home_pct, 80.0);
        assert_eq!(flow.over_pct, 65.0);

        assert!(analyze_money_flow(&snaps[..1]).is_none());
    }

    #[test]
    fn flow_trend_classification() {
        let accelerating = vec![
            snap(0, 2.00, 1.80, 2.0),
            snap(60, 1.99, 1.81, 2.0),
            snap(120, 1.98, 1.82, 2.0),
            snap(180, 1.85, 1.95, 2.0),
        ];
        assert_eq!(flow_trend(&accelerating), FlowTrend::Accelerating);

        let decelerating = vec![
            snap(0, 2.20, 1.60, 2.0),
            snap(60, 2.00, 1.80, 2.0),
            snap(120, 1.99, 1.81, 2.0),
        ];
        assert_eq!(flow_trend(&decelerating), FlowTrend::Decelerating);

        let flat = vec![snap(0, 1.9, 1.9, 2.0), snap(60, 1.9, 1.9, 2.0)];
        assert_eq!(flow_trend(&flat), FlowTrend::Stable);
    }

    #[test]
    fn divergence_when_market_fades_the_dominant_side() {
        // Away leads 0-1 while home dominates; home price drifts anyway.
        let mut m = busy_match(80, 0, 1);
        m.home.xg = 2.4;
        m.away.xg = 0.5;
        m.home.dangerous_attacks = 90;
        m.away.dangerous_attacks = 30;
        m.deltas_15.corners = 5;
        let snaps = vec![snap(0, 1.80, 2.00, 1.80), snap(120, 2.05, 1.75, 1.95)];

        let r = detect_divergence(&m, &snaps, &OddsConfig::default());
        assert!(r.detected);
        assert!(r.trigger_count >= 3, "{:?}", r.factors);
        assert!(matches!(
            r.severity,
            Some(Severity::Moderate) | Some(Severity::Strong)
        ));
        assert!(r.description.contains("xG mismatch"));
        let time = r
            .factors
            .iter()
            .find(|f| f.factor == DivergenceFactor::TimeWeight)
            .unwrap();
        assert!(!time.triggered);
        assert!(r.total <= 100.0);
    }

    #[test]
    fn no_divergence_on_quiet_agreeing_market() {
        let mut m = busy_match(50, 1, 0);
        m.recent_attacking_subs = 0;
        m.deltas_15.corners = 1;
        let snaps = vec![snap(0, 1.80, 2.00, 2.0), snap(120, 1.75, 2.05, 2.0)];
        let r = detect_divergence(&m, &snaps, &OddsConfig::default());
        assert!(!r.detected);
        assert!(r.severity.is_none());
        assert_eq!(r.recommendation, "No action");
    }
}
