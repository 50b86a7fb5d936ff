//! Unified late-phase module.
//!
//! From minute 65 the base score is re-weighted against an edge score built
//! from recent pressure and the match scenario, a timing score from the
//! temporal model, and (when present) the market's own movement. The module
//! warms up between 65 and 79: the score is capped and only WATCH or IGNORE
//! can come out. From minute 80 it is active and may recommend a bet.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::calibration::CalibratedProbability;
use super::kelly::KellyResult;
use super::scenario::{classify_scenario, Scenario, ScenarioContext};
use super::scoring::ScoreResult;
use super::strength::trailing_perspective_diff;
use super::temporal::{poisson_late_goal_probability, urgency_bonus};
use super::Action;
use crate::db::models::{MarketStateInput, MatchStateInput, Side, TeamStrengthInput};

pub const MODULE_ID: &str = "late_phase";

const WEIGHT_BASE: f64 = 0.35;
const WEIGHT_EDGE: f64 = 0.40;
const WEIGHT_TIMING: f64 = 0.25;
/// Points of final score per point of market score away from neutral
const MARKET_ADJUST_FACTOR: f64 = 0.2;
const MARKET_NEUTRAL: f64 = 50.0;
const ACTIVE_TIMING_BONUS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateModuleConfig {
    pub start_minute: i32,
    pub active_minute: i32,
    /// Hard cap on the score while warming up
    pub warmup_score_cap: i32,
    pub bet_score: i32,
    pub bet_confidence: i32,
    pub prepare_score: i32,
    pub watch_score: i32,
    /// Confidence ceiling when no market data is available
    pub no_market_confidence_cap: i32,
    pub bet_plan_ttl_secs: i64,
}

impl Default for LateModuleConfig {
    fn default() -> Self {
        Self {
            start_minute: 65,
            active_minute: 80,
            warmup_score_cap: 75,
            bet_score: 78,
            bet_confidence: 65,
            prepare_score: 68,
            watch_score: 55,
            no_market_confidence_cap: 70,
            bet_plan_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatePhase {
    Inactive,
    Warmup,
    Active,
}

pub fn should_trigger_late_module(minute: i32, cfg: &LateModuleConfig) -> bool {
    minute >= cfg.start_minute
}

pub fn late_module_phase(minute: i32, cfg: &LateModuleConfig) -> LatePhase {
    if minute >= cfg.active_minute {
        LatePhase::Active
    } else if minute >= cfg.start_minute {
        LatePhase::Warmup
    } else {
        LatePhase::Inactive
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeBreakdown {
    pub pressure: f64,
    pub xg_velocity: f64,
    pub shot_quality: f64,
    pub strength_gap: f64,
    pub trailing_pressure: f64,
    /// Can be negative (a blowout drags the edge down)
    pub scenario_bonus: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub edge: f64,
    pub timing: f64,
    /// Market score (50 = neutral), absent without market data
    pub market: Option<f64>,
    /// Input data quality, informational
    pub quality: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub data: i32,
    pub phase: i32,
    pub agreement: i32,
    pub market: i32,
    pub calibration: i32,
    /// Set when the no-market ceiling cut the total
    pub capped: bool,
    pub total: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reasons {
    pub tags: Vec<String>,
    pub key_stats: BTreeMap<String, f64>,
    pub deltas: BTreeMap<String, f64>,
    pub market_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetPlan {
    pub market: String,
    pub line: f64,
    pub selection: String,
    /// Lowest price at which the plan still has value
    pub min_odds: f64,
    pub stake_pct: Option<f64>,
    pub ttl_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSignal {
    pub module: String,
    pub fixture_id: i64,
    pub minute: i32,
    pub phase: LatePhase,
    pub score: i32,
    pub confidence: i32,
    pub action: Action,
    pub breakdown: ScoreBreakdown,
    pub edge: EdgeBreakdown,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub reasons: Reasons,
    pub bet_plan: Option<BetPlan>,
    pub scenario: Scenario,
}

/// Everything the module reads for one fixture on one tick
#[derive(Debug, Clone, Copy)]
pub struct LateContext<'a> {
    pub match_state: &'a MatchStateInput,
    pub market: Option<&'a MarketStateInput>,
    pub strength: Option<&'a TeamStrengthInput>,
    pub score: &'a ScoreResult,
    pub calibrated: CalibratedProbability,
    pub kelly: &'a KellyResult,
}

/// Returns `None` before the module starts.
pub fn evaluate_late_module(ctx: &LateContext<'_>, cfg: &LateModuleConfig) -> Option<UnifiedSignal> {
    let input = ctx.match_state;
    let phase = late_module_phase(input.minute, cfg);
    if phase == LatePhase::Inactive {
        return None;
    }

    let scenario_ctx = ScenarioContext::new(input, ctx.strength);
    let scenario = classify_scenario(&scenario_ctx);

    let base = ctx.score.total as f64;
    let edge = edge_breakdown(input, &scenario_ctx, scenario);
    let timing = timing_score(input, phase);
    let market = ctx.market.map(market_score);

    let mut raw = base * WEIGHT_BASE + edge.total * WEIGHT_EDGE + timing * WEIGHT_TIMING;
    if let Some(m) = market {
        raw += (m - MARKET_NEUTRAL) * MARKET_ADJUST_FACTOR;
    }
    let mut score = (raw.round() as i32).clamp(0, 100);
    if phase == LatePhase::Warmup {
        score = score.min(cfg.warmup_score_cap);
    }

    let confidence = confidence_breakdown(ctx, phase, base, edge.total, cfg);
    let action = choose_action(scenario, phase, score, confidence.total, ctx.kelly, cfg);
    let bet_plan = (phase == LatePhase::Active && action.is_actionable())
        .then(|| bet_plan(input, ctx.market, ctx.calibrated, ctx.kelly, cfg));

    Some(UnifiedSignal {
        module: MODULE_ID.to_string(),
        fixture_id: input.fixture_id,
        minute: input.minute,
        phase,
        score,
        confidence: confidence.total,
        action,
        breakdown: ScoreBreakdown {
            base,
            edge: edge.total,
            timing,
            market,
            quality: data_quality(input, ctx.market),
        },
        edge,
        confidence_breakdown: confidence,
        reasons: reasons(ctx, scenario, phase),
        bet_plan,
        scenario,
    })
}

// ── Edge ─────────────────────────────────────────────────────────────────────

fn edge_breakdown(input: &MatchStateInput, sc: &ScenarioContext, scenario: Scenario) -> EdgeBreakdown {
    let d = &input.deltas_15;
    let pressure = (d.dangerous_attacks as f64 / 20.0).min(1.0) * 15.0
        + (d.shots_on_target as f64 / 4.0).min(1.0) * 10.0;
    let xg_velocity = d.xg.clamp(0.0, 1.0) * 20.0;
    let shot_quality = if sc.total_shots > 0 {
        let per_shot = sc.total_xg / sc.total_shots as f64;
        (per_shot / 0.12).min(1.0) * 15.0
    } else {
        0.0
    };
    let strength_gap = strength_gap_edge(sc);
    let trailing_pressure = trailing_pressure_edge(input);
    let scenario_bonus = scenario_bonus(scenario, sc);

    let total = (pressure + xg_velocity + shot_quality + strength_gap + trailing_pressure
        + scenario_bonus)
        .clamp(0.0, 100.0);
    EdgeBreakdown {
        pressure,
        xg_velocity,
        shot_quality,
        strength_gap,
        trailing_pressure,
        scenario_bonus,
        total,
    }
}

/// A stronger side that is level or behind keeps pushing.
fn strength_gap_edge(sc: &ScenarioContext) -> f64 {
    let Some(gap) = sc.strength_gap else {
        return 0.0;
    };
    let stronger = if gap >= 0.0 { Side::Home } else { Side::Away };
    let scale = (gap.abs() / 50.0).min(1.0);
    match sc.leader {
        None => scale * 10.0,
        Some(leader) if leader != stronger => scale * 15.0,
        Some(_) => 0.0,
    }
}

/// Trailing side out-shooting the leader in a one or two goal game.
fn trailing_pressure_edge(input: &MatchStateInput) -> f64 {
    let Some(trailing) = input.trailing_side() else {
        return 0.0;
    };
    if input.goal_diff().abs() > 2 {
        return 0.0;
    }
    let surplus = input.side(trailing).shots - input.side(trailing.opponent()).shots;
    if surplus <= 0 {
        return 0.0;
    }
    (surplus as f64 / 8.0).min(1.0) * 15.0
}

fn scenario_bonus(scenario: Scenario, sc: &ScenarioContext) -> f64 {
    match scenario {
        Scenario::DeadlockBreak => 10.0 + (sc.xg_debt.max(0.0) / 2.5).min(1.0) * 15.0,
        Scenario::OverSprint => 12.0,
        Scenario::StrongBehind => 15.0,
        Scenario::WeakDefend => 5.0,
        Scenario::BalancedLate => 3.0,
        Scenario::Generic => 0.0,
        Scenario::Blowout => -20.0,
    }
}

// ── Timing & market ──────────────────────────────────────────────────────────

fn timing_score(input: &MatchStateInput, phase: LatePhase) -> f64 {
    let diff = trailing_perspective_diff(input);
    let poisson = poisson_late_goal_probability(input.total_xg(), input.minute, diff) as f64;
    let urgency = urgency_bonus(input.minute, input.home_score, input.away_score);
    let phase_bonus = if phase == LatePhase::Active {
        ACTIVE_TIMING_BONUS
    } else {
        0.0
    };
    (poisson + urgency * 2.0 + phase_bonus).clamp(0.0, 100.0)
}

/// 0–100 around a neutral 50; above 50 the market leans towards more goals.
pub fn market_score(market: &MarketStateInput) -> f64 {
    let mut score = MARKET_NEUTRAL;
    let over_move = market.over_odds_move();
    match over_move {
        Some(m) if m < 0.0 => score += 12.0,
        Some(m) if m > 0.0 => score -= 12.0,
        _ => {}
    }
    match market.ou_line_move() {
        // over shortening even though the line dropped
        Some(l) if l < 0.0 && over_move.is_some_and(|m| m < 0.0) => score += 15.0,
        Some(l) if l > 0.0 => score += 8.0,
        _ => {}
    }
    if let Some(over) = market.over_odds {
        if over <= 1.8 {
            score += 5.0;
        } else if over >= 2.6 {
            score -= 5.0;
        }
    }
    score.clamp(0.0, 100.0)
}

fn trailing_handicap_shortening(input: &MatchStateInput, market: &MarketStateInput) -> bool {
    input
        .trailing_side()
        .and_then(|side| market.ah_odds_move(side))
        .is_some_and(|m| m < 0.0)
}

fn odds_move_consistent(market: &MarketStateInput) -> bool {
    let over = market.over_odds_move();
    let under = market.under_odds.zip(market.prev_under_odds).map(|(u, p)| u - p);
    matches!((over, under), (Some(o), Some(u)) if (o < 0.0 && u > 0.0) || (o > 0.0 && u < 0.0))
}

fn data_quality(input: &MatchStateInput, market: Option<&MarketStateInput>) -> f64 {
    let mut q = 0.0;
    if input.stats_available {
        q += 50.0;
    }
    if input.events_available {
        q += 20.0;
    }
    if let Some(m) = market {
        q += 20.0;
        if m.is_live {
            q += 10.0;
        }
    }
    q
}

// ── Confidence & action ──────────────────────────────────────────────────────

fn confidence_breakdown(
    ctx: &LateContext<'_>,
    phase: LatePhase,
    base: f64,
    edge: f64,
    cfg: &LateModuleConfig,
) -> ConfidenceBreakdown {
    let input = ctx.match_state;
    let mut c = ConfidenceBreakdown::default();
    if input.stats_available {
        c.data += 30;
    }
    if input.events_available {
        c.data += 10;
    }
    c.phase = match phase {
        LatePhase::Active => 10,
        LatePhase::Warmup => 5,
        LatePhase::Inactive => 0,
    };
    c.agreement = match (base >= 60.0, edge >= 50.0) {
        (true, true) => 15,
        (true, false) | (false, true) => 5,
        (false, false) => 0,
    };
    if let Some(m) = ctx.market {
        c.market += 15;
        if m.is_live {
            c.market += 5;
        }
        if odds_move_consistent(m) {
            c.market += 5;
        }
        if trailing_handicap_shortening(input, m) {
            c.market += 5;
        }
    }
    if ctx.calibrated.is_calibrated {
        c.calibration = 5;
    }

    let mut total = c.data + c.phase + c.agreement + c.market + c.calibration;
    if ctx.market.is_none() && total > cfg.no_market_confidence_cap {
        total = cfg.no_market_confidence_cap;
        c.capped = true;
    }
    c.total = total.clamp(0, 100);
    c
}

fn choose_action(
    scenario: Scenario,
    phase: LatePhase,
    score: i32,
    confidence: i32,
    kelly: &KellyResult,
    cfg: &LateModuleConfig,
) -> Action {
    if scenario == Scenario::Blowout {
        return Action::Ignore;
    }
    match phase {
        LatePhase::Inactive => Action::Ignore,
        LatePhase::Warmup if score >= cfg.watch_score => Action::Watch,
        LatePhase::Warmup => Action::Ignore,
        LatePhase::Active => {
            let can_bet = kelly.has_real_odds && kelly.bet_suggestion.is_some();
            if score >= cfg.bet_score && confidence >= cfg.bet_confidence && can_bet {
                Action::Bet
            } else if score >= cfg.prepare_score {
                Action::Prepare
            } else if score >= cfg.watch_score {
                Action::Watch
            } else {
                Action::Ignore
            }
        }
    }
}

fn bet_plan(
    input: &MatchStateInput,
    market: Option<&MarketStateInput>,
    calibrated: CalibratedProbability,
    kelly: &KellyResult,
    cfg: &LateModuleConfig,
) -> BetPlan {
    let line = market
        .and_then(|m| m.ou_line)
        .unwrap_or(input.total_goals() as f64 + 0.5);
    let fair = 1.0 / calibrated.probability.max(0.01);
    let min_odds = (fair.max(1.01) * 100.0).round() / 100.0;
    BetPlan {
        market: "OVER_UNDER".to_string(),
        line,
        selection: "Over".to_string(),
        min_odds,
        stake_pct: kelly.bet_suggestion,
        ttl_secs: cfg.bet_plan_ttl_secs,
    }
}

// ── Reasons ──────────────────────────────────────────────────────────────────

fn reasons(ctx: &LateContext<'_>, scenario: Scenario, phase: LatePhase) -> Reasons {
    let input = ctx.match_state;
    let mut tags = vec![scenario.as_str().to_string()];
    tags.push(
        match phase {
            LatePhase::Active => "LATE_ACTIVE",
            LatePhase::Warmup => "LATE_WARMUP",
            LatePhase::Inactive => "LATE_INACTIVE",
        }
        .to_string(),
    );
    if input.xg_debt() >= 1.0 {
        tags.push("XG_DEBT".to_string());
    }
    if ctx.score.is_strong_team_behind {
        tags.push("STRONG_TEAM_BEHIND".to_string());
    }
    if input.home_red_cards + input.away_red_cards > 0 {
        tags.push("RED_CARD".to_string());
    }
    if ctx.market.and_then(MarketStateInput::over_odds_move).is_some_and(|m| m < 0.0) {
        tags.push("OVER_SHORTENING".to_string());
    }
    if ctx.market.is_none() {
        tags.push("NO_MARKET".to_string());
    }
    tags.extend(ctx.score.alerts.iter().cloned());

    let mut key_stats = BTreeMap::new();
    key_stats.insert("total_xg".to_string(), input.total_xg());
    key_stats.insert("xg_debt".to_string(), input.xg_debt());
    key_stats.insert("total_shots".to_string(), input.total_shots() as f64);
    key_stats.insert(
        "shots_on_target".to_string(),
        (input.home.shots_on_target + input.away.shots_on_target) as f64,
    );
    key_stats.insert(
        "corners".to_string(),
        (input.home.corners + input.away.corners) as f64,
    );
    key_stats.insert("win_probability".to_string(), ctx.calibrated.probability);

    let d = &input.deltas_15;
    let mut deltas = BTreeMap::new();
    deltas.insert("shots_15".to_string(), d.shots as f64);
    deltas.insert("shots_on_target_15".to_string(), d.shots_on_target as f64);
    deltas.insert("xg_15".to_string(), d.xg);
    deltas.insert("corners_15".to_string(), d.corners as f64);
    deltas.insert("dangerous_attacks_15".to_string(), d.dangerous_attacks as f64);

    Reasons {
        tags,
        key_stats,
        deltas,
        market_summary: ctx.market.map(market_summary),
    }
}

fn fmt_price(p: Option<f64>) -> String {
    p.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn market_summary(m: &MarketStateInput) -> String {
    let mut s = format!(
        "O/U {} over {} (prev {}) under {}",
        m.ou_line.map(|l| l.to_string()).unwrap_or_else(|| "-".into()),
        fmt_price(m.over_odds),
        fmt_price(m.prev_over_odds),
        fmt_price(m.under_odds),
    );
    if m.ah_line.is_some() {
        s.push_str(&format!(
            "; AH {} {}/{}",
            m.ah_line.map(|l| l.to_string()).unwrap_or_default(),
            fmt_price(m.ah_home_odds),
            fmt_price(m.ah_away_odds),
        ));
    }
    if let Some(book) = &m.bookmaker {
        s.push_str(&format!(" [{}]", book));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::calibration::CalibrationMap;
    use crate::engine::fixtures::{busy_match, quiet_match, shortening_over_market};
    use crate::engine::kelly::{calculate_stake, KellyConfig};
    use crate::engine::scoring::score_match;

    fn run(input: &MatchStateInput, market: Option<&MarketStateInput>) -> Option<UnifiedSignal> {
        let score = score_match(input)?;
        let calibrated = CalibrationMap::new(30).calibrate(score.total);
        let kelly = calculate_stake(calibrated.probability, market, &KellyConfig::default());
        let ctx = LateContext {
            match_state: input,
            market,
            strength: None,
            score: &score,
            calibrated,
            kelly: &kelly,
        };
        evaluate_late_module(&ctx, &LateModuleConfig::default())
    }

    #[test]
    fn trigger_and_phase_boundaries() {
        let cfg = LateModuleConfig::default();
        for minute in 0..=120 {
            assert_eq!(should_trigger_late_module(minute, &cfg), minute >= 65);
        }
        assert_eq!(late_module_phase(60, &cfg), LatePhase::Inactive);
        assert_eq!(late_module_phase(64, &cfg), LatePhase::Inactive);
        for minute in 65..=79 {
            assert_eq!(late_module_phase(minute, &cfg), LatePhase::Warmup);
        }
        for minute in 80..=120 {
            assert_eq!(late_module_phase(minute, &cfg), LatePhase::Active);
        }
    }

    #[test]
    fn inactive_before_start() {
        assert!(run(&busy_match(50, 0, 0), None).is_none());
    }

    #[test]
    fn deadlock_break_scores_well_without_market() {
        let s = run(&busy_match(88, 0, 0), None).unwrap();
        assert_eq!(s.scenario, Scenario::DeadlockBreak);
        assert!(s.score > 65, "score {}", s.score);
        assert_eq!(s.breakdown.market, None);
        assert!(s.confidence <= 70);
        assert!(s.reasons.tags.iter().any(|t| t == "NO_MARKET"));
        // no price: never a BET
        assert_ne!(s.action, Action::Bet);
    }

    #[test]
    fn market_raises_score_and_confidence() {
        let input = busy_match(88, 0, 0);
        let market = shortening_over_market(1);
        let without = run(&input, None).unwrap();
        let with = run(&input, Some(&market)).unwrap();
        assert!(with.score > without.score);
        assert!(with.confidence > without.confidence);
        assert!(with.breakdown.market.unwrap() > 50.0);
        assert!(with.reasons.market_summary.as_deref().unwrap().contains("2.10"));
    }

    #[test]
    fn strong_active_signal_gets_plan() {
        let input = busy_match(88, 0, 0);
        let market = shortening_over_market(1);
        let s = run(&input, Some(&market)).unwrap();
        assert!(s.action.is_actionable(), "{:?} {}", s.action, s.score);
        let plan = s.bet_plan.expect("plan for actionable signal");
        assert_eq!(plan.line, 0.5);
        assert_eq!(plan.selection, "Over");
        assert!(plan.min_odds >= 1.01);
    }

    #[test]
    fn warmup_is_capped_and_passive() {
        let market = shortening_over_market(1);
        for minute in 65..=79 {
            for (h, a) in [(0, 0), (1, 0), (1, 1), (2, 1)] {
                let mut input = busy_match(minute, h, a);
                input.deltas_15.xg = 2.0;
                input.home_red_cards = 1;
                for m in [None, Some(&market)] {
                    let s = run(&input, m).unwrap();
                    assert_eq!(s.phase, LatePhase::Warmup);
                    assert!(s.score <= 75);
                    assert!(s.bet_plan.is_none());
                    assert!(matches!(s.action, Action::Watch | Action::Ignore));
                }
            }
        }
    }

    #[test]
    fn blowout_is_always_ignored() {
        let market = shortening_over_market(1);
        let s = run(&busy_match(85, 4, 0), Some(&market)).unwrap();
        assert_eq!(s.scenario, Scenario::Blowout);
        assert_eq!(s.action, Action::Ignore);
        assert!(s.bet_plan.is_none());
        assert!(s.edge.scenario_bonus < 0.0);
    }

    #[test]
    fn scores_and_confidence_stay_bounded() {
        for minute in 65..=95 {
            let s = run(&quiet_match(minute, 0, 0), None).unwrap();
            assert!((0..=100).contains(&s.score));
            assert!((0..=100).contains(&s.confidence));
            assert!((0.0..=100.0).contains(&s.edge.total));
        }
    }

    #[test]
    fn market_score_directions() {
        let m = shortening_over_market(1);
        // over falling (+12), line falling with it (+15)
        assert_eq!(market_score(&m), 77.0);

        let mut drifting = m.clone();
        drifting.over_odds = Some(2.70);
        drifting.prev_over_odds = Some(2.40);
        drifting.ou_line = Some(1.0);
        // over rising (-12), line rising (+8), long price (-5)
        assert_eq!(market_score(&drifting), 41.0);
    }
}
