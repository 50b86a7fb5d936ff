//! Tick orchestrator.
//!
//! [`SignalEngine::evaluate`] takes one polling tick worth of inputs and the
//! state left by the previous tick, and returns what it produced together
//! with the next state. The caller owns scheduling and persistence; nothing
//! in here performs I/O.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::calibration::{CalibratedProbability, CalibrationMap};
use super::hysteresis::{Direction, HysteresisState, Tier, TierObservation};
use super::kelly::{calculate_stake, KellyResult};
use super::late_module::{evaluate_late_module, should_trigger_late_module, LateContext, UnifiedSignal};
use super::odds::{
    analyze_money_flow, detect_divergence, detect_rapid_changes, DivergenceResult, MoneyFlow,
    OddsHistory, OddsSnapshot, RapidChange,
};
use super::scenario::{classify_scenario, Scenario, ScenarioContext};
use super::scoring::{score_match, ScoreResult};
use super::settlement::{expire_signal, settle_signal, SettlementState};
use super::strength::{blend_signal_strength, SignalStrength};
use super::{Action, EngineConfig};
use crate::db::models::{
    GoalEvent, MatchStateInput, MatchStatus, SignalRecord, SignalStatus, SignalType, TickInput,
};
use crate::feed::normalize::normalize_tick;

/// Everything the engine remembers between ticks
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub hysteresis: HysteresisState,
    pub odds: OddsHistory,
    pub settlement: SettlementState,
    /// Emitted signals still awaiting settlement
    pub signals: Vec<SignalRecord>,
    pub last_seen: HashMap<i64, DateTime<Utc>>,
}

impl EngineState {
    /// Start from pending signals loaded from the store.
    pub fn with_pending(signals: Vec<SignalRecord>) -> Self {
        Self {
            signals: signals
                .into_iter()
                .filter(|s| !s.status.is_settled())
                .collect(),
            ..Default::default()
        }
    }

    fn evict(&mut self, fixture_id: i64) {
        self.hysteresis.evict(fixture_id);
        self.odds.evict(fixture_id);
        self.settlement.evict(fixture_id);
        if !self.signals.iter().any(|s| s.fixture_id == fixture_id) {
            self.last_seen.remove(&fixture_id);
        }
    }
}

/// Per-fixture result of one tick
#[derive(Debug, Clone, Serialize)]
pub struct FixtureEvaluation {
    pub fixture_id: i64,
    pub minute: i32,
    /// `None` when the snapshot carried no statistics
    pub score: Option<ScoreResult>,
    pub strength: Option<SignalStrength>,
    pub calibrated: Option<CalibratedProbability>,
    pub kelly: Option<KellyResult>,
    pub tier: Option<TierObservation>,
    pub scenario: Option<Scenario>,
    pub late: Option<UnifiedSignal>,
    pub rapid_changes: Vec<RapidChange>,
    pub money_flow: Option<MoneyFlow>,
    pub divergence: Option<DivergenceResult>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TickOutput {
    pub evaluations: Vec<FixtureEvaluation>,
    /// Signals created this tick (status pending)
    pub new_signals: Vec<SignalRecord>,
    /// Signals that left pending this tick
    pub settled: Vec<SignalRecord>,
    pub goals: Vec<GoalEvent>,
    /// Fixtures skipped because their input was rejected
    pub skipped: Vec<(i64, String)>,
}

pub struct SignalEngine {
    cfg: EngineConfig,
    calibration: CalibrationMap,
}

impl SignalEngine {
    pub fn new(cfg: EngineConfig, calibration: CalibrationMap) -> Self {
        Self { cfg, calibration }
    }

    pub fn calibration(&self) -> &CalibrationMap {
        &self.calibration
    }

    /// Fold a settled signal into the calibration buckets.
    pub fn observe_settled(&mut self, record: &SignalRecord) {
        self.calibration.observe_record(record);
    }

    pub fn evaluate(
        &self,
        ticks: &[TickInput],
        mut state: EngineState,
        now: DateTime<Utc>,
    ) -> (TickOutput, EngineState) {
        let mut out = TickOutput::default();
        let mut seen = HashSet::new();

        for tick in ticks {
            let fixture_id = tick.match_state.fixture_id;
            let tick = match normalize_tick(tick.clone()) {
                Ok(t) => t,
                Err(e) => {
                    warn!("Skipping fixture {}: {}", fixture_id, e);
                    out.skipped.push((fixture_id, e.to_string()));
                    continue;
                }
            };
            if !seen.insert(fixture_id) {
                debug!("Fixture {} appears twice in one tick, later copy ignored", fixture_id);
                continue;
            }
            state.last_seen.insert(fixture_id, now);
            let evaluation = self.evaluate_fixture(&tick, &mut state, &mut out, now);
            out.evaluations.push(evaluation);

            if tick.match_state.status == MatchStatus::Finished {
                debug!("Fixture {} finished, evicting state", fixture_id);
                state.evict(fixture_id);
            }
        }

        self.expire_and_evict(&mut state, &seen, &mut out, now);
        (out, state)
    }

    fn evaluate_fixture(
        &self,
        tick: &TickInput,
        state: &mut EngineState,
        out: &mut TickOutput,
        now: DateTime<Utc>,
    ) -> FixtureEvaluation {
        let input = &tick.match_state;
        let market = tick.market.as_ref();
        let fixture_id = input.fixture_id;

        if let Some(m) = market {
            state.odds.record(
                fixture_id,
                OddsSnapshot::from_market(m, input.minute),
                &self.cfg.odds,
            );
        }

        // Settlement first: a goal in this tick resolves signals emitted earlier.
        let goals = state.settlement.observe(input);
        for g in &goals {
            info!(
                "Goal detected fixture={} side={:?} minute={} score={}-{}",
                g.fixture_id, g.side, g.minute, g.home_score, g.away_score
            );
        }
        let fixture_goals = state.settlement.goals(fixture_id).to_vec();
        let mut still_pending = Vec::with_capacity(state.signals.len());
        for rec in std::mem::take(&mut state.signals) {
            match settle_signal(&rec, &fixture_goals, input, now, &self.cfg.settlement) {
                Some(settled) => {
                    info!(
                        "Signal {} settled {} ({})",
                        settled.key,
                        settled.status.as_str(),
                        settled.settlement_note.as_deref().unwrap_or("")
                    );
                    out.settled.push(settled);
                }
                None => still_pending.push(rec),
            }
        }
        state.signals = still_pending;
        out.goals.extend(goals);

        let mut evaluation = FixtureEvaluation {
            fixture_id,
            minute: input.minute,
            score: None,
            strength: None,
            calibrated: None,
            kelly: None,
            tier: None,
            scenario: None,
            late: None,
            rapid_changes: Vec::new(),
            money_flow: None,
            divergence: None,
        };

        let Some(score) = score_match(input) else {
            debug!("Fixture {} unscoreable at {}': no statistics", fixture_id, input.minute);
            return evaluation;
        };

        let strength = blend_signal_strength(score.total, input, &self.cfg.blend);
        let calibrated = self.calibration.calibrate(strength.strength);
        let kelly = calculate_stake(calibrated.probability, market, &self.cfg.kelly);
        let scenario = classify_scenario(&ScenarioContext::new(input, tick.strength.as_ref()));
        let late = evaluate_late_module(
            &LateContext {
                match_state: input,
                market,
                strength: tick.strength.as_ref(),
                score: &score,
                calibrated,
                kelly: &kelly,
            },
            &self.cfg.late,
        );
        // Only live play moves the tier; a finished or paused match keeps
        // settling but can never promote or emit.
        let tier = if input.status == MatchStatus::InProgress {
            Some(
                state
                    .hysteresis
                    .observe(fixture_id, strength.strength, &self.cfg.tier),
            )
        } else {
            debug!(
                "Fixture {} not in play ({:?}), tier left untouched",
                fixture_id, input.status
            );
            None
        };

        let snapshots = state.odds.snapshots(fixture_id);
        if !snapshots.is_empty() {
            evaluation.rapid_changes = detect_rapid_changes(snapshots, &self.cfg.odds);
            evaluation.money_flow = analyze_money_flow(snapshots);
            let divergence = detect_divergence(input, snapshots, &self.cfg.odds);
            if divergence.detected {
                info!("Fixture {}: {}", fixture_id, divergence.description);
            }
            evaluation.divergence = Some(divergence);
        }
        for change in &evaluation.rapid_changes {
            debug!(
                "Fixture {} rapid {:?} move {:.2} -> {:.2} in {}s",
                fixture_id, change.field, change.from, change.to, change.elapsed_secs
            );
        }

        debug!(
            "Fixture {} {}' base={} strength={} tier={} scenario={}",
            fixture_id,
            input.minute,
            score.total,
            strength.strength,
            tier.map(|t| format!("{} raw={}", t.tier, t.raw))
                .unwrap_or_else(|| "-".to_string()),
            scenario
        );

        if let Some(change) = tier.and_then(|t| t.change) {
            info!(
                "Fixture {} tier {} -> {} at {}' (strength {})",
                fixture_id, change.from, change.to, input.minute, strength.strength
            );
            if change.direction == Direction::Upgrade && change.to == Tier::High {
                if let Some(rec) = self.try_emit(
                    input,
                    &strength,
                    calibrated,
                    scenario,
                    late.as_ref(),
                    state,
                    now,
                ) {
                    out.new_signals.push(rec.clone());
                    state.signals.push(rec);
                }
            }
        }

        evaluation.score = Some(score);
        evaluation.strength = Some(strength);
        evaluation.calibrated = Some(calibrated);
        evaluation.kelly = Some(kelly);
        evaluation.tier = tier;
        evaluation.scenario = Some(scenario);
        evaluation.late = late;
        evaluation
    }

    #[allow(clippy::too_many_arguments)]
    fn try_emit(
        &self,
        input: &MatchStateInput,
        strength: &SignalStrength,
        calibrated: CalibratedProbability,
        scenario: Scenario,
        late: Option<&UnifiedSignal>,
        state: &mut EngineState,
        now: DateTime<Utc>,
    ) -> Option<SignalRecord> {
        let fixture_id = input.fixture_id;
        if late.is_some_and(|l| l.action == Action::Ignore) {
            debug!(
                "Fixture {} reached high tier but late module says IGNORE ({})",
                fixture_id, scenario
            );
            return None;
        }
        let signal_type = if should_trigger_late_module(input.minute, &self.cfg.late) {
            SignalType::LateGoal
        } else {
            SignalType::Pressure
        };
        if !state
            .hysteresis
            .try_emit(fixture_id, signal_type, now, &self.cfg.tier)
        {
            debug!(
                "Fixture {} {} suppressed: cooldown active",
                fixture_id, signal_type
            );
            return None;
        }

        let confidence = late
            .map(|l| l.confidence)
            .unwrap_or_else(|| ((calibrated.probability * 100.0).round() as i32).clamp(0, 100));
        let rec = SignalRecord {
            key: SignalRecord::make_key(fixture_id, signal_type, now),
            fixture_id,
            signal_type,
            trigger_minute: input.minute,
            trigger_home_score: input.home_score,
            trigger_away_score: input.away_score,
            score: strength.strength,
            confidence,
            scenario: scenario.as_str().to_string(),
            status: SignalStatus::Pending,
            goal_minute: None,
            settlement_note: None,
            created_at: now,
            settled_at: None,
        };
        info!(
            "Signal emitted {} fixture={} {}' {}-{} strength={} confidence={} scenario={}",
            signal_type,
            fixture_id,
            input.minute,
            input.home_score,
            input.away_score,
            rec.score,
            rec.confidence,
            rec.scenario
        );
        Some(rec)
    }

    /// Expire pending signals of silent fixtures and drop stale fixture state.
    fn expire_and_evict(
        &self,
        state: &mut EngineState,
        seen: &HashSet<i64>,
        out: &mut TickOutput,
        now: DateTime<Utc>,
    ) {
        let mut still_pending = Vec::with_capacity(state.signals.len());
        for rec in std::mem::take(&mut state.signals) {
            if seen.contains(&rec.fixture_id) {
                still_pending.push(rec);
                continue;
            }
            let last_seen = state.last_seen.get(&rec.fixture_id).copied();
            match expire_signal(&rec, last_seen, now, &self.cfg.settlement) {
                Some(expired) => {
                    info!(
                        "Signal {} expired: {}",
                        expired.key,
                        expired.settlement_note.as_deref().unwrap_or("")
                    );
                    out.settled.push(expired);
                }
                None => still_pending.push(rec),
            }
        }
        state.signals = still_pending;

        let stale_after = Duration::minutes(self.cfg.stale_fixture_mins);
        let stale: Vec<i64> = state
            .last_seen
            .iter()
            .filter(|(_, seen_at)| now - **seen_at >= stale_after)
            .map(|(id, _)| *id)
            .collect();
        for fixture_id in stale {
            debug!("Evicting stale fixture {}", fixture_id);
            state.evict(fixture_id);
        }
    }
}
