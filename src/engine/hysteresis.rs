//! Tier hysteresis state machine.
//!
//! The raw tier is a pure function of signal strength. The visible tier only
//! moves after the same raw tier has been seen `confirm_count` consecutive
//! times, which keeps a fixture hovering around a threshold from flapping.
//! Emission of a given signal type is additionally rate limited per fixture.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::db::models::SignalType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub high_threshold: i32,
    pub watch_threshold: i32,
    /// Consecutive matching observations needed to commit a new tier
    pub confirm_count: u32,
    /// Minimum gap between two emissions of one signal type per fixture
    pub cooldown_secs: i64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            high_threshold: 70,
            watch_threshold: 50,
            confirm_count: 3,
            cooldown_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    High,
    Watch,
    Low,
}

impl Tier {
    fn rank(self) -> u8 {
        match self {
            Tier::Low => 0,
            Tier::Watch => 1,
            Tier::High => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Watch => "watch",
            Tier::Low => "low",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn raw_tier(strength: i32, cfg: &TierConfig) -> Tier {
    if strength >= cfg.high_threshold {
        Tier::High
    } else if strength >= cfg.watch_threshold {
        Tier::Watch
    } else {
        Tier::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Upgrade,
    Downgrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChange {
    pub from: Tier,
    pub to: Tier,
    pub direction: Direction,
}

/// Result of feeding one strength reading through the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierObservation {
    /// Committed tier after this observation
    pub tier: Tier,
    pub raw: Tier,
    pub pending: Option<Tier>,
    pub confirm_count: u32,
    /// `false` while a different raw tier is waiting for confirmation
    pub stable: bool,
    pub change: Option<TierChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierState {
    pub current: Tier,
    pub pending: Option<Tier>,
    pub confirm_count: u32,
    pub last_signal_at: HashMap<SignalType, DateTime<Utc>>,
}

impl Default for TierState {
    fn default() -> Self {
        Self {
            current: Tier::Low,
            pending: None,
            confirm_count: 0,
            last_signal_at: HashMap::new(),
        }
    }
}

impl TierState {
    fn observe(&mut self, raw: Tier, cfg: &TierConfig) -> Option<TierChange> {
        if raw == self.current {
            self.pending = None;
            self.confirm_count = 0;
            return None;
        }
        if self.pending == Some(raw) {
            self.confirm_count += 1;
        } else {
            self.pending = Some(raw);
            self.confirm_count = 1;
        }
        if self.confirm_count < cfg.confirm_count.max(1) {
            return None;
        }

        let from = self.current;
        self.current = raw;
        self.pending = None;
        self.confirm_count = 0;
        let direction = if raw.rank() > from.rank() {
            Direction::Upgrade
        } else {
            Direction::Downgrade
        };
        Some(TierChange {
            from,
            to: raw,
            direction,
        })
    }
}

/// Tier state for every tracked fixture
#[derive(Debug, Clone, Default)]
pub struct HysteresisState {
    fixtures: HashMap<i64, TierState>,
}

impl HysteresisState {
    pub fn observe(&mut self, fixture_id: i64, strength: i32, cfg: &TierConfig) -> TierObservation {
        let raw = raw_tier(strength, cfg);
        let state = self.fixtures.entry(fixture_id).or_default();
        let change = state.observe(raw, cfg);
        TierObservation {
            tier: state.current,
            raw,
            pending: state.pending,
            confirm_count: state.confirm_count,
            stable: state.pending.is_none(),
            change,
        }
    }

    /// Record an emission unless the same type fired for this fixture inside
    /// the cooldown window. Returns whether the emission may proceed.
    pub fn try_emit(
        &mut self,
        fixture_id: i64,
        signal_type: SignalType,
        now: DateTime<Utc>,
        cfg: &TierConfig,
    ) -> bool {
        let state = self.fixtures.entry(fixture_id).or_default();
        if let Some(last) = state.last_signal_at.get(&signal_type) {
            if now - *last < Duration::seconds(cfg.cooldown_secs) {
                return false;
            }
        }
        state.last_signal_at.insert(signal_type, now);
        true
    }

    pub fn state(&self, fixture_id: i64) -> Option<&TierState> {
        self.fixtures.get(&fixture_id)
    }

    pub fn evict(&mut self, fixture_id: i64) {
        self.fixtures.remove(&fixture_id);
    }

    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::kickoff;

    #[test]
    fn raw_tier_thresholds() {
        let cfg = TierConfig::default();
        assert_eq!(raw_tier(70, &cfg), Tier::High);
        assert_eq!(raw_tier(69, &cfg), Tier::Watch);
        assert_eq!(raw_tier(50, &cfg), Tier::Watch);
        assert_eq!(raw_tier(49, &cfg), Tier::Low);
    }

    #[test]
    fn commits_after_exactly_confirm_count_ticks() {
        for confirm in 1..=5u32 {
            let cfg = TierConfig {
                confirm_count: confirm,
                ..Default::default()
            };
            let mut h = HysteresisState::default();
            for tick in 1..confirm {
                let obs = h.observe(7, 85, &cfg);
                assert_eq!(obs.tier, Tier::Low, "tick {} of {}", tick, confirm);
                assert!(!obs.stable);
                assert_eq!(obs.confirm_count, tick);
            }
            let obs = h.observe(7, 85, &cfg);
            assert_eq!(obs.tier, Tier::High);
            assert!(obs.stable);
            assert_eq!(
                obs.change,
                Some(TierChange {
                    from: Tier::Low,
                    to: Tier::High,
                    direction: Direction::Upgrade
                })
            );
        }
    }

    #[test]
    fn differing_tick_resets_pending() {
        let cfg = TierConfig::default();
        let mut h = HysteresisState::default();
        h.observe(1, 85, &cfg);
        h.observe(1, 85, &cfg);
        // a watch-level reading replaces the pending high
        let obs = h.observe(1, 55, &cfg);
        assert_eq!(obs.pending, Some(Tier::Watch));
        assert_eq!(obs.confirm_count, 1);
        assert_eq!(obs.tier, Tier::Low);

        // back to current clears pending altogether
        let obs = h.observe(1, 10, &cfg);
        assert!(obs.stable);
        assert_eq!(obs.pending, None);
        assert_eq!(obs.confirm_count, 0);
    }

    #[test]
    fn downgrade_is_reported() {
        let cfg = TierConfig {
            confirm_count: 2,
            ..Default::default()
        };
        let mut h = HysteresisState::default();
        h.observe(1, 90, &cfg);
        h.observe(1, 90, &cfg);
        h.observe(1, 20, &cfg);
        let obs = h.observe(1, 20, &cfg);
        assert_eq!(obs.change.map(|c| c.direction), Some(Direction::Downgrade));
        assert_eq!(obs.tier, Tier::Low);
    }

    #[test]
    fn cooldown_suppresses_repeat_emission() {
        let cfg = TierConfig::default();
        let mut h = HysteresisState::default();
        let t0 = kickoff();
        assert!(h.try_emit(1, SignalType::LateGoal, t0, &cfg));
        assert!(!h.try_emit(1, SignalType::LateGoal, t0 + Duration::seconds(599), &cfg));
        // other type and other fixture are independent
        assert!(h.try_emit(1, SignalType::Pressure, t0, &cfg));
        assert!(h.try_emit(2, SignalType::LateGoal, t0, &cfg));
        assert!(h.try_emit(1, SignalType::LateGoal, t0 + Duration::seconds(600), &cfg));
    }

    #[test]
    fn eviction_forgets_fixture() {
        let cfg = TierConfig::default();
        let mut h = HysteresisState::default();
        h.observe(3, 90, &cfg);
        assert_eq!(h.fixture_count(), 1);
        h.evict(3);
        assert!(h.state(3).is_none());
    }
}
