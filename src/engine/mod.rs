pub mod calibration;
pub mod evaluator;
pub mod hysteresis;
pub mod kelly;
pub mod late_module;
pub mod odds;
pub mod scenario;
pub mod scoring;
pub mod settlement;
pub mod strength;
pub mod temporal;

#[cfg(test)]
pub(crate) mod fixtures;

pub use evaluator::{EngineState, SignalEngine, TickOutput};

use serde::{Deserialize, Serialize};
use std::fmt;

use hysteresis::TierConfig;
use kelly::KellyConfig;
use late_module::LateModuleConfig;
use odds::OddsConfig;
use settlement::SettlementConfig;
use strength::BlendWeights;

/// Discrete recommendation attached to every score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Bet,
    Prepare,
    Watch,
    Ignore,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Bet => "BET",
            Action::Prepare => "PREPARE",
            Action::Watch => "WATCH",
            Action::Ignore => "IGNORE",
        }
    }

    /// Actions that carry a bet plan
    pub fn is_actionable(self) -> bool {
        matches!(self, Action::Bet | Action::Prepare)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every tunable the engine reads, grouped per component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tier: TierConfig,
    pub kelly: KellyConfig,
    pub odds: OddsConfig,
    pub settlement: SettlementConfig,
    pub late: LateModuleConfig,
    pub blend: BlendWeights,
    /// Calibration buckets need this many settled signals before use
    pub calibration_min_samples: u32,
    /// Fixtures unseen for this long are evicted from engine state
    pub stale_fixture_mins: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tier: TierConfig::default(),
            kelly: KellyConfig::default(),
            odds: OddsConfig::default(),
            settlement: SettlementConfig::default(),
            late: LateModuleConfig::default(),
            blend: BlendWeights::default(),
            calibration_min_samples: 30,
            stale_fixture_mins: 30,
        }
    }
}
