/// Kelly Criterion stake-size calculator.
///
/// The Kelly formula sizes a bet to maximise the expected logarithm of wealth,
/// which balances risk and reward optimally over the long run.
///
/// Standard formula:
///   f* = (b·p − q) / b
/// where
///   b  = net decimal odds (profit per unit staked, i.e. odds − 1)
///   p  = estimated probability of winning
///   q  = 1 − p  (probability of losing)
///
/// The suggestion applies a *fractional* Kelly multiplier to reduce variance
/// at the cost of slightly lower expected growth, then bounds the result to
/// the configured stake range. Without a real market price there is no
/// suggestion at all; a price is never invented.
use serde::{Deserialize, Serialize};

use crate::db::models::MarketStateInput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (e.g. 0.25 = quarter Kelly)
    pub kelly_fraction: f64,
    /// Share of the bankroll allocated to this strategy
    pub position_fraction: f64,
    /// Stake percentage floor for a positive suggestion
    pub min_stake_pct: f64,
    /// Stake percentage cap
    pub max_stake_pct: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            kelly_fraction: 0.25,
            position_fraction: 1.0,
            min_stake_pct: 0.5,
            max_stake_pct: 5.0,
        }
    }
}

impl KellyConfig {
    /// Combined multiplier applied to the full-Kelly fraction
    pub fn conservative_fraction(&self) -> f64 {
        self.kelly_fraction * self.position_fraction
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellyResult {
    pub has_real_odds: bool,
    /// Decimal price the stake was sized against
    pub odds: Option<f64>,
    pub probability: f64,
    /// Full-Kelly fraction, never negative
    pub kelly_fraction: f64,
    /// Expected return per unit staked, `p·odds − 1`
    pub edge: f64,
    /// Suggested stake in percent of bankroll
    pub bet_suggestion: Option<f64>,
}

impl KellyResult {
    fn no_real_odds(probability: f64) -> Self {
        Self {
            has_real_odds: false,
            odds: None,
            probability,
            kelly_fraction: 0.0,
            edge: 0.0,
            bet_suggestion: None,
        }
    }
}

/// The primary over/under "over" price, if the market has a usable one.
pub fn primary_price(market: Option<&MarketStateInput>) -> Option<f64> {
    market?.over_odds.filter(|o| o.is_finite() && *o > 1.0)
}

/// Full-Kelly fraction for decimal `odds`. Returns `0.0` when expected value
/// is non-positive (i.e. no edge).
pub fn kelly_fraction(win_prob: f64, odds: f64) -> f64 {
    if !(odds > 1.0) {
        return 0.0;
    }
    let p = win_prob.clamp(0.0, 1.0);
    let q = 1.0 - p;
    let b = odds - 1.0;
    let f = (b * p - q) / b;
    if f <= 0.0 {
        return 0.0; // no edge
    }
    f.min(1.0)
}

/// Calculate the edge (expected value) of a bet at decimal `odds`.
///
/// Edge = win_prob × odds − 1
///
/// Positive edge means the market is underpricing the true probability.
pub fn edge(win_prob: f64, odds: f64) -> f64 {
    if odds <= 1.0 {
        return 0.0;
    }
    win_prob * odds - 1.0
}

/// Size a stake from a (preferably calibrated) win probability and the
/// market's primary price.
pub fn calculate_stake(
    win_prob: f64,
    market: Option<&MarketStateInput>,
    cfg: &KellyConfig,
) -> KellyResult {
    let Some(odds) = primary_price(market) else {
        return KellyResult::no_real_odds(win_prob);
    };

    let kelly = kelly_fraction(win_prob, odds);
    let raw_pct = kelly * cfg.conservative_fraction() * 100.0;
    let bet_suggestion = if raw_pct > 0.0 {
        Some(raw_pct.max(cfg.min_stake_pct).min(cfg.max_stake_pct))
    } else {
        None
    };

    KellyResult {
        has_real_odds: true,
        odds: Some(odds),
        probability: win_prob,
        kelly_fraction: kelly,
        edge: edge(win_prob, odds),
        bet_suggestion,
    }
}
