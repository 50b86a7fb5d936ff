//! Match/market state normalizer.
//!
//! Everything the engine consumes passes through here first. Recoverable
//! noise (possession slightly over 100, a negative corner count from a
//! provider correction) is clamped; snapshots that cannot describe a real
//! match are rejected with an [`InputError`] so the fixture is skipped for
//! the tick.

use thiserror::Error;
use tracing::warn;

use crate::db::models::{MarketStateInput, MatchStateInput, RollingDeltas, SideStats, TickInput};

/// Latest minute we accept (extra time plus a generous stoppage allowance)
const MAX_MINUTE: i32 = 130;

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("fixture {fixture_id}: minute {minute} outside 0..={max}", max = MAX_MINUTE)]
    MinuteOutOfRange { fixture_id: i64, minute: i32 },

    #[error("fixture {fixture_id}: negative score {home}-{away}")]
    NegativeScore { fixture_id: i64, home: i32, away: i32 },

    #[error("fixture {fixture_id}: non-finite {field}")]
    NonFinite { fixture_id: i64, field: &'static str },
}

/// Validate and clamp a match snapshot.
pub fn normalize_match(mut input: MatchStateInput) -> Result<MatchStateInput, InputError> {
    let fixture_id = input.fixture_id;
    if !(0..=MAX_MINUTE).contains(&input.minute) {
        return Err(InputError::MinuteOutOfRange {
            fixture_id,
            minute: input.minute,
        });
    }
    if input.home_score < 0 || input.away_score < 0 {
        return Err(InputError::NegativeScore {
            fixture_id,
            home: input.home_score,
            away: input.away_score,
        });
    }
    for (field, value) in [
        ("home.xg", input.home.xg),
        ("away.xg", input.away.xg),
        ("home.possession", input.home.possession),
        ("away.possession", input.away.possession),
        ("deltas_15.xg", input.deltas_15.xg),
    ] {
        if !value.is_finite() {
            return Err(InputError::NonFinite { fixture_id, field });
        }
    }

    clamp_side(&mut input.home);
    clamp_side(&mut input.away);
    clamp_deltas(&mut input.deltas_15);
    input.home_red_cards = input.home_red_cards.clamp(0, 5);
    input.away_red_cards = input.away_red_cards.clamp(0, 5);
    input.recent_goals = input.recent_goals.max(0);
    input.recent_attacking_subs = input.recent_attacking_subs.max(0);
    Ok(input)
}

fn clamp_side(side: &mut SideStats) {
    side.shots = side.shots.max(0);
    side.shots_on_target = side.shots_on_target.max(0);
    side.xg = side.xg.max(0.0);
    side.corners = side.corners.max(0);
    side.possession = side.possession.clamp(0.0, 100.0);
    side.dangerous_attacks = side.dangerous_attacks.max(0);
}

fn clamp_deltas(d: &mut RollingDeltas) {
    d.shots = d.shots.max(0);
    d.shots_on_target = d.shots_on_target.max(0);
    d.xg = d.xg.max(0.0);
    d.corners = d.corners.max(0);
    d.dangerous_attacks = d.dangerous_attacks.max(0);
}

/// Keep only usable prices. Returns `None` when the market belongs to a
/// different fixture; odds at or below 1.0 (or non-finite) are dropped.
pub fn normalize_market(fixture_id: i64, market: MarketStateInput) -> Option<MarketStateInput> {
    if market.fixture_id != fixture_id {
        warn!(
            "Market for fixture {} attached to fixture {}, ignoring odds",
            market.fixture_id, fixture_id
        );
        return None;
    }
    let price = |p: Option<f64>| p.filter(|v| v.is_finite() && *v > 1.0);
    let line = |l: Option<f64>| l.filter(|v| v.is_finite());
    Some(MarketStateInput {
        ou_line: line(market.ou_line),
        prev_ou_line: line(market.prev_ou_line),
        over_odds: price(market.over_odds),
        under_odds: price(market.under_odds),
        prev_over_odds: price(market.prev_over_odds),
        prev_under_odds: price(market.prev_under_odds),
        ah_line: line(market.ah_line),
        prev_ah_line: line(market.prev_ah_line),
        ah_home_odds: price(market.ah_home_odds),
        ah_away_odds: price(market.ah_away_odds),
        prev_ah_home_odds: price(market.prev_ah_home_odds),
        prev_ah_away_odds: price(market.prev_ah_away_odds),
        home_win_odds: price(market.home_win_odds),
        draw_odds: price(market.draw_odds),
        away_win_odds: price(market.away_win_odds),
        ..market
    })
}

/// Normalize one fixture's tick inputs.
pub fn normalize_tick(tick: TickInput) -> Result<TickInput, InputError> {
    let match_state = normalize_match(tick.match_state)?;
    let market = tick
        .market
        .and_then(|m| normalize_market(match_state.fixture_id, m));
    Ok(TickInput {
        match_state,
        market,
        strength: tick.strength,
    })
}
