//! Shared test snapshots.

use chrono::{DateTime, TimeZone, Utc};

use crate::db::models::{MarketStateInput, MatchStateInput, MatchStatus, RollingDeltas, SideStats};

/// A lively match: plenty of shots, 2.7 combined xG, pressure in the last 15'.
pub fn busy_match(minute: i32, home: i32, away: i32) -> MatchStateInput {
    MatchStateInput {
        fixture_id: 1,
        home_team: "Home".into(),
        away_team: "Away".into(),
        minute,
        status: MatchStatus::InProgress,
        home_score: home,
        away_score: away,
        home: SideStats {
            shots: 14,
            shots_on_target: 6,
            xg: 1.5,
            corners: 7,
            possession: 55.0,
            dangerous_attacks: 70,
        },
        away: SideStats {
            shots: 11,
            shots_on_target: 4,
            xg: 1.2,
            corners: 5,
            possession: 45.0,
            dangerous_attacks: 55,
        },
        deltas_15: RollingDeltas {
            shots: 6,
            shots_on_target: 3,
            xg: 0.6,
            corners: 3,
            dangerous_attacks: 18,
        },
        home_red_cards: 0,
        away_red_cards: 0,
        recent_goals: 0,
        recent_attacking_subs: 2,
        stats_available: true,
        events_available: true,
    }
}

/// A sterile match with almost nothing happening.
pub fn quiet_match(minute: i32, home: i32, away: i32) -> MatchStateInput {
    MatchStateInput {
        home: SideStats {
            shots: 3,
            shots_on_target: 1,
            xg: 0.2,
            corners: 1,
            possession: 50.0,
            dangerous_attacks: 15,
        },
        away: SideStats {
            shots: 2,
            shots_on_target: 0,
            xg: 0.1,
            corners: 1,
            possession: 50.0,
            dangerous_attacks: 12,
        },
        deltas_15: RollingDeltas::default(),
        recent_attacking_subs: 0,
        ..busy_match(minute, home, away)
    }
}

pub fn kickoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap()
}

/// Over/under market with the over price shortening against a dropping line.
pub fn shortening_over_market(fixture_id: i64) -> MarketStateInput {
    MarketStateInput {
        fixture_id,
        ou_line: Some(0.5),
        prev_ou_line: Some(0.75),
        over_odds: Some(2.10),
        under_odds: Some(1.75),
        prev_over_odds: Some(2.30),
        prev_under_odds: Some(1.62),
        ah_line: Some(0.0),
        prev_ah_line: Some(0.0),
        ah_home_odds: Some(1.90),
        ah_away_odds: Some(1.95),
        prev_ah_home_odds: Some(1.92),
        prev_ah_away_odds: Some(1.93),
        home_win_odds: None,
        draw_odds: Some(1.55),
        away_win_odds: None,
        bookmaker: Some("book".into()),
        is_live: true,
        captured_at: kickoff(),
    }
}
