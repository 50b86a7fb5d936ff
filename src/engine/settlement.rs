//! Signal settlement tracker.
//!
//! Goals are inferred by diffing each fixture's score against its previous
//! snapshot. A pending signal is a hit when a goal lands inside
//! `(trigger_minute, trigger_minute + window]`, a miss once that window has
//! passed (or the match finished) without one, and stays pending otherwise.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::db::models::{GoalEvent, MatchStateInput, MatchStatus, Side, SignalRecord, SignalStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Minutes after the trigger in which a goal validates the signal
    pub window_mins: i32,
    /// Pending signals whose fixture has not been seen for this long expire
    pub pending_expiry_mins: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            window_mins: 15,
            pending_expiry_mins: 180,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScoreSnapshot {
    minute: i32,
    home: i32,
    away: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SettlementState {
    snapshots: HashMap<i64, ScoreSnapshot>,
    goals: HashMap<i64, Vec<GoalEvent>>,
}

impl SettlementState {
    /// Diff the snapshot against the previous one and record one goal event
    /// per score increment. Returns only the newly recorded goals; replaying
    /// a snapshot already seen records nothing.
    pub fn observe(&mut self, input: &MatchStateInput) -> Vec<GoalEvent> {
        let current = ScoreSnapshot {
            minute: input.minute,
            home: input.home_score,
            away: input.away_score,
        };
        let Some(prev) = self.snapshots.get(&input.fixture_id).copied() else {
            self.snapshots.insert(input.fixture_id, current);
            return Vec::new();
        };
        if current.minute < prev.minute {
            debug!(
                "Fixture {} snapshot at {}' older than {}', ignored",
                input.fixture_id, current.minute, prev.minute
            );
            return Vec::new();
        }
        self.snapshots.insert(input.fixture_id, current);

        let goals = self.goals.entry(input.fixture_id).or_default();
        // a score going down means a goal was chalked off
        if current.home < prev.home || current.away < prev.away {
            goals.retain(|g| match g.side {
                Side::Home => g.home_score <= current.home,
                Side::Away => g.away_score <= current.away,
            });
        }

        let mut new_goals = Vec::new();
        for n in (prev.home + 1)..=current.home {
            new_goals.push(GoalEvent {
                fixture_id: input.fixture_id,
                side: Side::Home,
                minute: current.minute,
                home_score: n,
                away_score: prev.away.min(current.away),
            });
        }
        for n in (prev.away + 1)..=current.away {
            new_goals.push(GoalEvent {
                fixture_id: input.fixture_id,
                side: Side::Away,
                minute: current.minute,
                home_score: current.home,
                away_score: n,
            });
        }
        new_goals.retain(|g| !goals.iter().any(|seen| same_goal(seen, g)));
        goals.extend(new_goals.iter().cloned());
        new_goals
    }

    pub fn goals(&self, fixture_id: i64) -> &[GoalEvent] {
        self.goals.get(&fixture_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn evict(&mut self, fixture_id: i64) {
        self.snapshots.remove(&fixture_id);
        self.goals.remove(&fixture_id);
    }

    pub fn fixture_count(&self) -> usize {
        self.snapshots.len()
    }
}

/// The n-th goal of a side is the same goal however often it is observed.
fn same_goal(a: &GoalEvent, b: &GoalEvent) -> bool {
    a.side == b.side
        && match a.side {
            Side::Home => a.home_score == b.home_score,
            Side::Away => a.away_score == b.away_score,
        }
}

/// Resolve one signal against the fixture's goals and latest snapshot.
/// Returns the updated record, or `None` when nothing changes.
pub fn settle_signal(
    record: &SignalRecord,
    goals: &[GoalEvent],
    input: &MatchStateInput,
    now: DateTime<Utc>,
    cfg: &SettlementConfig,
) -> Option<SignalRecord> {
    if record.status.is_settled() || record.fixture_id != input.fixture_id {
        return None;
    }
    let window_end = record.trigger_minute + cfg.window_mins;
    let in_window = |minute: i32| minute > record.trigger_minute && minute <= window_end;

    let recorded = goals
        .iter()
        .filter(|g| in_window(g.minute))
        .map(|g| g.minute)
        .min();
    // Goals scored while the engine was not watching (e.g. after a restart)
    // still show up as a score above the trigger score. Goals that were
    // recorded, in the window or not, are already accounted for.
    let goal_minute = recorded.or_else(|| {
        let unseen = input.total_goals()
            - record.trigger_home_score
            - record.trigger_away_score
            - goals_since_trigger(record, goals);
        (unseen > 0 && in_window(input.minute)).then_some(input.minute)
    });

    let mut settled = record.clone();
    if let Some(minute) = goal_minute {
        settled.status = SignalStatus::Hit;
        settled.goal_minute = Some(minute);
        settled.settlement_note = Some(format!(
            "Goal at {}' ({} min after trigger)",
            minute,
            minute - record.trigger_minute
        ));
    } else if input.minute > window_end {
        settled.status = SignalStatus::Miss;
        settled.settlement_note = Some(format!("No goal by {}'", window_end));
    } else if input.status == MatchStatus::Finished {
        settled.status = SignalStatus::Miss;
        settled.settlement_note = Some(format!("Finished at {}' without a goal", input.minute));
    } else {
        return None;
    }
    settled.settled_at = Some(now);
    Some(settled)
}

/// Recorded goals that took a side past its score at trigger time.
fn goals_since_trigger(record: &SignalRecord, goals: &[GoalEvent]) -> i32 {
    goals
        .iter()
        .filter(|g| match g.side {
            Side::Home => g.home_score > record.trigger_home_score,
            Side::Away => g.away_score > record.trigger_away_score,
        })
        .count() as i32
}

/// Expire a pending signal whose fixture stopped updating.
pub fn expire_signal(
    record: &SignalRecord,
    last_seen: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cfg: &SettlementConfig,
) -> Option<SignalRecord> {
    if record.status.is_settled() {
        return None;
    }
    let reference = last_seen.unwrap_or(record.created_at);
    if now - reference < Duration::minutes(cfg.pending_expiry_mins) {
        return None;
    }
    let mut expired = record.clone();
    expired.status = SignalStatus::Expired;
    expired.settlement_note = Some(format!(
        "No update for {} min",
        (now - reference).num_minutes()
    ));
    expired.settled_at = Some(now);
    Some(expired)
}
