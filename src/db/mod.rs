use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Signals ───────────────────────────────────────────────────────────────

    /// Insert a newly emitted signal. Re-inserting the same key is a no-op.
    pub fn insert_signal(&self, rec: &SignalRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO signals (
                key, fixture_id, signal_type, trigger_minute,
                trigger_home_score, trigger_away_score, score, confidence,
                scenario, status, goal_minute, settlement_note,
                created_at, settled_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            params![
                rec.key,
                rec.fixture_id,
                rec.signal_type.as_str(),
                rec.trigger_minute,
                rec.trigger_home_score,
                rec.trigger_away_score,
                rec.score,
                rec.confidence,
                rec.scenario,
                rec.status.as_str(),
                rec.goal_minute,
                rec.settlement_note,
                rec.created_at,
                rec.settled_at,
            ],
        )?;
        Ok(())
    }

    /// Persist a settlement transition. Only pending rows are touched, so a
    /// replayed update never overwrites an earlier settlement.
    pub fn update_signal(&self, rec: &SignalRecord) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE signals SET status=?1, goal_minute=?2, settlement_note=?3, settled_at=?4
             WHERE key=?5 AND status='pending'",
            params![
                rec.status.as_str(),
                rec.goal_minute,
                rec.settlement_note,
                rec.settled_at,
                rec.key,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn list_pending_signals(&self) -> Result<Vec<SignalRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals WHERE status='pending' ORDER BY created_at ASC"
        ))?;
        let rows = stmt
            .query_map([], map_signal_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(SignalRow::into_record).collect()
    }

    /// Most recent signals first
    pub fn list_recent_signals(&self, limit: i64) -> Result<Vec<SignalRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals ORDER BY created_at DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit], map_signal_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(SignalRow::into_record).collect()
    }

    /// Hit/miss history used to build the calibration map
    pub fn list_settled_signals(&self, limit: i64) -> Result<Vec<SignalRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals WHERE status IN ('hit','miss')
             ORDER BY created_at DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit], map_signal_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(SignalRow::into_record).collect()
    }

    // ── Stats ─────────────────────────────────────────────────────────────────

    /// Aggregate signal outcomes for signals created on the given UTC day
    pub fn hit_rate_for_day(&self, day: NaiveDate) -> Result<HitRateStats> {
        let start = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid day {}", day))?
            .and_utc();
        let end = start + chrono::Duration::days(1);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM signals
             WHERE created_at >= ?1 AND created_at < ?2 GROUP BY status",
        )?;
        let counts = stmt
            .query_map(params![start, end], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stats = HitRateStats::default();
        for (status, count) in counts {
            match status.parse::<SignalStatus>()? {
                SignalStatus::Pending => stats.pending = count,
                SignalStatus::Hit => stats.hits = count,
                SignalStatus::Miss => stats.misses = count,
                SignalStatus::Expired => stats.expired = count,
            }
        }
        stats.total = stats.pending + stats.hits + stats.misses + stats.expired;
        let decided = stats.hits + stats.misses;
        stats.hit_rate = (decided > 0).then(|| stats.hits as f64 / decided as f64);
        Ok(stats)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

const SIGNAL_COLUMNS: &str = "key, fixture_id, signal_type, trigger_minute, \
    trigger_home_score, trigger_away_score, score, confidence, scenario, status, \
    goal_minute, settlement_note, created_at, settled_at";

/// Raw row; enum columns are parsed outside the rusqlite closure
struct SignalRow {
    key: String,
    fixture_id: i64,
    signal_type: String,
    trigger_minute: i32,
    trigger_home_score: i32,
    trigger_away_score: i32,
    score: i32,
    confidence: i32,
    scenario: String,
    status: String,
    goal_minute: Option<i32>,
    settlement_note: Option<String>,
    created_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
}

impl SignalRow {
    fn into_record(self) -> Result<SignalRecord> {
        Ok(SignalRecord {
            key: self.key,
            fixture_id: self.fixture_id,
            signal_type: self.signal_type.parse()?,
            trigger_minute: self.trigger_minute,
            trigger_home_score: self.trigger_home_score,
            trigger_away_score: self.trigger_away_score,
            score: self.score,
            confidence: self.confidence,
            scenario: self.scenario,
            status: self.status.parse()?,
            goal_minute: self.goal_minute,
            settlement_note: self.settlement_note,
            created_at: self.created_at,
            settled_at: self.settled_at,
        })
    }
}

fn map_signal_row(row: &rusqlite::Row) -> rusqlite::Result<SignalRow> {
    Ok(SignalRow {
        key: row.get(0)?,
        fixture_id: row.get(1)?,
        signal_type: row.get(2)?,
        trigger_minute: row.get(3)?,
        trigger_home_score: row.get(4)?,
        trigger_away_score: row.get(5)?,
        score: row.get(6)?,
        confidence: row.get(7)?,
        scenario: row.get(8)?,
        status: row.get(9)?,
        goal_minute: row.get(10)?,
        settlement_note: row.get(11)?,
        created_at: row.get(12)?,
        settled_at: row.get(13)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS signals (
    key                 TEXT    PRIMARY KEY,
    fixture_id          INTEGER NOT NULL,
    signal_type         TEXT    NOT NULL,
    trigger_minute      INTEGER NOT NULL,
    trigger_home_score  INTEGER NOT NULL,
    trigger_away_score  INTEGER NOT NULL,
    score               INTEGER NOT NULL,
    confidence          INTEGER NOT NULL,
    scenario            TEXT    NOT NULL,
    status              TEXT    NOT NULL DEFAULT 'pending',
    goal_minute         INTEGER,
    settlement_note     TEXT,
    created_at          TEXT    NOT NULL,
    settled_at          TEXT
);

CREATE INDEX IF NOT EXISTS idx_signals_status ON signals(status);
CREATE INDEX IF NOT EXISTS idx_signals_fixture ON signals(fixture_id);
CREATE INDEX IF NOT EXISTS idx_signals_created ON signals(created_at);
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitRateStats {
    pub total: i64,
    pub hits: i64,
    pub misses: i64,
    pub pending: i64,
    pub expired: i64,
    /// hits / (hits + misses); `None` before anything has settled
    pub hit_rate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(fixture_id: i64, minute: i32, at: DateTime<Utc>) -> SignalRecord {
        SignalRecord {
            key: SignalRecord::make_key(fixture_id, SignalType::LateGoal, at),
            fixture_id,
            signal_type: SignalType::LateGoal,
            trigger_minute: minute,
            trigger_home_score: 0,
            trigger_away_score: 0,
            score: 78,
            confidence: 64,
            scenario: "DEADLOCK_BREAK".into(),
            status: SignalStatus::Pending,
            goal_minute: None,
            settlement_note: None,
            created_at: at,
            settled_at: None,
        }
    }

    #[test]
    fn insert_and_list_pending() {
        let db = Database::open(":memory:").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap();
        let rec = record(7, 81, at);
        db.insert_signal(&rec).unwrap();
        // duplicate insert is ignored
        db.insert_signal(&rec).unwrap();

        let pending = db.list_pending_signals().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0], rec);
    }

    #[test]
    fn update_only_touches_pending_rows() {
        let db = Database::open(":memory:").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap();
        let mut rec = record(7, 81, at);
        db.insert_signal(&rec).unwrap();

        rec.status = SignalStatus::Hit;
        rec.goal_minute = Some(84);
        rec.settlement_note = Some("goal at 84'".into());
        rec.settled_at = Some(at + chrono::Duration::minutes(3));
        assert!(db.update_signal(&rec).unwrap());

        let mut again = rec.clone();
        again.status = SignalStatus::Miss;
        assert!(!db.update_signal(&again).unwrap());

        let recent = db.list_recent_signals(10).unwrap();
        assert_eq!(recent[0].status, SignalStatus::Hit);
        assert_eq!(recent[0].goal_minute, Some(84));
        assert!(db.list_pending_signals().unwrap().is_empty());
    }

    #[test]
    fn hit_rate_aggregates_by_day() {
        let db = Database::open(":memory:").unwrap();
        let day = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let statuses = [
            SignalStatus::Hit,
            SignalStatus::Hit,
            SignalStatus::Miss,
            SignalStatus::Pending,
        ];
        for (i, status) in statuses.iter().enumerate() {
            let mut rec = record(i as i64, 80, day + chrono::Duration::minutes(i as i64));
            rec.status = *status;
            db.insert_signal(&rec).unwrap();
        }
        // different day, must not be counted
        let mut other = record(99, 80, day - chrono::Duration::days(1));
        other.status = SignalStatus::Miss;
        db.insert_signal(&other).unwrap();

        let stats = db.hit_rate_for_day(day.date_naive()).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.pending, 1);
        approx::assert_relative_eq!(stats.hit_rate.unwrap(), 2.0 / 3.0, epsilon = 1e-9);

        let settled = db.list_settled_signals(100).unwrap();
        assert_eq!(settled.len(), 4);
    }
}
