use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

mod config;
mod db;
mod engine;
mod feed;

use config::Config;
use db::Database;
use engine::calibration::CalibrationMap;
use engine::{EngineState, SignalEngine, TickOutput};
use feed::{start_snapshot_monitor, ReplayProvider, SnapshotProvider};

/// Settled signals read back to warm the calibration map
const CALIBRATION_HISTORY_LIMIT: i64 = 5_000;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    let engine_config = config.engine_config();
    let engine_min_samples = engine_config.calibration_min_samples;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    // Calibration from everything already settled
    let settled = db.list_settled_signals(CALIBRATION_HISTORY_LIMIT)?;
    let calibration = CalibrationMap::from_records(&settled, engine_config.calibration_min_samples);
    match calibration.report(&settled) {
        Some(r) => info!(
            "Calibration warmed from {} settled signal(s): brier raw={:.4} cal={:.4}, logloss raw={:.4} cal={:.4}",
            r.samples, r.brier_raw, r.brier_calibrated, r.logloss_raw, r.logloss_calibrated
        ),
        None => info!("Calibration skipped: no settled signals yet"),
    }

    let pending = db.list_pending_signals()?;
    info!("Resuming with {} pending signal(s)", pending.len());
    let mut state = EngineState::with_pending(pending);

    let mut providers: Vec<Arc<dyn SnapshotProvider>> = Vec::new();
    for path in &config.replay_path {
        providers.push(Arc::new(ReplayProvider::open(path).await?));
    }
    info!("Configured {} snapshot provider(s)", providers.len());

    let mut engine = SignalEngine::new(engine_config, calibration);
    let mut rx = start_snapshot_monitor(providers, Duration::from_secs(config.poll_interval_secs));

    loop {
        tokio::select! {
            batch = rx.recv() => {
                let Some(batch) = batch else {
                    info!("Snapshot sources exhausted");
                    break;
                };
                let (out, next) = engine.evaluate(&batch, state, Utc::now());
                state = next;
                persist(&db, &mut engine, &out);
                report(&out);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    log_daily_hit_rate(&db);
    match db.list_recent_signals(10) {
        Ok(recent) => {
            for rec in recent {
                info!(
                    "Recent {} fixture={} {}' strength={} {} {}",
                    rec.signal_type,
                    rec.fixture_id,
                    rec.trigger_minute,
                    rec.score,
                    rec.status.as_str(),
                    rec.settlement_note.as_deref().unwrap_or("")
                );
            }
        }
        Err(e) => warn!("Could not list recent signals: {}", e),
    }
    let calibrated_buckets = engine
        .calibration()
        .buckets()
        .iter()
        .filter(|b| b.samples >= engine_min_samples)
        .count();
    info!("{} calibration bucket(s) populated", calibrated_buckets);
    Ok(())
}

/// Store new and settled signals. A failed write is logged and the tick goes on.
fn persist(db: &Database, engine: &mut SignalEngine, out: &TickOutput) {
    for rec in &out.new_signals {
        if let Err(e) = db.insert_signal(rec) {
            error!("Failed to store signal {}: {}", rec.key, e);
        }
    }
    for rec in &out.settled {
        match db.update_signal(rec) {
            Ok(true) => engine.observe_settled(rec),
            Ok(false) => debug!("Signal {} already settled in store", rec.key),
            Err(e) => {
                error!("Failed to update signal {}: {}", rec.key, e);
                engine.observe_settled(rec);
            }
        }
    }
    if !out.settled.is_empty() {
        log_daily_hit_rate(db);
    }
}

fn report(out: &TickOutput) {
    for ev in &out.evaluations {
        let Some(late) = &ev.late else {
            continue;
        };
        if late.action.is_actionable() {
            let plan = late
                .bet_plan
                .as_ref()
                .map(|p| {
                    format!(
                        "{} {} {} min_odds={:.2} stake={}",
                        p.market,
                        p.selection,
                        p.line,
                        p.min_odds,
                        p.stake_pct
                            .map(|s| format!("{:.2}%", s))
                            .unwrap_or_else(|| "-".to_string())
                    )
                })
                .unwrap_or_default();
            info!(
                "{} fixture={} {}' score={} confidence={} scenario={} {}",
                late.action, ev.fixture_id, ev.minute, late.score, late.confidence, late.scenario, plan
            );
        }
        match serde_json::to_string(late) {
            Ok(json) => debug!("Late signal: {}", json),
            Err(e) => warn!("Could not serialise late signal for {}: {}", ev.fixture_id, e),
        }
    }
}

fn log_daily_hit_rate(db: &Database) {
    match db.hit_rate_for_day(Utc::now().date_naive()) {
        Ok(stats) => info!(
            "Today: {} signal(s), {} hit / {} miss / {} pending / {} expired, hit rate {}",
            stats.total,
            stats.hits,
            stats.misses,
            stats.pending,
            stats.expired,
            stats
                .hit_rate
                .map(|r| format!("{:.1}%", r * 100.0))
                .unwrap_or_else(|| "n/a".to_string())
        ),
        Err(e) => warn!("Hit-rate aggregation failed: {}", e),
    }
}
