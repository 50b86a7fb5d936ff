pub mod normalize;
pub mod provider;
pub mod replay;

pub use provider::SnapshotProvider;
pub use replay::ReplayProvider;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::db::models::TickInput;

/// Merge batches from several providers into one entry per fixture.
///
/// When providers disagree the snapshot with the most advanced minute wins;
/// on a tie the earlier provider in the list is kept. A market or strength
/// block missing from the winner is borrowed from another provider.
pub fn merge_batches(batches: Vec<(String, Vec<TickInput>)>) -> Vec<TickInput> {
    let mut merged: HashMap<i64, TickInput> = HashMap::new();
    let mut order: Vec<i64> = Vec::new();

    for (_, batch) in batches {
        for tick in batch {
            let id = tick.match_state.fixture_id;
            match merged.get_mut(&id) {
                None => {
                    order.push(id);
                    merged.insert(id, tick);
                }
                Some(existing) => {
                    if tick.match_state.minute > existing.match_state.minute {
                        let market = existing.market.take();
                        let strength = existing.strength.take();
                        *existing = tick;
                        existing.market = existing.market.take().or(market);
                        existing.strength = existing.strength.take().or(strength);
                    } else {
                        if existing.market.is_none() {
                            existing.market = tick.market;
                        }
                        if existing.strength.is_none() {
                            existing.strength = tick.strength;
                        }
                    }
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| merged.remove(&id))
        .collect()
}

/// Spawns a background task that polls **all providers concurrently** at the
/// configured interval and sends one merged batch per tick through the
/// returned channel.
///
/// A provider that errors or times out is skipped for that tick; the channel
/// closes once every provider reports exhaustion.
pub fn start_snapshot_monitor(
    providers: Vec<Arc<dyn SnapshotProvider>>,
    poll_interval: Duration,
) -> mpsc::Receiver<Vec<TickInput>> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let provider_names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        info!(
            "Snapshot monitor started ({} providers: {:?}, interval={:?})",
            providers.len(),
            provider_names,
            poll_interval
        );

        let provider_timeout = poll_interval.max(Duration::from_secs(2));
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let fetch_futures: Vec<_> = providers
                .iter()
                .map(|p| {
                    let p = Arc::clone(p);
                    async move {
                        let res = tokio::time::timeout(provider_timeout, p.fetch_tick()).await;
                        let out = match res {
                            Ok(result) => result,
                            Err(_) => {
                                Err(anyhow::anyhow!("timed out after {:?}", provider_timeout))
                            }
                        };
                        (p.name().to_string(), out)
                    }
                })
                .collect();

            let results = futures_util::future::join_all(fetch_futures).await;

            let mut batches = Vec::new();
            let mut exhausted = 0usize;
            for (provider_name, result) in results {
                match result {
                    Ok(Some(batch)) => batches.push((provider_name, batch)),
                    Ok(None) => exhausted += 1,
                    Err(e) => warn!("Provider '{}' failed: {}", provider_name, e),
                }
            }

            if exhausted == providers.len() {
                info!("All snapshot providers exhausted, stopping monitor");
                break;
            }
            if batches.is_empty() {
                continue;
            }

            if let Err(e) = tx.send(merge_batches(batches)).await {
                error!("Tick channel closed, monitor stopping: {}", e);
                break;
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{MatchStateInput, TeamStrengthInput};

    fn tick(fixture_id: i64, minute: i32, with_strength: bool) -> TickInput {
        let match_state: MatchStateInput = serde_json::from_value(serde_json::json!({
            "fixture_id": fixture_id,
            "minute": minute,
            "home_score": 0,
            "away_score": 0,
        }))
        .unwrap();
        TickInput {
            match_state,
            market: None,
            strength: with_strength.then(|| TeamStrengthInput {
                home_rank: Some(1),
                away_rank: Some(18),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn merge_prefers_latest_minute_and_keeps_extras() {
        let merged = merge_batches(vec![
            ("a".into(), vec![tick(1, 70, true), tick(2, 10, false)]),
            ("b".into(), vec![tick(1, 72, false), tick(3, 5, false)]),
        ]);
        assert_eq!(merged.len(), 3);
        let first = &merged[0];
        assert_eq!(first.match_state.fixture_id, 1);
        assert_eq!(first.match_state.minute, 72);
        assert!(first.strength.is_some());
    }

    #[tokio::test]
    async fn monitor_forwards_batches_then_closes() {
        let provider: Arc<dyn SnapshotProvider> = Arc::new(ReplayProvider::from_ticks(
            "replay",
            vec![vec![tick(1, 70, false)], vec![tick(1, 71, false)]],
        ));
        let mut rx = start_snapshot_monitor(vec![provider], Duration::from_millis(5));
        assert_eq!(rx.recv().await.unwrap()[0].match_state.minute, 70);
        assert_eq!(rx.recv().await.unwrap()[0].match_state.minute, 71);
        assert!(rx.recv().await.is_none());
    }
}
