//! JSON-lines replay source.
//!
//! Each non-empty line holds one tick: a JSON array of [`TickInput`]. Lines
//! starting with `#` are comments. Useful for backtests and for driving the
//! engine without a live data provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::info;

use super::provider::SnapshotProvider;
use crate::db::models::TickInput;

pub struct ReplayProvider {
    name: String,
    ticks: Mutex<VecDeque<Vec<TickInput>>>,
}

impl ReplayProvider {
    /// Load every tick from `path` up front.
    pub async fn open(path: &str) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading replay file {}", path))?;
        let ticks = parse_ticks(&raw)?;
        info!("Replay '{}' loaded with {} tick(s)", path, ticks.len());
        Ok(Self {
            name: format!("replay:{}", path),
            ticks: Mutex::new(ticks),
        })
    }

    pub fn from_ticks(name: &str, ticks: Vec<Vec<TickInput>>) -> Self {
        Self {
            name: name.to_string(),
            ticks: Mutex::new(ticks.into()),
        }
    }
}

fn parse_ticks(raw: &str) -> Result<VecDeque<Vec<TickInput>>> {
    raw.lines()
        .enumerate()
        .map(|(i, line)| (i, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(i, line)| {
            serde_json::from_str::<Vec<TickInput>>(line)
                .with_context(|| format!("replay line {} is not a tick batch", i + 1))
        })
        .collect()
}

#[async_trait]
impl SnapshotProvider for ReplayProvider {
    async fn fetch_tick(&self) -> Result<Option<Vec<TickInput>>> {
        Ok(self.ticks.lock().await.pop_front())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# two fixtures, then one
[{"match":{"fixture_id":1,"minute":70,"home_score":0,"away_score":0,"stats_available":true}},{"match":{"fixture_id":2,"minute":12,"home_score":1,"away_score":0}}]

[{"match":{"fixture_id":1,"minute":71,"home_score":1,"away_score":0,"stats_available":true},"market":{"fixture_id":1,"over_odds":1.9,"captured_at":"2026-05-01T18:00:00Z"}}]
"#;

    #[test]
    fn parses_ticks_and_skips_comments() {
        let ticks = parse_ticks(SAMPLE).unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].len(), 2);
        assert_eq!(ticks[0][1].match_state.fixture_id, 2);
        assert!(!ticks[0][1].match_state.stats_available);
        assert_eq!(ticks[1][0].market.as_ref().unwrap().over_odds, Some(1.9));
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_ticks("[]\n{not json}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn drains_in_order_then_exhausts() {
        let provider = ReplayProvider::from_ticks("test", parse_ticks(SAMPLE).unwrap().into());
        assert_eq!(provider.fetch_tick().await.unwrap().unwrap().len(), 2);
        assert_eq!(provider.fetch_tick().await.unwrap().unwrap().len(), 1);
        assert!(provider.fetch_tick().await.unwrap().is_none());
    }
}
