use anyhow::Result;
use async_trait::async_trait;

use crate::db::models::TickInput;

/// Trait that every match-snapshot source must implement.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Return the current snapshot batch, one entry per tracked fixture.
    /// `Ok(None)` means the source is exhausted (replays only).
    async fn fetch_tick(&self) -> Result<Option<Vec<TickInput>>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
