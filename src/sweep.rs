use crate::error::Result;
use crate::storage::Storage;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument};

/// Batch-expires records no longer observed at their source.
///
/// Absence from future scrapes is expressed as `inactive`, never as
/// deletion; history stays queryable.
pub struct Sweeper {
    storage: Arc<dyn Storage>,
}

impl Sweeper {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Transition every record whose `last_scraped` is older than
    /// `now - window` to inactive. Runs once per cycle, after all sources,
    /// so slow-but-present sources are not penalized mid-cycle.
    #[instrument(skip(self))]
    pub async fn run(&self, window: Duration, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - window;
        let expired = self.storage.mark_stale_inactive(cutoff).await?;
        info!("Staleness sweep expired {} records", expired);
        Ok(expired)
    }
}
