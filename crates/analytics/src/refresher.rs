//! Background index refresher.
//!
//! A ticking loop that keeps the aggregation index bounded and warm:
//! every tick evicts readings past the retention horizon, sweeps expired
//! cache entries, and bulk-loads the recent window from storage so hot
//! queries never re-read full history. The loop is stopped through a
//! watch channel; [`Refresher::tick`] is public so tests drive it
//! directly instead of waiting on wall-clock time.

use std::sync::Arc;
use std::time::Duration;

use aggregator::AqiIndex;
use chrono::Utc;
use common::config::RefreshConfig;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::orchestrator::ResultCache;
use crate::store::ReadingStore;

pub struct Refresher {
    index: Arc<AqiIndex>,
    cache: Arc<ResultCache>,
    store: Arc<dyn ReadingStore>,
    interval: Duration,
    retention: chrono::Duration,
    lookback: chrono::Duration,
}

impl Refresher {
    pub fn new(
        index: Arc<AqiIndex>,
        cache: Arc<ResultCache>,
        store: Arc<dyn ReadingStore>,
        config: &RefreshConfig,
    ) -> Self {
        Self {
            index,
            cache,
            store,
            interval: Duration::from_secs(config.interval_secs),
            retention: chrono::Duration::days(config.retention_days as i64),
            lookback: chrono::Duration::days(config.lookback_days as i64),
        }
    }

    /// One refresh cycle: retention cleanup, cache sweep, bulk load.
    /// Storage failures are logged and skipped — the next tick retries.
    pub async fn tick(&self) {
        let now = Utc::now();

        let removed = self.index.cleanup_old_data(now - self.retention);
        if removed > 0 {
            info!("evicted {} readings past the retention horizon", removed);
        }

        self.cache.sweep();

        match self.store.readings_since(now - self.lookback, None).await {
            Ok(points) if !points.is_empty() => {
                let count = points.len();
                self.index.add_data_points(points);
                info!(
                    "loaded {} recent readings into index ({} total)",
                    count,
                    self.index.len()
                );
            }
            Ok(_) => debug!("no recent readings to load"),
            Err(e) => warn!("refresh load failed: {}", e),
        }
    }

    /// Ticking loop. The first tick fires immediately; the loop exits
    /// when the shutdown channel flips to `true` or its sender drops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("refresher stopping");
                        break;
                    }
                }
            }
        }
    }
}
