//! Analytics orchestrator.
//!
//! Public query surface of the engine: cache-then-compute analytics over
//! the aggregation index, and a deadline-bounded real-time dashboard.
//! Queries never surface internal faults — a failed computation degrades
//! to an empty-but-valid result (which is not cached), and a dashboard
//! that misses its deadline simply omits the unfinished cities. The
//! analytics path deliberately carries no per-call deadline of its own;
//! only the dashboard does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aggregator::AqiIndex;
use chrono::{DateTime, SecondsFormat, Utc};
use common::{AnalyticsResult, CitySnapshot, DataPoint, EngineConfig};
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::store::ReadingStore;

/// Hard cap on the time-series points returned with one result.
const MAX_SERIES_POINTS: usize = 1000;

/// Cache type used for analytics results.
pub type ResultCache = ttl_cache::TtlLruCache<String, AnalyticsResult>;

/// Query orchestrator over the index, result cache, and storage seam.
///
/// Holds no per-query state: every call is resolved against the current
/// cache and index contents.
pub struct AnalyticsEngine {
    index: Arc<AqiIndex>,
    cache: Arc<ResultCache>,
    store: Arc<dyn ReadingStore>,
    workers: Arc<Semaphore>,
    trend_buckets: usize,
    dashboard_deadline: Duration,
}

impl AnalyticsEngine {
    pub fn new(
        index: Arc<AqiIndex>,
        cache: Arc<ResultCache>,
        store: Arc<dyn ReadingStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            index,
            cache,
            store,
            workers: Arc::new(Semaphore::new(config.pool.workers)),
            trend_buckets: config.analytics.trend_buckets,
            dashboard_deadline: Duration::from_secs(config.dashboard.deadline_secs),
        }
    }

    /// Full analytics for `city` (or all cities) over `[start, end]`.
    ///
    /// Cache hits resolve immediately. A miss schedules the computation
    /// on the bounded worker pool; when the pool is saturated the work
    /// runs inline on the calling task instead of being rejected.
    pub async fn get_analytics(
        &self,
        city: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AnalyticsResult {
        let key = cache_key(city, start, end);
        if let Some(hit) = self.cache.get(&key) {
            debug!("analytics cache hit: {}", key);
            return hit;
        }

        let job = ComputeJob {
            index: self.index.clone(),
            cache: self.cache.clone(),
            city: city.map(String::from),
            start,
            end,
            trend_buckets: self.trend_buckets,
            key,
        };

        match self.workers.clone().try_acquire_owned() {
            Ok(permit) => {
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    job.run().await
                });
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!("analytics computation task failed: {}", e);
                        AnalyticsResult::empty()
                    }
                }
            }
            Err(_) => {
                debug!("worker pool saturated; computing inline");
                job.run().await
            }
        }
    }

    /// Latest snapshot per requested city, bounded by the dashboard
    /// deadline. Cities whose fetch fails or misses the deadline are
    /// absent from the map rather than reported as errors.
    pub async fn get_real_time_dashboard(
        &self,
        cities: &[String],
    ) -> HashMap<String, CitySnapshot> {
        let snapshots: Arc<DashMap<String, CitySnapshot>> = Arc::new(DashMap::new());

        let mut handles = Vec::with_capacity(cities.len());
        for city in cities {
            let store = self.store.clone();
            let snapshots = snapshots.clone();
            let city = city.clone();
            handles.push(tokio::spawn(async move {
                match store.latest_for_city(&city).await {
                    Ok(Some(point)) => {
                        snapshots.insert(city, CitySnapshot::from(point));
                    }
                    Ok(None) => debug!("no readings for {}", city),
                    Err(e) => warn!("dashboard fetch failed for {}: {}", city, e),
                }
            }));
        }

        let join_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if timeout(self.dashboard_deadline, join_all).await.is_err() {
            warn!("dashboard deadline exceeded; returning partial results");
        }

        snapshots
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Cached result count (heartbeat observability).
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Indexed reading count (heartbeat observability).
    pub fn index_len(&self) -> usize {
        self.index.len()
    }
}

/// One analytics computation: four independent sub-computations joined
/// into a single result, written back to the cache on success only.
struct ComputeJob {
    index: Arc<AqiIndex>,
    cache: Arc<ResultCache>,
    city: Option<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    trend_buckets: usize,
    key: String,
}

impl ComputeJob {
    async fn run(self) -> AnalyticsResult {
        let (start, end) = (self.start, self.end);

        let stats_task = {
            let index = self.index.clone();
            let city = self.city.clone();
            tokio::spawn(async move { index.statistics(city.as_deref(), start, end) })
        };
        let trend_task = {
            let index = self.index.clone();
            let city = self.city.clone();
            let buckets = self.trend_buckets;
            tokio::spawn(async move { index.trend_data(city.as_deref(), start, end, buckets) })
        };
        let dist_task = {
            let index = self.index.clone();
            let city = self.city.clone();
            tokio::spawn(async move { index.distribution(city.as_deref(), start, end) })
        };
        let series_task = {
            let index = self.index.clone();
            let city = self.city.clone();
            tokio::spawn(async move {
                let mut series = index.data_in_range(start, end);
                if let Some(city) = city {
                    series.retain(|p| p.city == city);
                }
                downsample(series)
            })
        };

        match tokio::try_join!(stats_task, trend_task, dist_task, series_task) {
            Ok((stats, trend, distribution, series)) => {
                let result = AnalyticsResult {
                    total_records: stats.total_records,
                    avg_aqi: stats.avg_aqi,
                    min_aqi: stats.min_aqi,
                    max_aqi: stats.max_aqi,
                    avg_pm25: stats.avg_pm25,
                    avg_pm10: stats.avg_pm10,
                    trend,
                    distribution,
                    series,
                };
                self.cache.put(self.key, result.clone());
                debug!(
                    "analytics computed: {} records in window",
                    result.total_records
                );
                result
            }
            Err(e) => {
                // Degrade the whole call; a partial result must never
                // reach the cache.
                error!("analytics sub-computation failed: {}", e);
                AnalyticsResult::empty()
            }
        }
    }
}

/// Deterministic cache key: city sentinel plus ISO-normalized bounds.
fn cache_key(city: Option<&str>, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        city.unwrap_or("ALL"),
        start.to_rfc3339_opts(SecondsFormat::Millis, true),
        end.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Keep every `ceil(n / MAX_SERIES_POINTS)`-th point, starting at the
/// first, so the series never exceeds the cap and stays time-ordered.
fn downsample(series: Vec<DataPoint>) -> Vec<DataPoint> {
    if series.len() <= MAX_SERIES_POINTS {
        return series;
    }
    let stride = series.len().div_ceil(MAX_SERIES_POINTS);
    series
        .into_iter()
        .step_by(stride)
        .collect()
}
