//! Per-city time-series index.
//!
//! Readings live in one `BTreeMap<timestamp, DataPoint>` partition per
//! city, held in a `DashMap`. The shard lock around a partition makes
//! insert and cleanup on the same city mutually exclusive and gives every
//! reader an atomic view of that partition, so a statistics scan racing a
//! bulk insert sees pre- or post-insert state per city, never a torn one.
//! Operations on different cities proceed mostly in parallel.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use common::{AggregatedStatistics, AqiCategory, DataPoint};
use dashmap::DashMap;
use tracing::debug;

type Partition = BTreeMap<DateTime<Utc>, DataPoint>;

/// Mutable index of recent readings, partitioned by city and sorted by
/// timestamp within each partition.
#[derive(Default)]
pub struct AqiIndex {
    partitions: DashMap<String, Partition>,
}

impl AqiIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk insert. Readings are grouped by city so each partition is
    /// locked once per batch; a reading with an existing
    /// `(city, timestamp)` key overwrites the stored one.
    pub fn add_data_points(&self, points: Vec<DataPoint>) {
        let mut grouped: HashMap<String, Vec<DataPoint>> = HashMap::new();
        for p in points {
            grouped.entry(p.city.clone()).or_default().push(p);
        }
        for (city, batch) in grouped {
            let mut part = self.partitions.entry(city).or_default();
            for p in batch {
                part.insert(p.timestamp, p);
            }
        }
    }

    /// Single-pass statistics over the inclusive `[start, end]` window,
    /// optionally filtered to one city. An empty match yields the
    /// all-zero default rather than an error.
    pub fn statistics(
        &self,
        city: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AggregatedStatistics {
        let mut acc = StatsAcc::default();
        self.scan(city, start, end, |p| acc.add(p));
        acc.finish()
    }

    /// Per-category AQI counts over the window. Matches the
    /// `distribution` field of [`statistics`](Self::statistics) for the
    /// identical filter.
    pub fn distribution(
        &self,
        city: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> [u64; 6] {
        let mut dist = [0u64; 6];
        self.scan(city, start, end, |p| {
            dist[AqiCategory::from_aqi(p.aqi).index()] += 1;
        });
        dist
    }

    /// Average AQI per bucket over `bucket_count` equal-width, half-open
    /// sub-intervals of `[start, end]`. Always returns exactly
    /// `bucket_count` points ascending by bucket start; a bucket nothing
    /// fell into reports `avg_aqi = 0.0` with `count = 0`. The final
    /// bucket closes at `end` inclusive, so bucket counts sum to the
    /// window's `total_records`.
    pub fn trend_data(
        &self,
        city: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket_count: usize,
    ) -> Vec<common::TrendPoint> {
        if bucket_count == 0 {
            return Vec::new();
        }
        let total_ms = (end - start).num_milliseconds().max(0);
        let bound = |i: usize| {
            start + Duration::milliseconds(total_ms * i as i64 / bucket_count as i64)
        };

        let mut readings: Vec<(DateTime<Utc>, i32)> = Vec::new();
        self.scan(city, start, end, |p| readings.push((p.timestamp, p.aqi)));
        readings.sort_by_key(|(ts, _)| *ts);

        let mut sums = vec![(0i64, 0u64); bucket_count];
        let mut idx = 0;
        for (ts, aqi) in readings {
            while idx + 1 < bucket_count && ts >= bound(idx + 1) {
                idx += 1;
            }
            sums[idx].0 += aqi as i64;
            sums[idx].1 += 1;
        }

        sums.into_iter()
            .enumerate()
            .map(|(i, (sum, count))| common::TrendPoint {
                bucket_start: bound(i),
                avg_aqi: if count == 0 { 0.0 } else { sum as f64 / count as f64 },
                count,
            })
            .collect()
    }

    /// All readings in the inclusive window across every city, ascending
    /// by timestamp. Read-only.
    pub fn data_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DataPoint> {
        let mut out: Vec<DataPoint> = Vec::new();
        for part in self.partitions.iter() {
            out.extend(part.range(start..=end).map(|(_, p)| p.clone()));
        }
        out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.city.cmp(&b.city)));
        out
    }

    /// Remove every reading with `timestamp < cutoff`. Idempotent: a
    /// repeated call with the same or an earlier cutoff removes nothing.
    /// Returns the number of readings removed.
    pub fn cleanup_old_data(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.partitions.retain(|city, part| {
            let before = part.len();
            let kept = part.split_off(&cutoff);
            removed += before - kept.len();
            *part = kept;
            if part.is_empty() {
                debug!("dropping emptied partition for {}", city);
            }
            !part.is_empty()
        });
        removed
    }

    /// Total readings across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Number of city partitions currently held.
    pub fn city_count(&self) -> usize {
        self.partitions.len()
    }

    fn scan<F: FnMut(&DataPoint)>(
        &self,
        city: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        mut visit: F,
    ) {
        match city {
            Some(name) => {
                if let Some(part) = self.partitions.get(name) {
                    for (_, p) in part.range(start..=end) {
                        visit(p);
                    }
                }
            }
            None => {
                for part in self.partitions.iter() {
                    for (_, p) in part.range(start..=end) {
                        visit(p);
                    }
                }
            }
        }
    }
}

#[derive(Default)]
struct StatsAcc {
    count: u64,
    sum_aqi: i64,
    min_aqi: i32,
    max_aqi: i32,
    sum_pm25: f64,
    sum_pm10: f64,
    dist: [u64; 6],
}

impl StatsAcc {
    fn add(&mut self, p: &DataPoint) {
        if self.count == 0 {
            self.min_aqi = p.aqi;
            self.max_aqi = p.aqi;
        } else {
            self.min_aqi = self.min_aqi.min(p.aqi);
            self.max_aqi = self.max_aqi.max(p.aqi);
        }
        self.count += 1;
        self.sum_aqi += p.aqi as i64;
        self.sum_pm25 += p.pm25;
        self.sum_pm10 += p.pm10;
        self.dist[AqiCategory::from_aqi(p.aqi).index()] += 1;
    }

    fn finish(self) -> AggregatedStatistics {
        if self.count == 0 {
            return AggregatedStatistics::default();
        }
        let n = self.count as f64;
        AggregatedStatistics {
            total_records: self.count,
            avg_aqi: self.sum_aqi as f64 / n,
            min_aqi: self.min_aqi,
            max_aqi: self.max_aqi,
            avg_pm25: self.sum_pm25 / n,
            avg_pm10: self.sum_pm10 / n,
            distribution: self.dist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn point(city: &str, aqi: i32, at: DateTime<Utc>) -> DataPoint {
        DataPoint {
            city: city.into(),
            aqi,
            pm25: aqi as f64 / 2.0,
            pm10: aqi as f64,
            no2: 10.0,
            so2: 5.0,
            o3: 20.0,
            timestamp: at,
        }
    }

    fn delhi_index() -> AqiIndex {
        let idx = AqiIndex::new();
        idx.add_data_points(vec![
            point("Delhi", 100, ts(0)),
            point("Delhi", 200, ts(1)),
            point("Delhi", 50, ts(2)),
        ]);
        idx
    }

    #[test]
    fn statistics_match_reference_scenario() {
        let idx = delhi_index();
        let stats = idx.statistics(Some("Delhi"), ts(0), ts(2));

        assert_eq!(stats.total_records, 3);
        assert!((stats.avg_aqi - 350.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.min_aqi, 50);
        assert_eq!(stats.max_aqi, 200);
        assert_eq!(stats.distribution, [1, 1, 0, 1, 0, 0]);
    }

    #[test]
    fn distribution_sums_to_total_records() {
        let idx = delhi_index();
        idx.add_data_points(vec![
            point("Mumbai", 320, ts(1)),
            point("Mumbai", 170, ts(2)),
        ]);

        let stats = idx.statistics(None, ts(0), ts(2));
        assert_eq!(stats.distribution.iter().sum::<u64>(), stats.total_records);
        assert_eq!(stats.total_records, 5);

        // The standalone scan agrees with the statistics field.
        let dist = idx.distribution(None, ts(0), ts(2));
        assert_eq!(dist, stats.distribution);
    }

    #[test]
    fn empty_window_yields_zeroed_statistics() {
        let idx = delhi_index();
        let stats = idx.statistics(Some("Delhi"), ts(10), ts(20));
        assert_eq!(stats, AggregatedStatistics::default());

        let stats = idx.statistics(Some("Nowhere"), ts(0), ts(2));
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.min_aqi, 0);
        assert_eq!(stats.max_aqi, 0);
        assert_eq!(stats.avg_aqi, 0.0);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let idx = delhi_index();
        assert_eq!(idx.statistics(Some("Delhi"), ts(0), ts(0)).total_records, 1);
        assert_eq!(idx.statistics(Some("Delhi"), ts(1), ts(2)).total_records, 2);
    }

    #[test]
    fn same_key_insert_overwrites() {
        let idx = delhi_index();
        idx.add_data_points(vec![point("Delhi", 400, ts(1))]);

        let stats = idx.statistics(Some("Delhi"), ts(0), ts(2));
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.max_aqi, 400);
    }

    #[test]
    fn trend_returns_exactly_n_ascending_buckets() {
        let idx = delhi_index();
        let trend = idx.trend_data(Some("Delhi"), ts(0), ts(2), 4);

        assert_eq!(trend.len(), 4);
        for pair in trend.windows(2) {
            assert!(pair[0].bucket_start < pair[1].bucket_start);
        }
        assert_eq!(trend[0].bucket_start, ts(0));
    }

    #[test]
    fn trend_counts_sum_to_total_records() {
        let idx = delhi_index();
        idx.add_data_points(vec![point("Delhi", 80, ts(2))]); // overwrite at t2

        for buckets in [1, 2, 3, 5, 7] {
            let trend = idx.trend_data(Some("Delhi"), ts(0), ts(2), buckets);
            let stats = idx.statistics(Some("Delhi"), ts(0), ts(2));
            let counted: u64 = trend.iter().map(|t| t.count).sum();
            assert_eq!(counted, stats.total_records, "buckets={}", buckets);
        }
    }

    #[test]
    fn empty_trend_bucket_reports_zero_average_and_count() {
        let idx = AqiIndex::new();
        idx.add_data_points(vec![point("Delhi", 90, ts(0)), point("Delhi", 110, ts(3))]);

        let trend = idx.trend_data(Some("Delhi"), ts(0), ts(3), 3);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].count, 1);
        assert_eq!(trend[0].avg_aqi, 90.0);
        assert_eq!(trend[1].count, 0);
        assert_eq!(trend[1].avg_aqi, 0.0);
        // t(3) falls on the inclusive right edge of the last bucket.
        assert_eq!(trend[2].count, 1);
        assert_eq!(trend[2].avg_aqi, 110.0);
    }

    #[test]
    fn data_in_range_is_ascending_and_read_only() {
        let idx = delhi_index();
        idx.add_data_points(vec![point("Mumbai", 60, ts(1))]);

        let data = idx.data_in_range(ts(0), ts(2));
        assert_eq!(data.len(), 4);
        for pair in data.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        assert_eq!(idx.len(), 4);
    }

    #[test]
    fn cleanup_removes_exactly_older_points_and_is_idempotent() {
        let idx = delhi_index();

        let removed = idx.cleanup_old_data(ts(1));
        assert_eq!(removed, 1);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.statistics(Some("Delhi"), ts(0), ts(2)).total_records, 2);

        // Repeat with the same cutoff: no-op.
        assert_eq!(idx.cleanup_old_data(ts(1)), 0);
        // Earlier cutoff: also a no-op.
        assert_eq!(idx.cleanup_old_data(ts(0)), 0);
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn cleanup_drops_emptied_partitions() {
        let idx = AqiIndex::new();
        idx.add_data_points(vec![point("Delhi", 80, ts(0)), point("Mumbai", 90, ts(5))]);
        assert_eq!(idx.city_count(), 2);

        idx.cleanup_old_data(ts(3));
        assert_eq!(idx.city_count(), 1);
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn concurrent_reads_never_observe_torn_distribution() {
        use std::sync::Arc;

        let idx = Arc::new(AqiIndex::new());
        let writer = {
            let idx = idx.clone();
            std::thread::spawn(move || {
                for batch in 0..50i64 {
                    idx.add_data_points(
                        (0..20)
                            .map(|i| point("Delhi", 75, ts(batch * 20 + i)))
                            .collect(),
                    );
                }
            })
        };
        let reader = {
            let idx = idx.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let stats = idx.statistics(Some("Delhi"), ts(0), ts(1000));
                    assert_eq!(
                        stats.distribution.iter().sum::<u64>(),
                        stats.total_records
                    );
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(idx.len(), 1000);
    }
}
