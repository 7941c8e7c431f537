//! Storage collaborator seam.
//!
//! The engine only ever needs two reads from persistent storage: readings
//! newer than an instant, and the latest reading for one city. Anything
//! behind this trait (SQL, remote API, files) is out of scope here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DataPoint, Result};
use tokio::sync::RwLock;

/// Bulk-read-since and latest-per-city access to persisted readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// All readings with `timestamp >= since`, optionally filtered by city.
    async fn readings_since(
        &self,
        since: DateTime<Utc>,
        city: Option<&str>,
    ) -> Result<Vec<DataPoint>>;

    /// The most recent reading for `city`, if any exists.
    async fn latest_for_city(&self, city: &str) -> Result<Option<DataPoint>>;
}

/// In-memory [`ReadingStore`] backing the demo binary and tests.
#[derive(Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<DataPoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, point: DataPoint) {
        self.readings.write().await.push(point);
    }

    pub async fn insert_many(&self, points: Vec<DataPoint>) {
        self.readings.write().await.extend(points);
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn readings_since(
        &self,
        since: DateTime<Utc>,
        city: Option<&str>,
    ) -> Result<Vec<DataPoint>> {
        let readings = self.readings.read().await;
        Ok(readings
            .iter()
            .filter(|p| p.timestamp >= since)
            .filter(|p| city.map_or(true, |c| p.city == c))
            .cloned()
            .collect())
    }

    async fn latest_for_city(&self, city: &str) -> Result<Option<DataPoint>> {
        let readings = self.readings.read().await;
        Ok(readings
            .iter()
            .filter(|p| p.city == city)
            .max_by_key(|p| p.timestamp)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn point(city: &str, aqi: i32, at: DateTime<Utc>) -> DataPoint {
        DataPoint {
            city: city.into(),
            aqi,
            pm25: 10.0,
            pm10: 20.0,
            no2: 5.0,
            so2: 2.0,
            o3: 30.0,
            timestamp: at,
        }
    }

    #[tokio::test]
    async fn readings_since_filters_time_and_city() {
        let store = MemoryStore::new();
        store
            .insert_many(vec![
                point("Delhi", 80, ts(0)),
                point("Delhi", 90, ts(5)),
                point("Mumbai", 70, ts(6)),
            ])
            .await;

        let all = store.readings_since(ts(1), None).await.unwrap();
        assert_eq!(all.len(), 2);

        let delhi = store.readings_since(ts(0), Some("Delhi")).await.unwrap();
        assert_eq!(delhi.len(), 2);
    }

    #[tokio::test]
    async fn latest_for_city_picks_newest() {
        let store = MemoryStore::new();
        store
            .insert_many(vec![
                point("Delhi", 80, ts(0)),
                point("Delhi", 95, ts(8)),
                point("Delhi", 90, ts(5)),
            ])
            .await;

        let latest = store.latest_for_city("Delhi").await.unwrap();
        assert_eq!(latest.map(|p| p.aqi), Some(95));

        let missing = store.latest_for_city("Chennai").await.unwrap();
        assert!(missing.is_none());
    }
}
