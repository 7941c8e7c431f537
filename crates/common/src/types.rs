//! Domain types shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Readings ──────────────────────────────────────────────────────────

/// A single air-quality reading for a city.
///
/// Identity key is `(city, timestamp)` — inserting a later reading with
/// the same key overwrites the earlier one. Readings are never mutated
/// once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub city: String,
    /// Air Quality Index severity score.
    pub aqi: i32,
    /// PM2.5 concentration (µg/m³).
    pub pm25: f64,
    /// PM10 concentration (µg/m³).
    pub pm10: f64,
    /// NO₂ concentration (µg/m³).
    pub no2: f64,
    /// SO₂ concentration (µg/m³).
    pub so2: f64,
    /// O₃ concentration (µg/m³).
    pub o3: f64,
    pub timestamp: DateTime<Utc>,
}

/// AQI severity category, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// Classify an AQI value. Thresholds: 50 / 100 / 150 / 200 / 300.
    pub fn from_aqi(aqi: i32) -> Self {
        if aqi <= 50 {
            AqiCategory::Good
        } else if aqi <= 100 {
            AqiCategory::Moderate
        } else if aqi <= 150 {
            AqiCategory::UnhealthySensitive
        } else if aqi <= 200 {
            AqiCategory::Unhealthy
        } else if aqi <= 300 {
            AqiCategory::VeryUnhealthy
        } else {
            AqiCategory::Hazardous
        }
    }

    /// Position in a 6-slot distribution array.
    pub fn index(self) -> usize {
        match self {
            AqiCategory::Good => 0,
            AqiCategory::Moderate => 1,
            AqiCategory::UnhealthySensitive => 2,
            AqiCategory::Unhealthy => 3,
            AqiCategory::VeryUnhealthy => 4,
            AqiCategory::Hazardous => 5,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

// ── Aggregates ────────────────────────────────────────────────────────

/// Statistics over a filtered window of readings.
///
/// `distribution` holds per-category counts in `AqiCategory::index()`
/// order and always sums to `total_records`. An empty window yields the
/// all-zero default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStatistics {
    pub total_records: u64,
    pub avg_aqi: f64,
    pub min_aqi: i32,
    pub max_aqi: i32,
    pub avg_pm25: f64,
    pub avg_pm10: f64,
    pub distribution: [u64; 6],
}

/// One bucket of a trend series.
///
/// `count` is the number of readings that contributed; an empty bucket
/// reports `avg_aqi = 0.0` with `count = 0`, so a genuine zero average
/// stays distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub bucket_start: DateTime<Utc>,
    pub avg_aqi: f64,
    pub count: u64,
}

/// Full analytics payload for one (city, window) query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub total_records: u64,
    pub avg_aqi: f64,
    pub min_aqi: i32,
    pub max_aqi: i32,
    pub avg_pm25: f64,
    pub avg_pm10: f64,
    pub trend: Vec<TrendPoint>,
    pub distribution: [u64; 6],
    /// Time-ordered, downsampled series (at most 1000 points).
    pub series: Vec<DataPoint>,
}

impl AnalyticsResult {
    /// The degraded outcome: all-zero, all-empty, but well-formed.
    pub fn empty() -> Self {
        Self::default()
    }
}

// ── Dashboard ─────────────────────────────────────────────────────────

/// Latest-reading snapshot for one city on the real-time dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySnapshot {
    pub city: String,
    pub aqi: i32,
    pub category: AqiCategory,
    pub pm25: f64,
    pub pm10: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<DataPoint> for CitySnapshot {
    fn from(p: DataPoint) -> Self {
        Self {
            category: AqiCategory::from_aqi(p.aqi),
            city: p.city,
            aqi: p.aqi,
            pm25: p.pm25,
            pm10: p.pm10,
            timestamp: p.timestamp,
        }
    }
}
