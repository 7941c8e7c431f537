//! Engine configuration types.

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cities served by the real-time dashboard and dry-run queries.
    #[serde(default = "default_cities")]
    pub cities: Vec<String>,

    /// Optional JSONL file of readings to seed the store with at startup.
    #[serde(default)]
    pub seed_path: Option<String>,

    /// Result cache parameters.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Worker pool parameters.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Query-shaping parameters.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Background refresh parameters.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Real-time dashboard parameters.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Analytics result cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached results. 0 disables caching.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Time-to-live for a cached result, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

/// Bounded pool for analytics computations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum concurrent analytics computations. Further requests run
    /// inline on the calling task instead of being rejected.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Query-shaping parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Number of equal-width buckets in a trend series.
    #[serde(default = "default_trend_buckets")]
    pub trend_buckets: usize,
}

/// Background index refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between refresh ticks.
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,

    /// Retention horizon — index entries older than this are evicted.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Bulk-load window — readings newer than this are pulled from the
    /// store into the index on each tick.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

/// Real-time dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Overall deadline for a dashboard round, in seconds. Cities whose
    /// fetch misses the deadline are omitted from the response.
    #[serde(default = "default_dashboard_deadline")]
    pub deadline_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_cities() -> Vec<String> {
    ["Delhi", "Mumbai", "Kolkata", "Chennai", "Bengaluru"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cache_capacity() -> usize {
    500
}
fn default_cache_ttl() -> u64 {
    900
}
fn default_workers() -> usize {
    16
}
fn default_trend_buckets() -> usize {
    24
}
fn default_refresh_interval() -> u64 {
    1800
}
fn default_retention_days() -> u32 {
    548
}
fn default_lookback_days() -> u32 {
    7
}
fn default_dashboard_deadline() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cities: default_cities(),
            seed_path: None,
            cache: CacheConfig::default(),
            pool: PoolConfig::default(),
            analytics: AnalyticsConfig::default(),
            refresh: RefreshConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            trend_buckets: default_trend_buckets(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
            retention_days: default_retention_days(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_dashboard_deadline(),
        }
    }
}
