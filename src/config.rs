//! Configuration loader — merges env vars, .env file, and config.toml.

use common::{EngineConfig, Error};
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn validate_config(config: &EngineConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.cities.is_empty() {
        issues.push("cities must contain at least one city".into());
    }
    if config.pool.workers == 0 {
        issues.push("pool.workers must be > 0".into());
    }
    if config.analytics.trend_buckets == 0 {
        issues.push("analytics.trend_buckets must be > 0".into());
    }
    if config.refresh.interval_secs == 0 {
        issues.push("refresh.interval_secs must be > 0".into());
    }
    if config.refresh.retention_days == 0 {
        issues.push("refresh.retention_days must be > 0".into());
    }
    if config.refresh.lookback_days == 0 {
        issues.push("refresh.lookback_days must be > 0".into());
    }
    if config.refresh.retention_days < config.refresh.lookback_days {
        issues.push("refresh.retention_days must be >= refresh.lookback_days".into());
    }
    if config.dashboard.deadline_secs == 0 {
        issues.push("dashboard.deadline_secs must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load engine configuration from environment and optional config file.
pub fn load_config() -> Result<EngineConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = EngineConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(raw) = std::env::var("AQI_CITIES") {
        let cities: Vec<String> = raw
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if !cities.is_empty() {
            config.cities = cities;
        }
    }
    if let Ok(raw) = std::env::var("AQI_SEED_PATH") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.seed_path = Some(trimmed.to_string());
        }
    }
    if let Ok(raw) = std::env::var("AQI_CACHE_CAPACITY") {
        config.cache.capacity = parse_u64(&raw, "AQI_CACHE_CAPACITY")? as usize;
    }
    if let Ok(raw) = std::env::var("AQI_CACHE_TTL_SECS") {
        config.cache.ttl_secs = parse_u64(&raw, "AQI_CACHE_TTL_SECS")?;
    }
    if let Ok(raw) = std::env::var("AQI_WORKERS") {
        config.pool.workers = parse_positive_u64(&raw, "AQI_WORKERS")? as usize;
    }
    if let Ok(raw) = std::env::var("AQI_TREND_BUCKETS") {
        config.analytics.trend_buckets = parse_positive_u64(&raw, "AQI_TREND_BUCKETS")? as usize;
    }
    if let Ok(raw) = std::env::var("AQI_REFRESH_INTERVAL_SECS") {
        config.refresh.interval_secs = parse_positive_u64(&raw, "AQI_REFRESH_INTERVAL_SECS")?;
    }
    if let Ok(raw) = std::env::var("AQI_RETENTION_DAYS") {
        config.refresh.retention_days = parse_positive_u64(&raw, "AQI_RETENTION_DAYS")? as u32;
    }
    if let Ok(raw) = std::env::var("AQI_LOOKBACK_DAYS") {
        config.refresh.lookback_days = parse_positive_u64(&raw, "AQI_LOOKBACK_DAYS")? as u32;
    }
    if let Ok(raw) = std::env::var("AQI_DASHBOARD_DEADLINE_SECS") {
        config.dashboard.deadline_secs =
            parse_positive_u64(&raw, "AQI_DASHBOARD_DEADLINE_SECS")?;
    }

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}
