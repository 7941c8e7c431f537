//! aqi-analytics: air-quality analytics engine.
//!
//! Single-binary Tokio application that:
//! 1. Seeds the reading store from an optional JSONL file
//! 2. Warms the aggregation index with a first refresh tick
//! 3. Serves analytics and real-time dashboard queries
//! 4. Runs the background refresher until shutdown

mod config;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use aggregator::AqiIndex;
use analytics::orchestrator::ResultCache;
use analytics::{AnalyticsEngine, MemoryStore, ReadingStore, Refresher};
use common::{DataPoint, EngineConfig};

/// Air-quality analytics engine
#[derive(Parser)]
#[command(name = "aqi-analytics", about = "Air-quality analytics engine")]
struct Cli {
    /// Run one refresh tick and one query round, then exit.
    #[arg(long)]
    dry_run: bool,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Read one `DataPoint` per line from a JSONL seed file.
fn load_seed(path: &str) -> common::Result<Vec<DataPoint>> {
    let contents = std::fs::read_to_string(path)?;
    let mut points = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DataPoint>(line) {
            Ok(p) => points.push(p),
            Err(e) => warn!("skipping seed line {}: {}", lineno + 1, e),
        }
    }
    Ok(points)
}

async fn run_query_round(engine: &AnalyticsEngine, cfg: &EngineConfig) {
    let now = Utc::now();
    let start = now - ChronoDuration::days(cfg.refresh.lookback_days as i64);

    for city in &cfg.cities {
        let result = engine.get_analytics(Some(city), start, now).await;
        info!(
            "{}: records={} avg_aqi={:.1} min={} max={} trend_buckets={} series={}",
            city,
            result.total_records,
            result.avg_aqi,
            result.min_aqi,
            result.max_aqi,
            result.trend.len(),
            result.series.len(),
        );
    }

    let dashboard = engine.get_real_time_dashboard(&cfg.cities).await;
    for (city, snapshot) in &dashboard {
        info!(
            "dashboard {}: aqi={} ({}) at {}",
            city,
            snapshot.aqi,
            snapshot.category.label(),
            snapshot.timestamp,
        );
    }
    info!(
        "dashboard round: {} / {} cities reported",
        dashboard.len(),
        cfg.cities.len()
    );
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aqi_analytics=info,analytics=info,aggregator=info,ttl_cache=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("Air-quality analytics engine starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Cities: {:?}", cfg.cities);
    info!(
        "Cache: capacity={}, ttl={}s; pool: workers={}",
        cfg.cache.capacity, cfg.cache.ttl_secs, cfg.pool.workers
    );
    info!(
        "Refresh: every {}s, retention={}d, lookback={}d; dashboard deadline={}s",
        cfg.refresh.interval_secs,
        cfg.refresh.retention_days,
        cfg.refresh.lookback_days,
        cfg.dashboard.deadline_secs,
    );

    // ── Service construction (explicit, no globals) ──────────────────
    let store = Arc::new(MemoryStore::new());
    if let Some(path) = &cfg.seed_path {
        match load_seed(path) {
            Ok(points) => {
                info!("seeded {} readings from {}", points.len(), path);
                store.insert_many(points).await;
            }
            Err(e) => {
                error!("Failed to read seed file {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }

    let index = Arc::new(AqiIndex::new());
    let cache = Arc::new(ResultCache::new(
        cfg.cache.capacity,
        Duration::from_secs(cfg.cache.ttl_secs),
    ));
    let store: Arc<dyn ReadingStore> = store;
    let engine = Arc::new(AnalyticsEngine::new(
        index.clone(),
        cache.clone(),
        store.clone(),
        &cfg,
    ));
    let refresher = Refresher::new(index.clone(), cache, store, &cfg.refresh);

    // ── Dry-run mode ─────────────────────────────────────────────────
    if cli.dry_run {
        info!("Running single refresh tick and query round...");
        refresher.tick().await;
        info!(
            "Index warmed: {} readings across {} cities",
            index.len(),
            index.city_count()
        );
        run_query_round(&engine, &cfg).await;
        return;
    }

    // ── Spawn tasks ──────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    let refresh_handle = tokio::spawn(refresher.run(stop_rx));

    let hb_engine = engine.clone();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            info!(
                "HEARTBEAT: indexed={} cached={}",
                hb_engine.index_len(),
                hb_engine.cache_len()
            );
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("Engine is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = refresh_handle => {
            error!("Refresher task exited: {:?}", r);
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
    }

    // Stop the refresher if it is still running; ignore a closed channel.
    let _ = stop_tx.send(true);

    info!("Engine shut down.");
}
