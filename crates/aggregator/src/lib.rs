//! In-memory aggregation index over recent readings.
//!
//! Serves statistics, trend, and range queries for the analytics
//! orchestrator without touching persistent storage.

pub mod index;

pub use index::AqiIndex;
