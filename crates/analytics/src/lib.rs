//! Analytics engine crate.
//!
//! Orchestrates cached, bounded-concurrency analytics queries over the
//! aggregation index, plus the background refresh loop that keeps the
//! index warm.

pub mod orchestrator;
pub mod refresher;
pub mod store;

pub use orchestrator::AnalyticsEngine;
pub use refresher::Refresher;
pub use store::{MemoryStore, ReadingStore};
