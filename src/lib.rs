// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod clock;
pub mod config;
pub mod ingest;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::AppConfig;
pub use crate::ingest::feed::HttpFeed;
pub use crate::ingest::types::{FeedError, FeedSource, IngestError, RunSummary};
pub use crate::ingest::Ingester;
