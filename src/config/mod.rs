pub mod ingest;

pub use ingest::{AppConfig, FeedConfig, OutputConfig};
