// src/ingest/types.rs
use bytes::Bytes;
use futures::stream::BoxStream;
use std::path::PathBuf;
use thiserror::Error;

/// Lines of one open feed connection, terminators stripped. Ends on clean
/// close; an `Err` item means the connection is gone.
pub type LineStream = BoxStream<'static, Result<Bytes, FeedError>>;

/// Network-layer failures. These are the only errors the ingester retries.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed responded with HTTP {status}")]
    Status { status: u16 },
    #[error("feed disconnected: {0}")]
    Disconnected(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// Output side failures are fatal.
    #[error("output file error: {0}")]
    Output(#[from] std::io::Error),
    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: FeedError,
    },
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Establish a new connection. Called once per ingestion attempt.
    async fn open(&self) -> Result<LineStream, FeedError>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub attempts: u32,
    pub records_written: u64,
    /// Output files opened, counting reopens under truncate/append.
    pub files_opened: u64,
    /// File of the most recent attempt that connected.
    pub last_file: Option<PathBuf>,
    /// Run ended because shutdown was requested.
    pub stopped: bool,
}
