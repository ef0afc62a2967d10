// src/ingest/mod.rs
pub mod feed;
pub mod fixture;
pub mod lines;
pub mod record;
pub mod retry;
pub mod types;
pub mod writer;

use futures::StreamExt;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::OutputConfig;
use crate::ingest::record::{format_record, output_file_name};
use crate::ingest::retry::RetryPolicy;
use crate::ingest::types::{FeedError, FeedSource, IngestError, RunSummary};
use crate::ingest::writer::RecordWriter;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_attempts_total", "Feed connection attempts.");
        describe_counter!(
            "ingest_records_written_total",
            "Timestamped records appended to output files."
        );
        describe_counter!(
            "ingest_empty_lines_total",
            "Empty feed lines skipped (keep-alives, SSE separators)."
        );
        describe_counter!(
            "ingest_feed_errors_total",
            "Attempts that ended with a network-layer error."
        );
        describe_counter!("ingest_files_opened_total", "Output files opened.");
        describe_gauge!(
            "ingest_last_record_ts",
            "Unix ts of the most recent record written."
        );
    });
}

enum AttemptEnd {
    Closed,
    Shutdown,
}

enum AttemptError {
    Feed(FeedError),
    Output(std::io::Error),
}

impl From<std::io::Error> for AttemptError {
    fn from(e: std::io::Error) -> Self {
        AttemptError::Output(e)
    }
}

/// Resolves once `true` has been published on the channel. Never resolves if
/// the sender is gone without having asked for shutdown.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Connect, timestamp, write, retry.
pub struct Ingester<F, C> {
    feed: F,
    clock: C,
    output: OutputConfig,
    retry: RetryPolicy,
}

impl<F: FeedSource, C: Clock> Ingester<F, C> {
    pub fn new(feed: F, clock: C, output: OutputConfig, retry: RetryPolicy) -> Self {
        Self {
            feed,
            clock,
            output,
            retry,
        }
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Run attempts until the stream closes cleanly, shutdown is requested,
    /// the output side fails, or the retry policy gives up.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary, IngestError> {
        ensure_metrics_described();

        let mut summary = RunSummary::default();
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                summary.stopped = true;
                return Ok(summary);
            }

            summary.attempts = summary.attempts.saturating_add(1);
            counter!("ingest_attempts_total").increment(1);
            let written_before = summary.records_written;

            let err = match self.run_attempt(&mut shutdown, &mut summary).await {
                Ok(AttemptEnd::Closed) => {
                    info!(
                        target: "ingest",
                        feed = self.feed.name(),
                        attempts = summary.attempts,
                        records = summary.records_written,
                        "feed closed cleanly"
                    );
                    return Ok(summary);
                }
                Ok(AttemptEnd::Shutdown) => {
                    info!(target: "ingest", records = summary.records_written, "shutdown requested");
                    summary.stopped = true;
                    return Ok(summary);
                }
                Err(AttemptError::Output(e)) => return Err(IngestError::Output(e)),
                Err(AttemptError::Feed(e)) => e,
            };

            counter!("ingest_feed_errors_total").increment(1);
            // A connection that delivered data was healthy; restart the backoff.
            failures = if summary.records_written > written_before {
                1
            } else {
                failures.saturating_add(1)
            };

            if !self.retry.allows_another(summary.attempts) {
                warn!(target: "ingest", error = %err, attempts = summary.attempts, "retries exhausted");
                return Err(IngestError::RetriesExhausted {
                    attempts: summary.attempts,
                    source: err,
                });
            }

            let delay = self.retry.delay_for(failures);
            warn!(
                target: "ingest",
                error = %err,
                attempt = summary.attempts,
                retry_in_ms = delay.as_millis() as u64,
                "feed error; reconnecting"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(&mut shutdown) => {
                    summary.stopped = true;
                    return Ok(summary);
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        summary: &mut RunSummary,
    ) -> Result<AttemptEnd, AttemptError> {
        let mut lines = self.feed.open().await.map_err(AttemptError::Feed)?;

        let started = self.clock.now();
        let name = output_file_name(&self.output.prefix, &self.output.extension, &started);
        let mut writer =
            RecordWriter::create(&self.output.dir, &name, self.output.on_collision).await?;
        counter!("ingest_files_opened_total").increment(1);
        summary.files_opened += 1;
        summary.last_file = Some(writer.path().to_path_buf());
        info!(target: "ingest", path = %writer.path().display(), "writing feed");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => {
                    writer.finish().await?;
                    return Ok(AttemptEnd::Shutdown);
                }
                next = lines.next() => next,
            };

            match next {
                None => {
                    writer.finish().await?;
                    return Ok(AttemptEnd::Closed);
                }
                Some(Err(e)) => {
                    writer.finish().await?;
                    return Err(AttemptError::Feed(e));
                }
                Some(Ok(line)) if line.is_empty() => {
                    counter!("ingest_empty_lines_total").increment(1);
                }
                Some(Ok(line)) => {
                    let at = self.clock.now();
                    let rec = format_record(&at, &line, self.output.line_format);
                    writer.write_record(&rec).await?;
                    summary.records_written += 1;
                    counter!("ingest_records_written_total").increment(1);
                    gauge!("ingest_last_record_ts").set(at.timestamp() as f64);
                }
            }
        }
    }
}
