//! Red Line prediction ingester: binary entrypoint.
//! Streams the MBTA predictions feed into timestamped files until the feed
//! closes, Ctrl-C is pressed, or the output side fails.

use anyhow::Context;
use commute_helper::{telemetry, AppConfig, HttpFeed, Ingester, SystemClock};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();

    let cfg = AppConfig::load_default()?;
    info!(feed = ?cfg.feed, output_dir = %cfg.output.dir.display(), "config loaded");

    if let Some(addr) = cfg.metrics_addr {
        telemetry::install_metrics_exporter(addr)?;
    }

    let feed = HttpFeed::from_config(&cfg.feed).context("building feed client")?;
    let ingester = Ingester::new(feed, SystemClock, cfg.output, cfg.retry);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received, finishing current file");
                let _ = stop_tx.send(true);
            }
            Err(e) => warn!(error = %e, "ctrl-c handler unavailable"),
        }
    });

    let summary = ingester.run(stop_rx).await?;
    info!(
        attempts = summary.attempts,
        records = summary.records_written,
        files = summary.files_opened,
        stopped = summary.stopped,
        "ingest finished"
    );
    Ok(())
}
