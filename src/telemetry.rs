// src/telemetry.rs
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ingest events log under `target: "ingest"`, not the crate path.
pub const DEFAULT_LOG_FILTER: &str = "commute_helper=info,ingest=info,warn";

/// Compact logs on stdout, filtered by `RUST_LOG`. Safe to call twice.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Install the global Prometheus recorder and serve `/metrics` on `addr`.
/// Must be called from within a tokio runtime.
pub fn install_metrics_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("prometheus: install exporter on {addr}"))?;
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
