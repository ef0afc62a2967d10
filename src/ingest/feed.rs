// src/ingest/feed.rs
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::time::Duration;

use crate::config::FeedConfig;
use crate::ingest::lines::split_lines;
use crate::ingest::types::{FeedError, FeedSource, LineStream};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const EVENT_STREAM: &str = "text/event-stream";

/// Streaming GET against the predictions endpoint. Each `open()` is a fresh
/// connection; the response body is never buffered whole.
pub struct HttpFeed {
    client: Client,
    url: String,
    query: Vec<(&'static str, String)>,
    api_key: Option<String>,
    route: String,
}

impl HttpFeed {
    pub fn from_config(cfg: &FeedConfig) -> Result<Self, FeedError> {
        let mut builder = Client::builder();
        if let Some(secs) = cfg.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        if cfg.api_key.is_none() {
            tracing::warn!(
                target: "ingest",
                "no MBTA API key configured; requests will use the keyless rate limit"
            );
        }

        Ok(Self {
            client,
            url: cfg.url(),
            query: cfg.query(),
            api_key: cfg.api_key.clone(),
            route: cfg.route.clone(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn open(&self) -> Result<LineStream, FeedError> {
        let mut req = self
            .client
            .get(&self.url)
            .header(ACCEPT, EVENT_STREAM)
            .query(&self.query);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }
        tracing::debug!(target: "ingest", url = %self.url, %status, "feed connected");

        Ok(split_lines(resp.bytes_stream().map_err(FeedError::from)))
    }

    fn name(&self) -> &str {
        &self.route
    }
}
