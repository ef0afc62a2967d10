// src/config/ingest.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::ingest::record::LineFormat;
use crate::ingest::retry::RetryPolicy;
use crate::ingest::writer::CollisionPolicy;

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/ingest.toml";
pub const DEFAULT_BASE_URL: &str = "https://api-v3.mbta.com";

pub const ENV_CONFIG_PATH: &str = "COMMUTE_CONFIG_PATH";
pub const ENV_API_KEY: &str = "MBTA_API_KEY";
pub const ENV_BASE_URL: &str = "MBTA_BASE_URL";
pub const ENV_ROUTE: &str = "FEED_ROUTE";
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub output: OutputConfig,
    pub retry: RetryPolicy,
    /// Serve Prometheus metrics here when set, e.g. "127.0.0.1:9100".
    pub metrics_addr: Option<SocketAddr>,
}

/// Where and what to stream.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub path: String,
    /// `filter[route]`
    pub route: String,
    /// `include`
    pub include: String,
    /// `fields[shape]`
    pub shape_fields: String,
    pub api_key: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            path: "/predictions/".to_string(),
            route: "Red".to_string(),
            include: "vehicle".to_string(),
            shape_fields: "name".to_string(),
            api_key: None,
            connect_timeout_secs: None,
        }
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConfig")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("route", &self.route)
            .field("include", &self.include)
            .field("shape_fields", &self.shape_fields)
            .field("api_key_len", &self.api_key.as_ref().map(|k| k.len()))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl FeedConfig {
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("filter[route]", self.route.clone()),
            ("include", self.include.clone()),
            ("fields[shape]", self.shape_fields.clone()),
        ]
    }
}

/// Output file layout: `<dir>/<prefix>_<YYYYMMDD>_<HHMMSS>.<extension>`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
    pub on_collision: CollisionPolicy,
    pub line_format: LineFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: "red_line_predict".to_string(),
            extension: "txt".to_string(),
            on_collision: CollisionPolicy::default(),
            line_format: LineFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit TOML path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading ingest config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load config using env var + fallbacks, then apply env overrides:
    /// 1) $COMMUTE_CONFIG_PATH
    /// 2) config/ingest.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay values from `lookup` (normally the process environment).
    /// Blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.feed.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.feed.base_url = url;
        }
        if let Some(route) = get(ENV_ROUTE) {
            self.feed.route = route;
        }
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(addr) = get(ENV_METRICS_ADDR) {
            let parsed = addr
                .parse::<SocketAddr>()
                .with_context(|| format!("{ENV_METRICS_ADDR}={addr} is not a socket address"))?;
            self.metrics_addr = Some(parsed);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed.route.trim().is_empty() {
            bail!("feed.route must not be empty");
        }
        if self.output.prefix.is_empty() || self.output.extension.is_empty() {
            bail!("output.prefix and output.extension must not be empty");
        }
        let m = self.retry.multiplier;
        if m.is_nan() || m < 1.0 {
            bail!("retry.multiplier must be >= 1.0 (got {m})");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_red_line_feed() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.feed.url(), "https://api-v3.mbta.com/predictions/");
        assert_eq!(
            cfg.feed.query(),
            vec![
                ("filter[route]", "Red".to_string()),
                ("include", "vehicle".to_string()),
                ("fields[shape]", "name".to_string()),
            ]
        );
        assert_eq!(cfg.output.prefix, "red_line_predict");
        assert_eq!(cfg.output.extension, "txt");
        assert!(cfg.feed.api_key.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
metrics_addr = "127.0.0.1:9100"

[feed]
route = "Orange"

[output]
on_collision = "truncate"
line_format = "raw"

[retry]
multiplier = 2.0
jitter_ms = 250
max_attempts = 10
"#,
        )
        .unwrap();
        assert_eq!(cfg.feed.route, "Orange");
        assert_eq!(cfg.feed.include, "vehicle");
        assert_eq!(cfg.output.on_collision, CollisionPolicy::Truncate);
        assert_eq!(cfg.output.line_format, LineFormat::Raw);
        assert_eq!(cfg.retry.base_delay_ms, 500);
        assert_eq!(cfg.retry.max_attempts, Some(10));
        assert_eq!(cfg.metrics_addr, Some("127.0.0.1:9100".parse().unwrap()));
    }

    #[test]
    fn env_overrides_win_and_blanks_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_KEY, " secret "),
            (ENV_ROUTE, ""),
            (ENV_OUTPUT_DIR, "/tmp/feeds"),
        ]);
        let mut cfg = AppConfig::default();
        cfg.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.feed.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.feed.route, "Red");
        assert_eq!(cfg.output.dir, PathBuf::from("/tmp/feeds"));
    }

    #[test]
    fn bad_metrics_addr_is_an_error() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_env_overrides(|k| (k == ENV_METRICS_ADDR).then(|| "not-an-addr".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_METRICS_ADDR));
    }

    #[test]
    fn validate_rejects_shrinking_backoff() {
        let mut cfg = AppConfig::default();
        cfg.retry.multiplier = 0.5;
        assert!(cfg.validate().is_err());
        cfg.retry.multiplier = f64::NAN;
        assert!(cfg.validate().is_err());
        cfg.retry.multiplier = 1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn debug_output_hides_api_key() {
        let feed = FeedConfig {
            api_key: Some("bb73-not-for-logs".into()),
            ..FeedConfig::default()
        };
        let dbg = format!("{feed:?}");
        assert!(!dbg.contains("bb73-not-for-logs"));
        assert!(dbg.contains("api_key_len"));
    }
}
