// src/config/bot.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compose::PostKind;
use crate::ingest::types::MissingTimestamp;
use crate::prices::Coin;

pub const ENV_CONFIG_PATH: &str = "BOT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";

pub const ENV_X_BEARER_TOKEN: &str = "X_BEARER_TOKEN";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";

/// One structured-news endpoint. The token is read from `token_env` at startup
/// and sent as the `token_param` query parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsApiCfg {
    pub name: String,
    pub url: String,
    pub token_env: String,
    pub token_param: String,
}

/// Runtime tunables. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub feeds: Vec<String>,
    pub news_apis: Vec<NewsApiCfg>,
    pub coins: Vec<Coin>,
    pub cycle: Vec<PostKind>,

    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    pub sleep_slice_secs: u64,
    pub failure_ceiling: u32,
    /// Stop after this many iterations. `None` runs until cancelled.
    pub max_posts: Option<u32>,

    pub acquire_attempts: u32,
    pub acquire_backoff_secs: u64,
    pub feed_sample_size: usize,
    pub recent_window: usize,
    pub missing_timestamp: MissingTimestamp,

    pub publish_retries: u32,
    pub rate_limit_cooldown_secs: u64,
    pub publish_backoff_secs: u64,
    pub http_timeout_secs: u64,

    pub price_header: String,
    /// Prefix for posts built from generated (not sourced) news.
    pub synthetic_label: Option<String>,

    pub price_endpoint: String,
    pub publish_endpoint: String,
    pub completion_endpoint: String,
}

fn default_feeds() -> Vec<String> {
    [
        "https://decrypt.co/feed",
        "https://www.coindesk.com/arc/outboundfeeds/rss/",
        "https://www.theblock.co/rss",
        "https://cointelegraph.com/rss",
        "https://bitcoinmagazine.com/feed",
        "https://cryptoslate.com/feed/",
        "https://beincrypto.com/feed/",
        "https://www.newsbtc.com/feed/",
        "https://ambcrypto.com/feed/",
        "https://u.today/rss",
        "https://newsletter.banklesshq.com/feed",
        "https://blockworks.co/feed",
        "https://www.dlnews.com/rss",
        "https://protos.com/feed/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_news_apis() -> Vec<NewsApiCfg> {
    vec![
        NewsApiCfg {
            name: "thenewsapi".into(),
            url: "https://api.thenewsapi.com/v1/news/all?search=crypto&language=en&limit=5"
                .into(),
            token_env: "THENEWSAPI_TOKEN".into(),
            token_param: "api_token".into(),
        },
        NewsApiCfg {
            name: "newsapi".into(),
            url: "https://newsapi.org/v2/everything?q=cryptocurrency&language=en&sortBy=publishedAt&pageSize=5"
                .into(),
            token_env: "NEWSAPI_KEY".into(),
            token_param: "apiKey".into(),
        },
    ]
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            news_apis: default_news_apis(),
            coins: crate::prices::default_coins(),
            cycle: vec![PostKind::Price, PostKind::News, PostKind::News, PostKind::News],
            min_delay_secs: 3_600,
            max_delay_secs: 7_200,
            sleep_slice_secs: 60,
            failure_ceiling: 5,
            max_posts: None,
            acquire_attempts: 3,
            acquire_backoff_secs: 30,
            feed_sample_size: 5,
            recent_window: 5,
            missing_timestamp: MissingTimestamp::Oldest,
            publish_retries: 3,
            rate_limit_cooldown_secs: 900,
            publish_backoff_secs: 30,
            http_timeout_secs: 10,
            price_header: "📊 Crypto Price Update:".into(),
            synthetic_label: None,
            price_endpoint: "https://api.coingecko.com/api/v3/simple/price".into(),
            publish_endpoint: "https://api.twitter.com/2/tweets".into(),
            completion_endpoint: "https://api.openai.com/v1/chat/completions".into(),
        }
    }
}

impl BotConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: BotConfig = toml::from_str(s).context("parsing bot config toml")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading bot config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $BOT_CONFIG_PATH (must exist)
    /// 2) config/bot.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default())
    }

    /// Repair out-of-range values instead of failing.
    pub fn sanitized(mut self) -> Self {
        if self.cycle.is_empty() {
            self.cycle = Self::default().cycle;
        }
        if self.min_delay_secs > self.max_delay_secs {
            // swap to keep a valid interval
            std::mem::swap(&mut self.min_delay_secs, &mut self.max_delay_secs);
        }
        self.sleep_slice_secs = self.sleep_slice_secs.max(1);
        self.failure_ceiling = self.failure_ceiling.max(1);
        self.acquire_attempts = self.acquire_attempts.max(1);
        self.publish_retries = self.publish_retries.max(1);
        self.feed_sample_size = self.feed_sample_size.max(1);
        self.recent_window = self.recent_window.max(1);
        self.http_timeout_secs = self.http_timeout_secs.max(1);
        self.feeds.retain(|f| !f.trim().is_empty());
        if let Some(label) = &self.synthetic_label {
            if label.trim().is_empty() {
                self.synthetic_label = None;
            }
        }
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Opaque authenticated handles required at startup.
#[derive(Clone)]
pub struct Credentials {
    pub x_bearer_token: String,
    pub openai_api_key: String,
    pub openai_model: Option<String>,
}

impl std::fmt::Debug for Credentials {
    // Safe diagnostics: key lengths only.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("x_bearer_token_len", &self.x_bearer_token.len())
            .field("openai_api_key_len", &self.openai_api_key.len())
            .field("openai_model", &self.openai_model)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Fails naming every missing variable, so one restart fixes them all.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let x = get(ENV_X_BEARER_TOKEN);
        let openai = get(ENV_OPENAI_API_KEY);

        let missing: Vec<&str> = [
            (ENV_X_BEARER_TOKEN, x.is_none()),
            (ENV_OPENAI_API_KEY, openai.is_none()),
        ]
        .iter()
        .filter(|(_, m)| *m)
        .map(|(k, _)| *k)
        .collect();

        match (x, openai) {
            (Some(x_bearer_token), Some(openai_api_key)) => Ok(Self {
                x_bearer_token,
                openai_api_key,
                openai_model: get(ENV_OPENAI_MODEL),
            }),
            _ => Err(anyhow!(
                "missing required credentials: {}",
                missing.join(", ")
            )),
        }
    }
}
