// src/bootstrap.rs
//! Wires configuration + credentials into the composer and publisher.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::analyze::ai_adapter::{DynCompletion, OpenAiClient, USER_AGENT};
use crate::analyze::summarize::Summarizer;
use crate::compose::Newsroom;
use crate::config::{BotConfig, Credentials};
use crate::ingest::aggregator::{AggregatorCfg, ContentAggregator, MIN_MEANINGFUL_CHARS};
use crate::ingest::extract::{ArticleExtractor, HttpPageFetcher};
use crate::ingest::providers::news_api::NewsApiEndpoint;
use crate::ingest::providers::rss::RssFeedSource;
use crate::ingest::types::{FeedSource, HeadlineSource};
use crate::notify::publisher::{PublisherCfg, XPublisher};
use crate::prices::PriceSnapshot;

pub struct BotRuntime {
    pub cfg: BotConfig,
    pub newsroom: Newsroom,
    pub publisher: XPublisher,
}

/// Shared HTTP client; per-request timeouts are set by each component.
pub fn http_client(cfg: &BotConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4).min(cfg.http_timeout()))
        .build()
        .context("building http client")
}

pub fn build_newsroom(
    cfg: &BotConfig,
    creds: &Credentials,
    client: &reqwest::Client,
) -> Newsroom {
    let timeout = cfg.http_timeout();

    let completion: DynCompletion = Arc::new(OpenAiClient::new(
        client.clone(),
        creds,
        cfg.completion_endpoint.clone(),
        // generation is slower than a page fetch
        timeout * 3,
    ));

    let feeds: Vec<Box<dyn FeedSource>> = cfg
        .feeds
        .iter()
        .map(|url| {
            Box::new(RssFeedSource::from_url(url.clone(), client.clone(), timeout))
                as Box<dyn FeedSource>
        })
        .collect();

    let apis: Vec<Box<dyn HeadlineSource>> = cfg
        .news_apis
        .iter()
        .filter_map(|api| NewsApiEndpoint::from_env(api, client.clone(), timeout))
        .map(|e| Box::new(e) as Box<dyn HeadlineSource>)
        .collect();

    let extractor = ArticleExtractor::new(Arc::new(HttpPageFetcher::new(client.clone(), timeout)));

    let aggregator = ContentAggregator::new(
        feeds,
        extractor,
        apis,
        completion.clone(),
        AggregatorCfg {
            attempts: cfg.acquire_attempts,
            backoff_unit: Duration::from_secs(cfg.acquire_backoff_secs),
            sample_size: cfg.feed_sample_size,
            recent_window: cfg.recent_window,
            min_chars: MIN_MEANINGFUL_CHARS,
            missing_timestamp: cfg.missing_timestamp,
        },
    );

    let summarizer = Summarizer::new(completion).with_synthetic_label(cfg.synthetic_label.clone());

    let prices = PriceSnapshot::new(
        client.clone(),
        cfg.price_endpoint.clone(),
        timeout,
        cfg.coins.clone(),
    )
    .with_header(cfg.price_header.clone());

    Newsroom::new(prices, aggregator, summarizer)
}

pub fn build_publisher(cfg: &BotConfig, creds: &Credentials, client: &reqwest::Client) -> XPublisher {
    XPublisher::new(
        cfg.publish_endpoint.clone(),
        creds.x_bearer_token.clone(),
        client.clone(),
    )
    .with_cfg(PublisherCfg {
        max_attempts: cfg.publish_retries,
        rate_limit_cooldown: Duration::from_secs(cfg.rate_limit_cooldown_secs),
        backoff_unit: Duration::from_secs(cfg.publish_backoff_secs),
        timeout: cfg.http_timeout(),
    })
}

impl BotRuntime {
    /// Credentials first: a missing secret must fail before anything else runs.
    pub fn from_env() -> Result<Self> {
        let creds = Credentials::from_env()?;
        let cfg = BotConfig::load_default()?;
        // Safe diagnostics: only counts + key lengths
        info!(
            feeds = cfg.feeds.len(),
            news_apis = cfg.news_apis.len(),
            coins = cfg.coins.len(),
            cycle = ?cfg.cycle,
            creds = ?creds,
            "bot cfg loaded"
        );
        let client = http_client(&cfg)?;
        let newsroom = build_newsroom(&cfg, &creds, &client);
        let publisher = build_publisher(&cfg, &creds, &client);
        Ok(Self {
            cfg,
            newsroom,
            publisher,
        })
    }
}
