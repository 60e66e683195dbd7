// src/ingest/aggregator.rs
//! Tiered acquisition: feeds -> structured news APIs -> generative fallback,
//! wrapped in a bounded attempt loop with linear backoff.

use metrics::counter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

use crate::analyze::ai_adapter::DynCompletion;
use crate::ingest::extract::ArticleExtractor;
use crate::ingest::types::{FeedSource, HeadlineSource, MissingTimestamp, RawArticle, SourceKind};
use crate::ingest::{char_len, clean_text, fetch_sorted};
use crate::telemetry;

/// Below this many characters a feed or API result counts as "no content".
pub const MIN_MEANINGFUL_CHARS: usize = 50;

pub const GENERATIVE_SYSTEM_PROMPT: &str = "You are a crypto news desk. \
Write one short, plausible, recent-sounding crypto market news item in two or three sentences. \
No investment advice, no price predictions, no links.";
pub const GENERATIVE_USER_PROMPT: &str = "Give me one crypto news item from today.";

#[derive(Clone, Copy, Debug)]
pub struct AggregatorCfg {
    pub attempts: u32,
    /// Sleep `backoff_unit * attempt` between full attempts.
    pub backoff_unit: Duration,
    pub sample_size: usize,
    pub recent_window: usize,
    pub min_chars: usize,
    pub missing_timestamp: MissingTimestamp,
}

impl Default for AggregatorCfg {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_unit: Duration::from_secs(30),
            sample_size: 5,
            recent_window: 5,
            min_chars: MIN_MEANINGFUL_CHARS,
            missing_timestamp: MissingTimestamp::Oldest,
        }
    }
}

pub struct ContentAggregator {
    feeds: Vec<Box<dyn FeedSource>>,
    extractor: ArticleExtractor,
    apis: Vec<Box<dyn HeadlineSource>>,
    completion: DynCompletion,
    cfg: AggregatorCfg,
    rng: Mutex<StdRng>,
}

impl ContentAggregator {
    pub fn new(
        feeds: Vec<Box<dyn FeedSource>>,
        extractor: ArticleExtractor,
        apis: Vec<Box<dyn HeadlineSource>>,
        completion: DynCompletion,
        cfg: AggregatorCfg,
    ) -> Self {
        Self {
            feeds,
            extractor,
            apis,
            completion,
            cfg,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic sampling for tests.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut guard = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *guard)
    }

    /// `None` means "skip this cycle's post"; never an error.
    pub async fn acquire(&self) -> Option<RawArticle> {
        let attempts = self.cfg.attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(article) = self.acquire_once().await {
                tracing::info!(
                    tier = article.source_kind.as_str(),
                    attempt,
                    chars = char_len(&article.text),
                    "acquired article"
                );
                counter!(telemetry::ACQUIRE_TIER, "tier" => article.source_kind.as_str())
                    .increment(1);
                return Some(article);
            }
            if attempt < attempts {
                let wait = self.cfg.backoff_unit * attempt;
                tracing::warn!(attempt, wait_secs = wait.as_secs(), "all tiers empty, backing off");
                tokio::time::sleep(wait).await;
            }
        }
        tracing::warn!(attempts, "acquisition exhausted");
        counter!(telemetry::ACQUIRE_ABSENT).increment(1);
        None
    }

    async fn acquire_once(&self) -> Option<RawArticle> {
        match self.from_feeds().await {
            Some(text) if char_len(&text) >= self.cfg.min_chars => {
                return Some(RawArticle {
                    text,
                    source_kind: SourceKind::Feed,
                });
            }
            Some(text) => {
                tracing::debug!(chars = char_len(&text), "feed article too short");
            }
            None => tracing::debug!("no sampled feed had entries"),
        }

        if let Some(text) = self.from_apis().await {
            return Some(RawArticle {
                text,
                source_kind: SourceKind::StructuredApi,
            });
        }

        self.from_generative().await.map(|text| RawArticle {
            text,
            source_kind: SourceKind::Generative,
        })
    }

    /// Sample feeds, stop at the first with entries, extract one of its most
    /// recent entries. Returns cleaned text, possibly short.
    async fn from_feeds(&self) -> Option<String> {
        let n = self.feeds.len();
        if n == 0 {
            return None;
        }
        let k = self.cfg.sample_size.clamp(1, n);
        let order = self.with_rng(|rng| rand::seq::index::sample(rng, n, k).into_vec());

        for idx in order {
            let feed = &self.feeds[idx];
            let entries = fetch_sorted(feed.as_ref(), self.cfg.missing_timestamp).await;
            if entries.is_empty() {
                continue;
            }
            let window = self.cfg.recent_window.clamp(1, entries.len());
            let pick = self.with_rng(|rng| rng.random_range(0..window));
            let entry = &entries[pick];
            tracing::debug!(source = feed.name(), title = %entry.title, "picked entry");
            let raw = self.extractor.extract(entry).await;
            return Some(clean_text(&raw));
        }
        None
    }

    /// First endpoint whose payload yields a meaningful title + description.
    async fn from_apis(&self) -> Option<String> {
        for api in &self.apis {
            match api.fetch_headline().await {
                Ok(Some(h)) => {
                    let text = clean_text(&format!("{}. {}", h.title, h.description));
                    if char_len(&text) >= self.cfg.min_chars {
                        return Some(text);
                    }
                    tracing::debug!(api = api.name(), "headline too short");
                }
                Ok(None) => tracing::debug!(api = api.name(), "unrecognized or empty payload"),
                Err(e) => tracing::warn!(error = ?e, api = api.name(), "news api error"),
            }
        }
        None
    }

    /// Generated text is passed on as-is; only emptiness is rejected.
    async fn from_generative(&self) -> Option<String> {
        match self
            .completion
            .complete(GENERATIVE_SYSTEM_PROMPT, GENERATIVE_USER_PROMPT)
            .await
        {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                tracing::warn!("generative fallback returned nothing");
                None
            }
            Err(e) => {
                tracing::warn!(error = ?e, "generative fallback failed");
                None
            }
        }
    }
}
