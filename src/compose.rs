// src/compose.rs
//! Post kinds and the composer that turns a kind into a finished post.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analyze::summarize::Summarizer;
use crate::ingest::aggregator::ContentAggregator;
use crate::ingest::char_len;
use crate::prices::PriceSnapshot;
use crate::POST_CHAR_LIMIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Price,
    News,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Price => "price",
            PostKind::News => "news",
        }
    }
}

/// Finished, length-bounded text ready for publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCandidate {
    pub text: String,
    pub kind: PostKind,
}

impl PostCandidate {
    pub fn within_limit(&self) -> bool {
        !self.text.trim().is_empty() && char_len(&self.text) <= POST_CHAR_LIMIT
    }
}

#[async_trait]
pub trait PostComposer: Send + Sync {
    /// `None` means "nothing publishable this cycle".
    async fn compose(&self, kind: PostKind) -> Option<PostCandidate>;
}

/// Production composer: price digest, or acquire -> summarize for news.
pub struct Newsroom {
    prices: PriceSnapshot,
    aggregator: ContentAggregator,
    summarizer: Summarizer,
}

impl Newsroom {
    pub fn new(prices: PriceSnapshot, aggregator: ContentAggregator, summarizer: Summarizer) -> Self {
        Self {
            prices,
            aggregator,
            summarizer,
        }
    }
}

#[async_trait]
impl PostComposer for Newsroom {
    async fn compose(&self, kind: PostKind) -> Option<PostCandidate> {
        let candidate = match kind {
            PostKind::Price => self.prices.snapshot().await.map(|text| PostCandidate {
                text,
                kind: PostKind::Price,
            }),
            PostKind::News => {
                let article = self.aggregator.acquire().await?;
                self.summarizer.summarize(&article).await
            }
        }?;
        // Never hand the publisher something that breaks the post invariant.
        if !candidate.within_limit() {
            tracing::warn!(
                kind = kind.as_str(),
                chars = char_len(&candidate.text),
                "composed post violates length limit, dropping"
            );
            return None;
        }
        Some(candidate)
    }
}
