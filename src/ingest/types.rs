// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One parsed syndication entry. Request-scoped; dropped once text is extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub embedded_content: Option<String>,
}

/// Which fallback tier produced a raw article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Feed,
    StructuredApi,
    Generative,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::StructuredApi => "structured_api",
            SourceKind::Generative => "generative",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticle {
    pub text: String,
    pub source_kind: SourceKind,
}

/// How an entry without a usable publish timestamp ranks against dated ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTimestamp {
    /// Sorts after every dated entry.
    #[default]
    Oldest,
    /// Treated as published at fetch time.
    Newest,
}

/// A title + description pair from a structured news API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub description: String,
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Entries as parsed, in document order. Errors are degraded to "no entries"
    /// by the caller.
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>>;
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
pub trait HeadlineSource: Send + Sync {
    /// `Ok(None)` when the payload is valid but carries no usable article.
    async fn fetch_headline(&self) -> Result<Option<Headline>>;
    fn name(&self) -> &str;
}
