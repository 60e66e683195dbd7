// src/ingest/extract.rs
//! Article text extraction: embedded content, then a substantive summary,
//! then a live page scrape. Always returns some text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::types::FeedEntry;
use crate::ingest::{char_len, clean_text};

/// A summary longer than this is treated as the article, not a teaser.
pub const MIN_SUMMARY_CHARS: usize = 300;
pub const MAX_PARAGRAPHS: usize = 5;
const FALLBACK_SEPARATOR: &str = " — ";

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPageFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("article http get()")?
            .error_for_status()
            .context("article non-2xx")?
            .text()
            .await
            .context("article http .text()")
    }
}

fn re_script_style() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>").unwrap()
    })
}

fn paragraph_selector() -> &'static Selector {
    static SEL: OnceCell<Selector> = OnceCell::new();
    SEL.get_or_init(|| Selector::parse("p").unwrap())
}

/// Visible text of the first `max` paragraphs, script/style removed first.
/// Empty paragraphs do not count toward `max`.
pub fn scrape_paragraphs(html: &str, max: usize) -> String {
    let stripped = re_script_style().replace_all(html, " ");
    let doc = Html::parse_document(&stripped);
    doc.select(paragraph_selector())
        .map(|p| p.text().collect::<String>())
        .map(|t| clean_text(&t))
        .filter(|t| !t.is_empty())
        .take(max)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct ArticleExtractor {
    fetcher: Arc<dyn PageFetcher>,
    min_summary_chars: usize,
    max_paragraphs: usize,
}

impl ArticleExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            min_summary_chars: MIN_SUMMARY_CHARS,
            max_paragraphs: MAX_PARAGRAPHS,
        }
    }

    pub async fn extract(&self, entry: &FeedEntry) -> String {
        if let Some(content) = entry.embedded_content.as_deref() {
            if !clean_text(content).is_empty() {
                return content.to_string();
            }
        }

        if let Some(summary) = entry.summary.as_deref() {
            if char_len(&clean_text(summary)) > self.min_summary_chars {
                return summary.to_string();
            }
        }

        match self.fetcher.fetch_page(&entry.link).await {
            Ok(html) => {
                let text = scrape_paragraphs(&html, self.max_paragraphs);
                if !text.is_empty() {
                    return text;
                }
                tracing::debug!(link = %entry.link, "scrape found no paragraphs");
            }
            Err(e) => {
                tracing::debug!(error = ?e, link = %entry.link, "scrape failed");
            }
        }

        format!(
            "{}{}{}",
            entry.title,
            FALLBACK_SEPARATOR,
            entry.summary.as_deref().unwrap_or_default()
        )
    }
}
