// src/ingest/providers/news_api.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::NewsApiCfg;
use crate::ingest::types::{Headline, HeadlineSource};

#[derive(Debug, Clone, Deserialize)]
struct ArticleDto {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

// --- tolerant response envelopes, checked in declaration order ---

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Data { data: Vec<ArticleDto> },
    Articles { articles: Vec<ArticleDto> },
}

impl Envelope {
    fn into_articles(self) -> Vec<ArticleDto> {
        match self {
            Envelope::Data { data } => data,
            Envelope::Articles { articles } => articles,
        }
    }
}

/// First article carrying both a title and a description, or `None` when the
/// body matches neither envelope.
pub fn parse_envelope(body: &str) -> Option<Headline> {
    let env: Envelope = serde_json::from_str(body.trim()).ok()?;
    env.into_articles().into_iter().find_map(|a| {
        let title = a.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
        let description = a
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())?;
        Some(Headline { title, description })
    })
}

pub struct NewsApiEndpoint {
    name: String,
    url: String,
    token_param: String,
    token: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl NewsApiEndpoint {
    pub fn new(
        cfg: &NewsApiCfg,
        token: String,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            name: cfg.name.clone(),
            url: cfg.url.clone(),
            token_param: cfg.token_param.clone(),
            token,
            client,
            timeout,
        }
    }

    /// Build from config, reading the token from the configured env var.
    /// Endpoints without a token are skipped (logged), never fatal.
    pub fn from_env(cfg: &NewsApiCfg, client: reqwest::Client, timeout: Duration) -> Option<Self> {
        match std::env::var(&cfg.token_env) {
            Ok(tok) if !tok.trim().is_empty() => {
                Some(Self::new(cfg, tok.trim().to_string(), client, timeout))
            }
            _ => {
                tracing::warn!(
                    api = %cfg.name,
                    env = %cfg.token_env,
                    "news api disabled: token env var missing"
                );
                None
            }
        }
    }
}

#[async_trait]
impl HeadlineSource for NewsApiEndpoint {
    async fn fetch_headline(&self) -> Result<Option<Headline>> {
        let body = self
            .client
            .get(&self.url)
            .query(&[(self.token_param.as_str(), self.token.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .context("news api get()")?
            .error_for_status()
            .context("news api non-2xx")?
            .text()
            .await
            .context("news api .text()")?;
        Ok(parse_envelope(&body))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
