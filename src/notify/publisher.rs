// src/notify/publisher.rs
use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::telemetry;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// `true` only once the feed confirmed creation. Never errors.
    async fn publish(&self, text: &str) -> bool;
}

#[derive(Clone, Copy, Debug)]
pub struct PublisherCfg {
    /// Total post attempts, rate-limited ones included.
    pub max_attempts: u32,
    /// Fixed wait after a 429.
    pub rate_limit_cooldown: Duration,
    /// Other failures wait `backoff_unit * attempt`.
    pub backoff_unit: Duration,
    pub timeout: Duration,
}

impl Default for PublisherCfg {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_cooldown: Duration::from_secs(15 * 60),
            backoff_unit: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Created,
    RateLimited,
    Failed(String),
}

pub fn classify(status: StatusCode) -> AttemptOutcome {
    match status {
        StatusCode::CREATED => AttemptOutcome::Created,
        StatusCode::TOO_MANY_REQUESTS => AttemptOutcome::RateLimited,
        other => AttemptOutcome::Failed(format!("HTTP {other}")),
    }
}

#[derive(Serialize)]
struct PostBody<'a> {
    text: &'a str,
}

/// Posts to the X v2 `tweets` endpoint with a bearer token.
#[derive(Clone)]
pub struct XPublisher {
    endpoint: String,
    token: String,
    client: Client,
    cfg: PublisherCfg,
}

impl XPublisher {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            client,
            cfg: PublisherCfg::default(),
        }
    }

    pub fn with_cfg(mut self, cfg: PublisherCfg) -> Self {
        self.cfg = cfg;
        self
    }

    async fn attempt(&self, text: &str) -> AttemptOutcome {
        counter!(telemetry::PUBLISH_ATTEMPTS).increment(1);
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .timeout(self.cfg.timeout)
            .json(&PostBody { text })
            .send()
            .await;
        match res {
            Ok(rsp) => match classify(rsp.status()) {
                AttemptOutcome::Failed(reason) => {
                    let body = rsp.text().await.unwrap_or_default();
                    let snippet: String = body.chars().take(200).collect();
                    AttemptOutcome::Failed(format!("{reason}: {snippet}"))
                }
                outcome => outcome,
            },
            Err(e) => AttemptOutcome::Failed(format!("request failed: {e}")),
        }
    }
}

#[async_trait]
impl Publisher for XPublisher {
    async fn publish(&self, text: &str) -> bool {
        let max = self.cfg.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let wait = match self.attempt(text).await {
                AttemptOutcome::Created => {
                    tracing::info!(attempt, chars = text.chars().count(), "posted");
                    return true;
                }
                AttemptOutcome::RateLimited => {
                    counter!(telemetry::PUBLISH_RATE_LIMITED).increment(1);
                    tracing::warn!(attempt, "rate limited by feed");
                    self.cfg.rate_limit_cooldown
                }
                AttemptOutcome::Failed(reason) => {
                    tracing::warn!(attempt, %reason, "post failed");
                    self.cfg.backoff_unit * attempt
                }
            };
            if attempt >= max {
                tracing::error!(attempts = attempt, "giving up on post");
                return false;
            }
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_created_counts_as_success() {
        assert_eq!(classify(StatusCode::CREATED), AttemptOutcome::Created);
        assert_eq!(
            classify(StatusCode::TOO_MANY_REQUESTS),
            AttemptOutcome::RateLimited
        );
        assert!(matches!(classify(StatusCode::OK), AttemptOutcome::Failed(_)));
        assert!(matches!(
            classify(StatusCode::FORBIDDEN),
            AttemptOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_exhausts_budget() {
        let p = XPublisher::new("http://127.0.0.1:9/2/tweets", "t", Client::new()).with_cfg(
            PublisherCfg {
                max_attempts: 2,
                rate_limit_cooldown: Duration::from_millis(1),
                backoff_unit: Duration::from_millis(1),
                timeout: Duration::from_secs(2),
            },
        );
        assert!(!p.publish("hello").await);
    }
}
