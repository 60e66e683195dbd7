//! AI adapter: completion-provider abstraction with a bounded retry budget.
//! Used both for summarization and for the generative news fallback.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Credentials;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const USER_AGENT: &str = "crypto-pulse-bot/0.1";

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Trait object used by the summarizer and the aggregator (and tests).
pub trait CompletionClient: Send + Sync {
    /// One system instruction + one user prompt in, free-form text out.
    /// Errors only after the provider's own retry budget is spent.
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynCompletion = Arc<dyn CompletionClient>;

// ------------------------------------------------------------
// OpenAI (Chat Completions API)
// ------------------------------------------------------------

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    timeout: Duration,
    max_retries: u8,
    backoff_unit: Duration,
}

impl OpenAiClient {
    pub fn new(
        http: reqwest::Client,
        creds: &Credentials,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let model = creds
            .openai_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            http,
            api_key: creds.openai_api_key.clone(),
            model,
            endpoint: endpoint.into(),
            timeout,
            max_retries: 3,
            backoff_unit: Duration::from_millis(500),
        }
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    async fn complete_once(&self, system: &str, user: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.7,
            max_tokens: 200,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&req)
            .send()
            .await
            .context("completion request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("completion HTTP status {status}");
        }
        let body: Resp = resp.json().await.context("completion json")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            bail!("completion returned empty content");
        }
        Ok(content)
    }

    async fn complete_impl(&self, system: &str, user: &str) -> Result<String> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.complete_once(system, user).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(error = ?e, attempt, "completion failed, retrying");
                    tokio::time::sleep(self.backoff_unit * (1u32 << (attempt - 1))).await;
                }
                Err(e) => {
                    return Err(e.context(format!("completion failed after {attempt} attempts")))
                }
            }
        }
    }
}

impl CompletionClient for OpenAiClient {
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.complete_impl(system, user))
    }
    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Scripted provider for tests/local runs. Replies are served in order; once
/// the script runs out, `fallback` is returned (or an error if none).
#[derive(Default)]
pub struct MockCompletion {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl MockCompletion {
    pub fn fixed(reply: &str) -> Self {
        Self {
            fallback: Some(reply.to_string()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn scripted<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, String>>,
    {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (system, user) pairs seen so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl CompletionClient for MockCompletion {
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.prompts.lock() {
            p.push((system.to_string(), user.to_string()));
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let out = match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(anyhow!(e)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| anyhow!("mock completion exhausted")),
        };
        Box::pin(async move { out })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_serves_script_then_fallback() {
        let m = MockCompletion {
            script: Mutex::new(VecDeque::from([Err("boom".to_string())])),
            fallback: Some("steady".into()),
            ..Default::default()
        };
        assert!(m.complete("s", "u1").await.is_err());
        assert_eq!(m.complete("s", "u2").await.unwrap(), "steady");
        assert_eq!(m.calls(), 2);
        assert_eq!(m.prompts()[1].1, "u2");
    }

    #[tokio::test]
    async fn openai_client_gives_up_after_budget() {
        let creds = Credentials {
            x_bearer_token: "x".into(),
            openai_api_key: "k".into(),
            openai_model: None,
        };
        // Port 9 (discard) is closed on loopback: every attempt fails fast.
        let client = OpenAiClient::new(
            reqwest::Client::new(),
            &creds,
            "http://127.0.0.1:9/v1/chat/completions",
            Duration::from_secs(2),
        )
        .with_retries(2)
        .with_backoff_unit(Duration::from_millis(1));
        let err = client.complete("s", "u").await.unwrap_err();
        assert!(format!("{err:#}").contains("after 2 attempts"));
    }
}
