// src/analyze/summarize.rs
//! Turns a raw article into a post: normalize, compress via the completion
//! service, then enforce the character cap locally.

use crate::analyze::ai_adapter::DynCompletion;
use crate::compose::{PostCandidate, PostKind};
use crate::ingest::types::{RawArticle, SourceKind};
use crate::ingest::{char_len, clean_text};
use crate::POST_CHAR_LIMIT;

pub const SUMMARY_SYSTEM_PROMPT: &str = "You write short posts about crypto news for a social feed. \
Remove all markup and links. Use plain, conversational language. \
Never give investment advice. Output only the post text.";

/// Input sent to the model is capped to bound prompt size.
const MAX_PROMPT_INPUT_CHARS: usize = 4_000;
/// A label that leaves less room than this for the post is ignored.
const MIN_BODY_CHARS: usize = 80;
const ELLIPSIS: char = '…';

/// Cap `text` at `limit` characters, cutting at the last whitespace at or
/// before `limit` so no word is split. An ellipsis is appended only when it
/// still fits. A single token longer than `limit` is hard-cut.
pub fn fit_to_budget(text: &str, limit: usize) -> String {
    let text = text.trim();
    if char_len(text) <= limit {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let cut = if chars[limit].is_whitespace() {
        Some(limit)
    } else {
        (1..limit).rev().find(|&i| chars[i].is_whitespace())
    };
    let Some(cut) = cut else {
        return chars[..limit].iter().collect();
    };
    let mut head: String = chars[..cut].iter().collect::<String>().trim_end().to_string();
    if char_len(&head) < limit {
        head.push(ELLIPSIS);
    }
    head
}

pub struct Summarizer {
    client: DynCompletion,
    char_limit: usize,
    synthetic_label: Option<String>,
}

impl Summarizer {
    pub fn new(client: DynCompletion) -> Self {
        Self {
            client,
            char_limit: POST_CHAR_LIMIT,
            synthetic_label: None,
        }
    }

    /// Prefix posts built from generated news with `label`.
    pub fn with_synthetic_label(mut self, label: Option<String>) -> Self {
        self.synthetic_label = label;
        self
    }

    fn label_for(&self, kind: SourceKind) -> Option<&str> {
        let label = self.synthetic_label.as_deref()?;
        let fits = self.char_limit.saturating_sub(char_len(label) + 1) >= MIN_BODY_CHARS;
        (kind == SourceKind::Generative && fits).then_some(label)
    }

    /// `None` only when there is nothing to summarize or the completion call
    /// fails after its own retries. Oversized replies are trimmed, not rejected.
    pub async fn summarize(&self, article: &RawArticle) -> Option<PostCandidate> {
        let normalized = clean_text(&article.text);
        if normalized.is_empty() {
            tracing::warn!(source = article.source_kind.as_str(), "nothing to summarize");
            return None;
        }

        let label = self.label_for(article.source_kind);
        let budget = match label {
            Some(l) => self.char_limit - char_len(l) - 1,
            None => self.char_limit,
        };

        let input: String = normalized.chars().take(MAX_PROMPT_INPUT_CHARS).collect();
        let prompt = format!(
            "Summarize this news as one post of at most {budget} characters:\n\n{input}"
        );

        let reply = match self.client.complete(SUMMARY_SYSTEM_PROMPT, &prompt).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    provider = self.client.provider_name(),
                    "summarization failed"
                );
                return None;
            }
        };

        let cleaned = clean_text(&reply);
        let cleaned = cleaned.trim_matches('"').trim();
        if cleaned.is_empty() {
            tracing::warn!("completion reply was empty after cleaning");
            return None;
        }
        if char_len(cleaned) > budget {
            tracing::debug!(len = char_len(cleaned), budget, "trimming oversized summary");
        }
        let body = fit_to_budget(cleaned, budget);

        let text = match label {
            Some(l) => format!("{l} {body}"),
            None => body,
        };
        Some(PostCandidate {
            text,
            kind: PostKind::News,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::ai_adapter::MockCompletion;
    use std::sync::Arc;

    fn raw(text: &str, kind: SourceKind) -> RawArticle {
        RawArticle {
            text: text.into(),
            source_kind: kind,
        }
    }

    #[test]
    fn fit_keeps_short_text() {
        assert_eq!(fit_to_budget("  short post ", 280), "short post");
    }

    #[test]
    fn fit_cuts_at_word_boundary_with_ellipsis() {
        let s = "alpha beta gamma";
        assert_eq!(fit_to_budget(s, 12), "alpha beta…");
        // boundary exactly at the limit: no room for the ellipsis
        assert_eq!(fit_to_budget(s, 10), "alpha beta");
    }

    #[test]
    fn fit_hard_cuts_a_single_giant_token() {
        let s = "x".repeat(300);
        assert_eq!(fit_to_budget(&s, 280).chars().count(), 280);
    }

    #[test]
    fn fit_never_splits_words_on_long_prose() {
        let words = ["bitcoin", "miners", "rally", "after", "halving", "étude"];
        let s: Vec<&str> = (0..200).map(|i| words[i % words.len()]).collect();
        let s = s.join(" ");
        let out = fit_to_budget(&s, 280);
        assert!(out.chars().count() <= 280);
        let body = out.trim_end_matches(ELLIPSIS);
        assert!(s.starts_with(body));
        let next = s[body.len()..].chars().next();
        assert!(next.map_or(true, char::is_whitespace));
    }

    #[tokio::test]
    async fn oversized_reply_is_corrected_in_place() {
        let long = format!("{} https://t.example/x", "Ether gains ground again ".repeat(30));
        let ai = Arc::new(MockCompletion::fixed(&long));
        let s = Summarizer::new(ai.clone());
        let post = s.summarize(&raw("Ether rises", SourceKind::Feed)).await.unwrap();
        assert!(post.text.chars().count() <= 280);
        assert!(!post.text.contains("http"));
        assert_eq!(post.kind, PostKind::News);
        assert_eq!(ai.calls(), 1);
    }

    #[tokio::test]
    async fn prompt_receives_normalized_text() {
        let ai = Arc::new(MockCompletion::fixed("ok post"));
        let s = Summarizer::new(ai.clone());
        s.summarize(&raw("<p>Check this https://x.example/abc out!!</p>", SourceKind::Feed))
            .await
            .unwrap();
        let (system, user) = ai.prompts().remove(0);
        assert!(system.contains("investment advice"));
        assert!(user.ends_with("Check this out!!"));
        assert!(user.contains("280 characters"));
    }

    #[tokio::test]
    async fn escaped_markup_in_reply_is_stripped() {
        let ai = Arc::new(MockCompletion::fixed(
            "Ether &lt;b&gt;rises&lt;/b&gt; &lt;script&gt;x&lt;/script&gt; today",
        ));
        let s = Summarizer::new(ai);
        let post = s.summarize(&raw("Ether rises", SourceKind::Feed)).await.unwrap();
        assert_eq!(post.text, "Ether rises x today");
        assert!(post.within_limit());
    }

    #[tokio::test]
    async fn completion_failure_is_absent() {
        let s = Summarizer::new(Arc::new(MockCompletion::failing()));
        assert!(s.summarize(&raw("Some news text", SourceKind::Feed)).await.is_none());
    }

    #[tokio::test]
    async fn empty_input_skips_the_call() {
        let ai = Arc::new(MockCompletion::fixed("x"));
        let s = Summarizer::new(ai.clone());
        assert!(s.summarize(&raw("<p> </p>", SourceKind::Feed)).await.is_none());
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn synthetic_label_only_on_generated_news_and_within_cap() {
        let ai = Arc::new(MockCompletion::fixed(&"word ".repeat(100)));
        let s = Summarizer::new(ai).with_synthetic_label(Some("[AI]".into()));
        let gen = s.summarize(&raw("gen", SourceKind::Generative)).await.unwrap();
        assert!(gen.text.starts_with("[AI] "));
        assert!(gen.text.chars().count() <= 280);
        let fed = s.summarize(&raw("feed", SourceKind::Feed)).await.unwrap();
        assert!(!fed.text.starts_with("[AI]"));
    }
}
