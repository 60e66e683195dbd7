// src/ingest/mod.rs
pub mod aggregator;
pub mod extract;
pub mod providers;
pub mod types;

use crate::ingest::types::{FeedEntry, FeedSource, MissingTimestamp};
use crate::telemetry;
use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;

fn re_urls() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").unwrap())
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[a-z!][^>]*>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Remove every `http(s)://...` or `www....` run up to the next whitespace.
pub fn strip_urls(s: &str) -> String {
    re_urls().replace_all(s, "").into_owned()
}

/// Normalize text for posting: decode entities, strip tags and URLs,
/// fold typographic quotes, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    // 1) Strip literal tags
    let out = re_tags().replace_all(s, " ");

    // 2) HTML entity decode, then strip any markup the decode produced
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = re_tags().replace_all(&out, " ");

    // 3) URLs (after decoding, so `&amp;` inside links is part of the run)
    let out = strip_urls(&out);

    // 4) Normalize “ ” ‘ ’ « » to ASCII quotes
    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 5) Collapse whitespace (includes NBSP)
    re_ws().replace_all(&out, " ").trim().to_string()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Sort most-recent first. Entries without a timestamp rank per `policy`;
/// ties keep document order.
pub fn sort_most_recent(entries: &mut [FeedEntry], policy: MissingTimestamp, now: DateTime<Utc>) {
    let rank = |e: &FeedEntry| match (e.published_at, policy) {
        (Some(ts), _) => ts,
        (None, MissingTimestamp::Newest) => now,
        (None, MissingTimestamp::Oldest) => DateTime::<Utc>::MIN_UTC,
    };
    entries.sort_by_key(|e| std::cmp::Reverse(rank(e)));
}

/// Fetch one source and sort its entries. Never fails: errors become "no entries".
pub async fn fetch_sorted(
    source: &dyn FeedSource,
    policy: MissingTimestamp,
) -> Vec<FeedEntry> {
    match source.fetch_entries().await {
        Ok(mut entries) => {
            sort_most_recent(&mut entries, policy, Utc::now());
            entries
        }
        Err(e) => {
            tracing::warn!(error = ?e, source = source.name(), "feed error");
            counter!(telemetry::FEED_ERRORS).increment(1);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(title: &str, ts: Option<i64>) -> FeedEntry {
        FeedEntry {
            title: title.into(),
            link: format!("https://news.example/{title}"),
            published_at: ts.map(|t| Utc.timestamp_opt(t, 0).unwrap()),
            summary: None,
            embedded_content: None,
        }
    }

    fn titles(v: &[FeedEntry]) -> Vec<&str> {
        v.iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn url_strip_then_collapse() {
        assert_eq!(
            clean_text("Check this https://x.example/abc out!!"),
            "Check this out!!"
        );
    }

    #[test]
    fn clean_text_strips_markup_and_entities() {
        let s = "<p>Bitcoin&nbsp;<b>rallies</b> &ldquo;hard&rdquo;</p>\n\n see www.example.com/x";
        assert_eq!(clean_text(s), r#"Bitcoin rallies "hard" see"#);
    }

    #[test]
    fn escaped_markup_never_survives_cleaning() {
        let s = "Ether &lt;b&gt;rises&lt;/b&gt; &lt;script&gt;x&lt;/script&gt; today";
        assert_eq!(clean_text(s), "Ether rises x today");
        // a bare less-than is text, not markup
        assert_eq!(clean_text("fees &lt; 1 gwei"), "fees < 1 gwei");
    }

    #[test]
    fn clean_text_keeps_trailing_punctuation_and_empty() {
        assert_eq!(clean_text("Wow!!"), "Wow!!");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn missing_timestamp_oldest_sorts_last() {
        let now = Utc.timestamp_opt(10_000, 0).unwrap();
        let mut v = vec![entry("undated", None), entry("old", Some(100)), entry("new", Some(900))];
        sort_most_recent(&mut v, MissingTimestamp::Oldest, now);
        assert_eq!(titles(&v), vec!["new", "old", "undated"]);
    }

    #[test]
    fn missing_timestamp_newest_sorts_as_fetch_time() {
        let now = Utc.timestamp_opt(500, 0).unwrap();
        let mut v = vec![entry("old", Some(100)), entry("undated", None), entry("future", Some(900))];
        sort_most_recent(&mut v, MissingTimestamp::Newest, now);
        assert_eq!(titles(&v), vec!["future", "undated", "old"]);
    }
}
