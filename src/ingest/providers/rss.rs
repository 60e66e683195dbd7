// src/ingest/providers/rss.rs
//! Syndication feed source: RSS 2.0 and Atom, fetched over HTTP or parsed from a fixture.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::types::{FeedEntry, FeedSource};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    // `content:encoded`; the deserializer matches on local names
    #[serde(rename = "encoded")]
    content_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|e| {
            // Named zones are common in the wild; normalize the UTC ones.
            ["GMT", "UTC", "UT", "Z"]
                .iter()
                .find_map(|z| ts.strip_suffix(z))
                .map(|head| OffsetDateTime::parse(&format!("{}+0000", head), &Rfc2822))
                .unwrap_or(Err(e))
        })
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), 0))
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), 0))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn from_rss(rss: Rss) -> Vec<FeedEntry> {
    rss.channel
        .item
        .into_iter()
        .filter_map(|it| {
            let title = non_empty(it.title)?;
            let link = non_empty(it.link)?;
            Some(FeedEntry {
                title,
                link,
                // Malformed dates count as missing; ranking policy decides the rest.
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
                summary: non_empty(it.description),
                embedded_content: non_empty(it.content_encoded),
            })
        })
        .collect()
}

fn from_atom(feed: AtomFeed) -> Vec<FeedEntry> {
    feed.entry
        .into_iter()
        .filter_map(|e| {
            let title = non_empty(e.title.map(|t| t.value))?;
            let link = e
                .links
                .iter()
                .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
                .or_else(|| e.links.first())
                .and_then(|l| non_empty(l.href.clone()))?;
            let published_at = e
                .published
                .as_deref()
                .and_then(parse_rfc3339)
                .or_else(|| e.updated.as_deref().and_then(parse_rfc3339));
            Some(FeedEntry {
                title,
                link,
                published_at,
                summary: non_empty(e.summary.map(|t| t.value)),
                embedded_content: non_empty(e.content.map(|t| t.value)),
            })
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum Dialect {
    Rss,
    Atom,
}

/// The deserializer ignores the root element name, so sniff it first.
fn sniff_dialect(xml: &str) -> Option<Dialect> {
    let rss = xml.find("<rss");
    let atom = xml.find("<feed");
    match (rss, atom) {
        (Some(r), Some(a)) if a < r => Some(Dialect::Atom),
        (Some(_), _) => Some(Dialect::Rss),
        (None, Some(_)) => Some(Dialect::Atom),
        (None, None) => None,
    }
}

/// Parse an RSS 2.0 or Atom document into entries, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let xml_clean = scrub_html_entities_for_xml(xml.trim_start_matches('\u{feff}'));
    match sniff_dialect(&xml_clean) {
        Some(Dialect::Rss) => {
            let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
            Ok(from_rss(rss))
        }
        Some(Dialect::Atom) => {
            let feed: AtomFeed = from_str(&xml_clean).context("parsing atom xml")?;
            Ok(from_atom(feed))
        }
        None => Err(anyhow!("not an rss or atom document")),
    }
}

pub struct RssFeedSource {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
        timeout: Duration,
    },
}

impl RssFeedSource {
    pub fn from_url(url: impl Into<String>, client: reqwest::Client, timeout: Duration) -> Self {
        let url = url.into();
        Self {
            name: url.clone(),
            mode: Mode::Http {
                url,
                client,
                timeout,
            },
        }
    }

    pub fn from_fixture_str(name: &str, xml: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>> {
        match &self.mode {
            Mode::Fixture(s) => parse_feed(s),
            Mode::Http {
                url,
                client,
                timeout,
            } => {
                let body = client
                    .get(url)
                    .timeout(*timeout)
                    .send()
                    .await
                    .context("feed http get()")?
                    .error_for_status()
                    .context("feed non-2xx")?
                    .text()
                    .await
                    .context("feed http .text()")?;
                parse_feed(&body).with_context(|| format!("parsing feed {url}"))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn re_named_entity() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap())
}

/// XML only predefines five entities; feeds routinely carry HTML ones
/// (`&nbsp;`, `&eacute;`, ...) that make the whole document unparsable.
/// Decode those to characters, escape unknown ones as literal text.
fn scrub_html_entities_for_xml(s: &str) -> String {
    re_named_entity()
        .replace_all(s, |caps: &regex::Captures| {
            let whole = &caps[0];
            match &caps[1] {
                "amp" | "lt" | "gt" | "quot" | "apos" => whole.to_string(),
                _ => {
                    let decoded = html_escape::decode_html_entities(whole);
                    if decoded == whole {
                        format!("&amp;{}", &whole[1..])
                    } else {
                        html_escape::encode_text(&decoded).into_owned()
                    }
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Chain Daily</title>
    <item>
      <title>ETF inflows hit record</title>
      <link>https://chain.example/etf</link>
      <pubDate>Tue, 07 Oct 2025 09:30:00 +0000</pubDate>
      <description><![CDATA[<p>Short teaser&nbsp;text</p>]]></description>
      <content:encoded><![CDATA[<p>Full body</p>]]></content:encoded>
    </item>
    <item>
      <title>Undated item</title>
      <link>https://chain.example/undated</link>
      <pubDate>sometime last week</pubDate>
    </item>
    <item>
      <title>No link, dropped</title>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Protocol Notes</title>
  <entry>
    <title type="html">Layer 2 fees fall</title>
    <link rel="self" href="https://proto.example/self"/>
    <link rel="alternate" href="https://proto.example/l2"/>
    <updated>2025-10-06T12:00:00Z</updated>
    <summary>Fees dropped after the upgrade.</summary>
  </entry>
</feed>"#;

    #[test]
    fn rss_items_parse_with_optional_fields() {
        let out = parse_feed(RSS).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "ETF inflows hit record");
        assert_eq!(out[0].published_at.unwrap().timestamp(), 1_759_829_400);
        assert_eq!(out[0].embedded_content.as_deref(), Some("<p>Full body</p>"));
        assert!(out[0].summary.as_deref().unwrap().contains("teaser"));
        assert!(out[1].published_at.is_none());
        assert!(out[1].summary.is_none());
    }

    #[test]
    fn atom_entries_prefer_alternate_link() {
        let out = parse_feed(ATOM).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, "https://proto.example/l2");
        assert_eq!(out[0].title, "Layer 2 fees fall");
        assert!(out[0].published_at.is_some());
    }

    #[test]
    fn html_named_entities_do_not_break_the_feed() {
        let xml = r#"<rss version="2.0"><channel>
  <item>
    <title>Caf&eacute; chain accepts BTC &mdash; &euro;5 minimum &amp; no fees</title>
    <link>https://chain.example/cafe</link>
    <description>Rollout &bogus; starts&nbsp;today</description>
  </item>
</channel></rss>"#;
        let out = parse_feed(xml).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Café chain accepts BTC — €5 minimum & no fees");
        assert_eq!(
            out[0].summary.as_deref(),
            Some("Rollout &bogus; starts\u{a0}today")
        );
    }

    #[test]
    fn named_utc_zones_are_accepted() {
        let a = parse_rfc2822("Tue, 07 Oct 2025 09:30:00 GMT").unwrap();
        let b = parse_rfc2822("Tue, 07 Oct 2025 09:30:00 +0000").unwrap();
        assert_eq!(a, b);
        assert!(parse_rfc2822("Tue, 07 Oct 2025 09:30:00 XYZ").is_none());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_feed("<html><body>nope</body></html>").is_err());
        assert!(parse_feed("").is_err());
    }

    #[tokio::test]
    async fn fixture_source_yields_entries() {
        let src = RssFeedSource::from_fixture_str("chain", RSS);
        assert_eq!(src.name(), "chain");
        assert_eq!(src.fetch_entries().await.unwrap().len(), 2);
    }
}
