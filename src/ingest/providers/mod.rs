// src/ingest/providers/mod.rs
pub mod news_api;
pub mod rss;
