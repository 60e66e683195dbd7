// src/telemetry.rs
//! Metric names used across the bot. Only the `metrics` facade is used here;
//! whoever hosts the process may install a recorder.

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

pub const POSTS_PUBLISHED: &str = "posts_published_total";
pub const POSTS_FAILED: &str = "posts_failed_total";
pub const ACQUIRE_TIER: &str = "acquire_tier_total";
pub const ACQUIRE_ABSENT: &str = "acquire_absent_total";
pub const PUBLISH_ATTEMPTS: &str = "publish_attempts_total";
pub const PUBLISH_RATE_LIMITED: &str = "publish_rate_limited_total";
pub const FEED_ERRORS: &str = "feed_errors_total";
pub const CONSECUTIVE_FAILURES: &str = "scheduler_consecutive_failures";

/// One-time metrics registration (so series carry descriptions once a recorder exists).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(POSTS_PUBLISHED, "Posts accepted by the feed, by kind.");
        describe_counter!(
            POSTS_FAILED,
            "Cycle steps that produced no content or failed to publish."
        );
        describe_counter!(ACQUIRE_TIER, "Raw articles produced, by fallback tier.");
        describe_counter!(
            ACQUIRE_ABSENT,
            "Acquisitions that exhausted every tier and attempt."
        );
        describe_counter!(PUBLISH_ATTEMPTS, "HTTP post attempts made by the publisher.");
        describe_counter!(PUBLISH_RATE_LIMITED, "Publish attempts answered with 429.");
        describe_counter!(FEED_ERRORS, "Feed fetch/parse errors.");
        describe_gauge!(
            CONSECUTIVE_FAILURES,
            "Back-to-back unsuccessful cycle iterations."
        );
    });
}
