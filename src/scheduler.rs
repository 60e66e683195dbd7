// src/scheduler.rs
//! The post loop: pick a kind from the cycle, compose, publish, record,
//! sleep a random interval in cancellable slices, repeat.

use metrics::{counter, gauge};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::watch;

use crate::compose::{PostComposer, PostKind};
use crate::config::BotConfig;
use crate::notify::publisher::Publisher;
use crate::telemetry;

/// The only long-lived mutable state of the loop. Touched once per iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleState {
    pub cycle_index: usize,
    pub consecutive_failures: u32,
    pub iterations: u32,
}

impl CycleState {
    /// Advance the cycle by exactly one step regardless of outcome.
    pub fn record(&mut self, success: bool, cycle_len: usize) {
        if success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        self.cycle_index = (self.cycle_index + 1) % cycle_len.max(1);
        self.iterations = self.iterations.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown requested from outside.
    Cancelled,
    /// Consecutive failures reached the ceiling.
    FailureCeiling,
    /// The configured number of iterations ran.
    PostLimit,
}

impl StopReason {
    /// Only systemic failure is a non-zero exit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StopReason::FailureCeiling)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerCfg {
    pub cycle: Vec<PostKind>,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub sleep_slice: Duration,
    pub failure_ceiling: u32,
    pub max_posts: Option<u32>,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self::from_bot(&BotConfig::default())
    }
}

impl SchedulerCfg {
    pub fn from_bot(cfg: &BotConfig) -> Self {
        Self {
            cycle: cfg.cycle.clone(),
            min_delay: Duration::from_secs(cfg.min_delay_secs),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
            sleep_slice: Duration::from_secs(cfg.sleep_slice_secs),
            failure_ceiling: cfg.failure_ceiling,
            max_posts: cfg.max_posts,
        }
    }
}

pub struct Scheduler {
    composer: Box<dyn PostComposer>,
    publisher: Box<dyn Publisher>,
    cfg: SchedulerCfg,
    state: CycleState,
    shutdown: watch::Receiver<bool>,
    rng: StdRng,
}

impl Scheduler {
    pub fn new(
        composer: Box<dyn PostComposer>,
        publisher: Box<dyn Publisher>,
        mut cfg: SchedulerCfg,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        if cfg.cycle.is_empty() {
            cfg.cycle = vec![PostKind::Price, PostKind::News];
        }
        if cfg.min_delay > cfg.max_delay {
            std::mem::swap(&mut cfg.min_delay, &mut cfg.max_delay);
        }
        if cfg.sleep_slice.is_zero() {
            cfg.sleep_slice = Duration::from_secs(1);
        }
        cfg.failure_ceiling = cfg.failure_ceiling.max(1);
        Self {
            composer,
            publisher,
            cfg,
            state: CycleState::default(),
            shutdown,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn next_delay(&mut self) -> Duration {
        let lo = self.cfg.min_delay.as_millis() as u64;
        let hi = self.cfg.max_delay.as_millis() as u64;
        Duration::from_millis(self.rng.random_range(lo..=hi))
    }

    /// Sleep `total` in slices, checking for cancellation before each one.
    /// Returns `false` if cancelled.
    async fn sleep_cancellable(&self, total: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.is_cancelled() {
                return false;
            }
            let slice = remaining.min(self.cfg.sleep_slice);
            tokio::time::sleep(slice).await;
            remaining = remaining.saturating_sub(slice);
        }
        !self.is_cancelled()
    }

    /// acquiring -> posting. `true` when the feed accepted a post.
    async fn step(&self, kind: PostKind) -> bool {
        let Some(post) = self.composer.compose(kind).await else {
            tracing::warn!(kind = kind.as_str(), "no publishable content, skipping post");
            counter!(telemetry::POSTS_FAILED, "kind" => kind.as_str(), "reason" => "no_content")
                .increment(1);
            return false;
        };
        if self.publisher.publish(&post.text).await {
            counter!(telemetry::POSTS_PUBLISHED, "kind" => kind.as_str()).increment(1);
            true
        } else {
            counter!(telemetry::POSTS_FAILED, "kind" => kind.as_str(), "reason" => "publish")
                .increment(1);
            false
        }
    }

    pub async fn run(&mut self) -> StopReason {
        telemetry::ensure_described();
        tracing::info!(
            cycle = ?self.cfg.cycle,
            failure_ceiling = self.cfg.failure_ceiling,
            max_posts = ?self.cfg.max_posts,
            "scheduler started"
        );

        loop {
            if self.is_cancelled() {
                tracing::info!(iterations = self.state.iterations, "shutdown requested");
                return StopReason::Cancelled;
            }

            let kind = self.cfg.cycle[self.state.cycle_index];
            let success = self.step(kind).await;
            self.state.record(success, self.cfg.cycle.len());
            gauge!(telemetry::CONSECUTIVE_FAILURES).set(self.state.consecutive_failures as f64);
            tracing::info!(
                kind = kind.as_str(),
                success,
                consecutive_failures = self.state.consecutive_failures,
                next_index = self.state.cycle_index,
                "cycle step done"
            );

            if self.state.consecutive_failures >= self.cfg.failure_ceiling {
                tracing::error!(
                    failures = self.state.consecutive_failures,
                    "consecutive failure ceiling reached, stopping"
                );
                return StopReason::FailureCeiling;
            }
            if self
                .cfg
                .max_posts
                .is_some_and(|max| self.state.iterations >= max)
            {
                tracing::info!(iterations = self.state.iterations, "post limit reached");
                return StopReason::PostLimit;
            }

            let delay = self.next_delay();
            tracing::info!(wait_mins = delay.as_secs_f64() / 60.0, "waiting before next post");
            if !self.sleep_cancellable(delay).await {
                tracing::info!(iterations = self.state.iterations, "shutdown requested during sleep");
                return StopReason::Cancelled;
            }
        }
    }
}
