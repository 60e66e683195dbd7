// tests/scheduler_loop.rs
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use crypto_pulse_bot::{
    PostCandidate, PostComposer, PostKind, Publisher, Scheduler, SchedulerCfg, StopReason,
};

/// Records requested kinds; produces a post unless told to come up empty.
#[derive(Clone, Default)]
struct RecordingComposer {
    kinds: Arc<Mutex<Vec<PostKind>>>,
    empty: bool,
}

#[async_trait]
impl PostComposer for RecordingComposer {
    async fn compose(&self, kind: PostKind) -> Option<PostCandidate> {
        self.kinds.lock().unwrap().push(kind);
        (!self.empty).then(|| PostCandidate {
            text: format!("{} post", kind.as_str()),
            kind,
        })
    }
}

/// Replays scripted outcomes, then `default_ok`.
#[derive(Clone)]
struct ScriptedPublisher {
    script: Arc<Mutex<VecDeque<bool>>>,
    default_ok: bool,
    posted: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPublisher {
    fn new(script: impl IntoIterator<Item = bool>, default_ok: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            default_ok,
            posted: Arc::default(),
        }
    }
}

#[async_trait]
impl Publisher for ScriptedPublisher {
    async fn publish(&self, text: &str) -> bool {
        self.posted.lock().unwrap().push(text.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_ok)
    }
}

fn instant_cfg(max_posts: Option<u32>) -> SchedulerCfg {
    SchedulerCfg {
        cycle: vec![PostKind::Price, PostKind::News, PostKind::News, PostKind::News],
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        sleep_slice: Duration::from_millis(1),
        failure_ceiling: 5,
        max_posts,
    }
}

#[tokio::test]
async fn kinds_follow_the_cycle_and_wrap() {
    let composer = RecordingComposer::default();
    let publisher = ScriptedPublisher::new([], true);
    let (_tx, rx) = watch::channel(false);

    let mut s = Scheduler::new(
        Box::new(composer.clone()),
        Box::new(publisher.clone()),
        instant_cfg(Some(8)),
        rx,
    );
    assert_eq!(s.run().await, StopReason::PostLimit);

    use PostKind::{News, Price};
    assert_eq!(
        *composer.kinds.lock().unwrap(),
        vec![Price, News, News, News, Price, News, News, News]
    );
    assert_eq!(s.state().iterations, 8);
    assert_eq!(s.state().cycle_index, 0);
    assert_eq!(s.state().consecutive_failures, 0);
    assert_eq!(publisher.posted.lock().unwrap()[0], "price post");
}

#[tokio::test]
async fn stops_exactly_at_the_failure_ceiling() {
    let composer = RecordingComposer {
        empty: true,
        ..Default::default()
    };
    let publisher = ScriptedPublisher::new([], true);
    let (_tx, rx) = watch::channel(false);

    let mut s = Scheduler::new(
        Box::new(composer.clone()),
        Box::new(publisher.clone()),
        instant_cfg(None),
        rx,
    );
    let reason = s.run().await;

    assert_eq!(reason, StopReason::FailureCeiling);
    assert!(reason.is_fatal());
    assert_eq!(s.state().iterations, 5);
    assert_eq!(s.state().consecutive_failures, 5);
    assert!(publisher.posted.lock().unwrap().is_empty(), "nothing to publish");
}

#[tokio::test]
async fn a_success_resets_the_failure_streak() {
    let composer = RecordingComposer::default();
    // four failures, one success, then failures until the ceiling
    let publisher = ScriptedPublisher::new([false, false, false, false, true], false);
    let (_tx, rx) = watch::channel(false);

    let mut s = Scheduler::new(
        Box::new(composer),
        Box::new(publisher.clone()),
        instant_cfg(None),
        rx,
    );
    assert_eq!(s.run().await, StopReason::FailureCeiling);
    assert_eq!(s.state().iterations, 10);
    assert_eq!(publisher.posted.lock().unwrap().len(), 10);
}

#[tokio::test]
async fn cancellation_before_start_runs_nothing() {
    let composer = RecordingComposer::default();
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let mut s = Scheduler::new(
        Box::new(composer.clone()),
        Box::new(ScriptedPublisher::new([], true)),
        instant_cfg(None),
        rx,
    );
    let reason = s.run().await;
    assert_eq!(reason, StopReason::Cancelled);
    assert!(!reason.is_fatal());
    assert_eq!(s.state().iterations, 0);
    assert!(composer.kinds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_the_inter_post_sleep() {
    let composer = RecordingComposer::default();
    let (tx, rx) = watch::channel(false);
    let cfg = SchedulerCfg {
        min_delay: Duration::from_secs(30),
        max_delay: Duration::from_secs(60),
        sleep_slice: Duration::from_millis(10),
        ..instant_cfg(None)
    };

    let mut s = Scheduler::new(
        Box::new(composer.clone()),
        Box::new(ScriptedPublisher::new([], true)),
        cfg,
        rx,
    )
    .with_seed(42);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = tx.send(true);
    });

    let reason = tokio::time::timeout(Duration::from_secs(5), s.run())
        .await
        .expect("sleep must observe cancellation within a slice");
    assert_eq!(reason, StopReason::Cancelled);
    assert_eq!(s.state().iterations, 1);
    assert_eq!(composer.kinds.lock().unwrap().len(), 1);
}

#[test]
fn random_delay_stays_within_bounds() {
    let (_tx, rx) = watch::channel(false);
    let cfg = SchedulerCfg {
        min_delay: Duration::from_secs(3_600),
        max_delay: Duration::from_secs(7_200),
        ..instant_cfg(None)
    };
    let mut s = Scheduler::new(
        Box::new(RecordingComposer::default()),
        Box::new(ScriptedPublisher::new([], true)),
        cfg,
        rx,
    )
    .with_seed(3);
    for _ in 0..200 {
        let d = s.next_delay();
        assert!(d >= Duration::from_secs(3_600) && d <= Duration::from_secs(7_200));
    }
}
