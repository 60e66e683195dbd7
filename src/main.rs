//! crypto-pulse-bot — binary entrypoint.
//! Loads credentials and config, wires the newsroom and publisher, and runs
//! the post loop until shutdown, the failure ceiling, or the post limit.

use std::process::ExitCode;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crypto_pulse_bot::bootstrap::BotRuntime;
use crypto_pulse_bot::{Scheduler, SchedulerCfg};

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crypto_pulse_bot=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// Flip the shutdown flag on ctrl-c (and SIGTERM on unix).
fn spawn_shutdown_listener(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable, ctrl-c only");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("shutdown signal received");
        let _ = tx.send(true);
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let runtime = match BotRuntime::from_env() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("startup failed: {e:#}");
            return ExitCode::from(2);
        }
    };

    let (tx, rx) = watch::channel(false);
    spawn_shutdown_listener(tx);

    let BotRuntime {
        cfg,
        newsroom,
        publisher,
    } = runtime;
    let mut scheduler = Scheduler::new(
        Box::new(newsroom),
        Box::new(publisher),
        SchedulerCfg::from_bot(&cfg),
        rx,
    );

    let reason = scheduler.run().await;
    tracing::info!(?reason, state = ?scheduler.state(), "bot stopped");
    if reason.is_fatal() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
