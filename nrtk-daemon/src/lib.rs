//! Scheduler runtime for `nrtk-sync run`: tracing setup, the repeat loop and
//! ctrl-c handling.

mod error;
pub mod log_rotation;
pub mod logging;
pub mod scheduler;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use nrtk_core::SyncConfig;
use nrtk_sync::lock::SyncLock;
use nrtk_sync::{Fetcher, HttpFetcher, Synchronizer};

pub use error::DaemonError;
pub use log_rotation::RotatingLog;
pub use logging::init_tracing;
pub use scheduler::{Schedule, Scheduler, SchedulerSummary};

use crate::error::io_err;

/// Build the HTTP synchronizer from `config` and run the scheduler on a
/// current-thread runtime until it finishes or ctrl-c is received.
pub fn start_blocking(
    config: &SyncConfig,
    log: Option<Arc<RotatingLog>>,
) -> Result<SchedulerSummary, DaemonError> {
    let fetcher = HttpFetcher::new(
        &config.api_url,
        &config.api_token,
        &config.auth_scheme,
        config.timeout,
    )?;
    let sync = Synchronizer::new(fetcher, config.layout.clone());
    let scheduler = Scheduler::new(Schedule::from_interval(config.interval));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(&sync, &scheduler, log))
}

/// Run `scheduler` over `sync`.
///
/// The sync lock is held for the whole run and the committed tracker value
/// is read once, then carried from cycle to cycle.
pub async fn run<F: Fetcher>(
    sync: &Synchronizer<F>,
    scheduler: &Scheduler,
    log: Option<Arc<RotatingLog>>,
) -> Result<SchedulerSummary, DaemonError> {
    let _lock = SyncLock::acquire(&sync.layout().lock_path())?;
    let mut tracked = sync.tracker().read_current()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let signal_handle = shutdown_listener(scheduler.schedule(), shutdown_tx.clone());
    if signal_handle.is_some() {
        // Let the signal task install its handler before the first cycle
        // blocks this thread.
        tokio::task::yield_now().await;
    }

    let result = scheduler
        .run(
            || {
                if let Some(log) = &log {
                    log.rotate_logged();
                }
                let report = sync.cycle(tracked.as_ref(), false)?;
                tracked = report.tracked;
                Ok(report.outcome)
            },
            shutdown_rx,
        )
        .await;

    if let Some(handle) = signal_handle {
        handle.abort();
    }
    drop(shutdown_tx);
    result
}

/// Turn ctrl-c into a shutdown request between cycles.
///
/// Only repeat mode listens. A single cycle keeps the default SIGINT action,
/// so ctrl-c still interrupts a stalled fetch.
fn shutdown_listener(
    schedule: Schedule,
    shutdown: broadcast::Sender<()>,
) -> Option<JoinHandle<()>> {
    if schedule == Schedule::Once {
        return None;
    }
    Some(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("received ctrl-c, stopping after the current cycle");
                let _ = shutdown.send(());
            }
            Err(err) => tracing::warn!(error = %err, "ctrl-c handler unavailable"),
        }
    }))
}
