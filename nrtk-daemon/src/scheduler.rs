//! Repeats a sync cycle at a fixed interval, or runs it once.
//!
//! The scheduler knows nothing about fetching or files: it calls a cycle
//! closure and counts outcomes. Cycles run inline, so they never overlap and
//! a shutdown request is only seen while sleeping between cycles.

use std::time::Duration;

use tokio::sync::broadcast;

use nrtk_sync::{CycleOutcome, SyncError};

use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// A single cycle; its error is the process result.
    Once,
    /// A cycle every `Duration`, until shutdown.
    Every(Duration),
}

impl Schedule {
    pub fn from_interval(interval: Option<Duration>) -> Self {
        match interval {
            Some(interval) if !interval.is_zero() => Schedule::Every(interval),
            _ => Schedule::Once,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub cycles: u64,
    pub updated: u64,
    pub failed: u64,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    schedule: Schedule,
    max_cycles: Option<u64>,
}

impl Scheduler {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            max_cycles: None,
        }
    }

    /// Stop after `max` cycles even in repeat mode.
    pub fn with_max_cycles(mut self, max: u64) -> Self {
        self.max_cycles = Some(max);
        self
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub async fn run<C>(
        &self,
        mut cycle: C,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<SchedulerSummary, DaemonError>
    where
        C: FnMut() -> Result<CycleOutcome, SyncError>,
    {
        let mut summary = SchedulerSummary::default();
        tracing::info!(schedule = ?self.schedule, "starting update");

        loop {
            summary.cycles += 1;
            match cycle() {
                Ok(outcome) => {
                    if outcome.is_update() {
                        summary.updated += 1;
                    }
                }
                Err(err) => {
                    summary.failed += 1;
                    if self.schedule == Schedule::Once {
                        return Err(err.into());
                    }
                    tracing::warn!(error = %err, "update unsuccessful; retrying next cycle");
                }
            }

            let Schedule::Every(interval) = self.schedule else {
                break;
            };
            if self.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }

            tracing::debug!(secs = interval.as_secs(), "waiting for next cycle");
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested; stopping");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            updated = summary.updated,
            failed = summary.failed,
            "scheduler finished",
        );
        Ok(summary)
    }
}
