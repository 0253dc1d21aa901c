//! Periodic job scheduler.
//!
//! Drives the control tick and the telemetry report from one monotonic
//! clock.  The scheduler notifies a [`SchedulerDelegate`] when a job comes
//! due; the main loop implements the delegate and dispatches into the
//! [`AppService`](crate::app::service::AppService).
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Job Sources                           │
//! │                                                              │
//! │        ┌──────────────────┐      ┌──────────────────┐        │
//! │        │   ControlTick    │      │    Telemetry     │        │
//! │        │ (timer_interval) │      │ (telemetry_secs) │        │
//! │        └────────┬─────────┘      └────────┬─────────┘        │
//! │                 │                         │                  │
//! │                 ▼                         ▼                  │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              SchedulerDelegate                         │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │                    AppService.tick()                         │
//! │                    AppService.handle_command()               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A job fires at most once per [`Scheduler::tick`] call.  If the caller
//! fell behind by several periods the missed firings are skipped, not
//! replayed, and the next deadline is re-armed from the current time.

use log::{debug, info, warn};

use crate::app::ports::SchedulerDelegate;
use crate::config::ControlConfig;

/// The jobs the firmware schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobId {
    /// One control-loop evaluation.
    ControlTick,
    /// Periodic telemetry snapshot.
    Telemetry,
}

/// Maximum number of concurrent jobs (stack-allocated).
const MAX_JOBS: usize = 4;

/// Internal bookkeeping for a live job.
#[derive(Debug, Clone, Copy)]
struct JobEntry {
    id: JobId,
    period_ms: u64,
    next_due_ms: u64,
}

/// The scheduler engine.
///
/// Decoupled from the event system: firing a job only invokes the delegate
/// callback.  This keeps the scheduler independently testable.
pub struct Scheduler {
    jobs: [Option<JobEntry>; MAX_JOBS],
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: [None; MAX_JOBS],
        }
    }

    /// Scheduler preloaded with the control tick and telemetry jobs.
    ///
    /// The first control tick is due one full period after `now_ms`.
    pub fn from_config(config: &ControlConfig, now_ms: u64) -> Self {
        let mut sched = Self::new();
        sched.add(JobId::ControlTick, u64::from(config.timer_interval_ms), now_ms);
        sched.add(
            JobId::Telemetry,
            u64::from(config.telemetry_interval_secs) * 1000,
            now_ms,
        );
        sched
    }

    /// Add (or replace) a periodic job.  Returns `false` if every slot is
    /// taken or `period_ms` is zero.
    pub fn add(&mut self, id: JobId, period_ms: u64, now_ms: u64) -> bool {
        if period_ms == 0 {
            warn!("Scheduler: refusing zero period for {:?}", id);
            return false;
        }
        let entry = JobEntry {
            id,
            period_ms,
            next_due_ms: now_ms.saturating_add(period_ms),
        };

        if let Some(slot) = self
            .jobs
            .iter_mut()
            .find(|s| s.is_some_and(|e| e.id == id))
        {
            *slot = Some(entry);
            info!("Scheduler: {:?} re-armed every {} ms", id, period_ms);
            return true;
        }
        match self.jobs.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(entry);
                info!("Scheduler: {:?} every {} ms", id, period_ms);
                true
            }
            None => false,
        }
    }

    /// Fire every job whose deadline has passed.
    ///
    /// Jobs fire in slot order, each at most once per call.
    pub fn tick(&mut self, now_ms: u64, delegate: &mut dyn SchedulerDelegate) {
        for entry in self.jobs.iter_mut().flatten() {
            if now_ms < entry.next_due_ms {
                continue;
            }

            let late_ms = now_ms - entry.next_due_ms;
            if late_ms >= entry.period_ms {
                warn!(
                    "Scheduler: {:?} late by {} ms, skipping {} period(s)",
                    entry.id,
                    late_ms,
                    late_ms / entry.period_ms
                );
            } else {
                debug!("Scheduler: {:?} fired", entry.id);
            }

            entry.next_due_ms = now_ms.saturating_add(entry.period_ms);
            delegate.on_job_fired(entry.id);
        }
    }

    /// Milliseconds until the earliest job is due (`0` if overdue).
    /// `None` if nothing is scheduled.
    pub fn ms_until_next(&self, now_ms: u64) -> Option<u64> {
        self.jobs
            .iter()
            .flatten()
            .map(|e| e.next_due_ms.saturating_sub(now_ms))
            .min()
    }

    /// Number of scheduled jobs.
    pub fn active_count(&self) -> usize {
        self.jobs.iter().flatten().count()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
