//! Sync scheduling.
//!
//! [`SyncScheduler`] is a small state machine (`Idle → Running → Idle`) fed
//! by two trigger sources: the wall clock reaching `next_scheduled_at` and
//! the [`ManualTrigger`] flag. [`drive`] polls it at a fixed interval and
//! runs one sync at a time.

mod clock;
mod trigger;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::MissedTickBehavior;

pub use clock::{Clock, SystemClock};
pub use trigger::{ManualListener, ManualTrigger};

#[cfg(test)]
pub use clock::ManualClock;

/// Why a sync cycle started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    Startup,
    Timer,
    Manual,
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunReason::Startup => "startup",
            RunReason::Timer => "timer",
            RunReason::Manual => "manual",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

pub struct SyncScheduler<C> {
    clock: C,
    interval: TimeDelta,
    next_scheduled_at: DateTime<Utc>,
    state: SchedulerState,
    /// At most one queued run; later requests coalesce into it.
    pending: Option<RunReason>,
}

impl<C: Clock> SyncScheduler<C> {
    /// Schedules the first timer run one `interval` from now. With
    /// `run_on_start`, a run is also queued immediately.
    pub fn new(clock: C, interval: Duration, run_on_start: bool) -> Self {
        let interval = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
        let next_scheduled_at = add_saturating(clock.now(), interval);
        Self {
            clock,
            interval,
            next_scheduled_at,
            state: SchedulerState::Idle,
            pending: run_on_start.then_some(RunReason::Startup),
        }
    }

    #[must_use]
    pub fn next_scheduled_at(&self) -> DateTime<Utc> {
        self.next_scheduled_at
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// One scheduler tick.
    ///
    /// `manual_requested` is the manual trigger as taken this tick. While a
    /// run is in progress it is only queued. Returns the reason for a run
    /// that should start now and moves to `Running`.
    pub fn tick(&mut self, manual_requested: bool) -> Option<RunReason> {
        if manual_requested && self.pending.is_none() {
            self.pending = Some(RunReason::Manual);
        }
        if self.state == SchedulerState::Running {
            return None;
        }

        let reason = self.pending.take().or_else(|| {
            (self.clock.now() >= self.next_scheduled_at).then_some(RunReason::Timer)
        })?;
        self.state = SchedulerState::Running;
        Some(reason)
    }

    /// Ends the current run and schedules the next timer run one interval
    /// from now, whatever triggered this one.
    pub fn complete_run(&mut self) {
        self.state = SchedulerState::Idle;
        self.next_scheduled_at = add_saturating(self.clock.now(), self.interval);
    }
}

fn add_saturating(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Runs the scheduler loop forever.
///
/// Every `poll_interval` the manual trigger is taken and the listener kept
/// alive, including while `run` is in progress, so requests made during a
/// run are coalesced into a single follow-up run.
pub async fn drive<C, F, Fut>(
    mut scheduler: SyncScheduler<C>,
    trigger: ManualTrigger,
    mut listener: Option<ManualListener>,
    poll_interval: Duration,
    mut run: F,
) where
    C: Clock,
    F: FnMut(RunReason) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        next_run = %scheduler.next_scheduled_at(),
        manual_trigger = listener.is_some(),
        "scheduler: started"
    );

    loop {
        ticker.tick().await;
        maintain_listener(&mut listener);

        let Some(reason) = scheduler.tick(trigger.take()) else {
            continue;
        };

        tracing::info!(%reason, "scheduler: starting sync");
        let run_fut = run(reason);
        tokio::pin!(run_fut);
        loop {
            tokio::select! {
                () = &mut run_fut => break,
                _ = ticker.tick() => {
                    maintain_listener(&mut listener);
                    if scheduler.tick(trigger.take()).is_some() {
                        tracing::error!("scheduler: started a run while another was in progress");
                    }
                }
            }
        }
        scheduler.complete_run();

        tracing::info!(
            next_run = %scheduler.next_scheduled_at(),
            state = ?scheduler.state(),
            "scheduler: sync finished"
        );
    }
}

fn maintain_listener(listener: &mut Option<ManualListener>) {
    if listener.as_mut().is_some_and(|l| !l.keep_alive()) {
        *listener = None;
    }
}
