//! Out-of-band manual trigger.
//!
//! A listener thread blocks on one line of stdin, fires the shared
//! [`ManualTrigger`] and exits; the scheduler loop respawns it so the next
//! line is observed as well. Without an interactive stdin the daemon runs on
//! the timer alone.

use std::io::{BufRead, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// "A manual run was requested" flag shared between the listener and the
/// scheduler loop.
#[derive(Debug, Clone, Default)]
pub struct ManualTrigger {
    requested: Arc<AtomicBool>,
}

impl ManualTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns whether a run was requested and clears the request.
    ///
    /// Any number of `fire` calls between two `take` calls count once.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

/// How a listener thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerExit {
    Fired,
    InputClosed,
}

/// Keeps one stdin listener thread alive.
pub struct ManualListener {
    trigger: ManualTrigger,
    handle: Option<JoinHandle<ListenerExit>>,
}

impl ManualListener {
    /// Starts listening, or returns `None` when stdin is not a terminal.
    #[must_use]
    pub fn start(trigger: ManualTrigger) -> Option<Self> {
        if !std::io::stdin().is_terminal() {
            tracing::info!("stdin is not interactive; manual trigger disabled, timer only");
            return None;
        }
        tracing::info!("press Enter to run a sync now");
        let mut listener = Self {
            trigger,
            handle: None,
        };
        listener.spawn();
        Some(listener)
    }

    /// Respawns the listener if it fired. Returns `false` once stdin has
    /// closed; the caller should drop the listener then.
    pub fn keep_alive(&mut self) -> bool {
        let Some(handle) = self.handle.take_if(|h| h.is_finished()) else {
            return true;
        };
        match handle.join() {
            Ok(ListenerExit::Fired) => {
                self.spawn();
                true
            }
            Ok(ListenerExit::InputClosed) => {
                tracing::warn!("manual trigger input closed; falling back to timer only");
                false
            }
            Err(_) => {
                tracing::error!("manual trigger listener panicked; falling back to timer only");
                false
            }
        }
    }

    fn spawn(&mut self) {
        let trigger = self.trigger.clone();
        let spawned = std::thread::Builder::new()
            .name("manual-trigger".to_owned())
            .spawn(move || listen_once(&mut std::io::stdin().lock(), &trigger));
        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn manual trigger listener");
            }
        }
    }
}

fn listen_once(input: &mut impl BufRead, trigger: &ManualTrigger) -> ListenerExit {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => ListenerExit::InputClosed,
        Ok(_) => {
            tracing::info!("manual sync requested");
            trigger.fire();
            ListenerExit::Fired
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to read manual trigger input");
            ListenerExit::InputClosed
        }
    }
}
