// src/engine/timer.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Resolution of the countdown.
pub const TICK: Duration = Duration::from_secs(1);

/// A cancellable one-second countdown driving an attempt's expiry.
///
/// At most one countdown is active per instance. Each `start` gets a fresh
/// liveness gate. Callbacks are delivered only while the gate is open and a tick
/// runs with the gate held, so once `stop()` returns no callback of that run can
/// fire again, even one that was already scheduled.
#[derive(Debug, Default)]
pub struct Countdown {
    run: Option<Run>,
}

#[derive(Debug)]
struct Run {
    active: Arc<Mutex<bool>>,
    handle: JoinHandle<()>,
}

fn open(gate: &Mutex<bool>) -> MutexGuard<'_, bool> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts counting down from `duration_secs`, stopping any previous run first.
    ///
    /// `on_tick(remaining)` fires once per elapsed second with the new remaining
    /// value (down to and including 0); `on_expire()` then fires exactly once.
    /// Must be called from within a Tokio runtime. `on_tick` must not call back
    /// into this countdown.
    pub fn start<T, E>(&mut self, duration_secs: u64, mut on_tick: T, on_expire: E)
    where
        T: FnMut(u64) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.stop();

        let active = Arc::new(Mutex::new(true));
        let gate = active.clone();

        let handle = tokio::spawn(async move {
            let mut remaining = duration_secs;
            while remaining > 0 {
                tokio::time::sleep(TICK).await;
                let gate_open = open(&gate);
                if !*gate_open {
                    return;
                }
                remaining -= 1;
                tracing::debug!("Countdown tick, {}s remaining", remaining);
                on_tick(remaining);
            }

            // Close the gate before expiring: on_expire may stop this countdown.
            let claimed = std::mem::replace(&mut *open(&gate), false);
            if claimed {
                on_expire();
            }
        });

        self.run = Some(Run { active, handle });
    }

    /// Cancels the pending tick or expiry. Idempotent.
    /// Waits for a tick being delivered right now to finish.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            *open(&run.active) = false;
            run.handle.abort();
        }
    }

    /// Whether a countdown is started and has neither expired nor been stopped.
    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| *open(&run.active))
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        // May run inside one of our own callbacks, with the gate held: never wait.
        if let Some(run) = self.run.take() {
            if let Ok(mut gate_open) = run.active.try_lock() {
                *gate_open = false;
            }
            run.handle.abort();
        }
    }
}
