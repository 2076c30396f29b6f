//! Recovery worker moving an Open breaker toward Half-Open.
//!
//! # Responsibilities
//! - Fire once per Open entry, `timeout` after it was armed
//! - Stay independent of whatever runtime (if any) the caller uses
//!
//! # Design Decisions
//! - One named thread per breaker, started on the first Open entry
//! - Re-arming or disarming wakes the thread instead of spawning another
//! - The thread exits once the owning breaker is dropped

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type OnFire = Box<dyn Fn(u64) -> bool + Send + Sync>;

/// Pending fire, if any, plus the worker's lifecycle flags.
#[derive(Debug, Default)]
struct Slot {
    armed: Option<(Instant, u64)>,
    running: bool,
    shutdown: bool,
    #[cfg(test)]
    spawned: u32,
}

struct WorkerState {
    name: String,
    slot: Mutex<Slot>,
    wake: Condvar,
    /// Receives the armed generation; returns false once the breaker is gone.
    on_fire: OnFire,
}

/// Handle owned by the breaker. Dropping it stops the worker thread.
pub(crate) struct RecoveryWorker {
    state: Arc<WorkerState>,
}

impl RecoveryWorker {
    pub(crate) fn new<F>(name: &str, on_fire: F) -> Self
    where
        F: Fn(u64) -> bool + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(WorkerState {
                name: name.to_string(),
                slot: Mutex::new(Slot::default()),
                wake: Condvar::new(),
                on_fire: Box::new(on_fire),
            }),
        }
    }

    /// Fire for `generation` after `delay`, replacing any pending fire.
    pub(crate) fn arm(&self, delay: Duration, generation: u64) {
        let mut slot = self.state.slot.lock();
        slot.armed = Some((Instant::now() + delay, generation));
        if slot.running {
            self.state.wake.notify_one();
        } else {
            self.spawn(&mut slot);
        }
    }

    /// Drop any pending fire.
    pub(crate) fn disarm(&self) {
        let mut slot = self.state.slot.lock();
        if slot.armed.take().is_some() {
            self.state.wake.notify_one();
        }
    }

    fn spawn(&self, slot: &mut MutexGuard<'_, Slot>) {
        let state = self.state.clone();
        let spawned = thread::Builder::new()
            .name(format!("breaker-recovery-{}", self.state.name))
            .spawn(move || run(&state));

        match spawned {
            Ok(_) => {
                slot.running = true;
                #[cfg(test)]
                {
                    slot.spawned += 1;
                }
            }
            Err(e) => {
                tracing::error!(
                    breaker = %self.state.name,
                    error = %e,
                    "Failed to start recovery worker; breaker stays open until closed manually"
                );
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn spawned(&self) -> u32 {
        self.state.slot.lock().spawned
    }
}

impl Drop for RecoveryWorker {
    fn drop(&mut self) {
        let mut slot = self.state.slot.lock();
        slot.shutdown = true;
        slot.armed = None;
        self.state.wake.notify_one();
    }
}

fn run(state: &WorkerState) {
    let mut slot = state.slot.lock();
    loop {
        if slot.shutdown {
            break;
        }
        let armed = slot.armed;
        match armed {
            None => state.wake.wait(&mut slot),
            Some((deadline, generation)) if Instant::now() >= deadline => {
                slot.armed = None;
                // The callback takes the breaker lock, which may in turn
                // re-arm or disarm; never hold the slot across it.
                let alive = MutexGuard::unlocked(&mut slot, || (state.on_fire)(generation));
                if !alive {
                    break;
                }
            }
            Some((deadline, _)) => {
                state.wake.wait_until(&mut slot, deadline);
            }
        }
    }
    slot.running = false;
    tracing::debug!(breaker = %state.name, "Recovery worker stopped");
}
