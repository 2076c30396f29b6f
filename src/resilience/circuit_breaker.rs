//! Circuit breaker for protecting calls to an unreliable dependency.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: the next call is a probe deciding Closed vs Open
//!
//! # Design Decisions
//! - One lock guards (failures, state); the protected operation always runs
//!   outside it
//! - Lock acquisition is bounded (see `timed_lock`), never an indefinite wait
//! - The caller's own error is returned unchanged; breaker errors reach the
//!   caller's error type through `From<BreakerError>`
//! - Readers see a snapshot word published under the lock, so accessors
//!   never block and never observe a torn (state, failures) pair

use futures_util::FutureExt;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::BreakerConfig;
use crate::resilience::error::{BreakerError, BreakerResult};
use crate::resilience::recovery::RecoveryWorker;
use crate::resilience::state::{CircuitState, Event, Machine};
use crate::resilience::timed_lock::{TimedMutex, DEFAULT_LOCK_TIMEOUT};

/// Name given to breakers built without configuration.
pub const DEFAULT_NAME: &str = "default";

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failures: u32,
    pub threshold: u32,
    pub timeout_ms: u64,
}

/// A circuit breaker. Cloning yields another handle to the same breaker.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    threshold: u32,
    timeout: Duration,
    machine: TimedMutex<Machine>,
    /// `state << 32 | failures`, rewritten under the lock after every change.
    published: AtomicU64,
    /// Moves Open to HalfOpen; holds only a weak reference back here.
    recovery: RecoveryWorker,
}

impl CircuitBreaker {
    /// Create a breaker that opens after `threshold` failures and probes
    /// again `timeout` after opening.
    pub fn new(threshold: u32, timeout: Duration) -> BreakerResult<Self> {
        Self::build(DEFAULT_NAME.to_string(), threshold, timeout, DEFAULT_LOCK_TIMEOUT)
    }

    /// Create a named breaker from configuration.
    pub fn from_config(config: &BreakerConfig) -> BreakerResult<Self> {
        Self::build(
            config.name.clone(),
            config.threshold,
            config.timeout(),
            config.lock_timeout(),
        )
    }

    fn build(
        name: String,
        threshold: u32,
        timeout: Duration,
        lock_timeout: Duration,
    ) -> BreakerResult<Self> {
        if threshold < 1 {
            return Err(BreakerError::invalid("threshold", "threshold should be greater than 0"));
        }
        if timeout.is_zero() {
            return Err(BreakerError::invalid("timeout", "timeout should be greater than 0"));
        }
        if lock_timeout.is_zero() {
            return Err(BreakerError::invalid(
                "lock_timeout",
                "lock timeout should be greater than 0",
            ));
        }

        let shared = Arc::new_cyclic(|this: &std::sync::Weak<Shared>| {
            let this = this.clone();
            let recovery = RecoveryWorker::new(&name, move |generation| match this.upgrade() {
                Some(shared) => {
                    shared.recover(generation);
                    true
                }
                None => false,
            });
            Shared {
                name,
                threshold,
                timeout,
                machine: TimedMutex::new(Machine::new(), lock_timeout),
                published: AtomicU64::new(pack(CircuitState::Closed, 0)),
                recovery,
            }
        });

        tracing::debug!(
            breaker = %shared.name,
            threshold,
            timeout_ms = timeout.as_millis() as u64,
            "Circuit breaker created"
        );

        Ok(Self { shared })
    }

    /// Run `operation` if the circuit allows it.
    ///
    /// The operation runs at most once and never under the breaker lock.
    /// Its error comes back exactly as it was returned. A panic counts as a
    /// failure and is then resumed.
    pub fn attempt<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<BreakerError>,
    {
        self.shared.record(Event::CallStarting)?;

        match panic::catch_unwind(AssertUnwindSafe(operation)) {
            Ok(outcome) => self.settle(outcome),
            Err(payload) => {
                let _ = self.shared.record(Event::CallFailed);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Async counterpart of [`attempt`](Self::attempt). The lock is never
    /// held across the operation's `.await`.
    pub async fn attempt_async<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<BreakerError>,
    {
        self.shared.record(Event::CallStarting)?;

        match AssertUnwindSafe(async move { operation().await })
            .catch_unwind()
            .await
        {
            Ok(outcome) => self.settle(outcome),
            Err(payload) => {
                let _ = self.shared.record(Event::CallFailed);
                panic::resume_unwind(payload)
            }
        }
    }

    fn settle<T, E>(&self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<BreakerError>,
    {
        match outcome {
            Ok(value) => {
                self.shared.record(Event::CallSucceeded)?;
                Ok(value)
            }
            Err(e) => {
                self.shared.record(Event::CallFailed)?;
                Err(e)
            }
        }
    }

    /// Force the breaker Closed and reset the failure count.
    pub fn close(&self) -> BreakerResult<()> {
        let mut machine = self.shared.machine.lock()?;
        self.shared.enter(&mut machine, CircuitState::Closed, "manual override");
        self.shared.publish(&machine);
        Ok(())
    }

    /// Force the breaker Open and arm a fresh recovery timer.
    pub fn open(&self) -> BreakerResult<()> {
        let mut machine = self.shared.machine.lock()?;
        self.shared.enter(&mut machine, CircuitState::Open, "manual override");
        self.shared.publish(&machine);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn threshold(&self) -> u32 {
        self.shared.threshold
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    pub fn failures(&self) -> u32 {
        self.shared.load().1
    }

    pub fn state(&self) -> CircuitState {
        self.shared.load().0
    }

    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    /// State and failure count read together, plus the fixed settings.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let (state, failures) = self.shared.load();
        BreakerSnapshot {
            state,
            failures,
            threshold: self.shared.threshold,
            timeout_ms: self.shared.timeout.as_millis() as u64,
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (state, failures) = self.shared.load();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.name)
            .field("state", &state)
            .field("failures", &failures)
            .field("threshold", &self.shared.threshold)
            .field("timeout", &self.shared.timeout)
            .finish()
    }
}

impl Shared {
    /// Report `event` to the current state and perform any transition.
    fn record(&self, event: Event) -> BreakerResult<()> {
        let mut machine = self.machine.lock()?;
        let from = machine.current();
        if let Some(target) = machine.on_event(event, self.threshold)? {
            let reason = match (from, target) {
                (CircuitState::HalfOpen, CircuitState::Open) => "probe failed",
                (CircuitState::HalfOpen, CircuitState::Closed) => "probe succeeded",
                _ => "failure threshold reached",
            };
            self.enter(&mut machine, target, reason);
        }
        self.publish(&machine);
        Ok(())
    }

    /// Replace the current state with a fresh `target` state.
    fn enter(&self, machine: &mut Machine, target: CircuitState, reason: &'static str) {
        let from = machine.current();
        match target {
            CircuitState::Closed => {
                machine.enter_closed();
                self.recovery.disarm();
            }
            CircuitState::HalfOpen => {
                machine.enter_half_open();
                self.recovery.disarm();
            }
            CircuitState::Open => {
                let generation = machine.enter_open();
                self.recovery.arm(self.timeout, generation);
            }
        }

        if target == CircuitState::Open {
            tracing::warn!(
                breaker = %self.name,
                from = %from,
                failures = machine.failures(),
                threshold = self.threshold,
                retry_after_ms = self.timeout.as_millis() as u64,
                reason,
                "Circuit breaker opened"
            );
        } else {
            tracing::info!(
                breaker = %self.name,
                from = %from,
                to = %target,
                failures = machine.failures(),
                reason,
                "Circuit breaker state changed"
            );
        }
    }

    /// Recovery callback for the Open instance armed with `generation`.
    fn recover(&self, generation: u64) {
        let mut machine = match self.machine.lock() {
            Ok(machine) => machine,
            Err(e) => {
                // The failed wait already took the full ceiling, so retry now.
                tracing::warn!(
                    breaker = %self.name,
                    error = %e,
                    "Recovery could not take the breaker lock; retrying"
                );
                self.recovery.arm(Duration::ZERO, generation);
                return;
            }
        };

        if !machine.is_open_generation(generation) {
            tracing::debug!(
                breaker = %self.name,
                state = %machine.current(),
                "Recovery timer fired for a replaced open state; ignoring"
            );
            return;
        }

        self.enter(&mut machine, CircuitState::HalfOpen, "recovery timeout elapsed");
        self.publish(&machine);
    }

    fn publish(&self, machine: &Machine) {
        self.published
            .store(pack(machine.current(), machine.failures()), Ordering::Release);
    }

    fn load(&self) -> (CircuitState, u32) {
        let word = self.published.load(Ordering::Acquire);
        (CircuitState::from((word >> 32) as u8), word as u32)
    }
}

fn pack(state: CircuitState, failures: u32) -> u64 {
    ((state as u64) << 32) | failures as u64
}
