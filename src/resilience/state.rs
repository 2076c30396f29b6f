//! Breaker state machine.
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     failure reported and failures >= threshold
//! Open     → HalfOpen: recovery timer of the current Open instance fires
//! HalfOpen → Closed:   probe call succeeds
//! HalfOpen → Open:     probe call fails
//! ```
//!
//! Entering Closed is the only place the failure counter resets. Every
//! entry bumps `generation`, which is how a stale recovery fire tells that
//! its Open instance has already been replaced.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resilience::error::{BreakerError, BreakerResult};

/// Observable breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// What happened to a guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    CallStarting,
    CallSucceeded,
    CallFailed,
}

/// The live state. Open remembers the generation its recovery was armed with.
#[derive(Debug)]
enum State {
    Closed,
    Open { generation: u64 },
    HalfOpen,
}

impl State {
    fn kind(&self) -> CircuitState {
        match self {
            State::Closed => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen => CircuitState::HalfOpen,
        }
    }
}

/// Failure counter plus current state, always mutated together under the
/// breaker lock.
#[derive(Debug)]
pub(crate) struct Machine {
    failures: u32,
    state: State,
    generation: u64,
}

impl Machine {
    /// A fresh machine in Closed with no failures.
    pub(crate) fn new() -> Self {
        Self {
            failures: 0,
            state: State::Closed,
            generation: 0,
        }
    }

    pub(crate) fn current(&self) -> CircuitState {
        self.state.kind()
    }

    pub(crate) fn failures(&self) -> u32 {
        self.failures
    }

    /// Apply `event` to the current state.
    ///
    /// Returns the state the breaker must enter next, if any. Entry side
    /// effects (counter reset, timer) are left to the caller so the rules
    /// here stay a pure function of (state, event).
    pub(crate) fn on_event(
        &mut self,
        event: Event,
        threshold: u32,
    ) -> BreakerResult<Option<CircuitState>> {
        let current = self.current();
        match (current, event) {
            (CircuitState::Open, Event::CallStarting) => Err(BreakerError::CircuitOpen),
            (_, Event::CallStarting) => Ok(None),

            (CircuitState::HalfOpen, Event::CallSucceeded) => Ok(Some(CircuitState::Closed)),
            (_, Event::CallSucceeded) => Ok(None),

            (state, Event::CallFailed) => {
                self.failures = self.failures.saturating_add(1);
                Ok(match state {
                    CircuitState::Closed if self.failures >= threshold => Some(CircuitState::Open),
                    CircuitState::HalfOpen => Some(CircuitState::Open),
                    // A call admitted before the trip; counted, no transition.
                    _ => None,
                })
            }
        }
    }

    pub(crate) fn enter_closed(&mut self) {
        self.generation += 1;
        self.failures = 0;
        self.state = State::Closed;
    }

    pub(crate) fn enter_half_open(&mut self) {
        self.generation += 1;
        self.state = State::HalfOpen;
    }

    /// Enter Open and return the generation the recovery must be armed with.
    pub(crate) fn enter_open(&mut self) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        self.state = State::Open { generation };
        generation
    }

    /// True while the Open instance armed with `generation` is current.
    pub(crate) fn is_open_generation(&self, generation: u64) -> bool {
        matches!(self.state, State::Open { generation: g, .. } if g == generation)
    }
}
