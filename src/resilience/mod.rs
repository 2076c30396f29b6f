//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded call:
//!     → circuit_breaker.rs (admit or reject under the timed lock)
//!     → protected operation runs with no lock held
//!     → state.rs (count failure, decide transition)
//!     → recovery.rs (Open arms the breaker's worker thread toward Half-Open)
//! ```
//!
//! # Design Decisions
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering a recovering dependency)
//! - Lock waits are bounded; contention surfaces as `LockTimeout`

pub mod circuit_breaker;
pub mod error;
pub(crate) mod recovery;
pub mod state;
pub mod timed_lock;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker};
pub use error::{BreakerError, BreakerResult};
pub use state::CircuitState;
