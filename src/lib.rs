//! Circuit breaker library.
//!
//! Wraps calls to an unreliable dependency and stops invoking it once it
//! fails repeatedly, probing again after a recovery timeout.
//!
//! ```no_run
//! use std::time::Duration;
//! use circuit_guard::{BreakerError, CircuitBreaker};
//!
//! #[derive(Debug)]
//! enum FetchError {
//!     Remote(String),
//!     Breaker(BreakerError),
//! }
//!
//! impl From<BreakerError> for FetchError {
//!     fn from(e: BreakerError) -> Self {
//!         FetchError::Breaker(e)
//!     }
//! }
//!
//! let breaker = CircuitBreaker::new(10, Duration::from_secs(300))?;
//! let result: Result<(), FetchError> =
//!     breaker.attempt(|| Err(FetchError::Remote("connection refused".into())));
//! assert!(matches!(result, Err(FetchError::Remote(_))));
//! assert_eq!(breaker.failures(), 1);
//! # Ok::<(), BreakerError>(())
//! ```

pub mod config;
pub mod observability;
pub mod resilience;

pub use config::GuardConfig;
pub use resilience::{BreakerError, BreakerResult, BreakerSnapshot, CircuitBreaker, CircuitState};
