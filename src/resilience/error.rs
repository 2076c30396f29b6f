//! Breaker error definitions.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the breaker itself.
///
/// Failures of the protected operation never appear here. They are handed
/// back to the caller untouched; these variants reach the caller's error
/// type through `From<BreakerError>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerError {
    /// Construction rejected an out-of-range setting.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfiguration {
        field: &'static str,
        reason: String,
    },

    /// The circuit is open; the protected operation was not called.
    #[error("the protected operation can not be called while the circuit is open")]
    CircuitOpen,

    /// The breaker lock could not be acquired within the ceiling.
    #[error("timed out after {0:?} waiting for the breaker lock")]
    LockTimeout(Duration),
}

impl BreakerError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }

    /// True for `CircuitOpen`, the "try later" signal.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen)
    }
}

/// Result type for breaker operations.
pub type BreakerResult<T> = Result<T, BreakerError>;
