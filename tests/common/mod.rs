//! Shared utilities for breaker integration tests.

use std::sync::atomic::{AtomicU32, Ordering};

use circuit_guard::{BreakerError, CircuitBreaker};

/// Error type used by protected operations in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    Dependency(String),
    Breaker(BreakerError),
}

impl From<BreakerError> for TestError {
    fn from(e: BreakerError) -> Self {
        TestError::Breaker(e)
    }
}

#[allow(dead_code)]
pub fn failing() -> Result<(), TestError> {
    Err(TestError::Dependency("blah".into()))
}

#[allow(dead_code)]
pub fn succeeding() -> Result<(), TestError> {
    Ok(())
}

/// Fail `times` guarded calls, asserting each returns the operation's own error.
#[allow(dead_code)]
pub fn trip(breaker: &CircuitBreaker, times: u32) {
    for _ in 0..times {
        assert_eq!(
            breaker.attempt(failing),
            Err(TestError::Dependency("blah".into()))
        );
    }
}

/// A dependency that fails its first `failures` calls, then recovers.
#[allow(dead_code)]
pub struct FlakyStub {
    failures: u32,
    calls: AtomicU32,
}

#[allow(dead_code)]
impl FlakyStub {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn call(&self) -> Result<(), TestError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(TestError::Dependency(format!("call {n} failed")))
        } else {
            Ok(())
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}
