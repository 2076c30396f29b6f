//! Mutex with a bounded acquisition wait.
//!
//! # Responsibilities
//! - Guard the breaker's bookkeeping with a single lock
//! - Fail with `LockTimeout` instead of blocking forever
//! - Release on every exit path (the guard is RAII)

use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

use crate::resilience::error::{BreakerError, BreakerResult};

/// Ceiling used when nothing else is configured.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// A mutex whose `lock` gives up after a fixed ceiling.
#[derive(Debug)]
pub struct TimedMutex<T> {
    inner: Mutex<T>,
    timeout: Duration,
}

impl<T> TimedMutex<T> {
    pub fn new(value: T, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(value),
            timeout,
        }
    }

    /// Acquire the lock, waiting at most the configured ceiling.
    pub fn lock(&self) -> BreakerResult<MutexGuard<'_, T>> {
        let timeout = self.timeout();
        self.inner
            .try_lock_for(timeout)
            .ok_or(BreakerError::LockTimeout(timeout))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
