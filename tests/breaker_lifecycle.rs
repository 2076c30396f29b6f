//! Breaker lifecycle tests for synchronous callers.
//!
//! No Tokio runtime is running here.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use circuit_guard::{BreakerError, CircuitBreaker, CircuitState};

mod common;
use common::{failing, succeeding, trip, FlakyStub, TestError};

const FIVE_MINUTES: Duration = Duration::from_secs(300);

#[test]
fn test_attempt_calls_protected_code() {
    let breaker = CircuitBreaker::new(10, FIVE_MINUTES).unwrap();
    let called = Cell::new(false);

    let result: Result<(), TestError> = breaker.attempt(|| {
        called.set(true);
        Ok(())
    });

    assert!(result.is_ok());
    assert!(called.get());
}

#[test]
fn test_attempt_returns_operation_value() {
    let breaker = CircuitBreaker::new(10, FIVE_MINUTES).unwrap();
    let value: Result<u32, TestError> = breaker.attempt(|| Ok(42));
    assert_eq!(value, Ok(42));
}

#[test]
fn test_new_breaker_is_closed() {
    let breaker = CircuitBreaker::new(5, FIVE_MINUTES).unwrap();
    assert!(breaker.is_closed());
    assert!(!breaker.is_open());
    assert!(!breaker.is_half_open());
    assert_eq!(breaker.failures(), 0);
    assert_eq!(breaker.threshold(), 5);
    assert_eq!(breaker.timeout(), FIVE_MINUTES);
}

#[test]
fn test_constructor_rejects_invalid_arguments() {
    assert!(matches!(
        CircuitBreaker::new(0, FIVE_MINUTES),
        Err(BreakerError::InvalidConfiguration { field: "threshold", .. })
    ));
    assert!(matches!(
        CircuitBreaker::new(10, Duration::ZERO),
        Err(BreakerError::InvalidConfiguration { field: "timeout", .. })
    ));
}

#[test]
fn test_success_does_not_change_failures() {
    let breaker = CircuitBreaker::new(10, FIVE_MINUTES).unwrap();
    trip(&breaker, 3);
    breaker.attempt(succeeding).unwrap();
    assert_eq!(breaker.failures(), 3);
    assert!(breaker.is_closed());
}

#[test]
fn test_failures_below_threshold_stay_closed() {
    let breaker = CircuitBreaker::new(10, FIVE_MINUTES).unwrap();
    for expected in 1..10 {
        assert_eq!(
            breaker.attempt(failing),
            Err(TestError::Dependency("blah".into()))
        );
        assert_eq!(breaker.failures(), expected);
        assert!(breaker.is_closed());
    }
}

#[test]
fn test_operation_error_is_returned_unchanged() {
    let breaker = CircuitBreaker::new(10, FIVE_MINUTES).unwrap();
    let result: Result<(), TestError> =
        breaker.attempt(|| Err(TestError::Dependency("disk on fire".into())));
    assert_eq!(result, Err(TestError::Dependency("disk on fire".into())));
}

#[test]
fn test_opens_at_threshold_and_rejects_without_calling() {
    let breaker = CircuitBreaker::new(10, FIVE_MINUTES).unwrap();
    for expected in 1..=10 {
        assert_eq!(
            breaker.attempt(failing),
            Err(TestError::Dependency("blah".into()))
        );
        assert_eq!(breaker.failures(), expected);
    }
    assert!(breaker.is_open());

    let called = Cell::new(false);
    let result: Result<(), TestError> = breaker.attempt(|| {
        called.set(true);
        Ok(())
    });

    assert_eq!(result, Err(TestError::Breaker(BreakerError::CircuitOpen)));
    assert!(!called.get());
    assert_eq!(breaker.failures(), 10);
}

#[test]
fn test_threshold_of_one() {
    let breaker = CircuitBreaker::new(1, FIVE_MINUTES).unwrap();
    trip(&breaker, 1);
    assert!(breaker.is_open());
}

#[test]
fn test_switches_to_half_open_after_timeout() {
    let breaker = CircuitBreaker::new(10, Duration::from_millis(50)).unwrap();
    trip(&breaker, 10);
    assert!(breaker.is_open());

    thread::sleep(Duration::from_millis(100));
    assert!(breaker.is_half_open());
    assert_eq!(breaker.failures(), 10);
}

#[test]
fn test_failure_in_half_open_reopens_and_restarts_timer() {
    let breaker = CircuitBreaker::new(10, Duration::from_millis(50)).unwrap();
    trip(&breaker, 10);
    thread::sleep(Duration::from_millis(100));
    assert!(breaker.is_half_open());

    trip(&breaker, 1);
    assert!(breaker.is_open());
    assert_eq!(breaker.failures(), 11);

    thread::sleep(Duration::from_millis(100));
    assert!(breaker.is_half_open());
}

#[test]
fn test_success_in_half_open_closes_and_resets() {
    let stub = FlakyStub::new(10);
    let breaker = CircuitBreaker::new(10, Duration::from_millis(50)).unwrap();
    for _ in 0..10 {
        assert!(matches!(
            breaker.attempt(|| stub.call()),
            Err(TestError::Dependency(_))
        ));
    }
    assert!(breaker.is_open());

    thread::sleep(Duration::from_millis(100));
    assert!(breaker.is_half_open());

    breaker.attempt(|| stub.call()).unwrap();
    assert!(breaker.is_closed());
    assert_eq!(breaker.failures(), 0);
    assert_eq!(stub.calls(), 11);
}

#[test]
fn test_manual_close_from_every_state() {
    let breaker = CircuitBreaker::new(2, Duration::from_millis(50)).unwrap();

    trip(&breaker, 1);
    breaker.close().unwrap();
    assert!(breaker.is_closed());
    assert_eq!(breaker.failures(), 0);

    trip(&breaker, 2);
    assert!(breaker.is_open());
    breaker.close().unwrap();
    assert!(breaker.is_closed());
    assert_eq!(breaker.failures(), 0);

    trip(&breaker, 2);
    thread::sleep(Duration::from_millis(100));
    assert!(breaker.is_half_open());
    breaker.close().unwrap();
    assert!(breaker.is_closed());
    assert_eq!(breaker.failures(), 0);
}

#[test]
fn test_close_cancels_pending_recovery() {
    let breaker = CircuitBreaker::new(1, Duration::from_millis(50)).unwrap();
    trip(&breaker, 1);
    breaker.close().unwrap();

    thread::sleep(Duration::from_millis(100));
    assert!(breaker.is_closed());
}

#[test]
fn test_manual_open_from_every_state() {
    let breaker = CircuitBreaker::new(2, Duration::from_millis(50)).unwrap();

    breaker.open().unwrap();
    assert!(breaker.is_open());
    assert_eq!(breaker.failures(), 0);
    assert_eq!(
        breaker.attempt(succeeding),
        Err(TestError::Breaker(BreakerError::CircuitOpen))
    );

    thread::sleep(Duration::from_millis(100));
    assert!(breaker.is_half_open());
    breaker.open().unwrap();
    assert!(breaker.is_open());

    thread::sleep(Duration::from_millis(100));
    assert!(breaker.is_half_open());
}

#[test]
fn test_manual_open_restarts_recovery_timer() {
    let breaker = CircuitBreaker::new(1, Duration::from_millis(150)).unwrap();
    breaker.open().unwrap();

    thread::sleep(Duration::from_millis(75));
    breaker.open().unwrap();

    // The first timer fires around 150ms and must be ignored.
    thread::sleep(Duration::from_millis(100));
    assert!(breaker.is_open());

    thread::sleep(Duration::from_millis(150));
    assert!(breaker.is_half_open());
}

#[test]
fn test_panic_counts_as_failure_and_is_resumed() {
    let breaker = CircuitBreaker::new(2, FIVE_MINUTES).unwrap();

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = breaker.attempt(|| -> Result<(), TestError> { panic!("boom") });
    }));

    let payload = caught.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    assert_eq!(breaker.failures(), 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[test]
fn test_snapshot_matches_accessors() {
    let breaker = CircuitBreaker::new(3, Duration::from_secs(2)).unwrap();
    trip(&breaker, 3);

    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, CircuitState::Open);
    assert_eq!(snapshot.failures, 3);
    assert_eq!(snapshot.threshold, 3);
    assert_eq!(snapshot.timeout_ms, 2000);
}

#[test]
fn test_repeated_manual_opens_keep_last_deadline() {
    let breaker = CircuitBreaker::new(1, FIVE_MINUTES).unwrap();
    for _ in 0..500 {
        breaker.open().unwrap();
    }
    assert!(breaker.is_open());

    let short = CircuitBreaker::new(1, Duration::from_millis(30)).unwrap();
    for _ in 0..500 {
        short.open().unwrap();
    }
    thread::sleep(Duration::from_millis(150));
    assert!(short.is_half_open());
    assert!(breaker.is_open());
}
