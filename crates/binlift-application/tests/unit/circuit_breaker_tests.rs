//! Circuit breaker state machine.

use std::time::Duration;

use binlift_application::decorators::{BreakerConfig, CircuitBreaker};
use binlift_domain::error::Error;
use binlift_domain::ports::BreakerState;

fn config(cooldown_ms: u64) -> BreakerConfig {
    BreakerConfig {
        window: Duration::from_secs(60),
        failure_ratio: 0.5,
        min_samples: 4,
        cooldown: Duration::from_millis(cooldown_ms),
    }
}

fn server_error() -> Error {
    Error::provider_server("a", "503")
}

fn drive_open(breaker: &CircuitBreaker) {
    for _ in 0..4 {
        breaker.try_acquire().unwrap();
        breaker.record_failure(&server_error());
    }
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[test]
fn stays_closed_below_min_samples() {
    let breaker = CircuitBreaker::new("a", config(10_000));
    for _ in 0..3 {
        breaker.try_acquire().unwrap();
        breaker.record_failure(&server_error());
    }
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert!(breaker.try_acquire().is_ok());
}

#[test]
fn opens_past_the_failure_ratio_and_short_circuits() {
    let breaker = CircuitBreaker::new("a", config(10_000));
    drive_open(&breaker);
    let err = breaker.try_acquire().unwrap_err();
    assert_eq!(err.code(), "provider_unavailable");
}

#[test]
fn successes_keep_the_ratio_below_threshold() {
    let breaker = CircuitBreaker::new("a", config(10_000));
    for _ in 0..6 {
        breaker.try_acquire().unwrap();
        breaker.record_success();
    }
    for _ in 0..4 {
        breaker.try_acquire().unwrap();
        breaker.record_failure(&server_error());
    }
    // 4 failures in 10 outcomes is below the 0.5 ratio.
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[test]
fn half_open_allows_exactly_one_probe() {
    let breaker = CircuitBreaker::new("a", config(10));
    drive_open(&breaker);
    std::thread::sleep(Duration::from_millis(20));

    assert_eq!(breaker.state(), BreakerState::HalfOpen);
    assert!(breaker.try_acquire().is_ok());
    assert!(breaker.try_acquire().is_err());
}

#[test]
fn successful_probe_closes_failed_probe_reopens() {
    let breaker = CircuitBreaker::new("a", config(10));
    drive_open(&breaker);
    std::thread::sleep(Duration::from_millis(20));
    breaker.try_acquire().unwrap();
    breaker.record_success();
    assert_eq!(breaker.state(), BreakerState::Closed);

    drive_open(&breaker);
    std::thread::sleep(Duration::from_millis(20));
    breaker.try_acquire().unwrap();
    breaker.record_failure(&server_error());
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(breaker.try_acquire().is_err());
}

#[test]
fn released_probe_frees_the_slot_without_transition() {
    let breaker = CircuitBreaker::new("a", config(10));
    drive_open(&breaker);
    std::thread::sleep(Duration::from_millis(20));
    breaker.try_acquire().unwrap();
    // A cancelled probe says nothing; the next caller may probe again.
    breaker.release();
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
    assert!(breaker.try_acquire().is_ok());
}

#[test]
fn force_open_sticks_until_reset() {
    let breaker = CircuitBreaker::new("a", config(1));
    breaker.force_open();
    std::thread::sleep(Duration::from_millis(10));
    // No cooldown-driven half-open while forced.
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(breaker.try_acquire().is_err());

    breaker.reset();
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert!(breaker.try_acquire().is_ok());
}
