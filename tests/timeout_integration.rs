//! Timeout coordination between the retry loop and its timer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use riprap::testing::CallCounter;
use riprap::{
    assert_timed_out, ConfigError, GuardState, Outcome, RetryError, RetryPolicy, TimeoutGuard,
};

#[test]
fn long_wait_is_interrupted_by_timeout() {
    let policy = RetryPolicy::<u32, ()>::builder()
        .timeout(Duration::from_millis(50))
        .wait(Duration::from_secs(1000))
        .build()
        .unwrap();
    let calls = CallCounter::new();
    let started = Instant::now();

    let result = policy.call(|| Ok(calls.tick()));

    assert_timed_out!(result);
    assert_eq!(calls.count(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn timeout_error_carries_attempts() {
    let policy = RetryPolicy::<u32, ()>::builder()
        .timeout(Duration::from_millis(50))
        .wait_fn(|n| {
            if n < 5 {
                Duration::ZERO
            } else {
                Duration::from_secs(100)
            }
        })
        .build()
        .unwrap();
    let calls = CallCounter::new();

    match policy.call(|| Ok(calls.tick())) {
        Err(RetryError::Timeout(err)) => {
            assert_eq!(err.attempts, 5);
            assert_eq!(err.timeout, Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(calls.count(), 5);
}

#[test]
fn dynamic_timeout() {
    let policy = RetryPolicy::<u32, ()>::builder()
        .timeout_fn(|| Duration::from_millis(50))
        .wait_fn(|n| {
            if n < 6 {
                Duration::ZERO
            } else {
                Duration::from_secs(100)
            }
        })
        .build()
        .unwrap();
    let calls = CallCounter::new();

    assert_timed_out!(policy.call(|| Ok(calls.tick())));
    assert_eq!(calls.count(), 6);
}

#[test]
fn constant_wait_bounded_by_timeout() {
    let policy = RetryPolicy::<u32, ()>::builder()
        .wait(Duration::from_millis(100))
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let calls = CallCounter::new();

    assert_timed_out!(policy.call(|| Ok(calls.tick())));
    assert!(calls.count() > 2);
    assert!(calls.count() < 6);
}

struct Budget {
    millis: u64,
}

#[test]
fn receiver_aware_timeout_uses_receiver_budget() {
    let policy = RetryPolicy::<u32, (), Budget>::builder()
        .timeout_with(|budget: &Budget| Duration::from_millis(budget.millis))
        .wait(Duration::from_secs(1000))
        .build()
        .unwrap();
    let calls = CallCounter::new();
    let started = Instant::now();

    match policy.call_with(&Budget { millis: 40 }, |_| Ok(calls.tick())) {
        Err(RetryError::Timeout(err)) => {
            assert_eq!(err.timeout, Duration::from_millis(40));
            assert_eq!(err.attempts, 1);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(calls.count(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn receiver_aware_zero_timeout_is_rejected_before_any_attempt() {
    let policy = RetryPolicy::<u32, (), Budget>::builder()
        .timeout_with(|budget: &Budget| Duration::from_millis(budget.millis))
        .build()
        .unwrap();
    let calls = CallCounter::new();

    let (result, report) =
        policy.call_with_report(&Budget { millis: 0 }, |_| Ok(calls.tick()));

    assert_eq!(result, Err(RetryError::Config(ConfigError::InvalidTimeout)));
    assert_eq!(report.outcome, Outcome::Misconfigured);
    assert_eq!(calls.count(), 0);
}

struct Waiter {
    waits: AtomicU32,
}

#[test]
fn receiver_aware_wait_callback() {
    let policy = RetryPolicy::<u32, (), Waiter>::builder()
        .wait_with(|waiter: &Waiter, n: u32| {
            waiter.waits.fetch_add(1, Ordering::SeqCst);
            if n <= 2 {
                Duration::from_millis(10)
            } else {
                Duration::from_secs(1000)
            }
        })
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let waiter = Waiter {
        waits: AtomicU32::new(0),
    };
    let calls = CallCounter::new();

    assert_timed_out!(policy.call_with(&waiter, |_| Ok(calls.tick())));
    assert_eq!(calls.count(), 3);
    assert_eq!(waiter.waits.load(Ordering::SeqCst), 3);
}

#[test]
fn early_finish_cancels_the_timer() {
    let policy = RetryPolicy::<u32, ()>::builder()
        .timeout(Duration::from_millis(20))
        .limit(1)
        .build()
        .unwrap();

    let (result, report) = policy.call_reported(|| Ok(7));
    assert_eq!(result, Ok(7));
    assert!(report.elapsed < Duration::from_millis(20));

    // A late timer firing must not leak into the next invocation.
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(policy.call(|| Ok(8)), Ok(8));
}

#[test]
fn cancelled_guard_never_expires() {
    for _ in 0..20 {
        let guard = TimeoutGuard::arm(Duration::from_millis(5));
        if guard.cancel() {
            std::thread::sleep(Duration::from_millis(15));
            assert_eq!(guard.state(), GuardState::Cancelled);
            assert!(guard.check_expired(0).is_ok());
        }
    }
}

#[test]
fn sleeping_thread_is_woken_by_another_thread_waiting_on_expiry() {
    let guard = Arc::new(TimeoutGuard::arm(Duration::from_millis(30)));
    let sleeper = {
        let guard = Arc::clone(&guard);
        std::thread::spawn(move || {
            let started = Instant::now();
            guard.sleep(Duration::from_secs(600));
            started.elapsed()
        })
    };

    let slept = sleeper.join().unwrap();
    assert!(slept < Duration::from_secs(600));
    assert!(guard.is_expired());
}
