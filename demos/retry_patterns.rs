//! Retry Patterns Example
//!
//! Demonstrates the common ways to describe a retry policy:
//! - Retrying transient errors and propagating the rest
//! - Polling until an operation returns a final value
//! - Comparing backoff schedules
//! - Receiver-aware callbacks and on-retry hooks
//! - Bounding the whole call with a timeout

use std::cell::Cell;
use std::time::{Duration, Instant};

use riprap::{Backoff, ErrorMatcher, Outcome, RetryError, RetryPolicy};

#[derive(Debug, Clone, PartialEq)]
enum FetchError {
    Unavailable,
    NotFound,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Unavailable => write!(f, "service unavailable"),
            FetchError::NotFound => write!(f, "not found"),
        }
    }
}

// ==================== Error Criteria ====================

/// Example 1: Retry only transient errors
fn example_transient_errors() {
    println!("\n=== Example 1: Transient Errors ===");

    let policy = RetryPolicy::<&str, FetchError>::builder()
        .on_error(ErrorMatcher::variant(&FetchError::Unavailable))
        .limit(5)
        .backoff(Backoff::exponential(Duration::from_millis(10)))
        .build()
        .expect("valid policy");

    let mut attempt = 0;
    let (result, report) = policy.call_reported(|| {
        attempt += 1;
        println!("  Attempt {}", attempt);
        if attempt < 3 {
            Err(FetchError::Unavailable)
        } else {
            Ok("payload")
        }
    });
    println!("  Result: {:?} after {} attempts", result, report.attempts);

    let result = policy.call(|| Err(FetchError::NotFound));
    match result {
        Err(RetryError::Operation(e)) => println!("  Propagated immediately: {}", e),
        other => println!("  Unexpected: {:?}", other),
    }
}

/// Example 2: Retry everything except permanent errors
fn example_unless_error() {
    println!("\n=== Example 2: Unless Error ===");

    let policy = RetryPolicy::<(), FetchError>::builder()
        .unless_error(ErrorMatcher::variant(&FetchError::NotFound))
        .limit(10)
        .build()
        .expect("valid policy");

    let mut attempt = 0;
    let (result, report) = policy.call_reported(|| {
        attempt += 1;
        if attempt < 4 {
            Err(FetchError::Unavailable)
        } else {
            Err(FetchError::NotFound)
        }
    });

    println!(
        "  {:?} after {} attempts ({:?})",
        result, report.attempts, report.outcome
    );
    assert_eq!(report.outcome, Outcome::Vetoed);
}

// ==================== Return Criteria ====================

/// Example 3: Poll until a job leaves the pending state
fn example_polling() {
    println!("\n=== Example 3: Polling ===");

    #[derive(Debug, Clone, PartialEq)]
    enum JobState {
        Pending,
        Done(u32),
    }

    let policy = RetryPolicy::<JobState, ()>::builder()
        .on_return(JobState::Pending)
        .wait(Duration::from_millis(5))
        .limit(20)
        .build()
        .expect("valid policy");

    let mut polls = 0;
    let state = policy.call(|| {
        polls += 1;
        if polls < 4 {
            Ok(JobState::Pending)
        } else {
            Ok(JobState::Done(42))
        }
    });
    println!("  Final state: {:?} after {} polls", state, polls);
}

// ==================== Backoff Schedules ====================

/// Example 4: Comparing backoff schedules
fn example_backoff_schedules() {
    println!("\n=== Example 4: Backoff Schedules ===");

    let base = Duration::from_millis(100);
    let schedules = [
        ("Constant", Backoff::constant(base)),
        ("Linear", Backoff::linear(base)),
        ("Exponential", Backoff::exponential(base)),
        ("Fibonacci", Backoff::fibonacci(base)),
        (
            "Exponential capped at 500ms",
            Backoff::exponential(base).with_max_delay(Duration::from_millis(500)),
        ),
    ];

    for (name, backoff) in schedules {
        let delays: Vec<_> = (1..=6).map(|n| backoff.delay_for_retry(n)).collect();
        println!("  {}: {:?}", name, delays);
    }
}

// ==================== Receivers and Hooks ====================

struct Connection {
    reconnects: Cell<u32>,
    max_attempts: u32,
}

/// Example 5: Callbacks that see the receiver
fn example_receiver_callbacks() {
    println!("\n=== Example 5: Receiver Callbacks ===");

    let policy = RetryPolicy::<&str, FetchError, Connection>::builder()
        .on_error(ErrorMatcher::variant(&FetchError::Unavailable))
        .limit_with(|conn: &Connection| conn.max_attempts)
        .on_retry_with(|conn: &Connection| {
            conn.reconnects.set(conn.reconnects.get() + 1);
            println!("  Reconnecting ({})", conn.reconnects.get());
        })
        .build()
        .expect("valid policy");

    let conn = Connection {
        reconnects: Cell::new(0),
        max_attempts: 3,
    };

    let result = policy.call_with(&conn, |_| Err(FetchError::Unavailable));
    println!(
        "  {:?} after {} reconnects",
        result,
        conn.reconnects.get()
    );
}

// ==================== Timeout ====================

/// Example 6: A timeout cuts a long backoff short
fn example_timeout() {
    println!("\n=== Example 6: Timeout ===");

    let policy = RetryPolicy::<(), FetchError>::builder()
        .wait(Duration::from_secs(60))
        .timeout(Duration::from_millis(100))
        .build()
        .expect("valid policy");

    let started = Instant::now();
    let (result, report) = policy.call_reported(|| Err(FetchError::Unavailable));

    match result {
        Err(RetryError::Timeout(t)) => println!(
            "  {} (gave up after {:?})",
            t,
            started.elapsed()
        ),
        other => println!("  Unexpected: {:?}", other),
    }
    println!("  Outcome: {:?}", report.outcome);
}

fn main() {
    println!("Riprap Retry Patterns");
    println!("=====================");

    example_transient_errors();
    example_unless_error();
    example_polling();
    example_backoff_schedules();
    example_receiver_callbacks();
    example_timeout();

    println!("\n=== All examples completed ===");
}
