//! Tracing Example
//!
//! Shows the debug events emitted for each attempt, wait and terminal outcome.
//!
//! Run with: cargo run --example tracing_demo --features tracing

use std::time::Duration;

use riprap::{ErrorMatcher, RetryPolicy};

#[derive(Debug, Clone, PartialEq)]
enum DbError {
    Deadlock,
    Constraint,
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let policy = RetryPolicy::<u64, DbError>::builder()
        .on_error(ErrorMatcher::variant(&DbError::Deadlock))
        .wait(Duration::from_millis(10))
        .limit(4)
        .build()
        .expect("valid policy");

    let mut attempt = 0;
    let inserted = policy.call(|| {
        attempt += 1;
        if attempt < 3 {
            Err(DbError::Deadlock)
        } else {
            Ok(17)
        }
    });
    tracing::info!("insert finished: {:?}", inserted);

    let rejected = policy.call(|| Err(DbError::Constraint));
    tracing::info!("insert finished: {:?}", rejected);

    let timed = RetryPolicy::<u64, DbError>::builder()
        .wait(Duration::from_secs(10))
        .timeout(Duration::from_millis(50))
        .build()
        .expect("valid policy");
    let result = timed.call(|| Err(DbError::Deadlock));
    tracing::info!("bounded insert finished: {:?}", result);
}
