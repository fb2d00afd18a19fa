//! Async Retry Example
//!
//! Runs the same policies against async operations on tokio.
//!
//! Run with: cargo run --example async_retry --features async

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use riprap::{Backoff, ErrorMatcher, RetryError, RetryPolicy};

#[derive(Debug, Clone, PartialEq)]
enum ApiError {
    RateLimited,
    Unauthorized,
}

async fn example_backoff() {
    println!("\n=== Example 1: Async Backoff ===");

    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::<String, ApiError>::builder()
        .on_error(ErrorMatcher::variant(&ApiError::RateLimited))
        .backoff(Backoff::exponential(Duration::from_millis(20)))
        .limit(5)
        .build()
        .expect("valid policy");

    let (result, report) = policy
        .call_async_with_report(&(), |_| {
            let attempts = attempts.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                println!("  Request {}", n);
                if n < 3 {
                    Err(ApiError::RateLimited)
                } else {
                    Ok(format!("response #{}", n))
                }
            }
        })
        .await;

    println!("  {:?} in {:?}", result, report.elapsed);
}

async fn example_veto() {
    println!("\n=== Example 2: Non-retryable Error ===");

    let policy = RetryPolicy::<String, ApiError>::builder()
        .unless_error(ErrorMatcher::variant(&ApiError::Unauthorized))
        .limit(5)
        .build()
        .expect("valid policy");

    let result = policy.call_async(|| async { Err(ApiError::Unauthorized) }).await;
    println!("  {:?}", result);
}

async fn example_timeout() {
    println!("\n=== Example 3: Async Timeout ===");

    let policy = RetryPolicy::<u32, ApiError>::builder()
        .wait(Duration::from_secs(30))
        .timeout(Duration::from_millis(100))
        .build()
        .expect("valid policy");

    match policy.call_async(|| async { Err(ApiError::RateLimited) }).await {
        Err(RetryError::Timeout(t)) => println!("  {}", t),
        other => println!("  Unexpected: {:?}", other),
    }
}

#[tokio::main]
async fn main() {
    println!("Riprap Async Retry");
    println!("==================");

    example_backoff().await;
    example_veto().await;
    example_timeout().await;
}
