//! # Riprap
//!
//! > *Stones against the current*
//!
//! Declarative retry policies for Rust.
//!
//! A [`RetryPolicy`] is built once and describes *when* to retry:
//!
//! - **Error criteria**: retry errors of some kinds (`on_error*`), or retry
//!   everything except some kinds (`unless_error*`). A non-retryable error is
//!   propagated immediately.
//! - **Return criteria**: retry while the operation returns certain values
//!   (`on_return*`), or until it returns one of them (`unless_return*`).
//! - **Limit**, **wait** (constant, callback, or [`Backoff`] schedule),
//!   **timeout**, and an **on-retry** hook.
//!
//! The policy then runs any operation, blocking the caller between attempts.
//! A timeout cuts a backoff sleep short; it never interrupts an attempt that
//! is already running.
//!
//! ## Quick Example
//!
//! ```rust
//! use riprap::{ErrorMatcher, RetryError, RetryPolicy};
//! use std::time::Duration;
//!
//! #[derive(Debug, PartialEq)]
//! enum FetchError { Unavailable, NotFound }
//!
//! let policy = RetryPolicy::<String, FetchError>::builder()
//!     .on_error(ErrorMatcher::variant(&FetchError::Unavailable))
//!     .limit(5)
//!     .wait(Duration::from_millis(1))
//!     .timeout(Duration::from_secs(2))
//!     .build()
//!     .unwrap();
//!
//! let mut attempts = 0;
//! let body = policy.call(|| {
//!     attempts += 1;
//!     if attempts < 3 {
//!         Err(FetchError::Unavailable)
//!     } else {
//!         Ok("hello".to_string())
//!     }
//! });
//! assert_eq!(body, Ok("hello".to_string()));
//!
//! // NotFound is not retryable, so it comes back on the first attempt.
//! let missing = policy.call(|| Err(FetchError::NotFound));
//! assert_eq!(missing, Err(RetryError::Operation(FetchError::NotFound)));
//! ```
//!
//! ## Receivers
//!
//! Callbacks come in two explicit shapes: free (`on_error_if`, `wait_fn`,
//! ...) and receiver-aware (`on_error_if_with`, `wait_with`, ...). Receiver-aware
//! callbacks get the `&R` passed to [`RetryPolicy::call_with`].
//!
//! ## Features
//!
//! - `async`: [`RetryPolicy::call_async`] on tokio.
//! - `jitter`: randomized [`Backoff`] delays.
//! - `tracing`: attempt-level log events.
//! - `serde`: (de)serialize [`Backoff`] settings.
//! - `proptest`: `Arbitrary` for [`Backoff`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backoff;
pub mod callback;
pub mod decide;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod policy;
pub mod testing;
pub mod timeout;
pub mod wait;

#[cfg(feature = "async")]
mod asynchronous;

// Re-exports
pub use backoff::{Backoff, BackoffStrategy, Jitter};
pub use callback::Callback;
pub use decide::{ErrorCriteria, PredicateEvaluator, ReturnCriteria};
pub use engine::{Outcome, RetryEngine, RetryReport};
pub use error::{ConfigError, RetryError, RetryTimeoutError};
pub use matcher::{ErrorMatcher, ValueMatcher};
pub use policy::{Limit, RetryPolicy, RetryPolicyBuilder, Timeout, Wait};
pub use timeout::{GuardState, TimeoutGuard};
pub use wait::WaitScheduler;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backoff::Backoff;
    pub use crate::error::{ConfigError, RetryError, RetryTimeoutError};
    pub use crate::matcher::{ErrorMatcher, ValueMatcher};
    pub use crate::policy::RetryPolicy;
}
