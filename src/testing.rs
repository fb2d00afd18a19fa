//! Testing utilities for code that retries.
//!
//! # Examples
//!
//! ```rust
//! use riprap::testing::CallCounter;
//! use riprap::{assert_accepted, RetryPolicy};
//!
//! let calls = CallCounter::new();
//! let policy = RetryPolicy::<u32, ()>::builder().limit(3).build().unwrap();
//!
//! assert_accepted!(policy.call(|| Ok(calls.tick())), 3);
//! assert_eq!(calls.count(), 3);
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A shareable counter of operation invocations.
///
/// Clones share the same count, so one clone can move into an operation or
/// callback while the test keeps another.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    count: Arc<AtomicU32>,
}

impl CallCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new count (1 on the first call).
    pub fn tick(&self) -> u32 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The current count.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

/// Assert that a retried call produced a value, optionally a specific one.
///
/// # Example
///
/// ```rust
/// use riprap::{assert_accepted, RetryError};
///
/// let result: Result<i32, RetryError<String>> = Ok(4);
/// assert_accepted!(result.clone());
/// assert_accepted!(result, 4);
/// ```
#[macro_export]
macro_rules! assert_accepted {
    ($result:expr) => {
        match $result {
            Ok(_) => {}
            Err(e) => {
                panic!("Expected an accepted value, got error: {:?}", e);
            }
        }
    };
    ($result:expr, $expected:expr) => {
        match $result {
            Ok(value) => assert_eq!(value, $expected),
            Err(e) => {
                panic!("Expected accepted value {:?}, got error: {:?}", $expected, e);
            }
        }
    };
}

/// Assert that a retried call propagated the operation's own error.
///
/// # Example
///
/// ```rust
/// use riprap::{assert_operation_error, RetryError};
///
/// let result: Result<i32, RetryError<&str>> = Err(RetryError::Operation("boom"));
/// assert_operation_error!(result, "boom");
/// ```
#[macro_export]
macro_rules! assert_operation_error {
    ($result:expr) => {
        match $result {
            Err($crate::RetryError::Operation(_)) => {}
            other => {
                panic!("Expected an operation error, got: {:?}", other);
            }
        }
    };
    ($result:expr, $expected:expr) => {
        match $result {
            Err($crate::RetryError::Operation(e)) => assert_eq!(e, $expected),
            other => {
                panic!("Expected operation error {:?}, got: {:?}", $expected, other);
            }
        }
    };
}

/// Assert that a retried call timed out.
///
/// # Example
///
/// ```rust
/// use riprap::{assert_timed_out, RetryError, RetryTimeoutError};
/// use std::time::Duration;
///
/// let result: Result<i32, RetryError<()>> =
///     Err(RetryTimeoutError::new(Duration::from_millis(5), 2).into());
/// assert_timed_out!(result);
/// ```
#[macro_export]
macro_rules! assert_timed_out {
    ($result:expr) => {
        match $result {
            Err($crate::RetryError::Timeout(_)) => {}
            other => {
                panic!("Expected a retry timeout, got: {:?}", other);
            }
        }
    };
}
