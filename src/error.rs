//! Error types for retry operations.
//!
//! Three kinds of failure can come out of a retried call:
//!
//! - [`ConfigError`]: the policy itself is invalid (conflicting criteria, zero
//!   limit, zero timeout, ...). Never retried.
//! - the operation's own error `E`, carried untouched in
//!   [`RetryError::Operation`] when it was vetoed or the limit ran out.
//! - [`RetryTimeoutError`]: the wall-clock deadline elapsed first.

use std::time::Duration;

/// Error raised when a retry policy is constructed or resolved with invalid options.
///
/// # Examples
///
/// ```rust
/// use riprap::{ConfigError, ErrorMatcher, RetryPolicy};
///
/// #[derive(Debug)]
/// enum AppError { Busy, Fatal }
///
/// let result = RetryPolicy::<(), AppError>::builder()
///     .on_error(ErrorMatcher::variant(&AppError::Busy))
///     .unless_error(ErrorMatcher::variant(&AppError::Fatal))
///     .build();
///
/// assert_eq!(result.unwrap_err(), ConfigError::ConflictingErrorCriteria);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Both positive (`on_error*`) and negative (`unless_error*`) error criteria were given.
    ConflictingErrorCriteria,
    /// Both positive (`on_return*`) and negative (`unless_return*`) return criteria were given.
    ConflictingReturnCriteria,
    /// A wait given in seconds was negative, NaN, or infinite.
    InvalidWait {
        /// The rejected value.
        seconds: f64,
    },
    /// The attempt limit resolved to zero.
    InvalidLimit,
    /// The timeout resolved to a zero duration.
    InvalidTimeout,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConflictingErrorCriteria => {
                write!(f, "on_error and unless_error criteria are mutually exclusive")
            }
            Self::ConflictingReturnCriteria => {
                write!(f, "on_return and unless_return criteria are mutually exclusive")
            }
            Self::InvalidWait { seconds } => write!(
                f,
                "wait should be a non-negative number of seconds or a callback of try count, got {}",
                seconds
            ),
            Self::InvalidLimit => write!(f, "limit should be a positive number of attempts"),
            Self::InvalidTimeout => write!(f, "timeout should be a positive duration"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Error returned when the retry deadline elapses before a terminal outcome.
///
/// The deadline is only observed between attempts: an attempt already in
/// flight is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimeoutError {
    /// The configured timeout that was exceeded.
    pub timeout: Duration,
    /// Number of attempts started before the deadline was observed.
    pub attempts: u32,
}

impl RetryTimeoutError {
    /// Create a new timeout error.
    pub fn new(timeout: Duration, attempts: u32) -> Self {
        Self { timeout, attempts }
    }
}

impl std::fmt::Display for RetryTimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "retry timeout after {:?} ({} attempts)",
            self.timeout, self.attempts
        )
    }
}

impl std::error::Error for RetryTimeoutError {}

/// The terminal failure of a retried call.
///
/// # Examples
///
/// ```rust
/// use riprap::{RetryError, RetryPolicy};
///
/// let policy = RetryPolicy::<(), &str>::builder().limit(2).build().unwrap();
///
/// match policy.call(|| Err("always fails")) {
///     Err(RetryError::Operation(e)) => assert_eq!(e, "always fails"),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The operation's own error, either vetoed by the error criteria or left
    /// over when the attempt limit ran out.
    Operation(E),
    /// The deadline elapsed first.
    Timeout(RetryTimeoutError),
    /// A dynamic limit or timeout resolved to an invalid value.
    Config(ConfigError),
}

impl<E> RetryError<E> {
    /// Returns true if this is the operation's own error.
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// Returns true if the deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns true if the policy could not be resolved.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Get a reference to the operation's error if present.
    pub fn operation(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Extract the operation's error, discarding the other kinds.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Map the operation's error, leaving timeouts and config errors untouched.
    pub fn map_operation<E2, F>(self, f: F) -> RetryError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::Operation(e) => RetryError::Operation(f(e)),
            Self::Timeout(t) => RetryError::Timeout(t),
            Self::Config(c) => RetryError::Config(c),
        }
    }
}

impl<E> From<ConfigError> for RetryError<E> {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl<E> From<RetryTimeoutError> for RetryError<E> {
    fn from(err: RetryTimeoutError) -> Self {
        Self::Timeout(err)
    }
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operation(e) => write!(f, "{}", e),
            Self::Timeout(t) => write!(f, "{}", t),
            Self::Config(c) => write!(f, "invalid retry policy: {}", c),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Operation(e) => Some(e),
            Self::Timeout(t) => Some(t),
            Self::Config(c) => Some(c),
        }
    }
}
