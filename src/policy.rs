//! Retry policy types and configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::callback::{Callback, HookFn, LimitFn, TimeoutFn, WaitFn};
use crate::decide::{ErrorCriteria, PredicateEvaluator, ReturnCriteria};
use crate::error::ConfigError;
use crate::matcher::{ErrorMatcher, ValueMatcher};

/// A retry policy describing when and how to retry an operation.
///
/// Policies are immutable data built once and shared by every invocation of
/// the operation they guard. `T` is the operation's value, `E` its error, and
/// `R` the receiver handed to receiver-aware callbacks (`()` when there is none).
///
/// # Defaults
///
/// With no criteria at all, *every* outcome is retried: successes keep
/// looping until `limit` or `timeout` stops them. Once any error criteria are
/// configured, an unclassified success is accepted instead. Unclassified
/// errors are always retried.
///
/// # Examples
///
/// ```rust
/// use riprap::{ErrorMatcher, RetryPolicy};
///
/// #[derive(Debug, PartialEq)]
/// enum NetError { Reset, Refused }
///
/// let policy = RetryPolicy::<u32, NetError>::builder()
///     .on_error(ErrorMatcher::variant(&NetError::Reset))
///     .limit(5)
///     .build()
///     .unwrap();
///
/// let mut calls = 0;
/// let value = policy.call(|| {
///     calls += 1;
///     if calls < 3 { Err(NetError::Reset) } else { Ok(calls) }
/// });
///
/// assert_eq!(value, Ok(3));
/// ```
pub struct RetryPolicy<T, E, R = ()> {
    errors: ErrorCriteria<E, R>,
    returns: ReturnCriteria<T, R>,
    limit: Limit<R>,
    wait: Wait<R>,
    timeout: Timeout<R>,
    on_retry: Option<HookFn<R>>,
}

/// How many attempts an invocation may make.
pub enum Limit<R> {
    /// No attempt limit.
    Unbounded,
    /// A fixed, positive number of attempts.
    Fixed(u32),
    /// Resolved once per invocation.
    Dynamic(LimitFn<R>),
}

/// The delay before each retry.
pub enum Wait<R> {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Constant(Duration),
    /// Built-in backoff schedule.
    Backoff(Backoff),
    /// Computed from the retry number on every retry.
    Dynamic(WaitFn<R>),
}

/// The wall-clock budget of one invocation.
pub enum Timeout<R> {
    /// No deadline.
    None,
    /// A fixed, positive duration.
    Fixed(Duration),
    /// Resolved once per invocation.
    Dynamic(TimeoutFn<R>),
}

impl<T, E, R> RetryPolicy<T, E, R> {
    /// Start building a policy.
    pub fn builder() -> RetryPolicyBuilder<T, E, R> {
        RetryPolicyBuilder::new()
    }

    /// Get the error criteria.
    pub fn error_criteria(&self) -> &ErrorCriteria<E, R> {
        &self.errors
    }

    /// Get the return criteria.
    pub fn return_criteria(&self) -> &ReturnCriteria<T, R> {
        &self.returns
    }

    /// Get the attempt limit.
    pub fn limit(&self) -> &Limit<R> {
        &self.limit
    }

    /// Get the wait configuration.
    pub fn wait(&self) -> &Wait<R> {
        &self.wait
    }

    /// Get the timeout configuration.
    pub fn timeout(&self) -> &Timeout<R> {
        &self.timeout
    }

    /// The evaluator that classifies outcomes under this policy.
    pub fn evaluator(&self) -> PredicateEvaluator<'_, T, E, R> {
        PredicateEvaluator::new(&self.returns, &self.errors)
    }

    /// Whether a successful `value` should be retried.
    ///
    /// Pure classification; does not account for the attempt limit.
    pub fn should_retry_value(&self, value: &T, receiver: &R) -> bool {
        self.evaluator().decide_after_success(value, receiver)
    }

    /// Whether a raised `error` should be retried. `false` is a veto.
    pub fn should_retry_error(&self, error: &E, receiver: &R) -> bool {
        self.evaluator().decide_after_failure(error, receiver)
    }

    /// Resolve the attempt limit for one invocation. `None` means unbounded.
    pub fn resolve_limit(&self, receiver: &R) -> Result<Option<u32>, ConfigError> {
        let limit = match &self.limit {
            Limit::Unbounded => return Ok(None),
            Limit::Fixed(n) => *n,
            Limit::Dynamic(Callback::Free(f)) => f(),
            Limit::Dynamic(Callback::ReceiverAware(g)) => g(receiver),
        };
        if limit == 0 {
            return Err(ConfigError::InvalidLimit);
        }
        Ok(Some(limit))
    }

    /// Resolve the timeout for one invocation. `None` means no deadline.
    pub fn resolve_timeout(&self, receiver: &R) -> Result<Option<Duration>, ConfigError> {
        let timeout = match &self.timeout {
            Timeout::None => return Ok(None),
            Timeout::Fixed(d) => *d,
            Timeout::Dynamic(Callback::Free(f)) => f(),
            Timeout::Dynamic(Callback::ReceiverAware(g)) => g(receiver),
        };
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(Some(timeout))
    }

    /// Run the `on_retry` hook, if any.
    pub(crate) fn notify_retry(&self, receiver: &R) {
        match &self.on_retry {
            None => {}
            Some(Callback::Free(f)) => f(),
            Some(Callback::ReceiverAware(g)) => g(receiver),
        }
    }
}

impl<T, E, R> Clone for RetryPolicy<T, E, R> {
    fn clone(&self) -> Self {
        Self {
            errors: self.errors.clone(),
            returns: self.returns.clone(),
            limit: self.limit.clone(),
            wait: self.wait.clone(),
            timeout: self.timeout.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<T, E, R> std::fmt::Debug for RetryPolicy<T, E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("errors", &self.errors)
            .field("returns", &self.returns)
            .field("limit", &self.limit)
            .field("wait", &self.wait)
            .field("timeout", &self.timeout)
            .field("on_retry", &self.on_retry)
            .finish()
    }
}

impl<R> Clone for Limit<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Unbounded => Self::Unbounded,
            Self::Fixed(n) => Self::Fixed(*n),
            Self::Dynamic(cb) => Self::Dynamic(cb.clone()),
        }
    }
}

impl<R> std::fmt::Debug for Limit<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => f.write_str("Unbounded"),
            Self::Fixed(n) => f.debug_tuple("Fixed").field(n).finish(),
            Self::Dynamic(cb) => f.debug_tuple("Dynamic").field(cb).finish(),
        }
    }
}

impl<R> Clone for Wait<R> {
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Constant(d) => Self::Constant(*d),
            Self::Backoff(b) => Self::Backoff(b.clone()),
            Self::Dynamic(cb) => Self::Dynamic(cb.clone()),
        }
    }
}

impl<R> std::fmt::Debug for Wait<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Constant(d) => f.debug_tuple("Constant").field(d).finish(),
            Self::Backoff(b) => f.debug_tuple("Backoff").field(b).finish(),
            Self::Dynamic(cb) => f.debug_tuple("Dynamic").field(cb).finish(),
        }
    }
}

impl<R> Clone for Timeout<R> {
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Fixed(d) => Self::Fixed(*d),
            Self::Dynamic(cb) => Self::Dynamic(cb.clone()),
        }
    }
}

impl<R> std::fmt::Debug for Timeout<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            Self::Dynamic(cb) => f.debug_tuple("Dynamic").field(cb).finish(),
        }
    }
}

/// Builder for [`RetryPolicy`].
///
/// Singular options (`on_error`, `on_return`, ...) append to the same list as
/// their plural forms. Predicates are kept apart from matchers and literals.
/// Validation happens in [`build`](Self::build).
pub struct RetryPolicyBuilder<T, E, R = ()> {
    errors: ErrorCriteria<E, R>,
    returns: ReturnCriteria<T, R>,
    limit: Limit<R>,
    wait: Wait<R>,
    timeout: Timeout<R>,
    on_retry: Option<HookFn<R>>,
    invalid_wait: Option<f64>,
}

impl<T, E, R> RetryPolicyBuilder<T, E, R> {
    /// Create a builder with no criteria, no limit, no wait, and no timeout.
    pub fn new() -> Self {
        Self {
            errors: ErrorCriteria::default(),
            returns: ReturnCriteria::default(),
            limit: Limit::Unbounded,
            wait: Wait::None,
            timeout: Timeout::None,
            on_retry: None,
            invalid_wait: None,
        }
    }

    /// Retry errors matching `matcher`.
    pub fn on_error(mut self, matcher: ErrorMatcher<E>) -> Self {
        self.errors.matchers.push(matcher);
        self
    }

    /// Retry errors matching any of `matchers`.
    pub fn on_errors(mut self, matchers: impl IntoIterator<Item = ErrorMatcher<E>>) -> Self {
        self.errors.matchers.extend(matchers);
        self
    }

    /// Retry errors for which `predicate` returns true.
    pub fn on_error_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.errors.checks.push(Callback::Free(Arc::new(predicate)));
        self
    }

    /// Retry errors for which the receiver-aware `predicate` returns true.
    pub fn on_error_if_with<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&R, &E) -> bool + Send + Sync + 'static,
    {
        self.errors
            .checks
            .push(Callback::ReceiverAware(Arc::new(predicate)));
        self
    }

    /// Propagate errors matching `matcher` immediately; retry the rest.
    pub fn unless_error(mut self, matcher: ErrorMatcher<E>) -> Self {
        self.errors.excluded.push(matcher);
        self
    }

    /// Propagate errors matching any of `matchers` immediately; retry the rest.
    pub fn unless_errors(mut self, matchers: impl IntoIterator<Item = ErrorMatcher<E>>) -> Self {
        self.errors.excluded.extend(matchers);
        self
    }

    /// Retry while the operation returns `value`.
    pub fn on_return(mut self, value: T) -> Self
    where
        T: PartialEq + std::fmt::Debug + Send + Sync + 'static,
    {
        self.returns.values.push(ValueMatcher::literal(value));
        self
    }

    /// Retry while the operation returns any of `values`.
    pub fn on_returns(mut self, values: impl IntoIterator<Item = T>) -> Self
    where
        T: PartialEq + std::fmt::Debug + Send + Sync + 'static,
    {
        self.returns
            .values
            .extend(values.into_iter().map(ValueMatcher::literal));
        self
    }

    /// Retry while `predicate` returns true for the returned value.
    pub fn on_return_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.returns.checks.push(Callback::Free(Arc::new(predicate)));
        self
    }

    /// Retry while the receiver-aware `predicate` returns true.
    pub fn on_return_if_with<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&R, &T) -> bool + Send + Sync + 'static,
    {
        self.returns
            .checks
            .push(Callback::ReceiverAware(Arc::new(predicate)));
        self
    }

    /// Accept the result as soon as the operation returns `value`.
    pub fn unless_return(mut self, value: T) -> Self
    where
        T: PartialEq + std::fmt::Debug + Send + Sync + 'static,
    {
        self.returns.excluded.push(ValueMatcher::literal(value));
        self
    }

    /// Accept the result as soon as the operation returns any of `values`.
    pub fn unless_returns(mut self, values: impl IntoIterator<Item = T>) -> Self
    where
        T: PartialEq + std::fmt::Debug + Send + Sync + 'static,
    {
        self.returns
            .excluded
            .extend(values.into_iter().map(ValueMatcher::literal));
        self
    }

    /// Make at most `attempts` attempts. Must be positive.
    pub fn limit(mut self, attempts: u32) -> Self {
        self.limit = Limit::Fixed(attempts);
        self
    }

    /// Resolve the attempt limit once per invocation.
    pub fn limit_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> u32 + Send + Sync + 'static,
    {
        self.limit = Limit::Dynamic(Callback::Free(Arc::new(f)));
        self
    }

    /// Resolve the attempt limit from the receiver once per invocation.
    pub fn limit_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&R) -> u32 + Send + Sync + 'static,
    {
        self.limit = Limit::Dynamic(Callback::ReceiverAware(Arc::new(f)));
        self
    }

    /// Wait a constant `delay` before every retry.
    pub fn wait(mut self, delay: Duration) -> Self {
        self.wait = Wait::Constant(delay);
        self.invalid_wait = None;
        self
    }

    /// Wait a constant number of seconds before every retry.
    ///
    /// Negative, NaN, or infinite values fail [`build`](Self::build).
    pub fn wait_secs(mut self, seconds: f64) -> Self {
        match Duration::try_from_secs_f64(seconds) {
            Ok(delay) => {
                self.wait = Wait::Constant(delay);
                self.invalid_wait = None;
            }
            Err(_) => self.invalid_wait = Some(seconds),
        }
        self
    }

    /// Wait according to a built-in backoff schedule.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.wait = Wait::Backoff(backoff);
        self.invalid_wait = None;
        self
    }

    /// Compute the wait from the retry number (1-based).
    pub fn wait_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.wait = Wait::Dynamic(Callback::Free(Arc::new(f)));
        self.invalid_wait = None;
        self
    }

    /// Compute the wait from the receiver and the retry number.
    pub fn wait_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&R, u32) -> Duration + Send + Sync + 'static,
    {
        self.wait = Wait::Dynamic(Callback::ReceiverAware(Arc::new(f)));
        self.invalid_wait = None;
        self
    }

    /// Give up once `timeout` has elapsed. Must be non-zero.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Timeout::Fixed(timeout);
        self
    }

    /// Resolve the timeout once per invocation.
    pub fn timeout_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Duration + Send + Sync + 'static,
    {
        self.timeout = Timeout::Dynamic(Callback::Free(Arc::new(f)));
        self
    }

    /// Resolve the timeout from the receiver once per invocation.
    pub fn timeout_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&R) -> Duration + Send + Sync + 'static,
    {
        self.timeout = Timeout::Dynamic(Callback::ReceiverAware(Arc::new(f)));
        self
    }

    /// Run `hook` before every retry (never before the first attempt).
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_retry = Some(Callback::Free(Arc::new(hook)));
        self
    }

    /// Run the receiver-aware `hook` before every retry.
    pub fn on_retry_with<F>(mut self, hook: F) -> Self
    where
        F: Fn(&R) + Send + Sync + 'static,
    {
        self.on_retry = Some(Callback::ReceiverAware(Arc::new(hook)));
        self
    }

    /// Validate the options and produce the immutable policy.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ConflictingErrorCriteria`] if both `on_error*` and
    ///   `unless_error*` were given.
    /// - [`ConfigError::ConflictingReturnCriteria`] likewise for returns.
    /// - [`ConfigError::InvalidWait`] for an unusable `wait_secs` value.
    /// - [`ConfigError::InvalidLimit`] for a fixed limit of zero.
    /// - [`ConfigError::InvalidTimeout`] for a fixed zero timeout.
    pub fn build(self) -> Result<RetryPolicy<T, E, R>, ConfigError> {
        if self.errors.has_positive() && self.errors.has_negative() {
            return Err(ConfigError::ConflictingErrorCriteria);
        }
        if self.returns.has_positive() && self.returns.has_negative() {
            return Err(ConfigError::ConflictingReturnCriteria);
        }
        if let Some(seconds) = self.invalid_wait {
            return Err(ConfigError::InvalidWait { seconds });
        }
        if let Limit::Fixed(0) = self.limit {
            return Err(ConfigError::InvalidLimit);
        }
        if let Timeout::Fixed(d) = self.timeout {
            if d.is_zero() {
                return Err(ConfigError::InvalidTimeout);
            }
        }

        Ok(RetryPolicy {
            errors: self.errors,
            returns: self.returns,
            limit: self.limit,
            wait: self.wait,
            timeout: self.timeout,
            on_retry: self.on_retry,
        })
    }
}

impl<T, E, R> Default for RetryPolicyBuilder<T, E, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E, R> std::fmt::Debug for RetryPolicyBuilder<T, E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicyBuilder")
            .field("errors", &self.errors)
            .field("returns", &self.returns)
            .field("limit", &self.limit)
            .field("wait", &self.wait)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
