//! The blocking retry loop.

use std::time::{Duration, Instant};

use crate::error::{RetryError, RetryTimeoutError};
use crate::policy::RetryPolicy;
use crate::timeout::TimeoutGuard;
use crate::wait::WaitScheduler;

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A value was accepted.
    Accepted,
    /// The error criteria vetoed an error, which was propagated immediately.
    Vetoed,
    /// The attempt limit ran out on an error.
    Exhausted,
    /// The deadline elapsed.
    TimedOut,
    /// A dynamic limit or timeout resolved to an invalid value.
    Misconfigured,
}

/// Metadata about a finished invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryReport {
    /// Number of times the operation was invoked.
    pub attempts: u32,
    /// Wall-clock time spent, backoff included.
    pub elapsed: Duration,
    /// How the invocation ended.
    pub outcome: Outcome,
}

/// Drives one invocation of an operation under a policy.
///
/// Most callers go through [`RetryPolicy::call`] or [`RetryPolicy::call_with`];
/// the engine is public for callers that want the [`RetryReport`].
#[derive(Debug)]
pub struct RetryEngine<'p, T, E, R> {
    policy: &'p RetryPolicy<T, E, R>,
    receiver: &'p R,
}

impl<'p, T, E, R> RetryEngine<'p, T, E, R> {
    /// Bind a policy to the receiver its callbacks will see.
    pub fn new(policy: &'p RetryPolicy<T, E, R>, receiver: &'p R) -> Self {
        Self { policy, receiver }
    }

    /// Run `operation` until a terminal outcome.
    ///
    /// Blocks the calling thread. The operation itself is never interrupted;
    /// the deadline is only observed between attempts and during backoff.
    pub fn run<F>(&self, mut operation: F) -> (Result<T, RetryError<E>>, RetryReport)
    where
        F: FnMut(&R) -> Result<T, E>,
    {
        let started = Instant::now();
        let mut attempts = 0;

        let (result, outcome) = self.resolve_and_loop(&mut operation, &mut attempts);

        let report = RetryReport {
            attempts,
            elapsed: started.elapsed(),
            outcome,
        };
        (result, report)
    }

    fn resolve_and_loop<F>(
        &self,
        operation: &mut F,
        tried: &mut u32,
    ) -> (Result<T, RetryError<E>>, Outcome)
    where
        F: FnMut(&R) -> Result<T, E>,
    {
        let limit = match self.policy.resolve_limit(self.receiver) {
            Ok(limit) => limit,
            Err(err) => return (Err(err.into()), Outcome::Misconfigured),
        };
        let timeout = match self.policy.resolve_timeout(self.receiver) {
            Ok(timeout) => timeout,
            Err(err) => return (Err(err.into()), Outcome::Misconfigured),
        };

        let guard = TimeoutGuard::new(timeout);
        let finished = self.attempt_loop(operation, &guard, limit, tried);
        guard.cancel();
        finished
    }

    fn attempt_loop<F>(
        &self,
        operation: &mut F,
        guard: &TimeoutGuard,
        limit: Option<u32>,
        tried: &mut u32,
    ) -> (Result<T, RetryError<E>>, Outcome)
    where
        F: FnMut(&R) -> Result<T, E>,
    {
        let evaluator = self.policy.evaluator();
        let mut scheduler = WaitScheduler::new(self.policy.wait());

        loop {
            if let Err(timeout) = guard.check_expired(*tried) {
                return timed_out(timeout);
            }

            if *tried > 0 {
                self.policy.notify_retry(self.receiver);

                let delay = scheduler.compute_wait(*tried, self.receiver);
                if !delay.is_zero() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Waiting {:?} before attempt {}", delay, *tried + 1);
                    guard.sleep(delay);
                }

                if let Err(timeout) = guard.check_expired(*tried) {
                    return timed_out(timeout);
                }
            }

            *tried = next_attempt(*tried);
            let exhausted = limit.is_some_and(|max| *tried >= max);

            match operation(self.receiver) {
                Ok(value) => {
                    let again = evaluator.decide_after_success(&value, self.receiver);
                    if !again || exhausted {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("Accepted result of attempt {}", *tried);
                        return (Ok(value), Outcome::Accepted);
                    }
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Attempt {} returned a retryable value", *tried);
                }
                Err(error) => {
                    if !evaluator.decide_after_failure(&error, self.receiver) {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("Attempt {} failed with a non-retryable error", *tried);
                        return (Err(RetryError::Operation(error)), Outcome::Vetoed);
                    }
                    if exhausted {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("Retry limit reached after {} attempts", *tried);
                        return (Err(RetryError::Operation(error)), Outcome::Exhausted);
                    }
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Attempt {} failed, retrying", *tried);
                }
            }
        }
    }
}

pub(crate) fn timed_out<T, E>(
    err: RetryTimeoutError,
) -> (Result<T, RetryError<E>>, Outcome) {
    #[cfg(feature = "tracing")]
    tracing::warn!("Giving up: {}", err);
    (Err(RetryError::Timeout(err)), Outcome::TimedOut)
}

// An unbounded loop without a deadline can outlive the counter.
pub(crate) fn next_attempt(tried: u32) -> u32 {
    tried.saturating_add(1)
}

impl<T, E, R> RetryPolicy<T, E, R> {
    /// Run `operation`, handing `receiver` to it and to receiver-aware callbacks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use riprap::RetryPolicy;
    /// use std::cell::Cell;
    ///
    /// struct Client { calls: Cell<u32> }
    ///
    /// let policy = RetryPolicy::<u32, (), Client>::builder()
    ///     .limit_with(|_client: &Client| 3)
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = Client { calls: Cell::new(0) };
    /// let value = policy.call_with(&client, |c| {
    ///     c.calls.set(c.calls.get() + 1);
    ///     Ok(c.calls.get())
    /// });
    ///
    /// assert_eq!(value, Ok(3));
    /// ```
    pub fn call_with<F>(&self, receiver: &R, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(&R) -> Result<T, E>,
    {
        self.call_with_report(receiver, operation).0
    }

    /// Like [`call_with`](Self::call_with), also returning a [`RetryReport`].
    pub fn call_with_report<F>(
        &self,
        receiver: &R,
        operation: F,
    ) -> (Result<T, RetryError<E>>, RetryReport)
    where
        F: FnMut(&R) -> Result<T, E>,
    {
        RetryEngine::new(self, receiver).run(operation)
    }
}

impl<T, E> RetryPolicy<T, E, ()> {
    /// Run a zero-argument `operation` under this policy.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use riprap::RetryPolicy;
    ///
    /// let policy = RetryPolicy::<u32, ()>::builder().limit(3).build().unwrap();
    ///
    /// let mut counter = 0;
    /// let value = policy.call(|| {
    ///     counter += 1;
    ///     Ok(counter)
    /// });
    ///
    /// // Without criteria every success is retried until the limit.
    /// assert_eq!(value, Ok(3));
    /// ```
    pub fn call<F>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.call_with(&(), |_| operation())
    }

    /// Like [`call`](Self::call), also returning a [`RetryReport`].
    pub fn call_reported<F>(&self, mut operation: F) -> (Result<T, RetryError<E>>, RetryReport)
    where
        F: FnMut() -> Result<T, E>,
    {
        self.call_with_report(&(), |_| operation())
    }
}
