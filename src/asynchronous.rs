//! Retry loop for async operations.
//!
//! Same decisions as the blocking engine. The deadline is a
//! `tokio::time::Instant` instead of a timer thread: a backoff sleep simply
//! ends at whichever comes first, the next attempt or the deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::engine::{next_attempt, timed_out, Outcome, RetryReport};
use crate::error::{RetryError, RetryTimeoutError};
use crate::policy::RetryPolicy;
use crate::wait::WaitScheduler;

impl<T, E, R> RetryPolicy<T, E, R> {
    /// Run an async `operation`, handing `receiver` to it and to receiver-aware callbacks.
    pub async fn call_async_with<F, Fut>(
        &self,
        receiver: &R,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(&R) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_async_with_report(receiver, operation).await.0
    }

    /// Like [`call_async_with`](Self::call_async_with), also returning a [`RetryReport`].
    pub async fn call_async_with_report<F, Fut>(
        &self,
        receiver: &R,
        mut operation: F,
    ) -> (Result<T, RetryError<E>>, RetryReport)
    where
        F: FnMut(&R) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut attempts = 0;

        let (result, outcome) = self.drive_async(receiver, &mut operation, &mut attempts).await;

        let report = RetryReport {
            attempts,
            elapsed: started.elapsed(),
            outcome,
        };
        (result, report)
    }

    async fn drive_async<F, Fut>(
        &self,
        receiver: &R,
        operation: &mut F,
        tried: &mut u32,
    ) -> (Result<T, RetryError<E>>, Outcome)
    where
        F: FnMut(&R) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let limit = match self.resolve_limit(receiver) {
            Ok(limit) => limit,
            Err(err) => return (Err(err.into()), Outcome::Misconfigured),
        };
        let timeout = match self.resolve_timeout(receiver) {
            Ok(timeout) => timeout,
            Err(err) => return (Err(err.into()), Outcome::Misconfigured),
        };
        let deadline = Deadline::start(timeout);

        let evaluator = self.evaluator();
        let mut scheduler = WaitScheduler::new(self.wait());

        loop {
            if let Err(err) = deadline.check(*tried) {
                return timed_out(err);
            }

            if *tried > 0 {
                self.notify_retry(receiver);

                let delay = scheduler.compute_wait(*tried, receiver);
                if !delay.is_zero() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Waiting {:?} before attempt {}", delay, *tried + 1);
                    deadline.sleep(delay).await;
                }

                if let Err(err) = deadline.check(*tried) {
                    return timed_out(err);
                }
            }

            *tried = next_attempt(*tried);
            let exhausted = limit.is_some_and(|max| *tried >= max);

            match operation(receiver).await {
                Ok(value) => {
                    let again = evaluator.decide_after_success(&value, receiver);
                    if !again || exhausted {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("Accepted result of attempt {}", *tried);
                        return (Ok(value), Outcome::Accepted);
                    }
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Attempt {} returned a retryable value", *tried);
                }
                Err(error) => {
                    if !evaluator.decide_after_failure(&error, receiver) {
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

impl<T, E> RetryPolicy<T, E, ()> {
    /// Run a zero-argument async `operation` under this policy.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use riprap::RetryPolicy;
    ///
    /// # tokio_test::block_on(async {
    /// let policy = RetryPolicy::<&str, &str>::builder()
    ///     .on_error_if(|e| *e == "busy")
    ///     .build()
    ///     .unwrap();
    ///
    /// let result = policy.call_async(|| async { Ok("done") }).await;
    /// assert_eq!(result, Ok("done"));
    /// # });
    /// ```
    pub async fn call_async<F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_async_with(&(), |_| operation()).await
    }
}

struct Deadline {
    timeout: Duration,
    at: Option<Instant>,
}

impl Deadline {
    fn start(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => Self {
                timeout,
                at: Instant::now().checked_add(timeout),
            },
            None => Self {
                timeout: Duration::ZERO,
                at: None,
            },
        }
    }

    fn check(&self, attempts: u32) -> Result<(), RetryTimeoutError> {
        match self.at {
            Some(at) if Instant::now() >= at => Err(RetryTimeoutError::new(self.timeout, attempts)),
            _ => Ok(()),
        }
    }

    async fn sleep(&self, delay: Duration) {
        let wake = Instant::now().checked_add(delay);
        let until = match (wake, self.at) {
            (Some(wake), Some(at)) => wake.min(at),
            (Some(wake), None) => wake,
            (None, Some(at)) => at,
            (None, None) => return std::future::pending().await,
        };
        tokio::time::sleep_until(until).await;
    }
}
