//! Backoff delay computation.

use std::time::Duration;

use crate::callback::Callback;
use crate::policy::Wait;

/// Computes the delay before each attempt of one invocation.
///
/// Holds the previous delay so decorrelated jitter can build on it, which is
/// why a fresh scheduler is created per invocation.
///
/// # Examples
///
/// ```rust
/// use riprap::{Wait, WaitScheduler};
/// use std::time::Duration;
///
/// let wait: Wait<()> = Wait::Constant(Duration::from_millis(10));
/// let mut scheduler = WaitScheduler::new(&wait);
///
/// assert_eq!(scheduler.compute_wait(0, &()), Duration::ZERO);
/// assert_eq!(scheduler.compute_wait(1, &()), Duration::from_millis(10));
/// ```
#[derive(Debug)]
pub struct WaitScheduler<'p, R> {
    wait: &'p Wait<R>,
    previous: Option<Duration>,
}

impl<'p, R> WaitScheduler<'p, R> {
    /// Create a scheduler for one invocation.
    pub fn new(wait: &'p Wait<R>) -> Self {
        Self {
            wait,
            previous: None,
        }
    }

    /// The delay before the attempt following `attempt` completed attempts.
    ///
    /// `attempt` 0 is the first try and always yields zero.
    pub fn compute_wait(&mut self, attempt: u32, receiver: &R) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = match self.wait {
            Wait::None => Duration::ZERO,
            Wait::Constant(d) => *d,
            Wait::Backoff(backoff) => backoff.delay_with_jitter(attempt, self.previous),
            Wait::Dynamic(Callback::Free(f)) => f(attempt),
            Wait::Dynamic(Callback::ReceiverAware(g)) => g(receiver, attempt),
        };

        self.previous = Some(delay);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::Backoff;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn first_attempt_never_waits() {
        let waits: Vec<Wait<()>> = vec![
            Wait::None,
            Wait::Constant(Duration::from_secs(1000)),
            Wait::Backoff(Backoff::exponential(Duration::from_secs(1))),
            Wait::Dynamic(Callback::Free(Arc::new(|_: u32| Duration::from_secs(5)))),
        ];
        for wait in &waits {
            assert_eq!(WaitScheduler::new(wait).compute_wait(0, &()), Duration::ZERO);
        }
    }

    #[test]
    fn absent_wait_is_zero() {
        let wait: Wait<()> = Wait::None;
        let mut scheduler = WaitScheduler::new(&wait);
        assert_eq!(scheduler.compute_wait(3, &()), Duration::ZERO);
    }

    #[test]
    fn free_callback_gets_attempt() {
        let wait: Wait<()> = Wait::Dynamic(Callback::Free(Arc::new(|n: u32| {
            Duration::from_millis(u64::from(n) * 10)
        })));
        let mut scheduler = WaitScheduler::new(&wait);
        assert_eq!(scheduler.compute_wait(1, &()), Duration::from_millis(10));
        assert_eq!(scheduler.compute_wait(4, &()), Duration::from_millis(40));
    }

    #[test]
    fn receiver_aware_callback_can_mutate_receiver() {
        let wait: Wait<AtomicU32> = Wait::Dynamic(Callback::ReceiverAware(Arc::new(
            |seen: &AtomicU32, n: u32| {
                seen.fetch_add(1, Ordering::SeqCst);
                Duration::from_millis(u64::from(n))
            },
        )));
        let receiver = AtomicU32::new(0);
        let mut scheduler = WaitScheduler::new(&wait);

        scheduler.compute_wait(1, &receiver);
        scheduler.compute_wait(2, &receiver);
        assert_eq!(receiver.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_is_evaluated_per_attempt() {
        let wait: Wait<()> = Wait::Backoff(Backoff::linear(Duration::from_millis(5)));
        let mut scheduler = WaitScheduler::new(&wait);
        assert_eq!(scheduler.compute_wait(1, &()), Duration::from_millis(5));
        assert_eq!(scheduler.compute_wait(2, &()), Duration::from_millis(10));
    }
}
