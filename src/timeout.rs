//! Deadline timer shared between the retry loop and a background thread.
//!
//! One [`TimeoutGuard`] exists per invocation. Arming it spawns a detached
//! timer thread that waits on the same condition variable the retry loop
//! sleeps on, so either side can wake the other:
//!
//! - the timer sets `expired` when the duration elapses, cutting any backoff
//!   sleep short;
//! - the loop sets `cancelled` when it finishes, letting the timer exit
//!   without ever setting `expired`.
//!
//! Both flags live behind one mutex, which makes "cancel strictly before
//! expiry means never expired" hold.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::RetryTimeoutError;

/// Lifecycle of a [`TimeoutGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// No timeout configured; never expires.
    Idle,
    /// Timer running.
    Armed,
    /// The duration elapsed before cancellation.
    Expired,
    /// Cancelled before the duration elapsed.
    Cancelled,
}

#[derive(Debug, Default)]
struct Flags {
    expired: bool,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct TimeoutSignal {
    flags: Mutex<Flags>,
    changed: Condvar,
}

impl TimeoutSignal {
    // The flags are plain booleans, so a poisoned lock still holds usable state.
    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer side: wait out `duration` unless cancelled first.
    fn run_timer(&self, duration: Duration) {
        let deadline = Instant::now().checked_add(duration);
        let mut flags = self.lock();
        loop {
            if flags.cancelled {
                return;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                flags.expired = true;
                self.changed.notify_all();
                return;
            }
            flags = self.wait(flags, remaining);
        }
    }

    /// Loop side: sleep up to `duration`, returning early once expired.
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now().checked_add(duration);
        let mut flags = self.lock();
        loop {
            if flags.expired {
                return;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                return;
            }
            flags = self.wait(flags, remaining);
        }
    }

    fn wait<'a>(&self, flags: MutexGuard<'a, Flags>, timeout: Duration) -> MutexGuard<'a, Flags> {
        match self.changed.wait_timeout(flags, timeout) {
            Ok((flags, _)) => flags,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }

    /// Returns true if this call moved the signal out of the running state.
    fn cancel(&self) -> bool {
        let mut flags = self.lock();
        if flags.expired || flags.cancelled {
            return false;
        }
        flags.cancelled = true;
        self.changed.notify_all();
        true
    }

    fn expire(&self) {
        let mut flags = self.lock();
        if !flags.cancelled {
            flags.expired = true;
            self.changed.notify_all();
        }
    }

    fn state(&self) -> GuardState {
        let flags = self.lock();
        match (flags.expired, flags.cancelled) {
            (true, _) => GuardState::Expired,
            (false, true) => GuardState::Cancelled,
            (false, false) => GuardState::Armed,
        }
    }
}

/// Per-invocation deadline with an interruptible sleep.
///
/// # Examples
///
/// ```rust
/// use riprap::{GuardState, TimeoutGuard};
/// use std::time::{Duration, Instant};
///
/// let guard = TimeoutGuard::arm(Duration::from_millis(20));
/// let started = Instant::now();
///
/// // A long backoff is cut short by the deadline.
/// guard.sleep(Duration::from_secs(60));
/// assert!(started.elapsed() < Duration::from_secs(60));
/// assert!(guard.check_expired(1).is_err());
/// assert_eq!(guard.state(), GuardState::Expired);
/// ```
#[derive(Debug)]
pub struct TimeoutGuard {
    armed: Option<Armed>,
}

#[derive(Debug)]
struct Armed {
    timeout: Duration,
    signal: Arc<TimeoutSignal>,
    // Set only when the timer thread could not be spawned; the loop then
    // enforces the deadline itself.
    fallback_deadline: Option<Instant>,
}

impl TimeoutGuard {
    /// A guard with no deadline.
    pub fn idle() -> Self {
        Self { armed: None }
    }

    /// Start a background timer for `timeout`.
    pub fn arm(timeout: Duration) -> Self {
        let signal = Arc::new(TimeoutSignal::default());
        let timer_signal = Arc::clone(&signal);

        let spawned = thread::Builder::new()
            .name("riprap-timeout".to_string())
            .spawn(move || timer_signal.run_timer(timeout));

        let fallback_deadline = match spawned {
            // Detached: the thread exits on its own once expired or cancelled.
            Ok(_handle) => None,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to spawn timeout thread, checking deadline inline: {}", _err);
                Some(Instant::now().checked_add(timeout).unwrap_or_else(far_future))
            }
        };

        Self {
            armed: Some(Armed {
                timeout,
                signal,
                fallback_deadline,
            }),
        }
    }

    /// Arm for `timeout` if present, otherwise stay idle.
    pub fn new(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => Self::arm(timeout),
            None => Self::idle(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GuardState {
        match &self.armed {
            None => GuardState::Idle,
            Some(armed) => {
                armed.expire_if_past_fallback();
                armed.signal.state()
            }
        }
    }

    /// Returns true once the deadline has elapsed.
    pub fn is_expired(&self) -> bool {
        self.state() == GuardState::Expired
    }

    /// Fail with [`RetryTimeoutError`] if the deadline has elapsed.
    ///
    /// `attempts` is recorded in the error.
    pub fn check_expired(&self, attempts: u32) -> Result<(), RetryTimeoutError> {
        match &self.armed {
            Some(armed) if self.is_expired() => {
                Err(RetryTimeoutError::new(armed.timeout, attempts))
            }
            _ => Ok(()),
        }
    }

    /// Sleep up to `duration`, waking early if the deadline elapses.
    pub fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        match &self.armed {
            None => thread::sleep(duration),
            Some(armed) => {
                let duration = match armed.fallback_deadline {
                    Some(deadline) => {
                        duration.min(deadline.saturating_duration_since(Instant::now()))
                    }
                    None => duration,
                };
                armed.signal.sleep(duration);
            }
        }
    }

    /// Stop the timer. Idempotent.
    ///
    /// Returns true if this call cancelled a running timer. After a
    /// successful cancel the guard never reports expiry.
    pub fn cancel(&self) -> bool {
        match &self.armed {
            None => false,
            Some(armed) => armed.signal.cancel(),
        }
    }
}

impl Armed {
    fn expire_if_past_fallback(&self) {
        if let Some(deadline) = self.fallback_deadline {
            if Instant::now() >= deadline {
                self.signal.expire();
            }
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn far_future() -> Instant {
    // Roughly 30 years; Instant has no MAX.
    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365 * 30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_guard_never_expires() {
        let guard = TimeoutGuard::idle();
        assert_eq!(guard.state(), GuardState::Idle);
        assert!(guard.check_expired(0).is_ok());
        assert!(!guard.cancel());
    }

    #[test]
    fn armed_guard_expires() {
        let guard = TimeoutGuard::arm(Duration::from_millis(10));
        assert_eq!(guard.state(), GuardState::Armed);

        guard.sleep(Duration::from_secs(30));
        let err = guard.check_expired(2).unwrap_err();
        assert_eq!(err.timeout, Duration::from_millis(10));
        assert_eq!(err.attempts, 2);
        assert!(!guard.cancel());
    }

    #[test]
    fn cancel_before_expiry_prevents_expiry() {
        let guard = TimeoutGuard::arm(Duration::from_millis(20));
        assert!(guard.cancel());
        assert!(!guard.cancel());

        thread::sleep(Duration::from_millis(60));
        assert_eq!(guard.state(), GuardState::Cancelled);
        assert!(guard.check_expired(1).is_ok());
    }

    #[test]
    fn sleep_returns_after_duration_when_not_expired() {
        let guard = TimeoutGuard::arm(Duration::from_secs(60));
        let started = Instant::now();
        guard.sleep(Duration::from_millis(10));
        assert!(started.elapsed() >= Duration::from_millis(10));
        assert!(!guard.is_expired());
    }

    #[test]
    fn huge_timeout_does_not_overflow() {
        let guard = TimeoutGuard::new(Some(Duration::MAX));
        assert_eq!(guard.state(), GuardState::Armed);
        assert!(guard.cancel());
    }

    #[test]
    fn expire_after_cancel_is_ignored() {
        let signal = TimeoutSignal::default();
        assert!(signal.cancel());
        signal.expire();
        assert_eq!(signal.state(), GuardState::Cancelled);
    }
}
