//! Callbacks that optionally receive the invocation's receiver.
//!
//! Whether a callback wants the receiver is chosen explicitly when the policy
//! is built, never inferred from the callable at run time.

use std::sync::Arc;
use std::time::Duration;

/// A callback that is either free-standing or receiver-aware.
///
/// `F` is the free signature, `G` the same signature with a leading `&R`.
pub enum Callback<F: ?Sized, G: ?Sized> {
    /// Called without the receiver.
    Free(Arc<F>),
    /// Called with the receiver as first argument.
    ReceiverAware(Arc<G>),
}

impl<F: ?Sized, G: ?Sized> Callback<F, G> {
    /// Returns true if the callback takes the receiver.
    pub fn is_receiver_aware(&self) -> bool {
        matches!(self, Self::ReceiverAware(_))
    }
}

impl<F: ?Sized, G: ?Sized> Clone for Callback<F, G> {
    fn clone(&self) -> Self {
        match self {
            Self::Free(f) => Self::Free(Arc::clone(f)),
            Self::ReceiverAware(g) => Self::ReceiverAware(Arc::clone(g)),
        }
    }
}

impl<F: ?Sized, G: ?Sized> std::fmt::Debug for Callback<F, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free(_) => f.write_str("Callback::Free(..)"),
            Self::ReceiverAware(_) => f.write_str("Callback::ReceiverAware(..)"),
        }
    }
}

/// Predicate over a returned value or raised error.
pub type CheckFn<R, V> =
    Callback<dyn Fn(&V) -> bool + Send + Sync, dyn Fn(&R, &V) -> bool + Send + Sync>;

/// Maps a retry number (1-based) to a backoff delay.
pub type WaitFn<R> =
    Callback<dyn Fn(u32) -> Duration + Send + Sync, dyn Fn(&R, u32) -> Duration + Send + Sync>;

/// Produces an attempt limit once per invocation.
pub type LimitFn<R> = Callback<dyn Fn() -> u32 + Send + Sync, dyn Fn(&R) -> u32 + Send + Sync>;

/// Produces a timeout once per invocation.
pub type TimeoutFn<R> =
    Callback<dyn Fn() -> Duration + Send + Sync, dyn Fn(&R) -> Duration + Send + Sync>;

/// Notification run before every retry.
pub type HookFn<R> = Callback<dyn Fn() + Send + Sync, dyn Fn(&R) + Send + Sync>;

pub(crate) fn check<R, V: ?Sized>(
    callback: &Callback<dyn Fn(&V) -> bool + Send + Sync, dyn Fn(&R, &V) -> bool + Send + Sync>,
    receiver: &R,
    value: &V,
) -> bool {
    match callback {
        Callback::Free(f) => f(value),
        Callback::ReceiverAware(g) => g(receiver, value),
    }
}
