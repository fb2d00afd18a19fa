//! Built-in backoff strategies.

use std::time::Duration;

/// A backoff schedule for the delay inserted before each retry.
///
/// Backoffs are pure data - they describe delays but don't sleep.
/// Retry numbers are 1-based: retry 1 is the wait before the second attempt.
///
/// # Examples
///
/// ```rust
/// use riprap::Backoff;
/// use std::time::Duration;
///
/// // Exponential backoff capped at one second
/// let backoff = Backoff::exponential(Duration::from_millis(100))
///     .with_max_delay(Duration::from_secs(1));
///
/// assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(100));
/// assert_eq!(backoff.delay_for_retry(4), Duration::from_millis(800));
/// assert_eq!(backoff.delay_for_retry(5), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Backoff {
    strategy: BackoffStrategy,
    #[cfg_attr(feature = "serde", serde(default))]
    max_delay: Option<Duration>,
    #[cfg_attr(feature = "serde", serde(default))]
    jitter: Jitter,
}

/// How the delay grows with the retry number.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BackoffStrategy {
    /// Fixed delay between attempts.
    Constant(Duration),
    /// Delay increases linearly: base * n.
    Linear {
        /// Base delay duration.
        base: Duration,
    },
    /// Delay doubles: base * 2^(n-1).
    Exponential {
        /// Base delay duration.
        base: Duration,
    },
    /// Delay follows the Fibonacci sequence: base * fib(n).
    Fibonacci {
        /// Base delay duration.
        base: Duration,
    },
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Jitter {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between 0 and calculated delay (AWS recommended).
    Full,
    /// Decorrelated jitter (AWS style).
    Decorrelated,
}

impl Backoff {
    /// Same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self::from_strategy(BackoffStrategy::Constant(delay))
    }

    /// Linearly increasing delay: 100ms, 200ms, 300ms, ...
    pub fn linear(base: Duration) -> Self {
        Self::from_strategy(BackoffStrategy::Linear { base })
    }

    /// Doubling delay: 100ms, 200ms, 400ms, ...
    pub fn exponential(base: Duration) -> Self {
        Self::from_strategy(BackoffStrategy::Exponential { base })
    }

    /// Fibonacci delay: 100ms, 100ms, 200ms, 300ms, 500ms, ...
    pub fn fibonacci(base: Duration) -> Self {
        Self::from_strategy(BackoffStrategy::Fibonacci { base })
    }

    fn from_strategy(strategy: BackoffStrategy) -> Self {
        Self {
            strategy,
            max_delay: None,
            jitter: Jitter::None,
        }
    }

    /// Set the maximum delay cap.
    ///
    /// Delays will never exceed this value, jitter included.
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Add proportional jitter to delays.
    ///
    /// `0.25` means the actual delay will be within ±25% of the calculated one.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, delays are not jittered.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = Jitter::Proportional(factor.clamp(0.0, 1.0));
        self
    }

    /// Use full jitter: a random delay between zero and the calculated delay.
    ///
    /// **Note**: Requires the `jitter` feature.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = Jitter::Full;
        self
    }

    /// Use decorrelated jitter: random between base and 3x the previous delay.
    ///
    /// **Note**: Requires the `jitter` feature.
    pub fn with_decorrelated_jitter(mut self) -> Self {
        self.jitter = Jitter::Decorrelated;
        self
    }

    /// Get the maximum delay cap.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> &Jitter {
        &self.jitter
    }

    /// Get the growth strategy.
    pub fn strategy(&self) -> &BackoffStrategy {
        &self.strategy
    }

    /// Calculate the un-jittered delay before retry `n` (1-based).
    ///
    /// Retry 0 is the first attempt, which never waits.
    pub fn delay_for_retry(&self, n: u32) -> Duration {
        if n == 0 {
            return Duration::ZERO;
        }

        let base_delay = match &self.strategy {
            BackoffStrategy::Constant(d) => *d,
            BackoffStrategy::Linear { base } => base.saturating_mul(n),
            BackoffStrategy::Exponential { base } => {
                base.saturating_mul(2u32.saturating_pow(n - 1))
            }
            BackoffStrategy::Fibonacci { base } => base.saturating_mul(fibonacci(n)),
        };

        match self.max_delay {
            Some(max) => base_delay.min(max),
            None => base_delay,
        }
    }

    /// Calculate the delay with jitter applied.
    ///
    /// `prev_delay` feeds decorrelated jitter.
    pub fn delay_with_jitter(&self, n: u32, prev_delay: Option<Duration>) -> Duration {
        if n == 0 {
            return Duration::ZERO;
        }
        self.jitter
            .apply(self.delay_for_retry(n), prev_delay, self.max_delay)
    }
}

impl Jitter {
    /// Apply jitter to a base delay, then cap it at `max_delay`.
    pub fn apply(
        &self,
        base_delay: Duration,
        #[cfg_attr(not(feature = "jitter"), allow(unused_variables))] prev_delay: Option<Duration>,
        max_delay: Option<Duration>,
    ) -> Duration {
        let jittered = match self {
            Jitter::None => base_delay,
            #[cfg(feature = "jitter")]
            Jitter::Proportional(factor) if !(factor.is_finite() && *factor > 0.0) => base_delay,
            #[cfg(feature = "jitter")]
            Jitter::Proportional(factor) => {
                use rand::Rng;
                let mut rng = rand::rng();
                let base_millis = base_delay.as_millis() as f64;
                let jitter_range = base_millis * factor;
                let min = (base_millis - jitter_range).max(0.0);
                let max = base_millis + jitter_range;
                let jittered_millis = rng.random_range(min..=max);
                Duration::from_millis(jittered_millis as u64)
            }
            #[cfg(not(feature = "jitter"))]
            Jitter::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            Jitter::Full => {
                use rand::Rng;
                let max_millis = base_delay.as_millis() as u64;
                if max_millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            Jitter::Full => base_delay,
            #[cfg(feature = "jitter")]
            Jitter::Decorrelated => {
                use rand::Rng;
                let prev = prev_delay.unwrap_or(base_delay);
                let base_millis = base_delay.as_millis() as u64;
                let max_millis = prev.as_millis().saturating_mul(3) as u64;
                if max_millis <= base_millis {
                    base_delay
                } else {
                    Duration::from_millis(rand::rng().random_range(base_millis..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            Jitter::Decorrelated => base_delay,
        };

        match max_delay {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}

/// Calculate the nth Fibonacci number.
fn fibonacci(n: u32) -> u32 {
    if n == 0 {
        return 0;
    }
    let mut a = 0u32;
    let mut b = 1u32;
    for _ in 1..n {
        let temp = a.saturating_add(b);
        a = b;
        b = temp;
    }
    b
}

#[cfg(feature = "proptest")]
mod arbitrary {
    use super::*;
    use proptest::prelude::*;

    impl Arbitrary for Backoff {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
            let base = (0u64..10_000).prop_map(Duration::from_millis);
            let strategy = prop_oneof![
                base.clone().prop_map(Backoff::constant),
                base.clone().prop_map(Backoff::linear),
                base.clone().prop_map(Backoff::exponential),
                base.clone().prop_map(Backoff::fibonacci),
            ];
            (strategy, proptest::option::of(base))
                .prop_map(|(backoff, cap)| match cap {
                    Some(cap) => backoff.with_max_delay(cap),
                    None => backoff,
                })
                .boxed()
        }
    }
}

#[cfg(test)]
mod backoff_tests {
    use super::*;

    #[test]
    fn test_retry_zero_never_waits() {
        let backoff = Backoff::constant(Duration::from_secs(5));
        assert_eq!(backoff.delay_for_retry(0), Duration::ZERO);
        assert_eq!(backoff.delay_with_jitter(0, None), Duration::ZERO);
    }

    #[test]
    fn test_constant_delay() {
        let backoff = Backoff::constant(Duration::from_millis(100));

        assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_retry(9), Duration::from_millis(100));
    }

    #[test]
    fn test_linear_delay() {
        let backoff = Backoff::linear(Duration::from_millis(100));

        assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_retry(3), Duration::from_millis(300));
    }

    #[test]
    fn test_exponential_delay() {
        let backoff = Backoff::exponential(Duration::from_millis(100));

        assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_retry(3), Duration::from_millis(400));
        assert_eq!(backoff.delay_for_retry(4), Duration::from_millis(800));
    }

    #[test]
    fn test_fibonacci_delay() {
        let backoff = Backoff::fibonacci(Duration::from_millis(100));

        // fib sequence: 1, 1, 2, 3, 5, 8, 13...
        assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_retry(3), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_retry(4), Duration::from_millis(300));
        assert_eq!(backoff.delay_for_retry(5), Duration::from_millis(500));
    }

    #[test]
    fn test_max_delay_cap() {
        let backoff = Backoff::exponential(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500));

        assert_eq!(backoff.delay_for_retry(3), Duration::from_millis(400));
        assert_eq!(backoff.delay_for_retry(4), Duration::from_millis(500)); // capped
        assert_eq!(backoff.delay_for_retry(40), Duration::from_millis(500)); // saturated, capped
    }

    #[test]
    fn test_jitter_none_returns_base_delay() {
        let base = Duration::from_millis(100);
        assert_eq!(Jitter::None.apply(base, None, None), base);
        assert_eq!(Jitter::default(), Jitter::None);
    }

    #[test]
    fn test_jitter_respects_cap() {
        let backoff = Backoff::constant(Duration::from_millis(100))
            .with_jitter(1.0)
            .with_max_delay(Duration::from_millis(100));

        for n in 1..20 {
            assert!(backoff.delay_with_jitter(n, None) <= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_with_jitter_clamps_factor() {
        let backoff = Backoff::linear(Duration::from_millis(10)).with_jitter(3.0);
        assert_eq!(backoff.jitter(), &Jitter::Proportional(1.0));
        assert!(matches!(backoff.strategy(), BackoffStrategy::Linear { .. }));
        assert_eq!(backoff.max_delay(), None);
    }

    #[cfg(feature = "jitter")]
    #[test]
    fn test_full_jitter_bounded_by_base() {
        let backoff = Backoff::constant(Duration::from_millis(50)).with_full_jitter();
        for n in 1..50 {
            assert!(backoff.delay_with_jitter(n, None) <= Duration::from_millis(50));
        }
    }

    #[test]
    fn test_fibonacci_function() {
        assert_eq!(fibonacci(0), 0);
        assert_eq!(fibonacci(1), 1);
        assert_eq!(fibonacci(2), 1);
        assert_eq!(fibonacci(3), 2);
        assert_eq!(fibonacci(7), 13);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_backoff_from_json() {
        let json = r#"{"strategy":{"exponential":{"base":{"secs":0,"nanos":100000000}}},"max_delay":{"secs":2,"nanos":0}}"#;
        let backoff: Backoff = serde_json::from_str(json).unwrap();
        assert_eq!(
            backoff,
            Backoff::exponential(Duration::from_millis(100)).with_max_delay(Duration::from_secs(2))
        );
    }
}
