//! Property-based tests for policy construction and decisions

use proptest::prelude::*;
use riprap::{Backoff, ConfigError, ErrorMatcher, RetryPolicy, Wait, WaitScheduler};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
enum TestError {
    A(i32),
    B(String),
}

fn any_error() -> impl Strategy<Value = TestError> {
    prop_oneof![
        any::<i32>().prop_map(TestError::A),
        "[a-z]{0,8}".prop_map(TestError::B),
    ]
}

fn any_wait() -> impl Strategy<Value = Wait<()>> {
    prop_oneof![
        Just(Wait::None),
        (0u64..100_000).prop_map(|ms| Wait::Constant(Duration::from_millis(ms))),
        (1u64..1_000).prop_map(|ms| Wait::Backoff(Backoff::exponential(Duration::from_millis(ms)))),
        (1u64..1_000).prop_map(|ms| Wait::Backoff(Backoff::fibonacci(Duration::from_millis(ms)))),
    ]
}

proptest! {
    #[test]
    fn prop_first_attempt_never_waits(wait in any_wait()) {
        let mut scheduler = WaitScheduler::new(&wait);
        prop_assert_eq!(scheduler.compute_wait(0, &()), Duration::ZERO);
    }

    #[test]
    fn prop_unconfigured_policy_retries_every_value(value in any::<i64>()) {
        let policy = RetryPolicy::<i64, TestError>::builder().build().unwrap();
        prop_assert!(policy.should_retry_value(&value, &()));
    }

    #[test]
    fn prop_unconfigured_policy_retries_every_error(error in any_error()) {
        let policy = RetryPolicy::<i64, TestError>::builder().build().unwrap();
        prop_assert!(policy.should_retry_error(&error, &()));
    }

    #[test]
    fn prop_error_only_policy_accepts_every_value(value in any::<i64>(), negative in any::<bool>()) {
        let builder = RetryPolicy::<i64, TestError>::builder();
        let matcher = ErrorMatcher::variant(&TestError::A(0));
        let policy = if negative {
            builder.unless_error(matcher)
        } else {
            builder.on_error(matcher)
        }
        .build()
        .unwrap();
        prop_assert!(!policy.should_retry_value(&value, &()));
    }

    #[test]
    fn prop_conflicting_return_criteria_rejected(a in any::<i32>(), b in any::<i32>()) {
        let result = RetryPolicy::<i32, TestError>::builder()
            .on_return(a)
            .unless_return(b)
            .build();
        prop_assert_eq!(result.unwrap_err(), ConfigError::ConflictingReturnCriteria);
    }

    #[test]
    fn prop_negative_return_always_wins(value in any::<i32>()) {
        let policy = RetryPolicy::<i32, TestError>::builder()
            .unless_return(value)
            .build()
            .unwrap();
        prop_assert!(!policy.should_retry_value(&value, &()));
    }

    #[test]
    fn prop_limit_bounds_attempts(limit in 1u32..20) {
        let policy = RetryPolicy::<u32, TestError>::builder().limit(limit).build().unwrap();
        let mut calls = 0;
        let (result, report) = policy.call_reported(|| {
            calls += 1;
            Ok(calls)
        });
        prop_assert_eq!(result, Ok(limit));
        prop_assert_eq!(report.attempts, limit);
    }

    #[test]
    fn prop_veto_stops_before_limit(veto_at in 1u32..10, limit in 10u32..20) {
        let policy = RetryPolicy::<(), TestError>::builder()
            .unless_error(ErrorMatcher::variant(&TestError::B(String::new())))
            .limit(limit)
            .build()
            .unwrap();
        let mut calls = 0;
        let (result, report) = policy.call_reported(|| {
            calls += 1;
            if calls == veto_at {
                Err(TestError::B("fatal".into()))
            } else {
                Err(TestError::A(calls as i32))
            }
        });
        prop_assert_eq!(result.unwrap_err().into_operation(), Some(TestError::B("fatal".into())));
        prop_assert_eq!(report.attempts, veto_at);
    }
}

#[cfg(feature = "proptest")]
mod arbitrary_backoff {
    use super::*;

    proptest! {
        #[test]
        fn prop_backoff_never_exceeds_cap(
            backoff in any::<Backoff>().prop_filter("capped", |b| b.max_delay().is_some()),
            n in 0u32..64
        ) {
            let cap = backoff.max_delay().unwrap();
            prop_assert!(backoff.delay_with_jitter(n, None) <= cap);
        }
    }
}
