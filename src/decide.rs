//! Retry/stop decisions for a single attempt's outcome.
//!
//! Each axis (returned values, raised errors) is split into a positive form
//! ("retry when ...") and a negative form ("stop when ..."). The rules:
//!
//! | outcome | positive configured | negative configured | neither configured |
//! |---------|---------------------|---------------------|--------------------|
//! | value   | retry iff it matches | a match forces accept | retry iff no error criteria exist |
//! | error   | retry iff it matches | a match vetoes | retry |
//!
//! A negative match always wins over the positive result.

use crate::callback::{check, CheckFn};
use crate::matcher::{ErrorMatcher, ValueMatcher};

/// Error-axis criteria.
pub struct ErrorCriteria<E, R> {
    pub(crate) matchers: Vec<ErrorMatcher<E>>,
    pub(crate) checks: Vec<CheckFn<R, E>>,
    pub(crate) excluded: Vec<ErrorMatcher<E>>,
}

impl<E, R> ErrorCriteria<E, R> {
    /// True if any `on_error*` matcher or predicate is configured.
    pub fn has_positive(&self) -> bool {
        !self.matchers.is_empty() || !self.checks.is_empty()
    }

    /// True if any `unless_error*` matcher is configured.
    pub fn has_negative(&self) -> bool {
        !self.excluded.is_empty()
    }

    /// True if the policy discriminates on errors at all.
    pub fn is_configured(&self) -> bool {
        self.has_positive() || self.has_negative()
    }
}

impl<E, R> Default for ErrorCriteria<E, R> {
    fn default() -> Self {
        Self {
            matchers: Vec::new(),
            checks: Vec::new(),
            excluded: Vec::new(),
        }
    }
}

impl<E, R> Clone for ErrorCriteria<E, R> {
    fn clone(&self) -> Self {
        Self {
            matchers: self.matchers.clone(),
            checks: self.checks.clone(),
            excluded: self.excluded.clone(),
        }
    }
}

impl<E, R> std::fmt::Debug for ErrorCriteria<E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorCriteria")
            .field("matchers", &self.matchers)
            .field("checks", &self.checks)
            .field("excluded", &self.excluded)
            .finish()
    }
}

/// Return-axis criteria.
pub struct ReturnCriteria<T, R> {
    pub(crate) values: Vec<ValueMatcher<T>>,
    pub(crate) checks: Vec<CheckFn<R, T>>,
    pub(crate) excluded: Vec<ValueMatcher<T>>,
}

impl<T, R> ReturnCriteria<T, R> {
    /// True if any `on_return*` literal or predicate is configured.
    pub fn has_positive(&self) -> bool {
        !self.values.is_empty() || !self.checks.is_empty()
    }

    /// True if any `unless_return*` literal is configured.
    pub fn has_negative(&self) -> bool {
        !self.excluded.is_empty()
    }
}

impl<T, R> Default for ReturnCriteria<T, R> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            checks: Vec::new(),
            excluded: Vec::new(),
        }
    }
}

impl<T, R> Clone for ReturnCriteria<T, R> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            checks: self.checks.clone(),
            excluded: self.excluded.clone(),
        }
    }
}

impl<T, R> std::fmt::Debug for ReturnCriteria<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReturnCriteria")
            .field("values", &self.values)
            .field("checks", &self.checks)
            .field("excluded", &self.excluded)
            .finish()
    }
}

/// Classifies attempt outcomes against a policy's criteria.
pub struct PredicateEvaluator<'p, T, E, R> {
    returns: &'p ReturnCriteria<T, R>,
    errors: &'p ErrorCriteria<E, R>,
}

impl<'p, T, E, R> PredicateEvaluator<'p, T, E, R> {
    /// Create an evaluator over both axes.
    pub fn new(returns: &'p ReturnCriteria<T, R>, errors: &'p ErrorCriteria<E, R>) -> Self {
        Self { returns, errors }
    }

    /// Returns true to keep retrying after `value`, false to accept it.
    pub fn decide_after_success(&self, value: &T, receiver: &R) -> bool {
        let mut verdict = None;

        if self.returns.has_positive() {
            verdict = Some(
                self.returns.values.iter().any(|m| m.matches(value))
                    || self.returns.checks.iter().any(|c| check(c, receiver, value)),
            );
        }

        if self.returns.excluded.iter().any(|m| m.matches(value)) {
            verdict = Some(false);
        }

        // Error-only policies accept a clean success; criteria-free policies
        // keep going until limit or timeout.
        verdict.unwrap_or(!self.errors.is_configured())
    }

    /// Returns true to keep retrying after `error`, false to propagate it now.
    pub fn decide_after_failure(&self, error: &E, receiver: &R) -> bool {
        let mut verdict = None;

        if self.errors.has_positive() {
            verdict = Some(
                self.errors.matchers.iter().any(|m| m.matches(error))
                    || self.errors.checks.iter().any(|c| check(c, receiver, error)),
            );
        }

        if self.errors.has_negative() {
            let excluded = self.errors.excluded.iter().any(|m| m.matches(error));
            verdict = Some(verdict.unwrap_or(true) && !excluded);
        }

        verdict.unwrap_or(true)
    }
}

impl<T, E, R> std::fmt::Debug for PredicateEvaluator<'_, T, E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateEvaluator")
            .field("returns", self.returns)
            .field("errors", self.errors)
            .finish()
    }
}
