//! Membership tests for errors and returned values.
//!
//! An [`ErrorMatcher`] plays the role of an error "type tag": it answers
//! whether a raised error belongs to some kind. A [`ValueMatcher`] is a
//! literal compared by equality.

use std::error::Error as StdError;
use std::mem::{discriminant, Discriminant};
use std::sync::Arc;

/// Classifies an error as belonging (or not) to a kind.
///
/// # Examples
///
/// ```rust
/// use riprap::ErrorMatcher;
///
/// #[derive(Debug)]
/// enum DbError { Timeout(u32), Constraint(String) }
///
/// let timeouts = ErrorMatcher::variant(&DbError::Timeout(0));
/// assert!(timeouts.matches(&DbError::Timeout(30)));
/// assert!(!timeouts.matches(&DbError::Constraint("unique".into())));
/// ```
pub struct ErrorMatcher<E> {
    label: String,
    test: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E> ErrorMatcher<E> {
    /// Create a matcher from an arbitrary classification function.
    pub fn new<F>(label: impl Into<String>, test: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            test: Arc::new(test),
        }
    }

    /// Returns true if `error` belongs to this matcher's kind.
    pub fn matches(&self, error: &E) -> bool {
        (self.test)(error)
    }

    /// The human readable name of the kind.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<E: 'static> ErrorMatcher<E> {
    /// Match every error sharing the enum variant of `sample`.
    ///
    /// Fields of the sample are ignored; only the variant matters.
    pub fn variant(sample: &E) -> Self {
        let wanted: Discriminant<E> = discriminant(sample);
        Self::new(format!("{:?}", wanted), move |error: &E| {
            discriminant(error) == wanted
        })
    }
}

impl<E> ErrorMatcher<E>
where
    E: AsRef<dyn StdError + Send + Sync + 'static> + 'static,
{
    /// Match boxed errors whose concrete type is `K`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use riprap::ErrorMatcher;
    /// use std::error::Error;
    ///
    /// type BoxError = Box<dyn Error + Send + Sync>;
    ///
    /// let io = ErrorMatcher::<BoxError>::of::<std::io::Error>();
    /// let err: BoxError = Box::new(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
    /// assert!(io.matches(&err));
    ///
    /// let err: BoxError = "plain message".into();
    /// assert!(!io.matches(&err));
    /// ```
    pub fn of<K: StdError + 'static>() -> Self {
        Self::new(std::any::type_name::<K>(), |error: &E| error.as_ref().is::<K>())
    }
}

impl<E> Clone for ErrorMatcher<E> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            test: Arc::clone(&self.test),
        }
    }
}

impl<E> std::fmt::Debug for ErrorMatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ErrorMatcher").field(&self.label).finish()
    }
}

/// A literal value compared by equality against returned values.
pub struct ValueMatcher<T> {
    label: String,
    test: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> ValueMatcher<T> {
    /// Match values equal to `literal`.
    pub fn literal(literal: T) -> Self
    where
        T: PartialEq + std::fmt::Debug + Send + Sync + 'static,
    {
        Self {
            label: format!("{:?}", literal),
            test: Arc::new(move |value: &T| *value == literal),
        }
    }

    /// Returns true if `value` equals the literal.
    pub fn matches(&self, value: &T) -> bool {
        (self.test)(value)
    }
}

impl<T> Clone for ValueMatcher<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            test: Arc::clone(&self.test),
        }
    }
}

impl<T> std::fmt::Debug for ValueMatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueMatcher").field(&self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Value(i32),
        Type,
    }

    #[derive(Debug)]
    struct Custom;

    impl std::fmt::Display for Custom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "custom")
        }
    }

    impl StdError for Custom {}

    #[test]
    fn variant_ignores_fields() {
        let m = ErrorMatcher::variant(&TestError::Value(0));
        assert!(m.matches(&TestError::Value(42)));
        assert!(!m.matches(&TestError::Type));
    }

    #[test]
    fn of_downcasts_boxed_errors() {
        type BoxError = Box<dyn StdError + Send + Sync>;

        let m = ErrorMatcher::<BoxError>::of::<Custom>();
        assert!(m.matches(&(Box::new(Custom) as BoxError)));
        assert!(!m.matches(&BoxError::from("other")));
        assert!(m.label().contains("Custom"));
    }

    #[test]
    fn new_uses_the_given_test() {
        let m = ErrorMatcher::new("negative", |e: &i32| *e < 0);
        assert!(m.matches(&-1));
        assert!(!m.matches(&1));
        assert_eq!(format!("{:?}", m), "ErrorMatcher(\"negative\")");
    }

    #[test]
    fn literal_compares_by_equality() {
        let m = ValueMatcher::literal("ready".to_string());
        assert!(m.matches(&"ready".to_string()));
        assert!(!m.matches(&"pending".to_string()));
        assert_eq!(format!("{:?}", m.clone()), "ValueMatcher(\"\\\"ready\\\"\")");
    }
}
