//! Describable value matchers.

use regex::Regex;
use std::fmt::Debug;
use std::sync::Arc;

/// A predicate over a value that can describe what it expects.
///
/// Matchers are shared between threads (the mock server evaluates them on its
/// own runtime), hence the `Send + Sync` bound.
pub trait Matcher<T: ?Sized>: Send + Sync {
    /// Check whether the value satisfies this matcher.
    fn matches(&self, actual: &T) -> bool;

    /// Describe the expected value, e.g. `a string containing "xml"`.
    fn describe(&self) -> String;

    /// Check whether a missing value (an absent header or parameter)
    /// satisfies this matcher.
    fn matches_absent(&self) -> bool {
        false
    }
}

impl<T: ?Sized, M: Matcher<T> + ?Sized> Matcher<T> for Box<M> {
    fn matches(&self, actual: &T) -> bool {
        (**self).matches(actual)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
    fn matches_absent(&self) -> bool {
        (**self).matches_absent()
    }
}

impl<T: ?Sized, M: Matcher<T> + ?Sized> Matcher<T> for Arc<M> {
    fn matches(&self, actual: &T) -> bool {
        (**self).matches(actual)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
    fn matches_absent(&self) -> bool {
        (**self).matches_absent()
    }
}

/// Matches values equal to the expected one.
#[derive(Debug, Clone)]
pub struct EqualTo<T>(T);

/// Create a matcher for values equal to `expected`.
pub fn equal_to<T>(expected: T) -> EqualTo<T> {
    EqualTo(expected)
}

impl<T: PartialEq + Debug + Send + Sync> Matcher<T> for EqualTo<T> {
    fn matches(&self, actual: &T) -> bool {
        *actual == self.0
    }

    fn describe(&self) -> String {
        format!("{:?}", self.0)
    }
}

impl Matcher<str> for EqualTo<String> {
    fn matches(&self, actual: &str) -> bool {
        actual == self.0
    }

    fn describe(&self) -> String {
        format!("{:?}", self.0)
    }
}

impl Matcher<str> for EqualTo<&'static str> {
    fn matches(&self, actual: &str) -> bool {
        actual == self.0
    }

    fn describe(&self) -> String {
        format!("{:?}", self.0)
    }
}

/// Matches strings containing a substring.
#[derive(Debug, Clone)]
pub struct ContainsString(String);

/// Create a matcher for strings containing `needle`.
pub fn contains_string(needle: impl Into<String>) -> ContainsString {
    ContainsString(needle.into())
}

impl Matcher<str> for ContainsString {
    fn matches(&self, actual: &str) -> bool {
        actual.contains(&self.0)
    }

    fn describe(&self) -> String {
        format!("a string containing {:?}", self.0)
    }
}

/// Matches strings starting with a prefix.
#[derive(Debug, Clone)]
pub struct StartsWith(String);

/// Create a matcher for strings starting with `prefix`.
pub fn starts_with(prefix: impl Into<String>) -> StartsWith {
    StartsWith(prefix.into())
}

impl Matcher<str> for StartsWith {
    fn matches(&self, actual: &str) -> bool {
        actual.starts_with(&self.0)
    }

    fn describe(&self) -> String {
        format!("a string starting with {:?}", self.0)
    }
}

/// Matches strings ending with a suffix.
#[derive(Debug, Clone)]
pub struct EndsWith(String);

/// Create a matcher for strings ending with `suffix`.
pub fn ends_with(suffix: impl Into<String>) -> EndsWith {
    EndsWith(suffix.into())
}

impl Matcher<str> for EndsWith {
    fn matches(&self, actual: &str) -> bool {
        actual.ends_with(&self.0)
    }

    fn describe(&self) -> String {
        format!("a string ending with {:?}", self.0)
    }
}

/// Matches strings against a regular expression.
#[derive(Debug, Clone)]
pub struct MatchesPattern(Regex);

/// Create a matcher for strings matching `pattern` anywhere.
pub fn matches_pattern(pattern: &str) -> Result<MatchesPattern, regex::Error> {
    Regex::new(pattern).map(MatchesPattern)
}

impl Matcher<str> for MatchesPattern {
    fn matches(&self, actual: &str) -> bool {
        self.0.is_match(actual)
    }

    fn describe(&self) -> String {
        format!("a string matching /{}/", self.0.as_str())
    }
}

/// Matches collections of strings where at least one item matches.
#[derive(Debug, Clone)]
pub struct HasItem<M>(M);

/// Create a matcher for string collections with an item matching `item`.
pub fn has_item<M: Matcher<str>>(item: M) -> HasItem<M> {
    HasItem(item)
}

impl<M: Matcher<str>> Matcher<[String]> for HasItem<M> {
    fn matches(&self, actual: &[String]) -> bool {
        actual.iter().any(|value| self.0.matches(value))
    }

    fn describe(&self) -> String {
        format!("a collection containing {}", self.0.describe())
    }
}

/// Inverts another matcher.
#[derive(Debug, Clone)]
pub struct Not<M>(M);

/// Create a matcher accepting whatever `inner` rejects.
pub fn not<M>(inner: M) -> Not<M> {
    Not(inner)
}

impl<T: ?Sized, M: Matcher<T>> Matcher<T> for Not<M> {
    fn matches(&self, actual: &T) -> bool {
        !self.0.matches(actual)
    }

    fn describe(&self) -> String {
        format!("not {}", self.0.describe())
    }
    fn matches_absent(&self) -> bool {
        !self.0.matches_absent()
    }
}

/// Matches anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anything;

/// Create a matcher that accepts every value.
pub fn anything() -> Anything {
    Anything
}

impl<T: ?Sized> Matcher<T> for Anything {
    fn matches(&self, _actual: &T) -> bool {
        true
    }

    fn describe(&self) -> String {
        "anything".to_string()
    }
    fn matches_absent(&self) -> bool {
        true
    }
}

/// Matcher backed by a closure.
pub struct Predicate<F> {
    description: String,
    test: F,
}

/// Create a matcher from a closure and a description of what it accepts.
///
/// ```
/// use restassay_core::{Matcher, predicate};
///
/// let success = predicate("a 2xx status", |status: &u16| (200..300).contains(status));
/// assert!(success.matches(&204));
/// assert!(!success.matches(&404));
/// ```
pub fn predicate<F>(description: impl Into<String>, test: F) -> Predicate<F> {
    Predicate {
        description: description.into(),
        test,
    }
}

impl<T: ?Sized, F> Matcher<T> for Predicate<F>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn matches(&self, actual: &T) -> bool {
        (self.test)(actual)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
