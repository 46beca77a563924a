//! Assertion policies evaluated by [`TestResponse::assert_that`].
//!
//! A policy inspects a response and fails with an [`Error`]. Policies that
//! opt into retrying are re-evaluated against a freshly fetched response
//! until they pass, decline to retry, or hit the configured attempt cap.

use std::fmt::Debug;

use restassay_core::{AssertionFailure, Matcher};

use crate::{Error, Result, TestResponse};

/// A check applied to a [`TestResponse`].
pub trait AssertionPolicy: Send + Sync {
    /// Evaluate the policy against the response.
    fn assert_that(&self, response: &TestResponse) -> Result<()>;

    /// Whether a failure after `attempt` evaluations should be retried.
    fn is_retry_needed(&self, _attempt: u32) -> bool {
        false
    }

    /// Quiet policies log only the failure message between attempts.
    fn is_quiet(&self) -> bool {
        false
    }

    /// Whether an error raised by this policy is eligible for retry at all.
    fn is_retryable(&self, error: &Error) -> bool {
        error.is_retryable()
    }

    /// Name used in log output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> AssertionPolicy for F
where
    F: Fn(&TestResponse) -> Result<()> + Send + Sync,
{
    fn assert_that(&self, response: &TestResponse) -> Result<()> {
        self(response)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

fn check<T, M>(response: &TestResponse, reason: &str, actual: &T, matcher: &M) -> Result<()>
where
    T: ?Sized + Debug,
    M: Matcher<T> + ?Sized,
{
    restassay_core::assert_that(reason, actual, matcher)
        .map_err(|failure| Error::Assertion(failure.with_transcript(response.transcript())))
}

/// Checks the status code.
#[derive(Debug, Clone)]
pub struct StatusPolicy<M> {
    matcher: M,
}

impl<M: Matcher<u16>> StatusPolicy<M> {
    /// Create a status check.
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }
}

impl<M: Matcher<u16>> AssertionPolicy for StatusPolicy<M> {
    fn assert_that(&self, response: &TestResponse) -> Result<()> {
        let status = response.status()?;
        check(response, "HTTP status code", &status, &self.matcher)
    }
}

/// Checks all values of one header.
#[derive(Debug, Clone)]
pub struct HeaderPolicy<M> {
    name: String,
    matcher: M,
}

impl<M: Matcher<[String]>> HeaderPolicy<M> {
    /// Create a header check.
    pub fn new(name: impl Into<String>, matcher: M) -> Self {
        Self {
            name: name.into(),
            matcher,
        }
    }
}

impl<M: Matcher<[String]>> AssertionPolicy for HeaderPolicy<M> {
    fn assert_that(&self, response: &TestResponse) -> Result<()> {
        let values = response.header(&self.name)?;
        let reason = format!("HTTP header '{}'", self.name);
        check(response, &reason, values.as_slice(), &self.matcher)
    }
}

/// Checks the body text.
#[derive(Debug, Clone)]
pub struct BodyPolicy<M> {
    matcher: M,
}

impl<M: Matcher<str>> BodyPolicy<M> {
    /// Create a body check.
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }
}

impl<M: Matcher<str>> AssertionPolicy for BodyPolicy<M> {
    fn assert_that(&self, response: &TestResponse) -> Result<()> {
        let body = response.body()?;
        check(response, "HTTP body", body.as_str(), &self.matcher)
    }
}

/// Requires an XPath query to select something in the XML body.
#[derive(Debug, Clone)]
pub struct XpathPolicy {
    query: String,
}

impl XpathPolicy {
    /// Create an XPath check.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

impl AssertionPolicy for XpathPolicy {
    fn assert_that(&self, response: &TestResponse) -> Result<()> {
        if response.xml()?.matches(&self.query)? {
            return Ok(());
        }
        Err(Error::Assertion(
            AssertionFailure::new(format!("XPath '{}' not found", self.query))
                .with_transcript(response.transcript()),
        ))
    }
}

/// Requires a JSON path to select something in the JSON body.
#[derive(Debug, Clone)]
pub struct JsonPolicy {
    query: String,
}

impl JsonPolicy {
    /// Create a JSON path check.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

impl AssertionPolicy for JsonPolicy {
    fn assert_that(&self, response: &TestResponse) -> Result<()> {
        if !response.json_path(&self.query)?.is_empty() {
            return Ok(());
        }
        Err(Error::Assertion(
            AssertionFailure::new(format!("JSON path '{}' not found", self.query))
                .with_transcript(response.transcript()),
        ))
    }
}

/// Always fails with the given reason.
#[derive(Debug, Clone)]
pub struct Failure {
    reason: String,
}

impl Failure {
    /// Create an unconditional failure.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl AssertionPolicy for Failure {
    fn assert_that(&self, response: &TestResponse) -> Result<()> {
        Err(Error::Assertion(
            AssertionFailure::new(self.reason.clone()).with_transcript(response.transcript()),
        ))
    }
}

/// Wraps a policy so that its failures are retried.
///
/// Up to `attempts` evaluations are made, never more than the client's
/// `max_attempts`.
#[derive(Debug, Clone)]
pub struct Retrying<P> {
    inner: P,
    attempts: u32,
    quiet: bool,
}

/// Retry `policy` for up to `attempts` evaluations.
pub fn retrying<P: AssertionPolicy>(policy: P, attempts: u32) -> Retrying<P> {
    Retrying {
        inner: policy,
        attempts,
        quiet: false,
    }
}

impl<P> Retrying<P> {
    /// Log only failure messages between attempts.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

impl<P: AssertionPolicy> AssertionPolicy for Retrying<P> {
    fn assert_that(&self, response: &TestResponse) -> Result<()> {
        self.inner.assert_that(response)
    }

    fn is_retry_needed(&self, attempt: u32) -> bool {
        attempt < self.attempts
    }

    fn is_quiet(&self) -> bool {
        self.quiet || self.inner.is_quiet()
    }

    fn is_retryable(&self, error: &Error) -> bool {
        self.inner.is_retryable(error)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restassay_core::{contains_string, equal_to, has_item};

    #[test]
    fn test_default_hooks() {
        let policy = StatusPolicy::new(equal_to(200u16));
        assert!(!policy.is_retry_needed(1));
        assert!(!policy.is_quiet());
        assert!(policy.is_retryable(&Error::Assertion(AssertionFailure::new("x"))));
        assert!(!policy.is_retryable(&Error::Connection("refused".into())));
        assert!(policy.name().contains("StatusPolicy"));
    }

    #[test]
    fn test_retrying_counts_attempts() {
        let policy = retrying(BodyPolicy::new(contains_string("ok")), 3).quiet();
        assert!(policy.is_retry_needed(1));
        assert!(policy.is_retry_needed(2));
        assert!(!policy.is_retry_needed(3));
        assert!(policy.is_quiet());
        assert!(policy.name().contains("BodyPolicy"));
    }

    #[test]
    fn test_retrying_keeps_classifier() {
        let policy = retrying(HeaderPolicy::new("ETag", has_item(equal_to("v1"))), 5);
        assert!(!policy.is_retryable(&Error::Document("bad".into())));
    }
}
