//! Assertion failures.

use crate::Matcher;
use std::fmt::Debug;

/// A matcher rejected a value.
///
/// Carries a human readable message and, when the failure concerns an HTTP
/// exchange, the transcript of the request and response that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}{}", render_transcript(.transcript))]
pub struct AssertionFailure {
    message: String,
    transcript: Option<String>,
}

impl AssertionFailure {
    /// Create a failure with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transcript: None,
        }
    }

    /// Attach the request/response transcript.
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    /// The failure message, without the transcript.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The transcript, if one was attached.
    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }
}

fn render_transcript(transcript: &Option<String>) -> String {
    transcript
        .as_ref()
        .map(|transcript| format!("\n{}", transcript))
        .unwrap_or_default()
}

/// Check `actual` against `matcher`, failing with `reason` on mismatch.
pub fn assert_that<T, M>(reason: &str, actual: &T, matcher: &M) -> Result<(), AssertionFailure>
where
    T: ?Sized + Debug,
    M: Matcher<T> + ?Sized,
{
    if matcher.matches(actual) {
        return Ok(());
    }
    Err(AssertionFailure::new(format!(
        "{}\nExpected: {}\n     but: was {:?}",
        reason,
        matcher.describe(),
        actual
    )))
}
