//! Test client error types.

use restassay_core::AssertionFailure;
use thiserror::Error;

/// Result type for test client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Test client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller supplied an unusable argument (e.g. a relative home URI).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An assertion policy rejected the response.
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    /// A retrying policy kept failing until the attempt cap was reached.
    #[error("failed after {attempts} attempt(s): {last}")]
    RetryExhausted {
        /// Number of evaluations made.
        attempts: u32,
        /// Failure of the last evaluation.
        last: Box<Error>,
    },

    /// Encoding or stream fault while preparing a request or reading a response.
    #[error("Resource fault: {0}")]
    Resource(String),

    /// The body could not be read as an XML/JSON document, or a query was invalid.
    #[error("Document error: {0}")]
    Document(String),

    /// Connection error reported by a transport.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is an assertion failure.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertion(_))
    }

    /// Check if retrying the assertion may change the outcome.
    ///
    /// Only assertion failures qualify; transport and resource faults are
    /// propagated unless a policy explicitly classifies them otherwise.
    pub fn is_retryable(&self) -> bool {
        self.is_assertion()
    }

    /// Check if the attempt cap was reached.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Get the assertion failure, if this is one.
    pub fn assertion(&self) -> Option<&AssertionFailure> {
        match self {
            Self::Assertion(failure) => Some(failure),
            _ => None,
        }
    }
}
