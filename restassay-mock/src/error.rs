//! Mock server errors.

use thiserror::Error;

/// Result type for mock server operations.
pub type Result<T> = std::result::Result<T, MockError>;

/// Mock server errors.
#[derive(Debug, Error)]
pub enum MockError {
    /// Binding the listener or starting the runtime failed.
    #[error("Failed to start mock server: {0}")]
    Io(#[from] std::io::Error),

    /// Requests arrived that did not satisfy the configured matchers.
    #[error("Mock server received {count} unexpected request(s):\n{report}")]
    Unverified {
        /// Number of rejected requests.
        count: usize,
        /// All failure messages, separated by blank lines.
        report: String,
    },

    /// The server thread panicked.
    #[error("Mock server thread panicked")]
    Panicked,
}
