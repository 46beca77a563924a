// restassay - fluent HTTP integration testing for Rust
//
// This library bundles a lazily fetching test client with retrying
// assertions, XPath/JSON views of response bodies, and an embedded mock
// server for checking outbound requests.

//! # Example
//!
//! ```no_run
//! use restassay::prelude::*;
//!
//! restassay::log::init();
//! let client = restassay::start("http://localhost:8080/")?;
//! let home = client.header("Accept", "text/xml").get("front page");
//! home.assert_status(200)?
//!     .assert_xpath("/page/title")?;
//! home.rel("/page/links/link[@rel='login']/@href")?
//!     .post("log in", "user=john&password=secret")
//!     .assert_status(303)?;
//! # Ok::<(), restassay::Error>(())
//! ```

// Re-export the test client
pub use restassay_client::*;

// Re-export matchers and assertion failures
pub use restassay_core::{
    AssertionFailure, Matcher, anything, contains_string, ends_with, equal_to, has_item,
    matches_pattern, not, predicate, starts_with,
};

/// Logging setup.
pub use restassay_log as log;

/// Embedded mock server.
#[cfg(feature = "mock")]
pub use restassay_mock as mock;

#[cfg(feature = "mock")]
pub use restassay_mock::{MockServer, MockServerHandle};

/// Create a client for an absolute URI with configuration taken from the
/// environment (`RESTASSAY_*` variables).
pub fn start(uri: &str) -> Result<TestClient> {
    TestClient::with_config(uri, ClientConfig::from_env())
}

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AssertionPolicy,
        ClientConfig,
        Error,
        // Matchers
        Matcher,
        StatusPolicy,
        TestClient,
        TestResponse,
        XpathPolicy,
        anything,
        contains_string,
        ends_with,
        equal_to,
        has_item,
        matches_pattern,
        not,
        predicate,
        retrying,
        starts_with,
    };

    #[cfg(feature = "mock")]
    pub use crate::MockServer;
}
