//! Fluent HTTP test client for restassay.
//!
//! A [`TestClient`] is bound to one absolute URI. Its `get`, `post` and `put`
//! methods return a [`TestResponse`] that performs the request lazily, buffers
//! the result exactly once, and exposes the status, headers, body, and
//! XML/JSON views of it. Assertions are expressed as [`AssertionPolicy`]
//! values; a policy may ask for retries, in which case the response is
//! re-fetched and the policy re-evaluated until it passes or the configured
//! attempt cap is hit.
//!
//! # Features
//!
//! - Basic authentication derived from credentials embedded in the URI
//! - Redirects are not followed, so `3xx` responses can be asserted and
//!   navigated with [`TestResponse::follow`]
//! - Link navigation by XPath with [`TestResponse::rel`], carrying cookies
//! - Pluggable [`Transport`] (blocking `reqwest` by default)
//!
//! # Example
//!
//! ```no_run
//! use restassay_client::{TestClient, retrying, StatusPolicy};
//! use restassay_core::{contains_string, equal_to};
//!
//! let client = TestClient::new("http://localhost:8080/")?;
//! let page = client.header("Accept", "text/xml").get("front page");
//! page.assert_status(200)?
//!     .assert_body(contains_string("<page"))?;
//!
//! // Wait for an eventually consistent resource
//! client.get("job status")
//!     .assert_that(&retrying(StatusPolicy::new(equal_to(200u16)), 5))?;
//!
//! let next = page.rel("/page/links/link[@rel='next']/@href")?;
//! next.get("second page").assert_status(200)?;
//! # Ok::<(), restassay_client::Error>(())
//! ```

mod client;
mod config;
mod error;
mod fetcher;
mod json;
mod policy;
mod request;
mod response;
mod transport;
mod xml;

pub use client::TestClient;
pub use config::{ClientConfig, ClientConfigBuilder, MAX_ATTEMPTS};
pub use error::{Error, Result};
pub use fetcher::BufferedFetcher;
pub use json::JsonDocument;
pub use policy::{
    AssertionPolicy, BodyPolicy, Failure, HeaderPolicy, JsonPolicy, Retrying, StatusPolicy,
    XpathPolicy, retrying,
};
pub use request::{Header, HttpRequest, RequestTranscript};
pub use response::TestResponse;
pub use transport::{RawResponse, ReqwestTransport, Transport};
pub use xml::XmlDocument;

/// Re-exports for convenience.
pub use cookie::Cookie;
pub use http::{HeaderMap, Method, StatusCode};
pub use url::Url;
