//! Mock server configuration and request checking.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use http::StatusCode;
use parking_lot::RwLock;
use restassay_core::{AssertionFailure, Matcher, assert_that};
use tracing::debug;

use crate::{MockRequest, MockServerHandle, Result};

type StrMatcher = Arc<dyn Matcher<str>>;

/// The canned response a mock server returns for accepted requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    /// Status code.
    pub status: StatusCode,
    /// Headers, one value per name.
    pub headers: Vec<(String, String)>,
    /// Body.
    pub body: Bytes,
}

/// An embedded HTTP server that checks every request against configured
/// matchers and answers with a canned response.
///
/// Configuration methods take `&self` and may be called while the server
/// runs (through [`MockServerHandle::server`]); each request sees a
/// consistent snapshot of every single setting.
///
/// ```no_run
/// use restassay_core::{contains_string, equal_to};
/// use restassay_mock::MockServer;
///
/// let mock = MockServer::new();
/// mock.method(equal_to("POST"))
///     .body_matcher(contains_string("name=John"))
///     .status(201)
///     .header("Location", "/users/1")
///     .body("created");
/// let handle = mock.start()?;
/// // ... exercise the system under test against handle.uri() ...
/// handle.verify()?;
/// # Ok::<(), restassay_mock::MockError>(())
/// ```
pub struct MockServer {
    method: RwLock<Option<StrMatcher>>,
    request_uri: RwLock<Option<StrMatcher>>,
    body_matcher: RwLock<Option<StrMatcher>>,
    params: DashMap<String, StrMatcher>,
    header_matchers: DashMap<String, StrMatcher>,
    status: RwLock<StatusCode>,
    headers: DashMap<String, (String, String)>,
    body: RwLock<Bytes>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self {
            method: RwLock::new(None),
            request_uri: RwLock::new(None),
            body_matcher: RwLock::new(None),
            params: DashMap::new(),
            header_matchers: DashMap::new(),
            status: RwLock::new(StatusCode::OK),
            headers: DashMap::new(),
            body: RwLock::new(Bytes::new()),
        }
    }
}

impl MockServer {
    /// Create a server that accepts anything and answers `200` with an
    /// empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the HTTP method to match.
    pub fn method<M: Matcher<str> + 'static>(&self, matcher: M) -> &Self {
        *self.method.write() = Some(Arc::new(matcher));
        self
    }

    /// Require the Request-URI to match. The query string is not part of it.
    pub fn request_uri<M: Matcher<str> + 'static>(&self, matcher: M) -> &Self {
        *self.request_uri.write() = Some(Arc::new(matcher));
        self
    }

    /// Require the request body to match.
    pub fn body_matcher<M: Matcher<str> + 'static>(&self, matcher: M) -> &Self {
        *self.body_matcher.write() = Some(Arc::new(matcher));
        self
    }

    /// Require the first value of a parameter to match. Replaces an earlier
    /// matcher for the same name. An absent parameter passes only if the
    /// matcher accepts absence, as `not(..)` and `anything()` do.
    pub fn param<M: Matcher<str> + 'static>(&self, name: impl Into<String>, matcher: M) -> &Self {
        self.params.insert(name.into(), Arc::new(matcher));
        self
    }

    /// Require the first value of a request header to match. Names are
    /// compared case-insensitively; absence is handled as for parameters.
    pub fn header_matcher<M: Matcher<str> + 'static>(
        &self,
        name: impl Into<String>,
        matcher: M,
    ) -> &Self {
        self.header_matchers
            .insert(name.into().to_ascii_lowercase(), Arc::new(matcher));
        self
    }

    /// Status code of the canned response. Unknown codes fall back to `500`.
    pub fn status(&self, status: u16) -> &Self {
        *self.status.write() =
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self
    }

    /// Set a header of the canned response, replacing an earlier value for
    /// the same name (case-insensitive).
    pub fn header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        let name = name.into();
        self.headers
            .insert(name.to_ascii_lowercase(), (name, value.into()));
        self
    }

    /// Text body of the canned response.
    pub fn body(&self, body: impl Into<String>) -> &Self {
        *self.body.write() = Bytes::from(body.into());
        self
    }

    /// Binary body of the canned response.
    pub fn body_bytes(&self, body: impl Into<Bytes>) -> &Self {
        *self.body.write() = body.into();
        self
    }

    /// Check if a body matcher is configured.
    pub fn has_body_matcher(&self) -> bool {
        self.body_matcher.read().is_some()
    }

    /// Check if any parameter matcher is configured.
    pub fn has_param_matcher(&self) -> bool {
        !self.params.is_empty()
    }

    /// Check a request against every matcher and produce the canned response.
    ///
    /// Checks run in a fixed order (method, Request-URI, parameters, body,
    /// headers) and stop at the first mismatch. The failure carries a dump
    /// of the request.
    pub fn service(&self, request: &MockRequest) -> std::result::Result<MockResponse, AssertionFailure> {
        let fail = |failure: AssertionFailure| failure.with_transcript(request.to_string());

        if let Some(matcher) = self.method.read().as_ref() {
            assert_that(
                "HTTP method matches provided matcher",
                request.method.as_str(),
                matcher,
            )
            .map_err(fail)?;
        }

        if let Some(matcher) = self.request_uri.read().as_ref() {
            assert_that(
                "Request-URI matches provided matcher",
                request.path(),
                matcher,
            )
            .map_err(fail)?;
        }

        if !self.params.is_empty() {
            let params = request.params();
            for entry in self.params.iter() {
                let reason = format!("Param '{}' matches specified matcher", entry.key());
                let value = params
                    .iter()
                    .find(|(name, _)| name == entry.key())
                    .map(|(_, value)| value.as_str());
                match value {
                    Some(value) => assert_that(&reason, value, entry.value()).map_err(fail)?,
                    None if entry.value().matches_absent() => {}
                    None => {
                        return Err(fail(AssertionFailure::new(format!(
                            "{}\nExpected: {}\n     but: param is absent",
                            reason,
                            entry.value().describe()
                        ))));
                    }
                }
            }
        }

        if let Some(matcher) = self.body_matcher.read().as_ref() {
            let body = request.body_text();
            assert_that("Body matches provided matcher", body.as_str(), matcher).map_err(fail)?;
        }

        for entry in self.header_matchers.iter() {
            let reason = format!("Header '{}' matches specified matcher", entry.key());
            match request.header(entry.key()) {
                Some(value) => assert_that(&reason, value, entry.value()).map_err(fail)?,
                None if entry.value().matches_absent() => {}
                None => {
                    return Err(fail(AssertionFailure::new(format!(
                        "{}\nExpected: {}\n     but: header is absent",
                        reason,
                        entry.value().describe()
                    ))));
                }
            }
        }

        debug!(method = %request.method, uri = %request.uri, "Request accepted");
        Ok(self.response())
    }

    /// The canned response as currently configured.
    pub fn response(&self) -> MockResponse {
        MockResponse {
            status: *self.status.read(),
            headers: self
                .headers
                .iter()
                .map(|entry| entry.value().clone())
                .collect(),
            body: self.body.read().clone(),
        }
    }

    /// Bind to an ephemeral port on `127.0.0.1` and start serving.
    pub fn start(self) -> Result<MockServerHandle> {
        MockServerHandle::spawn(Arc::new(self))
    }
}

impl fmt::Debug for MockServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let describe = |slot: &RwLock<Option<StrMatcher>>| slot.read().as_ref().map(|m| m.describe());
        f.debug_struct("MockServer")
            .field("method", &describe(&self.method))
            .field("request_uri", &describe(&self.request_uri))
            .field("body_matcher", &describe(&self.body_matcher))
            .field("params", &self.params.len())
            .field("header_matchers", &self.header_matchers.len())
            .field("status", &*self.status.read())
            .finish()
    }
}
