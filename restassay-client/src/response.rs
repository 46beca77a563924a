//! Test responses.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use cookie::Cookie;
use http::header::{HeaderMap, COOKIE, LOCATION, SET_COOKIE};
use parking_lot::ReentrantMutex;
use restassay_core::{AssertionFailure, Matcher, equal_to};
use tracing::{debug, info, warn};
use url::Url;

use crate::policy::{
    AssertionPolicy, BodyPolicy, Failure, HeaderPolicy, JsonPolicy, StatusPolicy, XpathPolicy,
};
use crate::{
    BufferedFetcher, ClientConfig, Error, JsonDocument, RawResponse, RequestTranscript, Result,
    TestClient, Transport, XmlDocument,
};

/// What a navigated-to client inherits from the client that made the request.
pub(crate) struct Origin {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: Arc<ClientConfig>,
}

struct Memo<T> {
    generation: u64,
    value: Arc<T>,
}

#[derive(Default)]
struct Views {
    xml: Option<Memo<XmlDocument>>,
    json: Option<Memo<JsonDocument>>,
    namespaces: BTreeMap<String, String>,
}

enum Outcome {
    Pass,
    Retry(Error),
    Fail(Error),
}

/// The result of a request, fetched lazily and inspected by assertions.
///
/// Nothing is sent until the first accessor or assertion needs data. Every
/// operation runs under one re-entrant monitor per response: policies may
/// call back into the response while [`assert_that`](Self::assert_that)
/// holds it, and other threads wait until a retry loop finishes.
///
/// ```no_run
/// use restassay_client::TestClient;
/// use restassay_core::contains_string;
///
/// let client = TestClient::new("http://localhost:8080/")?;
/// let response = client.header("Accept", "text/xml").get("home page");
/// response
///     .assert_status(200)?
///     .assert_body(contains_string("<page"))?
///     .assert_xpath("/page/title")?;
/// # Ok::<(), restassay_client::Error>(())
/// ```
pub struct TestResponse {
    fetcher: BufferedFetcher,
    request: RequestTranscript,
    origin: Origin,
    monitor: ReentrantMutex<RefCell<Views>>,
}

impl TestResponse {
    pub(crate) fn new(fetcher: BufferedFetcher, request: RequestTranscript, origin: Origin) -> Self {
        Self {
            fetcher,
            request,
            origin,
            monitor: ReentrantMutex::new(RefCell::new(Views::default())),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The request that produces this response.
    pub fn request(&self) -> &RequestTranscript {
        &self.request
    }

    /// The buffered response, fetching it if needed.
    pub fn raw(&self) -> Result<Arc<RawResponse>> {
        let _guard = self.monitor.lock();
        self.fetcher.fetch()
    }

    /// Status code.
    pub fn status(&self) -> Result<u16> {
        Ok(self.raw()?.status().as_u16())
    }

    /// Status line, e.g. `404 Not Found`.
    pub fn status_line(&self) -> Result<String> {
        let status = self.raw()?.status();
        Ok(match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason),
            None => status.as_u16().to_string(),
        })
    }

    /// All response headers.
    pub fn headers(&self) -> Result<HeaderMap> {
        Ok(self.raw()?.headers().clone())
    }

    /// All values of one header; empty when absent.
    pub fn header(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.raw()?.header_values(name))
    }

    /// Body as text.
    pub fn body(&self) -> Result<String> {
        self.raw()?.text()
    }

    /// Raw body.
    pub fn bytes(&self) -> Result<Bytes> {
        Ok(self.raw()?.body().clone())
    }

    /// Number of requests made for this response so far.
    pub fn fetches(&self) -> u64 {
        self.fetcher.calls()
    }

    /// Drop the cached response and every view derived from it.
    pub fn reset(&self) {
        let _guard = self.monitor.lock();
        self.fetcher.reset();
    }

    // ========================================================================
    // Document views
    // ========================================================================

    /// The body as an XML document with all registered namespaces.
    ///
    /// Parsed once per fetched response.
    pub fn xml(&self) -> Result<Arc<XmlDocument>> {
        let views = self.monitor.lock();
        let generation = self.fetcher.generation();
        if let Some(memo) = views.borrow().xml.as_ref() {
            if memo.generation == generation {
                return Ok(Arc::clone(&memo.value));
            }
        }

        let body = self.fetcher.body()?;
        let namespaces = views.borrow().namespaces.clone();
        let document = Arc::new(XmlDocument::parse(body)?.merge(namespaces));
        debug!(generation, "Parsed XML view");
        views.borrow_mut().xml = Some(Memo {
            generation,
            value: Arc::clone(&document),
        });
        Ok(document)
    }

    /// The body as a JSON document. Parsed once per fetched response.
    pub fn json(&self) -> Result<Arc<JsonDocument>> {
        let views = self.monitor.lock();
        let generation = self.fetcher.generation();
        if let Some(memo) = views.borrow().json.as_ref() {
            if memo.generation == generation {
                return Ok(Arc::clone(&memo.value));
            }
        }

        let body = self.fetcher.body()?;
        let document = Arc::new(JsonDocument::parse(&body)?);
        debug!(generation, "Parsed JSON view");
        views.borrow_mut().json = Some(Memo {
            generation,
            value: Arc::clone(&document),
        });
        Ok(document)
    }

    /// Evaluate an XPath query against the body.
    pub fn xpath(&self, query: &str) -> Result<Vec<String>> {
        self.xml()?.xpath(query)
    }

    /// Evaluate an XPath query and return matching elements as documents.
    pub fn nodes(&self, query: &str) -> Result<Vec<XmlDocument>> {
        self.xml()?.nodes(query)
    }

    /// Evaluate a JSON path against the body.
    pub fn json_path(&self, query: &str) -> Result<Vec<String>> {
        self.json()?.json(query)
    }

    /// Evaluate a JSON path and return matches as documents.
    pub fn json_nodes(&self, query: &str) -> Result<Vec<JsonDocument>> {
        self.json()?.nodes(query)
    }

    /// Register a namespace prefix for XPath queries. Kept across retries.
    pub fn register_ns(&self, prefix: impl Into<String>, uri: impl Into<String>) -> &Self {
        let prefix = prefix.into();
        let uri = uri.into();
        let guard = self.monitor.lock();
        let mut views = guard.borrow_mut();
        if let Some(memo) = views.xml.as_mut() {
            memo.value = Arc::new(memo.value.register_ns(prefix.clone(), uri.clone()));
        }
        views.namespaces.insert(prefix, uri);
        self
    }

    /// Register several namespace prefixes at once.
    pub fn merge_ns<I, K, V>(&self, namespaces: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (prefix, uri) in namespaces {
            self.register_ns(prefix, uri);
        }
        self
    }

    // ========================================================================
    // Assertions
    // ========================================================================

    /// Evaluate a policy, retrying with a fresh response while it asks to.
    ///
    /// A failure is retried only if the policy classifies the error as
    /// retryable and `is_retry_needed` returns true for the number of failed
    /// evaluations so far. The loop stops after `max_attempts` evaluations
    /// with [`Error::RetryExhausted`].
    pub fn assert_that<P: AssertionPolicy + ?Sized>(&self, policy: &P) -> Result<&Self> {
        let _guard = self.monitor.lock();
        let max_attempts = self.origin.config.max_attempts;
        let mut attempt: u32 = 0;

        loop {
            let outcome = match policy.assert_that(self) {
                Ok(()) => Outcome::Pass,
                Err(error) if !policy.is_retryable(&error) => Outcome::Fail(error),
                Err(error) => {
                    attempt += 1;
                    if !policy.is_retry_needed(attempt) {
                        Outcome::Fail(error)
                    } else if attempt >= max_attempts {
                        warn!(policy = policy.name(), attempts = attempt, "Giving up");
                        Outcome::Fail(Error::RetryExhausted {
                            attempts: attempt,
                            last: Box::new(error),
                        })
                    } else {
                        Outcome::Retry(error)
                    }
                }
            };

            match outcome {
                Outcome::Pass => {
                    if attempt > 0 {
                        info!(policy = policy.name(), attempts = attempt + 1, "Passed after retrying");
                    }
                    return Ok(self);
                }
                Outcome::Fail(error) => return Err(error),
                Outcome::Retry(error) => {
                    if policy.is_quiet() {
                        warn!(policy = policy.name(), attempt, "{}", brief(&error));
                    } else {
                        warn!(policy = policy.name(), attempt, "Attempt failed, re-trying: {}", error);
                    }
                    self.fetcher.reset();
                }
            }
        }
    }

    /// Require the status code to equal `status`.
    pub fn assert_status(&self, status: u16) -> Result<&Self> {
        self.assert_that(&StatusPolicy::new(equal_to(status)))
    }

    /// Require the status code to satisfy a matcher.
    pub fn assert_status_matching<M: Matcher<u16>>(&self, matcher: M) -> Result<&Self> {
        self.assert_that(&StatusPolicy::new(matcher))
    }

    /// Require the values of a header to satisfy a matcher.
    pub fn assert_header<M: Matcher<[String]>>(&self, name: &str, matcher: M) -> Result<&Self> {
        self.assert_that(&HeaderPolicy::new(name, matcher))
    }

    /// Require the body to satisfy a matcher.
    pub fn assert_body<M: Matcher<str>>(&self, matcher: M) -> Result<&Self> {
        self.assert_that(&BodyPolicy::new(matcher))
    }

    /// Require an XPath query to select something.
    pub fn assert_xpath(&self, query: &str) -> Result<&Self> {
        self.assert_that(&XpathPolicy::new(query))
    }

    /// Require a JSON path to select something.
    pub fn assert_json(&self, query: &str) -> Result<&Self> {
        self.assert_that(&JsonPolicy::new(query))
    }

    /// Fail with `reason` and the transcript. Never returns `Ok`.
    pub fn fail(&self, reason: impl Into<String>) -> Result<()> {
        self.assert_that(&Failure::new(reason)).map(|_| ())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// A client for the single link selected by an XPath query.
    ///
    /// Relative links resolve against this request's URI. Cookies set by
    /// this response are carried over.
    pub fn rel(&self, query: &str) -> Result<TestClient> {
        let _guard = self.monitor.lock();
        let links = self.xpath(query)?;
        let [link] = links.as_slice() else {
            return Err(self.failure(format!(
                "XPath '{}' should select exactly one link, {} found",
                query,
                links.len()
            )));
        };
        let target = self.resolve(link)?;
        debug!(%target, query, "Following link");
        Ok(self.navigate(target))
    }

    /// A client for the `Location` of this response.
    pub fn follow(&self) -> Result<TestClient> {
        let _guard = self.monitor.lock();
        let location = self
            .header(LOCATION.as_str())?
            .into_iter()
            .next()
            .ok_or_else(|| self.failure("Location header is absent in HTTP response"))?;
        let target = self.resolve(&location)?;
        debug!(%target, "Following Location");
        Ok(self.navigate(target))
    }

    /// A cookie set by this response.
    pub fn cookie(&self, name: &str) -> Result<Cookie<'static>> {
        let _guard = self.monitor.lock();
        let raw = self.header(SET_COOKIE.as_str())?;
        if raw.is_empty() {
            return Err(self.failure("cookies should be set in HTTP header"));
        }
        self.cookies()?
            .into_iter()
            .find(|cookie| cookie.name() == name)
            .ok_or_else(|| {
                self.failure(format!(
                    "cookie '{}' not found in Set-Cookie header: '{}'",
                    name,
                    raw.join(", ")
                ))
            })
    }

    /// All cookies set by this response. Unparsable values are skipped.
    pub fn cookies(&self) -> Result<Vec<Cookie<'static>>> {
        Ok(self
            .header(SET_COOKIE.as_str())?
            .into_iter()
            .filter_map(|value| match Cookie::parse(value) {
                Ok(cookie) => Some(cookie),
                Err(e) => {
                    debug!(error = %e, "Skipping malformed Set-Cookie");
                    None
                }
            })
            .collect())
    }

    fn resolve(&self, link: &str) -> Result<Url> {
        self.request
            .uri()
            .join(link)
            .map_err(|e| Error::InvalidArgument(format!("cannot resolve '{}': {}", link, e)))
    }

    fn navigate(&self, target: Url) -> TestClient {
        let client = TestClient::from_parts(
            target,
            Arc::clone(&self.origin.transport),
            Arc::clone(&self.origin.config),
        );
        if let Ok(cookies) = self.cookies() {
            for cookie in cookies {
                client.header(COOKIE.as_str(), format!("{}={}", cookie.name(), cookie.value()));
            }
        }
        client
    }

    fn failure(&self, message: impl Into<String>) -> Error {
        Error::Assertion(AssertionFailure::new(message).with_transcript(self.transcript()))
    }

    // ========================================================================
    // Transcript
    // ========================================================================

    /// Request and response as text, for failure messages.
    pub fn transcript(&self) -> String {
        let _guard = self.monitor.lock();
        let mut text = format!("HTTP request:\n{}", self.request);
        match self.fetcher.fetch() {
            Ok(raw) => {
                let status = raw.status();
                text.push_str(&format!(
                    "HTTP response:\n{} {}\n",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                ));
                for (name, value) in raw.headers() {
                    text.push_str(&format!(
                        "{}: {}\n",
                        name,
                        String::from_utf8_lossy(value.as_bytes())
                    ));
                }
                text.push('\n');
                text.push_str(&String::from_utf8_lossy(raw.body()));
            }
            Err(e) => text.push_str(&format!("HTTP response unavailable: {}\n", e)),
        }
        text
    }
}

fn brief(error: &Error) -> String {
    match error {
        Error::Assertion(failure) => failure.message().to_string(),
        other => other.to_string(),
    }
}

impl fmt::Display for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.transcript())
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("method", self.request.method())
            .field("uri", &self.request.uri().as_str())
            .field("fetcher", &self.fetcher)
            .finish()
    }
}
