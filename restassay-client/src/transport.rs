//! Transport abstraction and the default blocking HTTP transport.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use reqwest::redirect;
use tracing::debug;

use crate::{ClientConfig, Error, HttpRequest, Result};

/// Executes prepared requests and returns fully buffered responses.
///
/// The default implementation is [`ReqwestTransport`]. Tests and embedders
/// can supply their own to avoid the network.
pub trait Transport: Send + Sync {
    /// Execute a request.
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse>;
}

/// A buffered HTTP response as produced by a [`Transport`].
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl RawResponse {
    /// Create a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Create a `200 OK` response with the given body and no headers.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), body)
    }

    /// Replace the status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Append a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get all values of a header, in arrival order.
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect()
    }

    /// Get the raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the body as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| Error::Resource(format!("response body is not valid UTF-8: {}", e)))
    }
}

/// Blocking transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a transport from a client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let policy = if config.follow_redirects {
            redirect::Policy::limited(config.max_redirects)
        } else {
            redirect::Policy::none()
        };

        let inner = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(config.gzip)
            .brotli(config.brotli)
            .redirect(policy)
            .build()?;

        Ok(Self { inner })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse> {
        debug!(method = %request.method, uri = %request.uri, "Sending request");

        let mut builder = self
            .inner
            .request(request.method.clone(), request.uri.clone());
        for header in &request.headers {
            builder = builder.header(header.name(), header.value());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(|e| {
            if e.is_connect() {
                Error::Connection(e.to_string())
            } else {
                Error::Http(e)
            }
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?;

        Ok(RawResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_values_in_order() {
        let response = RawResponse::ok("")
            .with_header("Set-Cookie", "a=1")
            .with_header("Set-Cookie", "b=2")
            .with_header("bad header", "ignored");
        assert_eq!(response.header_values("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(response.headers().len(), 2);
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        let response = RawResponse::ok(vec![0xff, 0xfe]);
        assert!(matches!(response.text(), Err(Error::Resource(_))));
        assert_eq!(RawResponse::ok("hi").text().unwrap(), "hi");
    }

    #[test]
    fn test_transport_builds_from_config() {
        assert!(ReqwestTransport::new(&ClientConfig::default()).is_ok());
    }
}
