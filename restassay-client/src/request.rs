//! Outbound request types.

use std::fmt;

use http::Method;
use url::Url;

/// A single request header, kept in insertion order by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    /// Create a header.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Header name as given.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// A fully prepared request handed to a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute target URI.
    pub uri: Url,
    /// Headers in send order, `Authorization` included when derived.
    pub headers: Vec<Header>,
    /// Request body, if any.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Get the first value of a header (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Human readable record of the request behind a test response.
#[derive(Debug, Clone)]
pub struct RequestTranscript {
    method: Method,
    uri: Url,
    description: String,
    headers: Vec<Header>,
    body: Option<String>,
}

impl RequestTranscript {
    pub(crate) fn new(
        method: Method,
        uri: Url,
        description: impl Into<String>,
        headers: Vec<Header>,
        body: Option<String>,
    ) -> Self {
        Self {
            method,
            uri,
            description: description.into(),
            headers,
            body,
        }
    }

    /// HTTP method of the request.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URI of the request.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Description given by the test author.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Headers set on the client when the request was created.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }
}

impl fmt::Display for RequestTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} {:?}", self.method, self.uri.path(), self.description)?;
        writeln!(f, "{}", self.uri)?;
        for header in &self.headers {
            writeln!(f, "{}", header)?;
        }
        if let Some(body) = &self.body {
            writeln!(f)?;
            writeln!(f, "{}", body)?;
        }
        Ok(())
    }
}
