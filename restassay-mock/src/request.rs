//! Requests as seen by the mock server.

use std::fmt;

use bytes::Bytes;
use http::request::Parts;
use url::form_urlencoded;

/// A fully read request received by the mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRequest {
    /// HTTP method, e.g. `POST`.
    pub method: String,
    /// Request-URI as sent (path and query).
    pub uri: String,
    /// Protocol, e.g. `HTTP/1.1`.
    pub protocol: String,
    /// Headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: Bytes,
}

impl MockRequest {
    /// Create a request.
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            protocol: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn from_parts(parts: &Parts, body: Bytes) -> Self {
        Self {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            protocol: format!("{:?}", parts.version),
            headers: parts
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            body,
        }
    }

    /// The body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The path part of the Request-URI.
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or_default()
    }

    /// All values of a header (case-insensitive name).
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The first value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }

    /// Parameters from the query string followed by those of a form body.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = match self.uri.split_once('?') {
            Some((_, query)) => form_urlencoded::parse(query.as_bytes()).into_owned().collect(),
            None => Vec::new(),
        };
        let is_form = self.header("Content-Type").is_some_and(|ct| {
            ct.to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        });
        if is_form {
            params.extend(form_urlencoded::parse(&self.body).into_owned());
        }
        params
    }

    /// The first value of a parameter.
    pub fn param(&self, name: &str) -> Option<String> {
        self.params()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

impl fmt::Display for MockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}  {}", self.method, self.uri, self.protocol)?;
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in &self.headers {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name);
            }
        }
        for name in names {
            let values: Vec<String> = self
                .header_values(name)
                .into_iter()
                .map(|v| format!("[{}]", v))
                .collect();
            writeln!(f, "{}: {}", name, values.join(", "))?;
        }
        writeln!(f)?;
        f.write_str(&self.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_from_query_and_form_body() {
        let request = MockRequest::new("POST", "/users?page=2&sort=name")
            .with_header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
            .with_body("name=John+Smith&city=Paris%20Nord");

        assert_eq!(request.param("page").as_deref(), Some("2"));
        assert_eq!(request.param("name").as_deref(), Some("John Smith"));
        assert_eq!(request.param("city").as_deref(), Some("Paris Nord"));
        assert_eq!(request.params().len(), 4);
        assert_eq!(request.path(), "/users");
    }

    #[test]
    fn test_body_params_need_form_content_type() {
        let request = MockRequest::new("POST", "/users").with_body("name=John");
        assert!(request.params().is_empty());
    }

    #[test]
    fn test_dump_groups_header_values() {
        let request = MockRequest::new("GET", "/a?b=c")
            .with_header("Accept", "text/xml")
            .with_header("accept", "text/html")
            .with_header("Host", "localhost")
            .with_body("payload");

        assert_eq!(
            request.to_string(),
            "GET /a?b=c  HTTP/1.1\nAccept: [text/xml], [text/html]\nHost: [localhost]\n\npayload"
        );
    }
}
