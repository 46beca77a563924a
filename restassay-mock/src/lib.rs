//! Embedded mock HTTP server for restassay.
//!
//! A [`MockServer`] is configured with matchers for the method, Request-URI,
//! parameters, body and headers of expected requests, plus a canned response.
//! [`MockServer::start`] binds it to an ephemeral port on `127.0.0.1` and
//! serves HTTP/1.1 on a dedicated thread until the returned
//! [`MockServerHandle`] is shut down or dropped.
//!
//! Matching can also be exercised in-process with [`MockServer::service`].

mod error;
mod handle;
mod request;
mod server;

pub use error::{MockError, Result};
pub use handle::MockServerHandle;
pub use request::MockRequest;
pub use server::{MockResponse, MockServer};

#[cfg(test)]
mod tests {
    use super::*;
    use restassay_client::TestClient;
    use restassay_core::{contains_string, equal_to, has_item};

    fn client(handle: &MockServerHandle, path: &str) -> TestClient {
        TestClient::new(handle.url(path).as_str()).unwrap()
    }

    #[test]
    fn test_serves_canned_response() {
        restassay_log::init();
        let mock = MockServer::new();
        mock.status(201)
            .header("Content-Type", "text/xml")
            .header("X-Trace", "abc")
            .body("<created/>");
        let handle = mock.start().unwrap();

        let response = client(&handle, "/users").post("create user", "name=John");
        response
            .assert_status(201)
            .and_then(|r| r.assert_header("X-Trace", has_item(equal_to("abc"))))
            .and_then(|r| r.assert_xpath("/created"))
            .unwrap();

        let requests = handle.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].uri, "/users");
        assert_eq!(requests[0].body_text(), "name=John");
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_mismatch_is_reported() {
        restassay_log::init();
        let mock = MockServer::new();
        mock.method(equal_to("POST"))
            .body_matcher(contains_string("name=John"));
        let handle = mock.start().unwrap();

        let response = client(&handle, "/").get("wrong method");
        assert_eq!(response.status().unwrap(), 500);
        assert!(response.body().unwrap().contains("HTTP method matches provided matcher"));

        assert_eq!(handle.failures().len(), 1);
        let error = handle.verify().unwrap_err();
        assert!(matches!(error, MockError::Unverified { count: 1, .. }));
    }

    #[test]
    fn test_params_from_query_string() {
        let mock = MockServer::new();
        mock.param("q", equal_to("rust")).body("found");
        let handle = mock.start().unwrap();

        client(&handle, "/search?q=rust")
            .get("search")
            .assert_body(equal_to("found"))
            .unwrap();
        handle.verify().unwrap();
    }

    #[test]
    fn test_live_reconfiguration() {
        let handle = MockServer::new().start().unwrap();
        let client = client(&handle, "/");

        client.get("before").assert_status(200).unwrap();
        handle.server().status(404);
        client.get("after").assert_status(404).unwrap();
        assert_eq!(handle.requests().len(), 2);
    }

    #[test]
    fn test_url_building() {
        let handle = MockServer::new().start().unwrap();
        let url = handle.url("/a/b?c=d");
        assert_eq!(url.path(), "/a/b");
        assert_eq!(url.query(), Some("c=d"));
        assert_eq!(url.port(), Some(handle.addr().port()));
        assert_eq!(handle.uri().path(), "/");
    }

    #[test]
    #[should_panic(expected = "unexpected request")]
    fn test_drop_panics_on_unverified_failures() {
        let mock = MockServer::new();
        mock.request_uri(equal_to("/expected"));
        let handle = mock.start().unwrap();
        let _ = client(&handle, "/other").get("unexpected").status();
        drop(handle);
    }
}
