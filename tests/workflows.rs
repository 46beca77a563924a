//! Integration tests for common restassay workflows.
//!
//! Each test drives a real HTTP round trip between the test client and an
//! embedded mock server.

#![cfg(feature = "mock")]

use restassay::prelude::*;
use restassay::{AssertionFailure, JsonPolicy, MockServerHandle};

fn serve(configure: impl FnOnce(&MockServer)) -> MockServerHandle {
    restassay::log::init();
    let mock = MockServer::new();
    configure(&mock);
    mock.start().unwrap()
}

// =============================================================================
// Client Tests
// =============================================================================

#[test]
fn test_relative_uri_is_rejected() {
    let error = restassay::start("/relative/path").unwrap_err();
    assert!(matches!(error, Error::InvalidArgument(_)));
}

#[test]
fn test_basic_auth_reaches_the_server() {
    let handle = serve(|mock| {
        mock.header_matcher("Authorization", equal_to("Basic dXNlcjpwYSBzcw=="))
            .body("welcome");
    });

    let uri = format!("http://user:pa%20ss@{}/secure", handle.addr());
    let client = restassay::start(&uri).unwrap();
    client
        .get("secure area")
        .assert_status(200)
        .and_then(|r| r.assert_body(equal_to("welcome")))
        .unwrap();

    handle.shutdown().unwrap();
}

#[test]
fn test_headers_are_sent_once() {
    let handle = serve(|_| {});
    let client = restassay::start(handle.url("/").as_str()).unwrap();
    client.header("Accept", "text/xml").header("Accept", "text/xml");
    client.get("home").assert_status(200).unwrap();

    let requests = handle.requests();
    assert_eq!(requests[0].header_values("Accept"), vec!["text/xml"]);
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_xml_and_json_views() {
    let handle = serve(|mock| {
        mock.header("Content-Type", "application/json")
            .body(r#"{"data":{"user":{"id":1,"name":"John"}}}"#);
    });
    let client = restassay::start(handle.url("/users/1").as_str()).unwrap();

    let response = client.get("user details");
    response.assert_json("$.data.user.name").unwrap();
    assert_eq!(response.json_path("data.user.id").unwrap(), vec!["1"]);
    assert!(response
        .assert_that(&JsonPolicy::new("$.data.user.email"))
        .unwrap_err()
        .is_assertion());
    assert_eq!(handle.requests().len(), 1);
}

#[test]
fn test_redirects_are_not_followed_automatically() {
    let handle = serve(|mock| {
        mock.status(303).header("Location", "/orders/7");
    });
    let client = restassay::start(handle.url("/orders").as_str()).unwrap();

    let response = client.post("place order", "item=book");
    response.assert_status(303).unwrap();

    let order = response.follow().unwrap();
    assert_eq!(order.uri().path(), "/orders/7");
    assert_eq!(order.uri().port(), Some(handle.addr().port()));
}

#[test]
fn test_rel_carries_cookies() {
    let handle = serve(|mock| {
        mock.header("Content-Type", "text/xml")
            .header("Set-Cookie", "session=abc; Path=/")
            .body("<page><links><link rel='next' href='/page/2'/></links></page>");
    });
    let client = restassay::start(handle.url("/page/1").as_str()).unwrap();

    let first = client.get("first page");
    assert_eq!(first.cookie("session").unwrap().value(), "abc");

    let next = first.rel("/page/links/link[@rel='next']/@href").unwrap();
    next.get("second page").assert_status(200).unwrap();

    let requests = handle.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].uri, "/page/2");
    assert_eq!(requests[1].header("Cookie"), Some("session=abc"));
}

#[test]
fn test_retry_refetches_until_pass() {
    let handle = serve(|mock| {
        mock.status(503);
    });
    let client = restassay::start(handle.url("/jobs/1").as_str()).unwrap();

    // The server becomes ready after the first failed check.
    let ready = |response: &TestResponse| -> restassay::Result<()> {
        if response.status()? != 200 {
            handle.server().status(200).body("<job state='done'/>");
            return Err(AssertionFailure::new("job is not ready").into());
        }
        Ok(())
    };

    let response = client.get("job status");
    response.assert_that(&retrying(ready, 3)).unwrap();
    response.assert_xpath("/job[@state='done']").unwrap();
    assert_eq!(handle.requests().len(), 2);
}

#[test]
fn test_retry_gives_up_at_cap() {
    let handle = serve(|mock| {
        mock.status(503);
    });
    let config = ClientConfig::builder().max_attempts(3).build();
    let client = TestClient::with_config(handle.url("/").as_str(), config).unwrap();

    let error = client
        .get("never ready")
        .assert_that(&retrying(StatusPolicy::new(equal_to(200u16)), 10).quiet())
        .unwrap_err();
    assert!(error.is_exhausted());
    assert!(error.to_string().starts_with("failed after 3 attempt(s)"));
    assert_eq!(handle.requests().len(), 3);
}

// =============================================================================
// Mock Server Tests
// =============================================================================

#[test]
fn test_mock_rejects_unexpected_requests() {
    let handle = serve(|mock| {
        mock.method(equal_to("POST"))
            .body_matcher(contains_string("name=John"));
    });
    let client = restassay::start(handle.url("/users").as_str()).unwrap();

    let response = client.get("list users");
    assert_eq!(response.status().unwrap(), 500);

    let failures = handle.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].message().starts_with("HTTP method matches provided matcher"));
    assert!(handle.verify().is_err());
}

#[test]
fn test_mock_accepts_form_posts() {
    let handle = serve(|mock| {
        mock.method(equal_to("POST"))
            .param("name", equal_to("John"))
            .status(201)
            .body("created");
    });
    let client = restassay::start(handle.url("/users").as_str()).unwrap();
    client.header("Content-Type", "application/x-www-form-urlencoded");

    client
        .post("create user", "name=John&age=42")
        .assert_status(201)
        .unwrap();
    handle.shutdown().unwrap();
}
