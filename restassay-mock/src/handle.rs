//! Running mock servers.

use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use restassay_core::AssertionFailure;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{MockError, MockRequest, MockResponse, MockServer, Result};

/// Requests and failures observed by a running server.
#[derive(Default)]
struct Journal {
    requests: Mutex<Vec<MockRequest>>,
    failures: Mutex<Vec<AssertionFailure>>,
    verified: AtomicBool,
}

/// A mock server listening on `127.0.0.1`.
///
/// Requests that do not satisfy the configured matchers are answered with
/// `500` and the failure text, and recorded. Call [`verify`](Self::verify)
/// to turn them into an error; a handle dropped with unverified failures
/// panics so that the test cannot pass silently.
pub struct MockServerHandle {
    server: Arc<MockServer>,
    journal: Arc<Journal>,
    addr: SocketAddr,
    base: Url,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MockServerHandle {
    pub(crate) fn spawn(server: Arc<MockServer>) -> Result<Self> {
        let listener = StdTcpListener::bind(("127.0.0.1", 0))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        let base = Url::parse(&format!("http://{}/", addr))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let journal = Arc::new(Journal::default());
        let (shutdown, signal) = oneshot::channel();

        let thread = {
            let server = Arc::clone(&server);
            let journal = Arc::clone(&journal);
            thread::Builder::new()
                .name(format!("restassay-mock-{}", addr.port()))
                .spawn(move || runtime.block_on(serve(listener, server, journal, signal)))?
        };

        info!(%addr, "Mock server listening");
        Ok(Self {
            server,
            journal,
            addr,
            base,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    /// The configuration; changes apply to subsequent requests.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// The bound socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The server root, e.g. `http://127.0.0.1:40123/`.
    pub fn uri(&self) -> Url {
        self.url("/")
    }

    /// An absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Some((path, query)) = path.split_once('?') {
            url.set_path(path);
            url.set_query(Some(query));
        } else {
            url.set_path(path);
        }
        url
    }

    /// Every request received so far, accepted or not.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.journal.requests.lock().clone()
    }

    /// Failures of rejected requests so far.
    pub fn failures(&self) -> Vec<AssertionFailure> {
        self.journal.failures.lock().clone()
    }

    /// Fail if any request was rejected. Marks the failures as seen.
    pub fn verify(&self) -> Result<()> {
        self.journal.verified.store(true, Ordering::SeqCst);
        let failures = self.journal.failures.lock();
        if failures.is_empty() {
            return Ok(());
        }
        Err(MockError::Unverified {
            count: failures.len(),
            report: failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n\n"),
        })
    }

    /// Stop the server and verify it.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()?;
        self.verify()
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| MockError::Panicked)?;
            debug!(addr = %self.addr, "Mock server stopped");
        }
        Ok(())
    }
}

impl Drop for MockServerHandle {
    fn drop(&mut self) {
        let stopped = self.stop();
        if thread::panicking() || self.journal.verified.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = stopped {
            error!(error = %e, "Mock server did not stop cleanly");
        }
        if let Err(e) = self.verify() {
            panic!("{}", e);
        }
    }
}

impl fmt::Debug for MockServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServerHandle")
            .field("addr", &self.addr)
            .field("requests", &self.journal.requests.lock().len())
            .field("failures", &self.journal.failures.lock().len())
            .finish()
    }
}

async fn serve(
    listener: StdTcpListener,
    server: Arc<MockServer>,
    journal: Arc<Journal>,
    mut signal: oneshot::Receiver<()>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "Mock server could not register its listener");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = &mut signal => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let server = Arc::clone(&server);
                let journal = Arc::clone(&journal);

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let server = Arc::clone(&server);
                        let journal = Arc::clone(&journal);
                        async move { handle_request(req, server, journal).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        debug!(%peer, error = %err, "Error serving connection");
                    }
                });
            }
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    server: Arc<MockServer>,
    journal: Arc<Journal>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    let request = MockRequest::from_parts(&parts, body);

    let response = match server.service(&request) {
        Ok(response) => into_response(response),
        Err(failure) => {
            warn!(method = %request.method, uri = %request.uri, "Request rejected: {}", failure.message());
            let mut response = Response::new(Full::new(Bytes::from(failure.to_string())));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
            journal.failures.lock().push(failure);
            journal.verified.store(false, Ordering::SeqCst);
            response
        }
    };

    journal.requests.lock().push(request);
    Ok(response)
}

fn into_response(mock: MockResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(mock.body));
    *response.status_mut() = mock.status;
    for (name, value) in mock.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => warn!(name = %name, value = %value, "Skipping invalid response header"),
        }
    }
    response
}
