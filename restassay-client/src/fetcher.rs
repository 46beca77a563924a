//! Exactly-once response fetching.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{RawResponse, Result};

type FetchFn = Box<dyn Fn() -> Result<RawResponse> + Send + Sync>;

#[derive(Default)]
struct Slot {
    cached: Option<Arc<RawResponse>>,
    generation: u64,
    calls: u64,
}

/// Performs a request at most once and caches the buffered response until
/// [`reset`](Self::reset) is called.
///
/// The slot lock is held while the request runs, so concurrent callers of
/// [`fetch`](Self::fetch) wait for the in-flight request instead of issuing
/// their own. A failed fetch caches nothing; the next call tries again.
pub struct BufferedFetcher {
    fetch: FetchFn,
    slot: Mutex<Slot>,
}

impl BufferedFetcher {
    /// Wrap a request-producing function.
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn() -> Result<RawResponse> + Send + Sync + 'static,
    {
        Self {
            fetch: Box::new(fetch),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Get the cached response, performing the request if there is none.
    pub fn fetch(&self) -> Result<Arc<RawResponse>> {
        let mut slot = self.slot.lock();
        if let Some(cached) = &slot.cached {
            return Ok(Arc::clone(cached));
        }
        slot.calls += 1;
        let response = Arc::new((self.fetch)()?);
        slot.cached = Some(Arc::clone(&response));
        Ok(response)
    }

    /// Get the response body as text.
    pub fn body(&self) -> Result<String> {
        self.fetch()?.text()
    }

    /// Get the raw response body.
    pub fn bytes(&self) -> Result<Bytes> {
        Ok(self.fetch()?.body().clone())
    }

    /// Drop the cached response; the next access performs a new request.
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        slot.cached = None;
        slot.generation += 1;
    }

    /// Number of resets so far. Views derived from the body are valid for a
    /// single generation.
    pub fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    /// Number of requests performed so far.
    pub fn calls(&self) -> u64 {
        self.slot.lock().calls
    }

    /// Check if a response is currently cached.
    pub fn is_fetched(&self) -> bool {
        self.slot.lock().cached.is_some()
    }
}

impl fmt::Debug for BufferedFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("BufferedFetcher")
            .field("fetched", &slot.cached.is_some())
            .field("generation", &slot.generation)
            .field("calls", &slot.calls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn counting(counter: Arc<AtomicUsize>) -> BufferedFetcher {
        BufferedFetcher::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(RawResponse::ok(format!("response {}", n)))
        })
    }

    #[test]
    fn test_fetches_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let fetcher = counting(counter.clone());

        assert_eq!(fetcher.body().unwrap(), "response 1");
        assert_eq!(fetcher.body().unwrap(), "response 1");
        assert_eq!(fetcher.bytes().unwrap(), Bytes::from("response 1"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_reset_refetches() {
        let counter = Arc::new(AtomicUsize::new(0));
        let fetcher = counting(counter.clone());

        assert_eq!(fetcher.body().unwrap(), "response 1");
        fetcher.reset();
        assert!(!fetcher.is_fetched());
        assert_eq!(fetcher.generation(), 1);
        assert_eq!(fetcher.body().unwrap(), "response 2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_reset_before_fetch_is_harmless() {
        let counter = Arc::new(AtomicUsize::new(0));
        let fetcher = counting(counter.clone());
        fetcher.reset();
        fetcher.reset();
        assert_eq!(fetcher.body().unwrap(), "response 1");
    }

    #[test]
    fn test_failure_is_not_cached() {
        let counter = Arc::new(AtomicUsize::new(0));
        let attempts = counter.clone();
        let fetcher = BufferedFetcher::new(move || {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::Connection("refused".into()))
            } else {
                Ok(RawResponse::ok("up"))
            }
        });

        assert!(matches!(fetcher.fetch(), Err(Error::Connection(_))));
        assert_eq!(fetcher.body().unwrap(), "up");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_first_access_fetches_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let fetcher = Arc::new(BufferedFetcher::new(move || {
            thread::sleep(Duration::from_millis(20));
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawResponse::ok("shared"))
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fetcher = Arc::clone(&fetcher);
                thread::spawn(move || fetcher.body().unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "shared");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
