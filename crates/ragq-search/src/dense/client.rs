//! Deadline-aware dense search over an [`Embedder`] and a [`VectorStore`].
//!
//! With a bounded [`Deadline`] each upstream call runs on a helper thread
//! while the caller polls the deadline, so cancellation or expiry returns
//! promptly even if the call is still in flight. The abandoned call finishes
//! on its own (its I/O timeout is capped by the remaining budget) and its
//! result is dropped.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use ragq_core::error::UpstreamService;
use ragq_core::model::{Candidate, WhereFilter};
use ragq_core::{Deadline, RetrievalError};
use tracing::{debug, instrument};

use super::{Embedder, VectorStore};

/// How often a waiting caller re-checks its deadline.
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Default ceiling for a single upstream call.
pub const DEFAULT_IO_CEILING: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct DenseSearchClient {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    io_ceiling: Duration,
}

impl std::fmt::Debug for DenseSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseSearchClient")
            .field("io_ceiling", &self.io_ceiling)
            .finish_non_exhaustive()
    }
}

impl DenseSearchClient {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            io_ceiling: DEFAULT_IO_CEILING,
        }
    }

    #[must_use]
    pub const fn with_io_ceiling(mut self, ceiling: Duration) -> Self {
        self.io_ceiling = ceiling;
        self
    }

    /// Embed `query` and return up to `n` candidates matching `filter`,
    /// ordered by ascending distance as the store returned them.
    ///
    /// # Errors
    ///
    /// Upstream failures, cancellation, and deadline expiry abort the search.
    #[instrument(skip_all, fields(n = n, filtered = filter.is_some()))]
    pub fn search(
        &self,
        query: &str,
        n: usize,
        filter: Option<&WhereFilter>,
        deadline: &Deadline,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        deadline.check()?;

        let embedding = {
            let embedder = Arc::clone(&self.embedder);
            let text = query.to_string();
            let timeout = deadline.io_timeout(self.io_ceiling);
            run_bounded(deadline, UpstreamService::Embedding, move || {
                embedder.embed(&text, timeout)
            })?
        };
        deadline.check()?;

        let records = {
            let store = Arc::clone(&self.store);
            let filter = filter.cloned();
            let timeout = deadline.io_timeout(self.io_ceiling);
            run_bounded(deadline, UpstreamService::VectorStore, move || {
                store.query(&embedding, n, filter.as_ref(), timeout)
            })?
        };

        let candidates: Vec<Candidate> = records
            .into_iter()
            .take(n)
            .map(super::StoreRecord::into_candidate)
            .collect();
        debug!(candidates = candidates.len(), "dense recall complete");
        Ok(candidates)
    }
}

/// Run `call` so that `deadline` can interrupt the wait.
///
/// An unbounded deadline runs the call inline.
fn run_bounded<T, F>(
    deadline: &Deadline,
    service: UpstreamService,
    call: F,
) -> Result<T, RetrievalError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RetrievalError> + Send + 'static,
{
    if deadline.is_unbounded() {
        return call();
    }

    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name(format!("ragq-{}", thread_label(service)))
        .spawn(move || {
            // The receiver is gone once the caller gave up; nothing to report.
            let _ = tx.send(call());
        })
        .map_err(|e| upstream(service, format!("failed to spawn worker: {e}")))?;

    loop {
        let wait = deadline
            .remaining()
            .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
        match rx.recv_timeout(wait) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => deadline.check()?,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(upstream(service, "worker exited without a result".into()));
            }
        }
    }
}

const fn thread_label(service: UpstreamService) -> &'static str {
    match service {
        UpstreamService::Embedding => "embed",
        UpstreamService::VectorStore => "store",
    }
}

fn upstream(service: UpstreamService, message: String) -> RetrievalError {
    RetrievalError::Upstream {
        service,
        source: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::StoreRecord;
    use ragq_core::CancelToken;
    use ragq_core::model::{FilterValue, Metadata};
    use std::sync::Mutex;
    use std::time::Instant;

    struct FixedEmbedder;

    impl Embedder for FixedEmbedder {
        fn embed(&self, _text: &str, _timeout: Duration) -> Result<Vec<f32>, RetrievalError> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct SlowEmbedder(Duration);

    impl Embedder for SlowEmbedder {
        fn embed(&self, _text: &str, _timeout: Duration) -> Result<Vec<f32>, RetrievalError> {
            std::thread::sleep(self.0);
            Ok(vec![1.0])
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str, _timeout: Duration) -> Result<Vec<f32>, RetrievalError> {
            Err(RetrievalError::embedding("connection refused"))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        seen: Mutex<Vec<(usize, Option<WhereFilter>)>>,
        rows: Vec<StoreRecord>,
    }

    impl VectorStore for RecordingStore {
        fn query(
            &self,
            _embedding: &[f32],
            n_results: usize,
            filter: Option<&WhereFilter>,
            _timeout: Duration,
        ) -> Result<Vec<StoreRecord>, RetrievalError> {
            self.seen
                .lock()
                .expect("lock")
                .push((n_results, filter.cloned()));
            Ok(self.rows.clone())
        }
    }

    fn rows(n: usize) -> Vec<StoreRecord> {
        (0..n)
            .map(|i| {
                let mut meta = Metadata::new();
                meta.insert("chunk_id".into(), format!("c{i}").into());
                StoreRecord::new(format!("text {i}"), meta, i as f64 / 10.0)
            })
            .collect()
    }

    #[test]
    fn passes_n_and_filter_to_store() {
        let store = Arc::new(RecordingStore {
            rows: rows(3),
            ..RecordingStore::default()
        });
        let client = DenseSearchClient::new(Arc::new(FixedEmbedder), store.clone());
        let filter = WhereFilter::new()
            .with("tenant_id", FilterValue::Str("t1".into()))
            .expect("valid");

        let out = client
            .search("q", 3, Some(&filter), &Deadline::none())
            .expect("search");
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].chunk_id, "c0");

        let seen = store.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 3);
        assert_eq!(seen[0].1.as_ref(), Some(&filter));
    }

    #[test]
    fn extra_store_rows_are_dropped() {
        let store = Arc::new(RecordingStore {
            rows: rows(5),
            ..RecordingStore::default()
        });
        let client = DenseSearchClient::new(Arc::new(FixedEmbedder), store);
        let out = client.search("q", 2, None, &Deadline::none()).expect("search");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn upstream_failure_propagates() {
        let client = DenseSearchClient::new(
            Arc::new(FailingEmbedder),
            Arc::new(RecordingStore::default()),
        );
        let err = client.search("q", 5, None, &Deadline::none()).unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn expired_deadline_aborts_promptly() {
        let client = DenseSearchClient::new(
            Arc::new(SlowEmbedder(Duration::from_secs(2))),
            Arc::new(RecordingStore::default()),
        );
        let started = Instant::now();
        let err = client
            .search("q", 5, None, &Deadline::after(Duration::from_millis(50)))
            .unwrap_err();
        assert!(matches!(err, RetrievalError::DeadlineExceeded { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cancellation_aborts_in_flight_call() {
        let client = DenseSearchClient::new(
            Arc::new(SlowEmbedder(Duration::from_secs(2))),
            Arc::new(RecordingStore::default()),
        );
        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let started = Instant::now();
        let err = client
            .search("q", 5, None, &Deadline::none().with_cancel(token))
            .unwrap_err();
        handle.join().expect("canceller thread");
        assert!(matches!(err, RetrievalError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn bounded_deadline_still_returns_results() {
        let store = Arc::new(RecordingStore {
            rows: rows(2),
            ..RecordingStore::default()
        });
        let client = DenseSearchClient::new(Arc::new(FixedEmbedder), store);
        let out = client
            .search("q", 2, None, &Deadline::after(Duration::from_secs(5)))
            .expect("search");
        assert_eq!(out.len(), 2);
    }
}
