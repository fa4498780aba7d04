//! Dataset cache
//!
//! Holds the most recent successfully fetched candidate table, with derived
//! coordinates, for the lifetime of the process. There is no expiry;
//! [`DatasetCache::invalidate`] is the only way to force a re-fetch.
//!
//! Refreshes are single-flight: callers that find no cached entry join the
//! refresh already in progress (a shared future) instead of starting their
//! own. The refresh runs as its own task and commits its result itself, so
//! it completes even if every waiting caller goes away. The state lock is
//! never held across the network await.
//!
//! Fetch failures are contained here. A caller whose refresh fails receives
//! the previous entry (including one displaced by `invalidate`) or, if
//! there never was one, an empty dataset.

use chrono::{DateTime, Utc};
use exo_common::coordinates::transform_record;
use exo_common::{CandidateRecord, CartesianCoordinate};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::upstream::{CandidateSource, UpstreamError};

/// Upstream row plus its unit-sphere position, `None` when ra/dec are
/// missing or unparseable
#[derive(Debug, Clone, PartialEq)]
pub struct CachedCandidate {
    pub record: CandidateRecord,
    pub coordinate: Option<CartesianCoordinate>,
}

/// One successful fetch
#[derive(Debug)]
pub struct DatasetCacheEntry {
    pub dataset: Vec<CachedCandidate>,
    pub fetched_at: DateTime<Utc>,
}

/// Read-only view handed to callers; empty when nothing was ever fetched
#[derive(Debug, Clone, Default)]
pub struct Snapshot(Option<Arc<DatasetCacheEntry>>);

impl Snapshot {
    pub fn records(&self) -> &[CachedCandidate] {
        self.0.as_deref().map(|e| e.dataset.as_slice()).unwrap_or(&[])
    }

    /// Records that carry a sky position, with that position
    pub fn positioned(&self) -> impl Iterator<Item = (&CandidateRecord, CartesianCoordinate)> {
        self.records()
            .iter()
            .filter_map(|c| c.coordinate.map(|coordinate| (&c.record, coordinate)))
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.0.as_ref().map(|e| e.fetched_at)
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Whether two snapshots are the very same fetch
    pub fn same_entry(&self, other: &Snapshot) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Cache diagnostics for `/health`
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub cached: bool,
    pub records: usize,
    pub fetched_at: Option<DateTime<Utc>>,
    pub refreshing: bool,
    /// Serving an entry displaced by `invalidate` after a failed refresh
    pub serving_stale: bool,
    pub upstream_fetches: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

type FetchOutcome = Result<Arc<DatasetCacheEntry>, UpstreamError>;

struct InFlight {
    id: u64,
    future: Shared<BoxFuture<'static, FetchOutcome>>,
}

#[derive(Default)]
struct CacheState {
    current: Option<Arc<DatasetCacheEntry>>,
    fallback: Option<Arc<DatasetCacheEntry>>,
    in_flight: Option<InFlight>,
    next_flight: u64,
    last_error: Option<String>,
}

impl CacheState {
    fn is_registered(&self, id: u64) -> bool {
        self.in_flight.as_ref().map(|f| f.id) == Some(id)
    }

    fn serving(&self) -> Option<Arc<DatasetCacheEntry>> {
        self.current.clone().or_else(|| self.fallback.clone())
    }
}

/// Process-scoped, shared candidate cache
pub struct DatasetCache {
    source: Arc<dyn CandidateSource>,
    timeout: Duration,
    state: Arc<Mutex<CacheState>>,
    fetches: Arc<AtomicU64>,
}

impl DatasetCache {
    pub fn new(source: Arc<dyn CandidateSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            state: Arc::new(Mutex::new(CacheState::default())),
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached dataset, fetching it first if there is none
    pub async fn get(&self) -> Snapshot {
        let (id, flight) = {
            let mut state = self.state.lock().await;
            if let Some(entry) = &state.current {
                return Snapshot(Some(Arc::clone(entry)));
            }
            match &state.in_flight {
                Some(flight) => {
                    debug!(flight = flight.id, "Joining in-flight dataset refresh");
                    (flight.id, flight.future.clone())
                }
                None => self.start_flight(&mut state),
            }
        };

        match flight.await {
            Ok(entry) => Snapshot(Some(entry)),
            Err(_) => {
                let mut state = self.state.lock().await;
                // Set only if the refresh task died before committing
                if state.is_registered(id) {
                    state.in_flight = None;
                }
                Snapshot(state.serving())
            }
        }
    }

    /// Spawn a refresh task and register it as the in-flight flight
    fn start_flight(&self, state: &mut CacheState) -> (u64, Shared<BoxFuture<'static, FetchOutcome>>) {
        let id = state.next_flight;
        state.next_flight += 1;

        let task = tokio::spawn(run_flight(
            id,
            Arc::clone(&self.source),
            self.timeout,
            Arc::clone(&self.fetches),
            Arc::clone(&self.state),
        ));
        let future = task
            .map(move |joined| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(flight = id, "Dataset refresh task failed: {}", e);
                    Err(UpstreamError::Network(format!("refresh task failed: {}", e)))
                }
            })
            .boxed()
            .shared();

        state.in_flight = Some(InFlight {
            id,
            future: future.clone(),
        });
        (id, future)
    }

    /// Drop the cached entry so the next `get` re-fetches.
    ///
    /// Any refresh in progress is detached: callers arriving afterwards start
    /// a new fetch rather than receiving data from before the invalidation.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.current.take() {
            state.fallback = Some(entry);
        }
        let detached = state.in_flight.take().is_some();
        info!(detached_refresh = detached, "Dataset cache invalidated");
    }

    pub async fn status(&self) -> CacheStatus {
        let state = self.state.lock().await;
        let serving = state.current.as_ref().or(state.fallback.as_ref());
        CacheStatus {
            cached: state.current.is_some(),
            records: serving.map(|e| e.dataset.len()).unwrap_or(0),
            fetched_at: serving.map(|e| e.fetched_at),
            refreshing: state.in_flight.is_some(),
            serving_stale: state.current.is_none() && state.fallback.is_some(),
            upstream_fetches: self.fetches.load(Ordering::Relaxed),
            last_error: state.last_error.clone(),
        }
    }
}

/// Body of one refresh task: fetch, then commit if still registered.
///
/// Only the flight still registered may commit; a flight detached by
/// `invalidate` serves its own waiters and nothing else.
async fn run_flight(
    id: u64,
    source: Arc<dyn CandidateSource>,
    timeout: Duration,
    fetches: Arc<AtomicU64>,
    state: Arc<Mutex<CacheState>>,
) -> FetchOutcome {
    let outcome = refresh(Arc::clone(&source), timeout, fetches).await;

    let mut state = state.lock().await;
    if !state.is_registered(id) {
        debug!(flight = id, "Detached refresh finished; result not committed");
        return outcome;
    }
    state.in_flight = None;
    match &outcome {
        Ok(entry) => {
            state.current = Some(Arc::clone(entry));
            state.fallback = None;
            state.last_error = None;
        }
        Err(e) => {
            state.last_error = Some(e.to_string());
            warn!(
                source = %source.describe(),
                has_fallback = state.current.is_some() || state.fallback.is_some(),
                "Dataset refresh failed: {}",
                e
            );
        }
    }
    outcome
}

async fn refresh(source: Arc<dyn CandidateSource>, timeout: Duration, fetches: Arc<AtomicU64>) -> FetchOutcome {
    fetches.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let records = match tokio::time::timeout(timeout, source.fetch()).await {
        Ok(result) => result?,
        Err(_) => return Err(UpstreamError::Timeout(timeout)),
    };

    let dataset: Vec<CachedCandidate> = records
        .into_iter()
        .map(|record| CachedCandidate {
            coordinate: transform_record(&record),
            record,
        })
        .collect();
    let without_position = dataset.iter().filter(|c| c.coordinate.is_none()).count();

    info!(
        records = dataset.len(),
        without_position,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Dataset refreshed"
    );

    Ok(Arc::new(DatasetCacheEntry {
        dataset,
        fetched_at: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Scripted source: pops one response per fetch, repeating the last
    struct ScriptedSource {
        calls: AtomicUsize,
        delay: Duration,
        responses: std::sync::Mutex<VecDeque<Result<Vec<CandidateRecord>, UpstreamError>>>,
    }

    impl ScriptedSource {
        fn new(delay: Duration, responses: Vec<Result<Vec<CandidateRecord>, UpstreamError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                responses: std::sync::Mutex::new(responses.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CandidateSource for ScriptedSource {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn fetch(&self) -> Result<Vec<CandidateRecord>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                responses.front().cloned().unwrap()
            }
        }
    }

    fn koi(name: &str, ra: f64, dec: f64) -> CandidateRecord {
        CandidateRecord::new()
            .with("kepoi_name", name)
            .with("ra", ra)
            .with("dec", dec)
    }

    fn cache(source: &Arc<ScriptedSource>) -> DatasetCache {
        DatasetCache::new(source.clone(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_second_get_uses_cached_entry() {
        let source = ScriptedSource::new(Duration::ZERO, vec![Ok(vec![koi("a", 0.0, 0.0)])]);
        let cache = cache(&source);

        let first = cache.get().await;
        let second = cache.get().await;
        assert_eq!(first.len(), 1);
        assert!(first.same_entry(&second));
        assert_eq!(source.calls(), 1);
        assert!(first.fetched_at().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_gets_share_one_fetch() {
        let source = ScriptedSource::new(
            Duration::from_millis(100),
            vec![Ok(vec![koi("a", 0.0, 0.0), koi("b", 90.0, 0.0)])],
        );
        let cache = Arc::new(cache(&source));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get().await })
            })
            .collect();

        let mut snapshots = Vec::new();
        for handle in handles {
            snapshots.push(handle.await.unwrap());
        }

        assert_eq!(source.calls(), 1);
        assert!(snapshots.iter().all(|s| s.same_entry(&snapshots[0])));
        assert_eq!(snapshots[0].len(), 2);
    }

    #[tokio::test]
    async fn test_rows_without_position_keep_undefined_coordinate() {
        let source = ScriptedSource::new(
            Duration::ZERO,
            vec![Ok(vec![
                koi("ok", 10.0, 10.0),
                CandidateRecord::new().with("kepoi_name", "no-dec").with("ra", 1.0),
                CandidateRecord::new()
                    .with("kepoi_name", "junk")
                    .with("ra", "??")
                    .with("dec", 2.0),
            ])],
        );
        let snapshot = cache(&source).get().await;
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.records()[0].coordinate.is_some());
        assert!(snapshot.records()[1].coordinate.is_none());
        assert!(snapshot.records()[2].coordinate.is_none());

        let positioned: Vec<_> = snapshot
            .positioned()
            .map(|(record, _)| record.text("kepoi_name").unwrap())
            .collect();
        assert_eq!(positioned, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_refresh_completes_after_waiter_is_cancelled() {
        let source = ScriptedSource::new(Duration::from_millis(100), vec![Ok(vec![koi("a", 0.0, 0.0)])]);
        let cache = cache(&source);

        // The only waiter gives up long before the fetch returns
        let abandoned = tokio::time::timeout(Duration::from_millis(10), cache.get()).await;
        assert!(abandoned.is_err());
        assert!(cache.status().await.refreshing);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let status = cache.status().await;
        assert!(!status.refreshing);
        assert!(status.cached);
        assert_eq!(status.records, 1);

        assert_eq!(cache.get().await.len(), 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_without_entry_yields_empty_and_retries() {
        let source = ScriptedSource::new(
            Duration::ZERO,
            vec![
                Err(UpstreamError::Status(503, "busy".into())),
                Ok(vec![koi("a", 0.0, 0.0)]),
            ],
        );
        let cache = cache(&source);

        let first = cache.get().await;
        assert!(first.is_empty());
        let status = cache.status().await;
        assert!(!status.cached);
        assert!(status.last_error.unwrap().contains("503"));

        let second = cache.get().await;
        assert_eq!(second.len(), 1);
        assert_eq!(source.calls(), 2);
        assert!(cache.status().await.last_error.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let source = ScriptedSource::new(
            Duration::ZERO,
            vec![Ok(vec![koi("a", 0.0, 0.0)]), Ok(vec![koi("a", 0.0, 0.0), koi("b", 1.0, 1.0)])],
        );
        let cache = cache(&source);

        assert_eq!(cache.get().await.len(), 1);
        cache.invalidate().await;
        assert_eq!(cache.get().await.len(), 2);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_after_invalidate_serves_previous_entry() {
        let source = ScriptedSource::new(
            Duration::ZERO,
            vec![
                Ok(vec![koi("a", 0.0, 0.0)]),
                Err(UpstreamError::Network("connection reset".into())),
            ],
        );
        let cache = cache(&source);

        let first = cache.get().await;
        cache.invalidate().await;
        let after = cache.get().await;

        assert!(after.same_entry(&first));
        let status = cache.status().await;
        assert!(status.serving_stale);
        assert_eq!(status.records, 1);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let source = ScriptedSource::new(Duration::from_secs(5), vec![Ok(vec![koi("a", 0.0, 0.0)])]);
        let cache = DatasetCache::new(source.clone(), Duration::from_millis(50));

        let snapshot = cache.get().await;
        assert!(snapshot.is_empty());
        assert!(cache.status().await.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalidate_detaches_in_flight_refresh() {
        let source = ScriptedSource::new(
            Duration::from_millis(150),
            vec![Ok(vec![koi("old", 0.0, 0.0)]), Ok(vec![koi("new", 0.0, 0.0), koi("new2", 1.0, 1.0)])],
        );
        let cache = Arc::new(cache(&source));

        let early = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.invalidate().await;

        // Arrives after the invalidation, so must not join the old flight
        let late = cache.get().await;
        let early = early.await.unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(early.len(), 1);
        assert_eq!(late.len(), 2);
        // Only the post-invalidation fetch was committed
        assert!(cache.get().await.same_entry(&late));
    }
}
