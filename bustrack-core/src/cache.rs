//! Fleet state cache: the one piece of mutable shared state.
//!
//! Holds the current [`FleetSnapshot`] behind a mutex and refreshes it
//! on demand. The refresh protocol: serve the snapshot while it is
//! younger than the staleness window; otherwise fetch the remote feed,
//! falling back to the local snapshot file; replace the snapshot
//! atomically on success. Concurrent callers arriving during a refresh
//! block on the lock and then read the fresh snapshot — at most one
//! refresh is ever in flight.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};

use crate::feed;
use crate::types::{BusSighting, FleetSnapshot, Result, TransitError};

/// Maximum snapshot age before the next access triggers a refresh.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(60);

/// Source of the remote feed document. Blocking; the server crate
/// implements it over HTTP, tests implement it with canned bodies.
pub trait FeedSource {
    fn fetch(&self) -> Result<String>;
}

pub struct FleetStateCache {
    source: Box<dyn FeedSource + Send + Sync>,
    fallback_path: PathBuf,
    staleness: Duration,
    current: Mutex<Option<Arc<FleetSnapshot>>>,
}

impl FleetStateCache {
    pub fn new(
        source: Box<dyn FeedSource + Send + Sync>,
        fallback_path: impl Into<PathBuf>,
        staleness: Duration,
    ) -> Self {
        FleetStateCache {
            source,
            fallback_path: fallback_path.into(),
            staleness,
            current: Mutex::new(None),
        }
    }

    /// Current snapshot, refreshed first if stale. On a total refresh
    /// failure the previous snapshot is served with its old timestamp;
    /// with no previous snapshot the call fails with `NoData`.
    pub fn snapshot(&self) -> Result<Arc<FleetSnapshot>> {
        let mut current = self.current.lock().unwrap();

        if let Some(snap) = current.as_ref() {
            if !self.is_stale(snap) {
                return Ok(Arc::clone(snap));
            }
        }

        match self.load_fresh() {
            Ok(fresh) => {
                let fresh = Arc::new(fresh);
                *current = Some(Arc::clone(&fresh));
                Ok(fresh)
            }
            Err(err) => match current.as_ref() {
                Some(previous) => {
                    warn!(
                        "refresh failed ({err}), serving snapshot from {}",
                        previous.captured_at
                    );
                    Ok(Arc::clone(previous))
                }
                None => {
                    warn!("refresh failed with no prior snapshot: {err}");
                    Err(TransitError::NoData)
                }
            },
        }
    }

    /// Sightings on one route. Empty for a route with no live buses.
    pub fn buses_on_route(&self, route_id: &str) -> Result<Vec<BusSighting>> {
        Ok(self.snapshot()?.on_route(route_id).to_vec())
    }

    fn is_stale(&self, snapshot: &FleetSnapshot) -> bool {
        let age = Utc::now().signed_duration_since(snapshot.captured_at);
        age.num_milliseconds() >= self.staleness.as_millis() as i64
    }

    /// Remote fetch, then local fallback. The snapshot is stamped with
    /// the refresh start time so a slow fetch cannot make it look
    /// fresher than its data.
    fn load_fresh(&self) -> Result<FleetSnapshot> {
        let captured_at = Utc::now();
        match self
            .source
            .fetch()
            .and_then(|body| feed::parse_snapshot(&body, captured_at))
        {
            Ok(snapshot) => {
                info!("fetched live fleet state ({} buses)", snapshot.total_buses());
                Ok(snapshot)
            }
            Err(err) => {
                warn!(
                    "live feed unavailable ({err}), reading {}",
                    self.fallback_path.display()
                );
                let text = std::fs::read_to_string(&self.fallback_path)?;
                feed::parse_snapshot(&text, captured_at)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FEED: &str = r#"<buses>
        <bus lat="64.1355" lon="-21.8954" head="45.0" route="17" stop="90000170" next="90000060" code="6"/>
        <bus lat="64.1100" lon="-21.8000" head="0.0" route="3" stop="90000300" next="" code="7"/>
    </buses>"#;

    /// Counts fetches; serves `body` or fails after `succeed_times`.
    struct ScriptedSource {
        body: String,
        calls: AtomicUsize,
        succeed_times: usize,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(body: &str) -> Self {
            ScriptedSource {
                body: body.to_string(),
                calls: AtomicUsize::new(0),
                succeed_times: usize::MAX,
                delay: Duration::ZERO,
            }
        }

        fn failing() -> Self {
            ScriptedSource {
                body: String::new(),
                calls: AtomicUsize::new(0),
                succeed_times: 0,
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FeedSource for &'static ScriptedSource {
        fn fetch(&self) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if call < self.succeed_times {
                Ok(self.body.clone())
            } else {
                Err(TransitError::Fetch("scripted failure".into()))
            }
        }
    }

    fn leak(source: ScriptedSource) -> &'static ScriptedSource {
        Box::leak(Box::new(source))
    }

    fn fallback_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_within_window_serves_cached_without_fetch() {
        let source = leak(ScriptedSource::new(FEED));
        let cache = FleetStateCache::new(Box::new(source), "/nonexistent", DEFAULT_STALENESS);

        let first = cache.snapshot().unwrap();
        let second = cache.snapshot().unwrap();
        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_stale_snapshot_is_refetched() {
        let source = leak(ScriptedSource::new(FEED));
        let cache = FleetStateCache::new(Box::new(source), "/nonexistent", Duration::ZERO);

        cache.snapshot().unwrap();
        cache.snapshot().unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_failed_fetch_falls_back_to_file() {
        let file = fallback_file(FEED);
        let source = leak(ScriptedSource::failing());
        let cache = FleetStateCache::new(Box::new(source), file.path(), DEFAULT_STALENESS);

        let snap = cache.snapshot().unwrap();
        let direct = feed::parse_snapshot(FEED, snap.captured_at).unwrap();
        assert_eq!(snap.buses, direct.buses);
    }

    #[test]
    fn test_both_sources_dead_is_no_data() {
        let source = leak(ScriptedSource::failing());
        let cache = FleetStateCache::new(Box::new(source), "/nonexistent", DEFAULT_STALENESS);

        assert!(matches!(cache.snapshot(), Err(TransitError::NoData)));
    }

    #[test]
    fn test_total_failure_serves_previous_snapshot() {
        let mut source = ScriptedSource::new(FEED);
        source.succeed_times = 1;
        let source = leak(source);
        let cache = FleetStateCache::new(Box::new(source), "/nonexistent", Duration::ZERO);

        let first = cache.snapshot().unwrap();
        // Second refresh fails on both sources; the old snapshot, old
        // timestamp included, stays servable.
        let second = cache.snapshot().unwrap();
        assert_eq!(source.calls(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.captured_at, second.captured_at);
    }

    #[test]
    fn test_concurrent_callers_trigger_one_fetch() {
        let mut source = ScriptedSource::new(FEED);
        source.delay = Duration::from_millis(50);
        let source = leak(source);
        let cache = FleetStateCache::new(Box::new(source), "/nonexistent", DEFAULT_STALENESS);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let snap = cache.snapshot().unwrap();
                    assert_eq!(snap.total_buses(), 2);
                });
            }
        });
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_route_without_sightings_is_empty_vec() {
        let source = leak(ScriptedSource::new(FEED));
        let cache = FleetStateCache::new(Box::new(source), "/nonexistent", DEFAULT_STALENESS);

        assert_eq!(cache.buses_on_route("17").unwrap().len(), 1);
        assert!(cache.buses_on_route("99").unwrap().is_empty());
    }
}
