//! End-to-end run scenarios.
//!
//! Drives the public API the way the app does: fetch candidates, pick one,
//! track a run along it with a scripted position stream, save the route and
//! fold it into the history statistics. Timers run on Tokio's paused clock.
//!
//! Run with: `cargo test --test run_scenarios`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;
use runaroute::geo_utils::path_length_km;
use runaroute::stats::format_duration_mm_ss;
use runaroute::{
    Coordinate, LocationPermission, PathSample, PermissionStatus, PositionSource, Result,
    RouteCandidate, RouteCandidateFetcher, RouteHistoryEntry, RouteProvider, RouteSelector,
    RouteStatistics, RunaRouteError, SessionState, SessionTracker, TrackerConfig, WatchOptions,
    DEFAULT_SEEDS,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Square loop around `start` with sides of `side` degrees.
fn square(start: Coordinate, side: f64) -> Vec<Coordinate> {
    vec![
        start,
        Coordinate::new(start.latitude + side, start.longitude),
        Coordinate::new(start.latitude + side, start.longitude + side),
        Coordinate::new(start.latitude, start.longitude + side),
        start,
    ]
}

struct LoopProvider {
    requests: AtomicUsize,
    failing_seed: Option<u32>,
}

impl RouteProvider for LoopProvider {
    async fn fetch_round_trip(
        &self,
        start: Coordinate,
        _target_distance_km: f64,
        seed: u32,
    ) -> Result<RouteCandidate> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.failing_seed == Some(seed) {
            return Err(RunaRouteError::RouteFetchFailed {
                message: "HTTP 429 Too Many Requests".to_string(),
                status_code: Some(429),
            });
        }
        let coords = square(start, 0.005 * seed as f64);
        let km = path_length_km(&coords);
        Ok(RouteCandidate::new(coords, km))
    }
}

struct AlwaysGranted;

impl LocationPermission for AlwaysGranted {
    async fn request(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}

#[derive(Default)]
struct ScriptedSource {
    current: Mutex<Option<UnboundedSender<PathSample>>>,
}

impl ScriptedSource {
    fn emit(&self, sample: PathSample) {
        if let Some(tx) = self.current.lock().unwrap().as_ref() {
            let _ = tx.unbounded_send(sample);
        }
    }
}

impl PositionSource for ScriptedSource {
    fn watch(&self, _options: WatchOptions) -> BoxStream<'static, PathSample> {
        let (tx, rx) = unbounded();
        *self.current.lock().unwrap() = Some(tx);
        rx.boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_select_run_and_save() {
    init();
    let start = Coordinate::new(55.6761, 12.5683);

    // Fetch and page through candidates
    let fetcher = RouteCandidateFetcher::new(LoopProvider {
        requests: AtomicUsize::new(0),
        failing_seed: None,
    });
    let mut selector = RouteSelector::new();
    let count = selector
        .refresh(&fetcher, start, 5.0, &DEFAULT_SEEDS)
        .await
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(fetcher.provider().requests.load(Ordering::SeqCst), 2);

    selector.next();
    selector.next();
    assert_eq!(selector.index(), 1);
    selector.previous();
    let route = selector.current().unwrap().clone();
    assert!(route.is_closed_loop());

    // Run the loop: one sample every 30 seconds
    let source = Arc::new(ScriptedSource::default());
    let mut tracker = SessionTracker::new(AlwaysGranted, Arc::clone(&source), TrackerConfig::default());
    tracker.start().await.unwrap();

    for (i, c) in route.coordinates.iter().enumerate() {
        source.emit(PathSample::new(c.latitude, c.longitude, i as i64 * 30_000));
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    tracker.stop().unwrap();
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.state, SessionState::Stopped);
    assert_eq!(snapshot.point_count, 5);
    assert_eq!(snapshot.elapsed_seconds, 150);
    assert_eq!(format_duration_mm_ss(snapshot.elapsed_seconds), "02:30");
    assert!((snapshot.distance_km - route.distance_km).abs() < 1e-9);

    // Save and aggregate
    let record = tracker.accept().unwrap();
    let expected_pace = 2.5 / route.distance_km;
    assert!((record.pace_min_per_km - expected_pace).abs() < 1e-9);

    let entry = RouteHistoryEntry::from(&record);
    let today = entry.date;
    let older = RouteHistoryEntry {
        date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        distance_km: 10.0,
        elapsed_seconds: 3000,
        avg_pace_seconds_per_km: 300,
    };
    let stats = RouteStatistics::from_history(&[entry, older], today);
    assert_eq!(stats.total_routes, 2);
    assert_eq!(stats.routes_last_30_days, 1);
    assert!((stats.total_distance_km - (10.0 + route.distance_km)).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refetch_keeps_previous_candidates() {
    init();
    let start = Coordinate::new(55.6761, 12.5683);
    let mut selector = RouteSelector::new();

    let ok = RouteCandidateFetcher::new(LoopProvider {
        requests: AtomicUsize::new(0),
        failing_seed: None,
    });
    selector.refresh(&ok, start, 5.0, &[1, 2]).await.unwrap();
    selector.next();

    let failing = RouteCandidateFetcher::new(LoopProvider {
        requests: AtomicUsize::new(0),
        failing_seed: Some(2),
    });
    let err = selector
        .refresh(&failing, Coordinate::new(56.1629, 10.2039), 5.0, &[1, 2])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RunaRouteError::RouteFetchFailed {
            message: "HTTP 429 Too Many Requests".to_string(),
            status_code: Some(429),
        }
    );
    assert_eq!(selector.len(), 2);
    assert_eq!(selector.index(), 1);
    assert_eq!(selector.current().unwrap().start(), Some(start));
}

#[tokio::test(start_paused = true)]
async fn test_pause_excludes_time_and_movement() {
    init();
    let source = Arc::new(ScriptedSource::default());
    let mut tracker = SessionTracker::new(AlwaysGranted, Arc::clone(&source), TrackerConfig::default());
    tracker.start().await.unwrap();

    source.emit(PathSample::new(0.0, 0.0, 0));
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    tracker.pause().unwrap();

    // Movement and time while paused are not recorded
    source.emit(PathSample::new(0.0, 0.01, 20_000));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(tracker.elapsed_seconds(), 10);
    assert_eq!(tracker.path().len(), 1);

    tracker.resume().unwrap();
    source.emit(PathSample::new(0.0, 0.001, 80_000));
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    tracker.stop().unwrap();

    assert_eq!(tracker.elapsed_seconds(), 15);
    assert!((tracker.distance_covered_km() - 0.1112).abs() < 1e-4);

    tracker.discard().unwrap();
    assert_eq!(tracker.state(), SessionState::Idle);
    assert_eq!(tracker.distance_covered_km(), 0.0);
}
