//! # Session Tracker
//!
//! Drives a [`TrackingSession`] from two cancelable tasks:
//!
//! - a repeating tick (1 second by default) that advances the elapsed time
//! - a subscription to the platform position stream that appends samples
//!
//! Both tasks share the session behind a mutex and carry the session
//! generation they were spawned for. Every callback re-checks that generation
//! under the lock before mutating, and `pause`/`stop` change the state under
//! the same lock before aborting the tasks, so no callback can land after
//! either call returns.
//!
//! Pausing tears down the position subscription and resuming creates a new one
//! with identical [`WatchOptions`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::error::{Result, RunaRouteError};
use crate::session::{CompletedRoute, SessionSnapshot, SessionState, TrackingSession};
use crate::PathSample;

// ============================================================================
// Platform Seams
// ============================================================================

/// Requested accuracy of the position stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Accuracy {
    Lowest,
    Low,
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

/// Parameters of a position subscription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct WatchOptions {
    pub accuracy: Accuracy,
    /// Samples are only delivered after the device moved at least this far
    pub min_movement_meters: f64,
}

/// Outcome of a location permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Foreground location permission, provided by the host platform.
pub trait LocationPermission: Send + Sync {
    fn request(&self) -> impl Future<Output = PermissionStatus> + Send;
}

/// Live position stream, provided by the host platform.
///
/// Dropping the returned stream cancels the subscription.
pub trait PositionSource: Send + Sync {
    fn watch(&self, options: WatchOptions) -> BoxStream<'static, PathSample>;
}

impl<T: LocationPermission> LocationPermission for Arc<T> {
    fn request(&self) -> impl Future<Output = PermissionStatus> + Send {
        (**self).request()
    }
}

impl<T: PositionSource + ?Sized> PositionSource for Arc<T> {
    fn watch(&self, options: WatchOptions) -> BoxStream<'static, PathSample> {
        (**self).watch(options)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the session tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Period of the elapsed-time tick.
    /// Default: 1 second
    pub tick_interval: Duration,

    /// Minimum movement before the platform reports a new sample.
    /// Default: 2.0 meters
    pub min_movement_meters: f64,

    /// Requested accuracy of the position stream.
    /// Default: Highest
    pub accuracy: Accuracy,
}

impl TrackerConfig {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            accuracy: self.accuracy,
            min_movement_meters: self.min_movement_meters,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            min_movement_meters: 2.0,
            accuracy: Accuracy::Highest,
        }
    }
}

// ============================================================================
// Task Handles
// ============================================================================

/// Owned handle to a spawned task. Cancelling is idempotent.
#[derive(Debug, Default)]
pub(crate) struct TaskHandle {
    inner: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub(crate) fn set(&mut self, handle: JoinHandle<()>) {
        self.cancel();
        self.inner = Some(handle);
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.inner.take() {
            handle.abort();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.inner.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock_session(session: &Mutex<TrackingSession>) -> MutexGuard<'_, TrackingSession> {
    // Callbacks never panic mid-update, so a poisoned lock still holds a consistent session.
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Session Tracker
// ============================================================================

/// Owns the active-tracking lifecycle of one session at a time.
pub struct SessionTracker<L, P> {
    permission: L,
    source: P,
    config: TrackerConfig,
    runtime: Option<Handle>,
    session: Arc<Mutex<TrackingSession>>,
    ticker: TaskHandle,
    subscription: TaskHandle,
}

impl<L, P> SessionTracker<L, P>
where
    L: LocationPermission,
    P: PositionSource,
{
    /// Create a tracker that spawns its tasks on the ambient Tokio runtime.
    pub fn new(permission: L, source: P, config: TrackerConfig) -> Self {
        Self {
            permission,
            source,
            config,
            runtime: None,
            session: Arc::new(Mutex::new(TrackingSession::new())),
            ticker: TaskHandle::default(),
            subscription: TaskHandle::default(),
        }
    }

    /// Create a tracker that spawns its tasks on an explicit runtime.
    pub fn with_runtime(permission: L, source: P, config: TrackerConfig, runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            ..Self::new(permission, source, config)
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start a new session. Valid from `Idle`.
    ///
    /// Fails with [`RunaRouteError::PermissionDenied`] when location access is
    /// refused; the tracker stays `Idle` and `start` may be retried.
    pub async fn start(&mut self) -> Result<()> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(RunaRouteError::InvalidTransition {
                from: state,
                operation: "start",
            });
        }

        let status = self.permission.request().await;
        if status != PermissionStatus::Granted {
            warn!("[SessionTracker] Location permission {:?}, not starting", status);
            return Err(RunaRouteError::PermissionDenied);
        }

        let runtime = self.runtime_handle()?;
        let generation = lock_session(&self.session).begin(Utc::now())?;
        self.spawn_tasks(&runtime, generation);
        info!("[SessionTracker] Tracking started");
        Ok(())
    }

    /// Suspend the tick and the position subscription. Valid from `Active`.
    pub fn pause(&mut self) -> Result<()> {
        lock_session(&self.session).pause()?;
        self.cancel_tasks();
        Ok(())
    }

    /// Restart the tick and re-subscribe to positions. Valid from `Paused`.
    ///
    /// Outside a Tokio context and without an explicit runtime this fails
    /// with [`RunaRouteError::Internal`] and the session stays `Paused`.
    pub fn resume(&mut self) -> Result<()> {
        let runtime = self.runtime_handle()?;
        let generation = lock_session(&self.session).resume()?;
        self.spawn_tasks(&runtime, generation);
        Ok(())
    }

    /// Freeze the session. Valid from `Active` or `Paused`.
    ///
    /// Follow up with [`accept`](Self::accept) or [`discard`](Self::discard).
    pub fn stop(&mut self) -> Result<()> {
        let result = lock_session(&self.session).stop();
        // Cancel unconditionally, even if the transition was rejected.
        self.cancel_tasks();
        result
    }

    /// Export the stopped session and reset to `Idle`.
    pub fn accept(&mut self) -> Result<CompletedRoute> {
        let record = lock_session(&self.session).accept()?;
        info!(
            "[SessionTracker] Saved route: {:.2} km in {}s ({:.2} min/km)",
            record.distance_km, record.elapsed_seconds, record.pace_min_per_km
        );
        Ok(record)
    }

    /// Drop the stopped session and reset to `Idle`.
    pub fn discard(&mut self) -> Result<()> {
        lock_session(&self.session).discard()?;
        info!("[SessionTracker] Discarded route");
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn state(&self) -> SessionState {
        lock_session(&self.session).state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock_session(&self.session).snapshot()
    }

    pub fn path(&self) -> Vec<PathSample> {
        lock_session(&self.session).path().to_vec()
    }

    pub fn distance_covered_km(&self) -> f64 {
        lock_session(&self.session).distance_covered_km()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        lock_session(&self.session).elapsed_seconds()
    }

    pub fn pace(&self) -> f64 {
        lock_session(&self.session).pace()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Whether the tick or the position subscription task is still alive.
    pub fn has_running_tasks(&self) -> bool {
        self.ticker.is_running() || self.subscription.is_running()
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    fn runtime_handle(&self) -> Result<Handle> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.clone()),
            None => Handle::try_current().map_err(|e| RunaRouteError::Internal {
                message: format!("No Tokio runtime to spawn tracking tasks on: {}", e),
            }),
        }
    }

    fn spawn_tasks(&mut self, runtime: &Handle, generation: u64) {
        let period = self.config.tick_interval;
        let first_tick = Instant::now() + period;
        let session = Arc::clone(&self.session);
        let ticker = runtime.spawn(async move {
            let mut interval = interval_at(first_tick, period);
            loop {
                interval.tick().await;
                if !lock_session(&session).record_tick(generation) {
                    break;
                }
            }
        });
        self.ticker.set(ticker);

        let options = self.config.watch_options();
        let mut positions = self.source.watch(options);
        debug!(
            "[SessionTracker] Subscribed to positions ({:?}, {} m)",
            options.accuracy, options.min_movement_meters
        );
        let session = Arc::clone(&self.session);
        let subscription = runtime.spawn(async move {
            while let Some(sample) = positions.next().await {
                if !lock_session(&session).record_sample(generation, sample) {
                    break;
                }
            }
            debug!("[SessionTracker] Position stream for generation {} ended", generation);
        });
        self.subscription.set(subscription);
    }

    fn cancel_tasks(&mut self) {
        self.ticker.cancel();
        self.subscription.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
