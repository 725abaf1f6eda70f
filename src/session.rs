//! # Tracking Session
//!
//! The state and derived metrics of one live run, independent of any timer or
//! location platform. [`crate::tracker::SessionTracker`] drives a session from
//! real tasks; tests and the FFI layer can drive it directly.
//!
//! ## Lifecycle
//!
//! ```text
//!  Idle --begin--> Active --pause--> Paused --resume--> Active
//!                    |                  |
//!                    +------stop--------+--> Stopped --accept/discard--> Idle
//! ```
//!
//! Every transition bumps the session *generation*. Tick and sample callbacks
//! carry the generation they were started under and are ignored once it no
//! longer matches, so a callback that was already queued when `pause` or
//! `stop` ran can never mutate the session.

use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RunaRouteError};
use crate::geo_utils::haversine_km;
use crate::PathSample;

/// Lifecycle state of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SessionState {
    Idle,
    Active,
    Paused,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Pace in minutes per kilometer, `0.0` until any distance is covered.
pub fn pace_min_per_km(elapsed_seconds: u64, distance_km: f64) -> f64 {
    if distance_km > 0.0 {
        (elapsed_seconds as f64 / 60.0) / distance_km
    } else {
        0.0
    }
}

/// Record handed to external persistence after a stopped session is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRoute {
    /// When the session was started
    pub date: DateTime<Utc>,
    pub distance_km: f64,
    pub elapsed_seconds: u64,
    pub pace_min_per_km: f64,
}

/// Point-in-time view of the live metrics, read by the UI on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub distance_km: f64,
    pub elapsed_seconds: u64,
    pub pace_min_per_km: f64,
    pub point_count: u32,
}

/// Mutable state of one tracking session.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    state: SessionState,
    path: Vec<PathSample>,
    distance_covered_km: f64,
    elapsed_seconds: u64,
    generation: u64,
    started_at: Option<DateTime<Utc>>,
}

impl TrackingSession {
    /// Create an idle session.
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            path: Vec::new(),
            distance_covered_km: 0.0,
            elapsed_seconds: 0,
            generation: 0,
            started_at: None,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn path(&self) -> &[PathSample] {
        &self.path
    }

    pub fn distance_covered_km(&self) -> f64 {
        self.distance_covered_km
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Current generation; changes on every transition.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Derived pace, recomputed from the current counters.
    pub fn pace(&self) -> f64 {
        pace_min_per_km(self.elapsed_seconds, self.distance_covered_km)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            distance_km: self.distance_covered_km,
            elapsed_seconds: self.elapsed_seconds,
            pace_min_per_km: self.pace(),
            point_count: self.path.len() as u32,
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Idle -> Active. Clears path and metrics and returns the new generation.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Result<u64> {
        self.expect_state(&[SessionState::Idle], "start")?;
        self.path.clear();
        self.distance_covered_km = 0.0;
        self.elapsed_seconds = 0;
        self.started_at = Some(now);
        self.state = SessionState::Active;
        self.generation += 1;
        info!("[TrackingSession] Started (generation {})", self.generation);
        Ok(self.generation)
    }

    /// Active -> Paused. Path and metrics are kept.
    pub fn pause(&mut self) -> Result<()> {
        self.expect_state(&[SessionState::Active], "pause")?;
        self.state = SessionState::Paused;
        self.generation += 1;
        info!(
            "[TrackingSession] Paused at {}s, {:.3} km",
            self.elapsed_seconds, self.distance_covered_km
        );
        Ok(())
    }

    /// Paused -> Active. Returns the generation the restarted tasks must carry.
    pub fn resume(&mut self) -> Result<u64> {
        self.expect_state(&[SessionState::Paused], "resume")?;
        self.state = SessionState::Active;
        self.generation += 1;
        info!("[TrackingSession] Resumed (generation {})", self.generation);
        Ok(self.generation)
    }

    /// Active | Paused -> Stopped. The session is frozen afterwards.
    pub fn stop(&mut self) -> Result<()> {
        self.expect_state(&[SessionState::Active, SessionState::Paused], "stop")?;
        self.state = SessionState::Stopped;
        self.generation += 1;
        info!(
            "[TrackingSession] Stopped: {} points, {:.3} km in {}s",
            self.path.len(),
            self.distance_covered_km,
            self.elapsed_seconds
        );
        Ok(())
    }

    /// Stopped -> Idle, exporting the completed-route record.
    pub fn accept(&mut self) -> Result<CompletedRoute> {
        self.expect_state(&[SessionState::Stopped], "save")?;
        let record = CompletedRoute {
            date: self.started_at.unwrap_or_else(Utc::now),
            distance_km: self.distance_covered_km,
            elapsed_seconds: self.elapsed_seconds,
            pace_min_per_km: self.pace(),
        };
        self.reset();
        Ok(record)
    }

    /// Stopped -> Idle, dropping the recorded data.
    pub fn discard(&mut self) -> Result<()> {
        self.expect_state(&[SessionState::Stopped], "discard")?;
        self.reset();
        Ok(())
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Apply one timer tick. Returns `false` when the tick is stale.
    pub fn record_tick(&mut self, generation: u64) -> bool {
        if !self.owns(generation) {
            return false;
        }
        self.elapsed_seconds += 1;
        true
    }

    /// Append one position sample and add the newest segment to the distance.
    /// Returns `false` when the sample is stale.
    pub fn record_sample(&mut self, generation: u64, sample: PathSample) -> bool {
        if !self.owns(generation) {
            debug!(
                "[TrackingSession] Dropping sample from generation {} (current {}, {})",
                generation, self.generation, self.state
            );
            return false;
        }
        if let Some(prev) = self.path.last() {
            self.distance_covered_km += haversine_km(&prev.coordinate(), &sample.coordinate());
        }
        self.path.push(sample);
        true
    }

    fn owns(&self, generation: u64) -> bool {
        self.state == SessionState::Active && self.generation == generation
    }

    fn expect_state(&self, allowed: &[SessionState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RunaRouteError::InvalidTransition {
                from: self.state,
                operation,
            })
        }
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.path.clear();
        self.distance_covered_km = 0.0;
        self.elapsed_seconds = 0;
        self.started_at = None;
        self.generation += 1;
    }
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
