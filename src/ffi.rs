//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose Rust functionality
//! to Kotlin and Swift. All free FFI functions are prefixed with `ffi_` to
//! avoid naming conflicts with the internal API.
//!
//! The host owns the timer and the location subscription on the mobile side
//! and drives an [`FfiTrackingSession`] through its callbacks; the Rust side
//! keeps the state machine and the metrics.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use log::{info, warn};
#[cfg(feature = "http")]
use once_cell::sync::Lazy;

use crate::error::{Result, RunaRouteError};
use crate::geocoding::AddressQuery;
use crate::session::{SessionSnapshot, SessionState, TrackingSession};
use crate::stats::{format_duration_hh_mm_ss, format_duration_mm_ss, format_pace, RouteHistoryEntry, RouteStatistics};
use crate::weather::WeatherKind;
use crate::{geo_utils, init_logging, Coordinate, PathSample, RouteCandidate};

// ============================================================================
// Tracking Session
// ============================================================================

/// Completed-route record with the date flattened to epoch milliseconds.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCompletedRoute {
    pub date_millis: i64,
    pub distance_km: f64,
    pub elapsed_seconds: u64,
    pub pace_min_per_km: f64,
}

/// A tracking session driven by the host's timer and position callbacks.
///
/// `begin` and `resume` return the generation the host must pass back with
/// every tick and sample; stale callbacks are ignored.
#[derive(uniffi::Object)]
pub struct FfiTrackingSession {
    inner: Mutex<TrackingSession>,
}

impl FfiTrackingSession {
    fn lock(&self) -> MutexGuard<'_, TrackingSession> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[uniffi::export]
impl FfiTrackingSession {
    #[uniffi::constructor]
    pub fn new() -> Arc<Self> {
        init_logging();
        Arc::new(Self {
            inner: Mutex::new(TrackingSession::new()),
        })
    }

    pub fn begin(&self) -> Result<u64> {
        self.lock().begin(Utc::now())
    }

    pub fn pause(&self) -> Result<()> {
        self.lock().pause()
    }

    pub fn resume(&self) -> Result<u64> {
        self.lock().resume()
    }

    pub fn stop(&self) -> Result<()> {
        self.lock().stop()
    }

    pub fn accept(&self) -> Result<FfiCompletedRoute> {
        let record = self.lock().accept()?;
        info!(
            "[RunaRouteRust] Accepted route: {:.2} km in {}s",
            record.distance_km, record.elapsed_seconds
        );
        Ok(FfiCompletedRoute {
            date_millis: record.date.timestamp_millis(),
            distance_km: record.distance_km,
            elapsed_seconds: record.elapsed_seconds,
            pace_min_per_km: record.pace_min_per_km,
        })
    }

    pub fn discard(&self) -> Result<()> {
        self.lock().discard()
    }

    pub fn record_tick(&self, generation: u64) -> bool {
        self.lock().record_tick(generation)
    }

    pub fn record_sample(&self, generation: u64, sample: PathSample) -> bool {
        self.lock().record_sample(generation, sample)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn path(&self) -> Vec<PathSample> {
        self.lock().path().to_vec()
    }
}

// ============================================================================
// Metrics and formatting
// ============================================================================

#[uniffi::export]
pub fn ffi_haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    geo_utils::haversine_km(&a, &b)
}

#[uniffi::export]
pub fn ffi_format_duration(seconds: u64) -> String {
    format_duration_mm_ss(seconds)
}

/// Route time for history rows, `HH:MM:SS`.
#[uniffi::export]
pub fn ffi_format_route_time(seconds: u64) -> String {
    format_duration_hh_mm_ss(seconds)
}

#[uniffi::export]
pub fn ffi_format_pace(seconds_per_km: u32) -> String {
    format_pace(seconds_per_km)
}

/// Trimmed query, or `None` when too short to look up.
#[uniffi::export]
pub fn ffi_normalize_address_query(input: String) -> Option<String> {
    AddressQuery::normalize(&input).map(|q| q.as_str().to_string())
}

#[uniffi::export]
pub fn ffi_weather_kind(condition: String) -> WeatherKind {
    WeatherKind::from_condition(&condition)
}

/// History entry with an ISO `YYYY-MM-DD` date.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRouteHistoryEntry {
    pub date: String,
    pub distance_km: f64,
    pub elapsed_seconds: u64,
    pub avg_pace_seconds_per_km: u32,
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| RunaRouteError::ConfigError {
        message: format!("invalid date '{}': {}", text, e),
    })
}

/// Aggregate statistics relative to `today` (`YYYY-MM-DD`).
#[uniffi::export]
pub fn ffi_route_statistics(
    history: Vec<FfiRouteHistoryEntry>,
    today: String,
) -> Result<RouteStatistics> {
    init_logging();
    let entries = history
        .into_iter()
        .map(|e| {
            Ok(RouteHistoryEntry {
                date: parse_date(&e.date)?,
                distance_km: e.distance_km,
                elapsed_seconds: e.elapsed_seconds,
                avg_pace_seconds_per_km: e.avg_pace_seconds_per_km,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RouteStatistics::from_history(&entries, parse_date(&today)?))
}

// ============================================================================
// HTTP providers (requires "http" feature)
// ============================================================================

/// Outcome of a candidate fetch. `candidates` is empty unless `success`.
#[cfg(feature = "http")]
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRouteFetchResult {
    pub candidates: Vec<RouteCandidate>,
    pub success: bool,
    pub error: Option<String>,
    pub status_code: Option<u16>,
}

/// Runtime shared by the blocking provider calls.
#[cfg(feature = "http")]
static RUNTIME: Lazy<std::result::Result<tokio::runtime::Runtime, String>> =
    Lazy::new(|| tokio::runtime::Runtime::new().map_err(|e| e.to_string()));

#[cfg(feature = "http")]
fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    match &*RUNTIME {
        Ok(rt) => Ok(rt.block_on(future)),
        Err(e) => Err(RunaRouteError::Internal {
            message: format!("Runtime error: {}", e),
        }),
    }
}

/// Fetch one round-trip candidate per seed. All-or-nothing.
#[cfg(feature = "http")]
#[uniffi::export]
pub fn ffi_fetch_route_candidates(
    api_key: String,
    start: Coordinate,
    target_distance_km: f64,
    variation_seeds: Vec<u32>,
) -> FfiRouteFetchResult {
    use crate::routing::{OrsRouteProvider, RouteCandidateFetcher};

    init_logging();
    info!(
        "[RunaRouteRust] ffi_fetch_route_candidates: {:.1} km, {} seeds",
        target_distance_km,
        variation_seeds.len()
    );

    let outcome = OrsRouteProvider::new(&api_key).and_then(|provider| {
        let fetcher = RouteCandidateFetcher::new(provider);
        block_on(fetcher.fetch(start, target_distance_km, &variation_seeds))?
    });

    match outcome {
        Ok(candidates) => FfiRouteFetchResult {
            candidates,
            success: true,
            error: None,
            status_code: None,
        },
        Err(e) => {
            warn!("[RunaRouteRust] Route fetch failed: {}", e);
            let status_code = match &e {
                RunaRouteError::RouteFetchFailed { status_code, .. } => *status_code,
                _ => None,
            };
            FfiRouteFetchResult {
                candidates: Vec::new(),
                success: false,
                error: Some(e.to_string()),
                status_code,
            }
        }
    }
}

/// One-shot address lookup; the debounce lives on the host side.
#[cfg(feature = "http")]
#[uniffi::export]
pub fn ffi_search_address(
    query: String,
) -> Result<Vec<crate::geocoding::GeocodeSuggestion>> {
    use crate::geocoding::{GeocodeProvider, NominatimGeocoder};

    init_logging();
    let Some(query) = AddressQuery::normalize(&query) else {
        return Ok(Vec::new());
    };
    let geocoder = NominatimGeocoder::new()?;
    block_on(geocoder.search(&query))?
}

/// Forecast as JSON (camelCase [`crate::WeatherForecast`]).
#[cfg(feature = "http")]
#[uniffi::export]
pub fn ffi_weather_forecast(api_key: String, at: Coordinate) -> Result<String> {
    use crate::weather::WeatherClient;

    init_logging();
    let client = WeatherClient::new(&api_key)?;
    let forecast = block_on(client.forecast(at))??;
    serde_json::to_string(&forecast).map_err(|e| RunaRouteError::Internal {
        message: format!("JSON encode error: {}", e),
    })
}
