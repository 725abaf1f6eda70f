//! # Runaroute
//!
//! Round-trip route fetching and live run tracking for the runaroute app.
//!
//! This library provides:
//! - Round-trip route candidates from openrouteservice, fetched concurrently
//! - A live session tracker (start / pause / resume / stop) that turns a
//!   position stream into distance covered, elapsed time and pace
//! - Address autocomplete, weather forecast and route-history statistics
//!
//! ## Features
//!
//! - **`http`** - Enable HTTP clients for the routing, geocoding and weather providers (default)
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use runaroute::{PathSample, TrackingSession};
//! use chrono::Utc;
//!
//! let mut session = TrackingSession::new();
//! let generation = session.begin(Utc::now()).unwrap();
//!
//! session.record_sample(generation, PathSample::new(0.0, 0.0, 0));
//! session.record_sample(generation, PathSample::new(0.0, 0.001, 1_000));
//!
//! println!("Covered {:.3} km", session.distance_covered_km());
//! ```

use geo::{algorithm::simplify::Simplify, Coord, LineString};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, RunaRouteError};

// Geographic utilities (distance, bounds)
pub mod geo_utils;
pub use geo_utils::haversine_km;

// Session state machine and derived metrics
pub mod session;
pub use session::{
    pace_min_per_km, CompletedRoute, SessionSnapshot, SessionState, TrackingSession,
};

// Task-driven tracker (tick + position subscription)
pub mod tracker;
pub use tracker::{
    Accuracy, LocationPermission, PermissionStatus, PositionSource, SessionTracker,
    TrackerConfig, WatchOptions,
};

// Round-trip route candidates
pub mod routing;
pub use routing::{RouteCandidateFetcher, RouteProvider, RoutingConfig, DEFAULT_SEEDS};
#[cfg(feature = "http")]
pub use routing::OrsRouteProvider;

// Candidate paging
pub mod selector;
pub use selector::RouteSelector;

// Address autocomplete
pub mod geocoding;
pub use geocoding::{AddressAutocomplete, AddressQuery, GeocodeProvider, GeocodeSuggestion, GeocodingConfig};
#[cfg(feature = "http")]
pub use geocoding::NominatimGeocoder;

// Weather forecast
pub mod weather;
pub use weather::{WeatherConfig, WeatherForecast, WeatherKind};
#[cfg(feature = "http")]
pub use weather::WeatherClient;

// Route-history statistics
pub mod stats;
pub use stats::{RouteHistoryEntry, RouteStatistics};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("Runaroute"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use runaroute::Coordinate;
/// let point = Coordinate::new(55.6761, 12.5683); // Copenhagen
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A position delivered by the live position stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct PathSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp_millis: i64,
}

impl PathSample {
    pub fn new(latitude: f64, longitude: f64, timestamp_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_millis,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Bounding box of a set of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from coordinates.
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut bounds = Self {
            min_lat: f64::MAX,
            max_lat: f64::MIN,
            min_lng: f64::MAX,
            max_lng: f64::MIN,
        };
        for p in points {
            bounds.min_lat = bounds.min_lat.min(p.latitude);
            bounds.max_lat = bounds.max_lat.max(p.latitude);
            bounds.min_lng = bounds.min_lng.min(p.longitude);
            bounds.max_lng = bounds.max_lng.max(p.longitude);
        }
        Some(bounds)
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// One round-trip route offered by the routing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct RouteCandidate {
    /// Closed-loop polyline, first == last
    pub coordinates: Vec<Coordinate>,
    /// Realized distance reported by the provider, may differ from the target
    pub distance_km: f64,
}

impl RouteCandidate {
    pub fn new(coordinates: Vec<Coordinate>, distance_km: f64) -> Self {
        Self {
            coordinates,
            distance_km,
        }
    }

    /// Whether the polyline starts and ends at the same coordinate.
    pub fn is_closed_loop(&self) -> bool {
        match (self.coordinates.first(), self.coordinates.last()) {
            (Some(first), Some(last)) => self.coordinates.len() > 1 && first == last,
            _ => false,
        }
    }

    pub fn start(&self) -> Option<Coordinate> {
        self.coordinates.first().copied()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.coordinates)
    }

    /// Douglas-Peucker simplified polyline for map display.
    ///
    /// `tolerance` is in degrees; 0.0001 is roughly 11 meters.
    pub fn simplified(&self, tolerance: f64) -> Vec<Coordinate> {
        let line: LineString<f64> = self
            .coordinates
            .iter()
            .map(|c| Coord {
                x: c.longitude,
                y: c.latitude,
            })
            .collect();
        line.simplify(&tolerance)
            .0
            .into_iter()
            .map(|c| Coordinate::new(c.y, c.x))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
