//! Round-trip route candidates.
//!
//! [`RouteCandidateFetcher`] asks a [`RouteProvider`] for one loop per
//! variation seed. All requests are issued concurrently and joined
//! all-or-nothing: if any request fails the whole batch fails with
//! [`RunaRouteError::RouteFetchFailed`] and no partial results are returned.
//! There is no retry policy; the caller retries manually.
//!
//! With the `http` feature, [`OrsRouteProvider`] implements the provider
//! against the openrouteservice directions API.

use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, RunaRouteError};
use crate::{Coordinate, RouteCandidate};

/// Seeds used when the caller does not choose its own.
pub const DEFAULT_SEEDS: [u32; 2] = [1, 2];

/// Source of round-trip routes.
pub trait RouteProvider: Send + Sync {
    /// Fetch one closed loop starting at `start`, roughly `target_distance_km` long.
    fn fetch_round_trip(
        &self,
        start: Coordinate,
        target_distance_km: f64,
        seed: u32,
    ) -> impl Future<Output = Result<RouteCandidate>> + Send;
}

impl<T: RouteProvider> RouteProvider for std::sync::Arc<T> {
    fn fetch_round_trip(
        &self,
        start: Coordinate,
        target_distance_km: f64,
        seed: u32,
    ) -> impl Future<Output = Result<RouteCandidate>> + Send {
        (**self).fetch_round_trip(start, target_distance_km, seed)
    }
}

/// Configuration for the routing provider.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Base URL of the openrouteservice API.
    /// Default: "https://api.openrouteservice.org"
    pub base_url: String,

    /// Routing profile.
    /// Default: "foot-walking"
    pub profile: String,

    /// Number of generated waypoints that shape the loop.
    /// Default: 4
    pub waypoint_count: u32,

    /// Per-request timeout.
    /// Default: 30 seconds
    pub timeout: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openrouteservice.org".to_string(),
            profile: "foot-walking".to_string(),
            waypoint_count: 4,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Fetches a batch of route candidates, one per variation seed.
pub struct RouteCandidateFetcher<P> {
    provider: P,
}

impl<P: RouteProvider> RouteCandidateFetcher<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Fetch one candidate per seed, concurrently, preserving seed order.
    pub async fn fetch(
        &self,
        start: Coordinate,
        target_distance_km: f64,
        variation_seeds: &[u32],
    ) -> Result<Vec<RouteCandidate>> {
        if variation_seeds.is_empty() {
            return Err(RunaRouteError::ConfigError {
                message: "at least one variation seed is required".to_string(),
            });
        }
        if !start.is_valid() {
            return Err(RunaRouteError::ConfigError {
                message: format!(
                    "invalid start coordinate ({}, {})",
                    start.latitude, start.longitude
                ),
            });
        }
        if !(target_distance_km.is_finite() && target_distance_km > 0.0) {
            return Err(RunaRouteError::ConfigError {
                message: format!("invalid target distance {} km", target_distance_km),
            });
        }

        info!(
            "[RouteFetcher] Fetching {} candidates of {:.1} km from ({:.5}, {:.5})",
            variation_seeds.len(),
            target_distance_km,
            start.latitude,
            start.longitude
        );
        let fetch_start = Instant::now();

        let requests = variation_seeds
            .iter()
            .map(|&seed| self.provider.fetch_round_trip(start, target_distance_km, seed));

        match try_join_all(requests).await {
            Ok(candidates) => {
                for (seed, candidate) in variation_seeds.iter().zip(&candidates) {
                    if !candidate.is_closed_loop() {
                        warn!(
                            "[RouteFetcher] Candidate for seed {} is not a closed loop ({} points)",
                            seed,
                            candidate.coordinates.len()
                        );
                    }
                }
                info!(
                    "[RouteFetcher] Fetched {} candidates in {:?}",
                    candidates.len(),
                    fetch_start.elapsed()
                );
                Ok(candidates)
            }
            Err(e) => {
                warn!(
                    "[RouteFetcher] Batch failed after {:?}: {}",
                    fetch_start.elapsed(),
                    e
                );
                Err(match e {
                    RunaRouteError::RouteFetchFailed { .. } => e,
                    other => RunaRouteError::route_fetch(other.to_string(), None),
                })
            }
        }
    }

    /// Fetch with [`DEFAULT_SEEDS`].
    pub async fn fetch_default(
        &self,
        start: Coordinate,
        target_distance_km: f64,
    ) -> Result<Vec<RouteCandidate>> {
        self.fetch(start, target_distance_km, &DEFAULT_SEEDS).await
    }
}

// ============================================================================
// openrouteservice wire format
// ============================================================================

/// Request body for the round-trip directions endpoint
#[derive(Debug, Serialize)]
struct OrsRequest {
    /// [[lon, lat]]
    coordinates: Vec<[f64; 2]>,
    options: OrsOptions,
}

#[derive(Debug, Serialize)]
struct OrsOptions {
    round_trip: OrsRoundTrip,
}

#[derive(Debug, Serialize)]
struct OrsRoundTrip {
    /// Target loop length in meters
    length: f64,
    points: u32,
    seed: u32,
}

/// GeoJSON response (FeatureCollection)
#[derive(Debug, Deserialize)]
struct OrsResponse {
    features: Vec<OrsFeature>,
}

#[derive(Debug, Deserialize)]
struct OrsFeature {
    geometry: OrsGeometry,
    properties: OrsProperties,
}

#[derive(Debug, Deserialize)]
struct OrsGeometry {
    /// [lon, lat] or [lon, lat, elevation]
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct OrsProperties {
    summary: OrsSummary,
}

#[derive(Debug, Deserialize)]
struct OrsSummary {
    /// Meters
    #[serde(default)]
    distance: f64,
}

fn round_trip_body(start: Coordinate, target_distance_km: f64, waypoints: u32, seed: u32) -> OrsRequest {
    OrsRequest {
        coordinates: vec![[start.longitude, start.latitude]],
        options: OrsOptions {
            round_trip: OrsRoundTrip {
                length: target_distance_km * 1000.0,
                points: waypoints,
                seed,
            },
        },
    }
}

/// Extract the polyline and realized distance from a GeoJSON response body.
pub fn parse_route_response(body: &[u8]) -> Result<RouteCandidate> {
    let data: OrsResponse = serde_json::from_slice(body)
        .map_err(|e| RunaRouteError::route_fetch(format!("JSON parse error: {}", e), None))?;

    let feature = data
        .features
        .into_iter()
        .next()
        .ok_or_route_fetch("response contained no route features")?;

    let coordinates: Vec<Coordinate> = feature
        .geometry
        .coordinates
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| Coordinate::new(c[1], c[0]))
        .collect();

    if coordinates.len() < 2 {
        return Err(RunaRouteError::route_fetch(
            format!("route geometry has {} points", coordinates.len()),
            None,
        ));
    }

    Ok(RouteCandidate::new(
        coordinates,
        feature.properties.summary.distance / 1000.0,
    ))
}

// ============================================================================
// HTTP provider
// ============================================================================

#[cfg(feature = "http")]
pub use ors::OrsRouteProvider;

#[cfg(feature = "http")]
mod ors {
    use super::*;
    use log::debug;
    use reqwest::Client;

    /// openrouteservice round-trip provider, authenticated with a static API key.
    pub struct OrsRouteProvider {
        client: Client,
        api_key: String,
        config: RoutingConfig,
    }

    impl OrsRouteProvider {
        /// Create a provider with the default configuration.
        pub fn new(api_key: &str) -> Result<Self> {
            Self::with_config(api_key, RoutingConfig::default())
        }

        pub fn with_config(api_key: &str, config: RoutingConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|e| RunaRouteError::ConfigError {
                    message: format!("Failed to create HTTP client: {}", e),
                })?;

            Ok(Self {
                client,
                api_key: api_key.to_string(),
                config,
            })
        }

        fn url(&self) -> String {
            format!(
                "{}/v2/directions/{}/geojson",
                self.config.base_url.trim_end_matches('/'),
                self.config.profile
            )
        }
    }

    impl RouteProvider for OrsRouteProvider {
        async fn fetch_round_trip(
            &self,
            start: Coordinate,
            target_distance_km: f64,
            seed: u32,
        ) -> Result<RouteCandidate> {
            let req_start = Instant::now();
            let body = round_trip_body(start, target_distance_km, self.config.waypoint_count, seed);

            let resp = self
                .client
                .post(self.url())
                .header("Authorization", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    RunaRouteError::route_fetch(
                        format!("Request error: {}", e),
                        e.status().map(|s| s.as_u16()),
                    )
                })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(RunaRouteError::route_fetch(
                    format!("HTTP {}", status),
                    Some(status.as_u16()),
                ));
            }

            let bytes = resp.bytes().await.map_err(|e| {
                RunaRouteError::route_fetch(format!("Body download error: {}", e), None)
            })?;
            let candidate = parse_route_response(&bytes)?;

            debug!(
                "[Fetch seed {}] {} points, {:.2} km, {:.1}KB in {:?}",
                seed,
                candidate.coordinates.len(),
                candidate.distance_km,
                bytes.len() as f64 / 1024.0,
                req_start.elapsed()
            );
            Ok(candidate)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
