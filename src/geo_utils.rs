//! Geographic utilities: great-circle distance and path length.
//!
//! Distances are computed on a sphere of radius [`EARTH_RADIUS_KM`] using the
//! haversine formula. No ellipsoid correction is applied. `geo::Haversine`
//! is not used since its mean radius is 6371.0088 km.

use crate::Coordinate;

/// Mean Earth radius used by the distance estimator.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometers.
///
/// # Example
/// ```
/// use runaroute::{Coordinate, geo_utils::haversine_km};
///
/// let copenhagen = Coordinate::new(55.6761, 12.5683);
/// let aarhus = Coordinate::new(56.1629, 10.2039);
/// let d = haversine_km(&copenhagen, &aarhus);
/// assert!((d - 157.0).abs() < 1.0);
/// ```
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Total length of a polyline in kilometers.
pub fn path_length_km(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(&pair[0], &pair[1]))
        .sum()
}
