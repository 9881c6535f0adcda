use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Admission radius applied when a business does not choose one.
pub const DEFAULT_RADIUS_M: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite, |lat| <= 90 and |lon| <= 180.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance in meters, or `None` when either point is malformed.
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> Option<f64> {
    if !a.is_valid() || !b.is_valid() {
        return None;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();

    Some(EARTH_RADIUS_M * c)
}

/// Geofence admission check.
///
/// The boundary is inclusive: a candidate exactly `radius_m` away is inside.
/// Malformed coordinates or a negative/non-finite radius never pass.
pub fn is_within_radius(business: GeoPoint, radius_m: f64, candidate: GeoPoint) -> bool {
    if !radius_m.is_finite() || radius_m < 0.0 {
        return false;
    }
    match distance_m(business, candidate) {
        Some(distance) => distance <= radius_m,
        None => false,
    }
}
