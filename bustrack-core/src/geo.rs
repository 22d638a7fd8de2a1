//! Great-circle distance between coordinates.

use crate::types::LatLon;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Haversine distance between two points, in kilometers.
///
/// Pure and total for in-range coordinates; used as a sort key when
/// ranking buses by proximity to a reference point.
pub fn distance_km(a: LatLon, b: LatLon) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let slat = (dlat / 2.0).sin();
    let slon = (dlon / 2.0).sin();
    let h = slat * slat + a.lat.to_radians().cos() * b.lat.to_radians().cos() * slon * slon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(lat: f64, lon: f64) -> LatLon {
        LatLon::new(lat, lon).unwrap()
    }

    #[test]
    fn test_distance_identity() {
        let p = loc(64.156896, -21.9512);
        assert_eq!(distance_km(p, p), 0.0);
    }

    #[test]
    fn test_distance_symmetry() {
        let a = loc(64.156896, -21.9512);
        let b = loc(64.1355, -21.8954);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-12);
    }

    #[test]
    fn test_munich_to_berlin() {
        let munich = loc(48.1372, 11.5756);
        let berlin = loc(52.5186, 13.4083);
        let d = distance_km(munich, berlin);
        assert!((d - 504.2).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_antipodal_is_half_circumference() {
        let a = loc(0.0, 0.0);
        let b = loc(0.0, 180.0);
        let half = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!((distance_km(a, b) - half).abs() < 1e-6);
    }
}
