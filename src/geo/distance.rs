// SPDX-License-Identifier: MIT
//! distance.rs — haversine great-circle distance.
//!
//! Good to well under 0.5% for the distances that matter here (tens of
//! meters to a few kilometers), which is far tighter than consumer GPS
//! accuracy. Uses the atan2 form for numerical stability near antipodes.

use super::Coordinate;

/// Mean Earth radius in meters (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters.
pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 near antipodes; keep sqrt(1 - h) real.
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_zero_distance_for_identical_points() {
        let p = coord(52.52, 13.405);
        assert_eq!(haversine_meters(p, p), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let a = coord(48.8566, 2.3522);
        let b = coord(51.5074, -0.1278);
        assert_eq!(haversine_meters(a, b), haversine_meters(b, a));
    }

    #[test]
    fn test_paris_to_london() {
        // Paris ↔ London is about 343.5 km great-circle.
        let paris = coord(48.8566, 2.3522);
        let london = coord(51.5074, -0.1278);
        let d = haversine_meters(paris, london);
        assert!(
            (d - 343_550.0).abs() < 1_500.0,
            "expected ~343.5 km, got {d} m"
        );
    }

    #[test]
    fn test_one_millidegree_of_latitude() {
        // 0.001° of latitude is ~111.19 m anywhere on Earth.
        let a = coord(37.0, -122.0);
        let b = coord(37.001, -122.0);
        let d = haversine_meters(a, b);
        assert!((d - 111.19).abs() < 0.1, "got {d} m");
    }

    #[test]
    fn test_longitude_shrinks_with_latitude() {
        // 1° of longitude spans ~111.19 km at the equator but only
        // ~cos(60°) of that at 60°N. Both axes must feed the formula —
        // a latitude-only computation would return 0 for these pairs.
        let equator = haversine_meters(coord(0.0, 20.0), coord(0.0, 21.0));
        let north = haversine_meters(coord(60.0, 20.0), coord(60.0, 21.0));
        assert!((equator - 111_195.0).abs() < 200.0, "equator: {equator} m");
        assert!((north - 55_597.0).abs() < 200.0, "60N: {north} m");
    }

    #[test]
    fn test_antimeridian_crossing_stays_short() {
        // ±179.9995° are 0.001° apart, not a full trip around the globe.
        let a = coord(0.0, 179.9995);
        let b = coord(0.0, -179.9995);
        let d = haversine_meters(a, b);
        assert!((d - 111.19).abs() < 0.5, "got {d} m");
    }

    #[test]
    fn test_antipodal_is_half_circumference() {
        let a = coord(0.0, 0.0);
        let b = coord(0.0, 180.0);
        let d = haversine_meters(a, b);
        let half = std::f64::consts::PI * EARTH_RADIUS_M;
        assert!((d - half).abs() < 1.0, "got {d} m, want {half} m");
    }
}
