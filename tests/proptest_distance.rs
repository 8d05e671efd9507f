// SPDX-License-Identifier: MIT
//! Property-based tests for coordinates and the haversine distance.
//!
//! 1. Distance is finite, non-negative, and symmetric over the whole globe.
//! 2. A point is at distance zero from itself.
//! 3. No two Earth points are farther apart than half the circumference.
//! 4. Moving well past a threshold along a meridian always classifies as
//!    outside it — the property the away-set computation rests on.
//!
//! Run with: cargo test --test proptest_distance

use proptest::prelude::*;
use tetherd::geo::{haversine_meters, Coordinate};

/// π × mean Earth radius — the antipodal maximum.
const HALF_CIRCUMFERENCE_M: f64 = 20_015_086.8;

fn arb_coord() -> impl Strategy<Value = Coordinate> {
    (-90.0_f64..=90.0, -180.0_f64..=180.0)
        .prop_map(|(lat, lon)| Coordinate::new(lat, lon).unwrap())
}

proptest! {
    #[test]
    fn distance_is_finite_nonnegative_and_symmetric(a in arb_coord(), b in arb_coord()) {
        let d_ab = haversine_meters(a, b);
        let d_ba = haversine_meters(b, a);
        prop_assert!(d_ab.is_finite(), "not finite: {a} → {b} gave {d_ab}");
        prop_assert!(d_ab >= 0.0, "negative: {a} → {b} gave {d_ab}");
        prop_assert!(
            (d_ab - d_ba).abs() < 1e-6,
            "asymmetric: {d_ab} vs {d_ba}"
        );
    }

    #[test]
    fn identical_points_are_at_zero(a in arb_coord()) {
        prop_assert!(haversine_meters(a, a) < 1e-9);
    }

    #[test]
    fn no_distance_exceeds_the_antipodal_maximum(a in arb_coord(), b in arb_coord()) {
        let d = haversine_meters(a, b);
        prop_assert!(
            d <= HALF_CIRCUMFERENCE_M + 1.0,
            "{a} → {b} gave {d} m, beyond antipodal"
        );
    }

    /// One degree of latitude is ~111 195 m at any longitude, so a point
    /// displaced 2×threshold north must always land outside the threshold
    /// while the origin itself never does.
    #[test]
    fn threshold_classification_holds_along_meridians(
        lat in -80.0_f64..=80.0,
        lon in -179.0_f64..=179.0,
        threshold in 10.0_f64..=10_000.0,
    ) {
        let origin = Coordinate::new(lat, lon).unwrap();
        let delta_deg = (threshold * 2.0) / 111_195.0;
        let displaced = Coordinate::new(lat + delta_deg, lon).unwrap();

        prop_assert!(haversine_meters(origin, origin) <= threshold);
        prop_assert!(
            haversine_meters(origin, displaced) > threshold,
            "displaced {delta_deg}° at lat {lat} stayed inside {threshold} m"
        );
    }

    /// Parsing accepts exactly what `Display` prints.
    #[test]
    fn coordinate_display_parses_back(a in arb_coord()) {
        let parsed: Coordinate = a.to_string().parse().unwrap();
        prop_assert_eq!(parsed, a);
    }
}
