//! Great-circle distance and coarse region bucketing (C1).
//!
//! Region bucketing follows the original NYC dispatch demo: a 4-quadrant
//! split around a fixed longitude/latitude line, with a sentinel region for
//! missing coordinates.

const EARTH_RADIUS_KM: f64 = 6371.0;

const LON_SPLIT: f64 = -73.9;
const LAT_SPLIT: f64 = 40.65;

/// Sentinel region for unknown/missing coordinates.
pub const UNKNOWN_REGION: i32 = 0;

/// Great-circle distance between two (lon, lat) points, in kilometers.
pub fn haversine(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );

    let sin_dlat = ((lat2 - lat1) / 2.0).sin();
    let sin_dlon = ((lon2 - lon1) / 2.0).sin();
    let a = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;

    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

/// Coarse region bucket for a (lon, lat) point.
///
/// Regions:
/// - 0 = North-West (also the sentinel for unknown input)
/// - 1 = North-East
/// - 2 = South-West
/// - 3 = South-East
pub fn region(lon: Option<f64>, lat: Option<f64>) -> i32 {
    let (Some(lon), Some(lat)) = (lon, lat) else {
        return UNKNOWN_REGION;
    };

    if lat >= LAT_SPLIT {
        if lon <= LON_SPLIT { 0 } else { 1 }
    } else if lon <= LON_SPLIT {
        2
    } else {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_distance_for_identical_points() {
        let d = haversine(-73.98, 40.75, -73.98, 40.75);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn haversine_matches_known_nyc_distance() {
        // scenario 1 in spec §8: pickup (-73.98,40.75) -> dropoff (-73.96,40.76)
        let d = haversine(-73.98, 40.75, -73.96, 40.76);
        assert!((d - 1.77).abs() < 0.05, "got {d}");
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = haversine(-73.98, 40.75, -73.96, 40.76);
        let b = haversine(-73.96, 40.76, -73.98, 40.75);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn region_buckets_four_quadrants() {
        assert_eq!(region(Some(-74.0), Some(40.70)), 0); // NW
        assert_eq!(region(Some(-73.8), Some(40.70)), 1); // NE
        assert_eq!(region(Some(-74.0), Some(40.50)), 2); // SW
        assert_eq!(region(Some(-73.8), Some(40.50)), 3); // SE
    }

    #[test]
    fn region_boundary_is_inclusive_on_split_lines() {
        assert_eq!(region(Some(LON_SPLIT), Some(LAT_SPLIT)), 0);
    }

    #[test]
    fn region_unknown_for_missing_coordinates() {
        assert_eq!(region(None, Some(40.7)), UNKNOWN_REGION);
        assert_eq!(region(Some(-73.9), None), UNKNOWN_REGION);
        assert_eq!(region(None, None), UNKNOWN_REGION);
    }

    proptest::proptest! {
        #[test]
        fn haversine_never_negative(lon1 in -180.0..180.0, lat1 in -90.0..90.0, lon2 in -180.0..180.0, lat2 in -90.0..90.0) {
            let d = haversine(lon1, lat1, lon2, lat2);
            proptest::prop_assert!(d >= -1e-6);
        }

        #[test]
        fn region_always_in_range(lon in -180.0..180.0, lat in -90.0..90.0) {
            let r = region(Some(lon), Some(lat));
            proptest::prop_assert!((0..=3).contains(&r));
        }
    }
}
