// Great-circle distance, shared by the reference-map linking engine and
// the merge engine's GPS-proximity signal. Hand-rolled (no geo crate in
// the dependency table) since it's a single well-known formula.

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two lat/lng points, in meters.
pub fn haversine_distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1_rad, lat2_rad) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert!(haversine_distance_meters(42.36, -71.05, 42.36, -71.05) < 1e-6);
    }

    #[test]
    fn known_distance_is_approximately_correct() {
        // Boston Common to Fenway Park, roughly 3.1 km.
        let d = haversine_distance_meters(42.3551, -71.0657, 42.3467, -71.0972);
        assert!(d > 2_500.0 && d < 3_500.0);
    }
}
