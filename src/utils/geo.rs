/// Great-circle distance between two coordinates (Haversine), in kilometers.
/// Arguments are [lng, lat] pairs to match the wire order used everywhere else.
pub fn haversine_km(lng1: f64, lat1: f64, lng2: f64, lat2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// True if both components are finite and within WGS84 bounds.
pub fn valid_coordinates(lng: f64, lat: f64) -> bool {
    lng.is_finite() && lat.is_finite() && (-180.0..=180.0).contains(&lng) && (-90.0..=90.0).contains(&lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connaught_place_to_noida() {
        // Roughly the trip from the request-ride scenario
        let d = haversine_km(77.20, 28.61, 77.25, 28.65);
        assert!(d > 5.0 && d < 8.0, "got {}", d);
    }

    #[test]
    fn zero_distance_for_same_point() {
        assert!(haversine_km(77.20, 28.61, 77.20, 28.61) < 1e-9);
    }

    #[test]
    fn coordinate_validation() {
        assert!(valid_coordinates(77.20, 28.61));
        assert!(!valid_coordinates(200.0, 28.61));
        assert!(!valid_coordinates(77.20, 95.0));
        assert!(!valid_coordinates(f64::NAN, 28.61));
    }
}
