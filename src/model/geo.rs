/**
 * Mean earth radius in kilometres.
 */
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/**
 * Anything with a centroid.
 */
pub trait Located {
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;
}

impl Located for crate::model::models::DistrictDetailType {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }
}

/**
 * Great-circle distance between two points using the Haversine formula.
 *
 * # Arguments
 * `lat1`, `lng1`: First point in degrees.
 * `lat2`, `lng2`: Second point in degrees.
 *
 * # Returns
 * The distance in kilometres.
 */
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/**
 * Finds the candidate closest to the given point.
 *
 * Ties keep the first minimum found.
 *
 * # Returns
 * The closest candidate and its distance in kilometres, or `None` if there are no candidates.
 */
pub fn nearest<T: Located>(latitude: f64, longitude: f64, candidates: &[T]) -> Option<(&T, f64)> {
    let mut best: Option<(&T, f64)> = None;
    for candidate in candidates {
        let distance = haversine_km(latitude, longitude, candidate.latitude(), candidate.longitude());
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }
    best
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::sample::fallback_districts;

    struct Point(f64, f64);

    impl Located for Point {
        fn latitude(&self) -> f64 {
            self.0
        }

        fn longitude(&self) -> f64 {
            self.1
        }
    }

    #[test]
    fn test_haversine_zero() {
        assert!(haversine_km(26.8467, 80.9462, 26.8467, 80.9462).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_lucknow_kanpur() {
        let distance = haversine_km(26.8467, 80.9462, 26.4499, 80.3319);
        assert!((distance - 76.0).abs() < 3.0, "distance was {distance}");
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = haversine_km(25.3176, 82.9739, 28.9845, 77.7064);
        let b = haversine_km(28.9845, 77.7064, 25.3176, 82.9739);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_empty() {
        let candidates: Vec<Point> = vec![];
        assert!(nearest(26.0, 80.0, &candidates).is_none());
    }

    #[test]
    fn test_nearest_first_minimum_wins() {
        let candidates = vec![Point(10.0, 10.0), Point(0.0, 1.0), Point(0.0, -1.0)];
        let (point, _) = nearest(0.0, 0.0, &candidates).unwrap();
        assert!((point.1 - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nearest_district_matches_brute_force() {
        let districts = fallback_districts();
        let mut latitude = 24.0;
        while latitude <= 30.0 {
            let mut longitude = 77.0;
            while longitude <= 84.0 {
                let (district, distance) = nearest(latitude, longitude, &districts).unwrap();
                for other in &districts {
                    assert!(distance <= haversine_km(latitude, longitude, other.latitude, other.longitude) + 1e-9);
                }
                assert!(districts.iter().any(|d| d.name == district.name));
                longitude += 0.5;
            }
            latitude += 0.5;
        }
    }

    #[test]
    fn test_nearest_district_at_centroid() {
        let districts = fallback_districts();
        for district in &districts {
            let (found, distance) = nearest(district.latitude, district.longitude, &districts).unwrap();
            assert_eq!(found.name, district.name);
            assert!(distance < 1e-6);
        }
    }
}
