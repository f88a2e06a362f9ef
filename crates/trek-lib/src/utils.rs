//! Utility functions for great-circle distances and bounding boxes

use geo::{Coord, Point, Rect};

/// Mean Earth radius in meters, used for elevation profiles by default
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Earth radius in meters historically used by the directions provider tooling
pub const PROVIDER_EARTH_RADIUS_M: f64 = 6_372_800.0;

/// Calculate the Haversine distance between two WGS84 points in meters
///
/// Points are `(x = longitude, y = latitude)` in degrees.
#[inline]
pub fn haversine(p1: Point<f64>, p2: Point<f64>) -> f64 {
    haversine_with_radius(p1, p2, MEAN_EARTH_RADIUS_M)
}

/// Haversine distance on a sphere of the given radius (meters)
#[inline]
pub fn haversine_with_radius(p1: Point<f64>, p2: Point<f64>, radius_m: f64) -> f64 {
    let lat1 = p1.y().to_radians();
    let lat2 = p2.y().to_radians();
    let delta_lat = (p2.y() - p1.y()).to_radians();
    let delta_lon = (p2.x() - p1.x()).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    radius_m * c
}

/// Round to a fixed number of decimal places
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Grow `bbox` so that it contains `point`, creating it on first use
pub fn expand_bounds(bbox: &mut Option<Rect<f64>>, point: Point<f64>) {
    match bbox {
        Some(rect) => {
            let min = Coord {
                x: rect.min().x.min(point.x()),
                y: rect.min().y.min(point.y()),
            };
            let max = Coord {
                x: rect.max().x.max(point.x()),
                y: rect.max().y.max(point.y()),
            };
            *rect = Rect::new(min, max);
        }
        None => *bbox = Some(Rect::new(point.0, point.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_on_meridian() {
        let d = haversine(Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        assert!((d - 111_194.9).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        for p in [
            Point::new(0.0, 0.0),
            Point::new(5.718545, 45.177879),
            Point::new(-179.9, -89.5),
        ] {
            assert_eq!(haversine(p, p), 0.0);
        }
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let grenoble = Point::new(5.718545, 45.177879);
        let cholet = Point::new(-0.883084, 47.058606);
        let d1 = haversine(grenoble, cholet);
        let d2 = haversine(cholet, grenoble);
        assert!((d1 - d2).abs() < 1e-6);
        // Roughly 540 km as the crow flies
        assert!(d1 > 500_000.0 && d1 < 580_000.0);
    }

    #[test]
    fn test_provider_radius_scales_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 1.0);
        let d = haversine_with_radius(a, b, PROVIDER_EARTH_RADIUS_M);
        assert!((d - 111_226.3).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(111.194_926, 2), 111.19);
        assert_eq!(round_to(222.389_853, 2), 222.39);
        assert_eq!(round_to(0.0, 2), 0.0);
    }

    #[test]
    fn test_expand_bounds() {
        let mut bbox = None;
        expand_bounds(&mut bbox, Point::new(1.0, 2.0));
        expand_bounds(&mut bbox, Point::new(-1.0, 5.0));
        let rect = bbox.unwrap();
        assert_eq!(rect.min(), Coord { x: -1.0, y: 2.0 });
        assert_eq!(rect.max(), Coord { x: 1.0, y: 5.0 });
    }
}
