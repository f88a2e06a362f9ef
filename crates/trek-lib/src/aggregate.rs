//! Trek-level totals and the elevation profile
//!
//! Nothing here is cached: every call walks the Trek's Routes as they are
//! right now. A Route without derived fields contributes zero to every total
//! and no samples to the profile.

use crate::codec::{self, Coordinate};
use crate::model::TrekId;
use crate::store::TrekStore;
use crate::utils::{expand_bounds, haversine_with_radius, round_to};
use crate::Result;
use geo::Rect;
use rayon::prelude::*;

/// Totals over all Routes of a Trek
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrekSummary {
    pub route_count: usize,
    /// Sum of Route marker counts; a Marker shared by two Routes counts twice
    pub marker_count: usize,
    /// Meters
    pub total_distance: f64,
    pub total_ascent: f64,
    pub total_descent: f64,
    /// WGS84 bounding box of the decoded geometry, if any
    pub bounds: Option<Rect<f64>>,
}

/// One point of the elevation profile
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileSample {
    /// Cumulative great-circle distance in kilometers, rounded to 2 decimals
    pub distance_km: f64,
    /// Meters
    pub elevation: f64,
}

/// Decoded geometry of each Route of the Trek, in Trek order
///
/// Routes without geometry yield an empty sequence.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn trek_coordinates(store: &TrekStore, trek: TrekId) -> Result<Vec<Vec<Coordinate>>> {
    let geometries: Vec<Option<&str>> = store
        .trek_routes(trek)?
        .into_iter()
        .map(|route| route.geometry())
        .collect();

    // Decoding is independent per Route; collect keeps Trek order
    Ok(geometries
        .into_par_iter()
        .map(|geometry| geometry.map(codec::decode).unwrap_or_default())
        .collect())
}

#[cfg_attr(feature = "profiling", profiling::function)]
pub fn summarize(store: &TrekStore, trek: TrekId) -> Result<TrekSummary> {
    let routes = store.trek_routes(trek)?;
    let mut summary = TrekSummary {
        route_count: routes.len(),
        ..Default::default()
    };
    for route in &routes {
        summary.marker_count += route.markers().len();
        summary.total_distance += route.distance().unwrap_or(0.0);
        summary.total_ascent += route.ascent().unwrap_or(0.0);
        summary.total_descent += route.descent().unwrap_or(0.0);
    }
    for coordinate in trek_coordinates(store, trek)?.iter().flatten() {
        expand_bounds(&mut summary.bounds, coordinate.point());
    }
    Ok(summary)
}

/// Elevation profile of a Trek, see [`profile_from_coordinates`]
pub fn elevation_profile(store: &TrekStore, trek: TrekId, radius_m: f64) -> Result<Vec<ProfileSample>> {
    let coordinates: Vec<Coordinate> = trek_coordinates(store, trek)?.into_iter().flatten().collect();
    Ok(profile_from_coordinates(&coordinates, radius_m))
}

/// Distance-vs-elevation samples for a concatenated coordinate sequence
///
/// The first sample sits at distance 0; each following one adds the haversine
/// distance from its predecessor. Consecutive Routes are joined as-is, so a gap
/// between one Route's end and the next one's start counts as distance.
pub fn profile_from_coordinates(coordinates: &[Coordinate], radius_m: f64) -> Vec<ProfileSample> {
    #[cfg(feature = "profiling")]
    profiling::scope!("aggregate::profile_from_coordinates");

    let Some(first) = coordinates.first() else {
        return Vec::new();
    };

    let mut samples = Vec::with_capacity(coordinates.len());
    samples.push(ProfileSample {
        distance_km: 0.0,
        elevation: first.elevation,
    });

    let mut total_m = 0.0;
    for pair in coordinates.windows(2) {
        total_m += haversine_with_radius(pair[0].point(), pair[1].point(), radius_m);
        samples.push(ProfileSample {
            distance_km: round_to(total_m / 1000.0, 2),
            elevation: pair[1].elevation,
        });
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewMarker, RouteDefaults, RouteId, RoutePath};
    use crate::store::RouteOptions;
    use crate::utils::MEAN_EARTH_RADIUS_M;

    fn computed(store: &mut TrekStore, route: RouteId, coordinates: &[Coordinate], distance: f64) {
        store
            .apply_path(
                route,
                RoutePath {
                    geometry: codec::encode(coordinates),
                    distance,
                    ascent: 50.0,
                    descent: 25.0,
                },
            )
            .unwrap();
    }

    /// A Trek with three Routes of two markers each; the last one is left STALE
    fn trek() -> (TrekStore, TrekId, Vec<RouteId>) {
        let mut store = TrekStore::new();
        let user = store.add_user("alice", "alice@example.org").unwrap();
        let trek = store.create_trek("Trek", user, RouteDefaults::default()).unwrap();
        let markers: Vec<_> = (0..3)
            .map(|i| {
                store
                    .create_marker(user, NewMarker::named(format!("M{i}")).at(0.0, i as f64, None))
                    .unwrap()
            })
            .collect();
        let routes: Vec<_> = (0..3)
            .map(|i| {
                let route = store
                    .create_route(trek, format!("R{i}"), RouteOptions::default())
                    .unwrap();
                store.append_marker(route, markers[i % 2]).unwrap();
                store.append_marker(route, markers[i % 2 + 1]).unwrap();
                route
            })
            .collect();

        computed(
            &mut store,
            routes[0],
            &[Coordinate::new(0.0, 0.0, 100.0), Coordinate::new(0.0, 1.0, 150.0)],
            1000.0,
        );
        computed(
            &mut store,
            routes[1],
            &[Coordinate::new(0.0, 1.0, 150.0), Coordinate::new(0.0, 2.0, 100.0)],
            2000.0,
        );
        (store, trek, routes)
    }

    #[test]
    fn test_summary_treats_stale_routes_as_zero() {
        let (store, trek, _) = trek();
        let summary = summarize(&store, trek).unwrap();
        assert_eq!(summary.route_count, 3);
        assert_eq!(summary.marker_count, 6);
        assert_eq!(summary.total_distance, 3000.0);
        assert_eq!(summary.total_ascent, 100.0);
        assert_eq!(summary.total_descent, 50.0);

        let bounds = summary.bounds.unwrap();
        assert_eq!(bounds.min().y, 0.0);
        assert_eq!(bounds.max().y, 2.0);
    }

    #[test]
    fn test_empty_trek_summary() {
        let mut store = TrekStore::new();
        let user = store.add_user("bob", "").unwrap();
        let trek = store.create_trek("Nothing", user, RouteDefaults::default()).unwrap();
        let summary = summarize(&store, trek).unwrap();
        assert_eq!(summary, TrekSummary::default());
        assert!(elevation_profile(&store, trek, MEAN_EARTH_RADIUS_M).unwrap().is_empty());
    }

    #[test]
    fn test_profile_concatenates_routes_in_order() {
        let (store, trek, _) = trek();
        let profile = elevation_profile(&store, trek, MEAN_EARTH_RADIUS_M).unwrap();
        // Two coordinates from each computed Route, nothing from the stale one
        let distances: Vec<f64> = profile.iter().map(|s| s.distance_km).collect();
        let elevations: Vec<f64> = profile.iter().map(|s| s.elevation).collect();
        assert_eq!(distances, vec![0.0, 111.19, 111.19, 222.39]);
        assert_eq!(elevations, vec![100.0, 150.0, 150.0, 100.0]);
    }

    #[test]
    fn test_profile_over_joined_sequence() {
        let coordinates = [
            Coordinate::new(0.0, 0.0, 100.0),
            Coordinate::new(0.0, 1.0, 150.0),
            Coordinate::new(0.0, 2.0, 100.0),
        ];
        let profile = profile_from_coordinates(&coordinates, MEAN_EARTH_RADIUS_M);
        assert_eq!(
            profile,
            vec![
                ProfileSample { distance_km: 0.0, elevation: 100.0 },
                ProfileSample { distance_km: 111.19, elevation: 150.0 },
                ProfileSample { distance_km: 222.39, elevation: 100.0 },
            ]
        );
    }

    #[test]
    fn test_profile_follows_route_reordering() {
        let (mut store, trek, routes) = trek();
        store.move_route(routes[1], 0).unwrap();
        let profile = elevation_profile(&store, trek, MEAN_EARTH_RADIUS_M).unwrap();
        let elevations: Vec<f64> = profile.iter().map(|s| s.elevation).collect();
        assert_eq!(elevations, vec![150.0, 100.0, 100.0, 150.0]);
        // The jump from (0, 2) back to (0, 0) is counted
        assert_eq!(profile[2].distance_km, 333.58);
    }

    #[test]
    fn test_single_coordinate_profile() {
        let profile = profile_from_coordinates(&[Coordinate::new(5.0, 45.0, 212.0)], MEAN_EARTH_RADIUS_M);
        assert_eq!(profile, vec![ProfileSample { distance_km: 0.0, elevation: 212.0 }]);
    }

    #[test]
    fn test_malformed_geometry_is_skipped() {
        let (mut store, trek, routes) = trek();
        store
            .apply_path(
                routes[2],
                RoutePath {
                    geometry: "\u{1}\u{2}".to_string(),
                    distance: 10.0,
                    ascent: 0.0,
                    descent: 0.0,
                },
            )
            .unwrap();
        let profile = elevation_profile(&store, trek, MEAN_EARTH_RADIUS_M).unwrap();
        assert_eq!(profile.len(), 4);
        assert_eq!(summarize(&store, trek).unwrap().total_distance, 3010.0);
    }
}
