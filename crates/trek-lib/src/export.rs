//! GPX export of a whole Trek
//!
//! One track per Route (single segment of its decoded geometry) and one
//! waypoint per Marker per Route, in Route order then marker order. Markers
//! shared by several Routes are repeated. The document carries no timestamps,
//! so the same Trek always serializes to the same bytes.

use crate::aggregate::trek_coordinates;
use crate::model::TrekId;
use crate::store::TrekStore;
use crate::utils::expand_bounds;
use crate::Result;
use gpx::{Gpx, GpxVersion, Metadata, Person, Track, TrackSegment, Waypoint};

pub const GPX_CONTENT_TYPE: &str = "application/gpx+xml";
const GPX_CREATOR: &str = "trek-lib";

/// A downloadable GPX document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GpxExport {
    /// `<trek name>.gpx`, reduced to a single path component
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Build the GPX document of a Trek
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn trek_to_gpx(store: &TrekStore, trek: TrekId) -> Result<Gpx> {
    let t = store.require_trek(trek)?;
    let routes = store.trek_routes(trek)?;
    let coordinates = trek_coordinates(store, trek)?;

    let mut bounds = None;
    let tracks: Vec<Track> = routes
        .iter()
        .zip(&coordinates)
        .map(|(route, coordinates)| {
            let mut segment = TrackSegment::default();
            for c in coordinates {
                expand_bounds(&mut bounds, c.point());
                let mut point = Waypoint::new(c.point());
                point.elevation = Some(c.elevation);
                segment.points.push(point);
            }
            let mut track = Track::default();
            track.name = Some(route.name.clone());
            track.segments.push(segment);
            track
        })
        .collect();

    // Markers that were never geocoded cannot be placed
    let mut waypoints = Vec::new();
    for route in &routes {
        for id in route.markers().iter() {
            let marker = store.require_marker(*id)?;
            let Some(location) = marker.location else {
                tracing::debug!("Skipping unresolved {id} in export of {trek}");
                continue;
            };
            let mut waypoint = Waypoint::new(location.point());
            waypoint.elevation = location.elevation;
            waypoint.name = Some(marker.name.clone());
            waypoints.push(waypoint);
        }
    }

    let author = store.user(t.owner).map(|user| Person {
        name: Some(user.username.clone()),
        // GPX stores emails as id/domain pairs
        email: user.email.contains('@').then(|| user.email.clone()),
        ..Default::default()
    });

    Ok(Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(GPX_CREATOR.to_string()),
        metadata: Some(Metadata {
            name: Some(t.name.clone()),
            author,
            bounds,
            ..Default::default()
        }),
        waypoints,
        tracks,
        ..Default::default()
    })
}

/// Serialize a Trek to GPX 1.1 bytes
pub fn write_trek_gpx(store: &TrekStore, trek: TrekId) -> Result<Vec<u8>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("export::write_trek_gpx");

    let document = trek_to_gpx(store, trek)?;
    let mut body = Vec::new();
    gpx::write(&document, &mut body)?;
    Ok(body)
}

/// Serialize a Trek into a downloadable file named after it
pub fn export_trek(store: &TrekStore, trek: TrekId) -> Result<GpxExport> {
    let body = write_trek_gpx(store, trek)?;
    let name = &store.require_trek(trek)?.name;
    tracing::info!("Exported {trek} ({name}): {} bytes of GPX", body.len());
    Ok(GpxExport {
        file_name: format!("{}.gpx", file_stem(name)),
        content_type: GPX_CONTENT_TYPE,
        body,
    })
}

/// Trek name made safe to use as a file name in any directory
fn file_stem(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    // No hidden files and no `.`/`..` components
    let stem = replaced.trim_start_matches('.').trim();
    if stem.is_empty() {
        "trek".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, Coordinate};
    use crate::model::{MarkerId, NewMarker, RouteDefaults, RouteId, RoutePath};
    use crate::store::RouteOptions;

    struct Fixture {
        store: TrekStore,
        trek: TrekId,
        routes: Vec<RouteId>,
        markers: Vec<MarkerId>,
    }

    /// Two computed Routes sharing the middle marker, plus an empty third Route
    fn fixture() -> Fixture {
        let mut store = TrekStore::new();
        let user = store.add_user("alice", "alice@example.org").unwrap();
        let trek = store.create_trek("Vercors", user, RouteDefaults::default()).unwrap();
        let markers: Vec<_> = [(0.0, 0.0, 100.0), (0.0, 1.0, 150.0), (0.0, 2.0, 100.0)]
            .iter()
            .enumerate()
            .map(|(i, &(lon, lat, ele))| {
                store
                    .create_marker(user, NewMarker::named(format!("M{i}")).at(lon, lat, Some(ele)))
                    .unwrap()
            })
            .collect();
        let mut routes = Vec::new();
        for i in 0..2 {
            let route = store
                .create_route(trek, format!("Day {}", i + 1), RouteOptions::default())
                .unwrap();
            store.append_marker(route, markers[i]).unwrap();
            store.append_marker(route, markers[i + 1]).unwrap();
            let coordinates: Vec<Coordinate> = [markers[i], markers[i + 1]]
                .iter()
                .map(|m| {
                    let l = store.marker(*m).unwrap().location.unwrap();
                    Coordinate::new(l.longitude, l.latitude, l.elevation.unwrap())
                })
                .collect();
            store
                .apply_path(
                    route,
                    RoutePath {
                        geometry: codec::encode(&coordinates),
                        distance: 111_194.9,
                        ascent: 0.0,
                        descent: 0.0,
                    },
                )
                .unwrap();
            routes.push(route);
        }
        routes.push(store.create_route(trek, "Rest day", RouteOptions::default()).unwrap());
        Fixture {
            store,
            trek,
            routes,
            markers,
        }
    }

    #[test]
    fn test_document_structure() {
        let f = fixture();
        let gpx = trek_to_gpx(&f.store, f.trek).unwrap();

        let metadata = gpx.metadata.as_ref().unwrap();
        assert_eq!(metadata.name.as_deref(), Some("Vercors"));
        let author = metadata.author.as_ref().unwrap();
        assert_eq!(author.name.as_deref(), Some("alice"));
        assert_eq!(author.email.as_deref(), Some("alice@example.org"));

        assert_eq!(gpx.tracks.len(), f.routes.len());
        let names: Vec<_> = gpx.tracks.iter().map(|t| t.name.clone().unwrap()).collect();
        assert_eq!(names, ["Day 1", "Day 2", "Rest day"]);
        for track in &gpx.tracks {
            assert_eq!(track.segments.len(), 1);
        }
        assert_eq!(gpx.tracks[0].segments[0].points.len(), 2);
        assert!(gpx.tracks[2].segments[0].points.is_empty());

        let first = &gpx.tracks[1].segments[0].points[0];
        assert_eq!(first.point().y(), 1.0);
        assert_eq!(first.elevation, Some(150.0));
    }

    #[test]
    fn test_shared_markers_are_repeated() {
        let f = fixture();
        let gpx = trek_to_gpx(&f.store, f.trek).unwrap();
        let names: Vec<_> = gpx.waypoints.iter().map(|w| w.name.clone().unwrap()).collect();
        assert_eq!(names, ["M0", "M1", "M1", "M2"]);
    }

    #[test]
    fn test_unresolved_markers_are_skipped() {
        let mut f = fixture();
        f.store.set_marker_location(f.markers[0], None).unwrap();
        let gpx = trek_to_gpx(&f.store, f.trek).unwrap();
        assert_eq!(gpx.waypoints.len(), 3);
        // The location change invalidated the first Route
        assert!(gpx.tracks[0].segments[0].points.is_empty());
    }

    #[test]
    fn test_export_is_deterministic() {
        let f = fixture();
        let first = export_trek(&f.store, f.trek).unwrap();
        let second = export_trek(&f.store, f.trek).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.file_name, "Vercors.gpx");
        assert_eq!(first.content_type, "application/gpx+xml");
    }

    #[test]
    fn test_export_file_name_stays_in_directory() {
        let mut store = TrekStore::new();
        let user = store.add_user("mallory", "mallory@example.org").unwrap();
        for (name, expected) in [
            ("../escaped", "_escaped.gpx"),
            ("a/b", "a_b.gpx"),
            ("..\\windows", "_windows.gpx"),
            ("..", "trek.gpx"),
        ] {
            let trek = store.create_trek(name, user, RouteDefaults::default()).unwrap();
            let file_name = export_trek(&store, trek).unwrap().file_name;
            assert_eq!(file_name, expected);
            assert!(!file_name.contains('/'));
            assert_eq!(std::path::Path::new(&file_name).components().count(), 1);
        }
    }

    #[test]
    fn test_written_document_reads_back() {
        let f = fixture();
        let body = write_trek_gpx(&f.store, f.trek).unwrap();
        let gpx = gpx::read(body.as_slice()).unwrap();
        assert_eq!(gpx.tracks.len(), 3);
        assert_eq!(gpx.waypoints.len(), 4);
        assert_eq!(gpx.tracks[1].name.as_deref(), Some("Day 2"));
        assert_eq!(gpx.tracks[1].segments[0].points.len(), 2);
    }

    #[test]
    fn test_author_without_valid_email() {
        let mut store = TrekStore::new();
        let user = store.add_user("bob", "not an email").unwrap();
        let trek = store.create_trek("Solo", user, RouteDefaults::default()).unwrap();
        let gpx = trek_to_gpx(&store, trek).unwrap();
        let author = gpx.metadata.unwrap().author.unwrap();
        assert_eq!(author.name.as_deref(), Some("bob"));
        assert_eq!(author.email, None);
        assert!(write_trek_gpx(&store, trek).is_ok());
    }

    #[test]
    fn test_unknown_trek() {
        let f = fixture();
        assert!(matches!(
            export_trek(&f.store, TrekId(999)),
            Err(crate::TrekError::NotFound(_))
        ));
    }
}
