//! Entities of the trek model
//!
//! Back-references (Route → Trek, Marker ↔ Route) are plain ids resolved
//! through [`crate::TrekStore`]; nothing here owns another entity.

use crate::PositionalList;
use geo::Point;
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " #{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`User`]
    UserId,
    "user"
);
entity_id!(
    /// Identifier of a [`Trek`]
    TrekId,
    "trek"
);
entity_id!(
    /// Identifier of a [`Route`]
    RouteId,
    "route"
);
entity_id!(
    /// Identifier of a [`Marker`]
    MarkerId,
    "marker"
);

/// Travel mode requested from the directions provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TravelMode {
    Driving,
    #[default]
    Cycling,
    Walking,
    Hiking,
}

impl TravelMode {
    pub const ALL: [TravelMode; 4] = [
        TravelMode::Driving,
        TravelMode::Cycling,
        TravelMode::Walking,
        TravelMode::Hiking,
    ];

    /// Routing profile name understood by the directions provider
    pub fn provider_profile(self) -> &'static str {
        match self {
            TravelMode::Driving => "driving-car",
            TravelMode::Cycling => "cycling-regular",
            TravelMode::Walking => "foot-walking",
            TravelMode::Hiking => "foot-hiking",
        }
    }
}

/// Optimization preference requested from the directions provider
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Preference {
    Fastest,
    #[default]
    Shortest,
    Recommended,
}

impl Preference {
    pub const ALL: [Preference; 3] = [
        Preference::Fastest,
        Preference::Shortest,
        Preference::Recommended,
    ];

    pub fn provider_name(self) -> &'static str {
        match self {
            Preference::Fastest => "fastest",
            Preference::Shortest => "shortest",
            Preference::Recommended => "recommended",
        }
    }
}

/// Mode and preference applied to Routes that do not pick their own
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteDefaults {
    pub mode: TravelMode,
    pub preference: Preference,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// A named, ordered collection of Routes owned by a user
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trek {
    pub id: TrekId,
    pub name: String,
    pub owner: UserId,
    pub defaults: RouteDefaults,
    pub(crate) routes: PositionalList<RouteId>,
}

impl Trek {
    /// Routes in Trek order
    pub fn routes(&self) -> &PositionalList<RouteId> {
        &self.routes
    }
}

/// Provider output stored on a Route, present only as a whole
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutePath {
    /// Encoded geometry, see [`crate::codec`]
    pub geometry: String,
    pub distance: f64,
    pub ascent: f64,
    pub descent: f64,
}

/// Recomputation state of a Route
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteState {
    /// Fewer than two markers: nothing to route
    Empty,
    /// Two or more markers, derived fields absent
    Stale,
    /// Derived fields valid for the current marker sequence
    Computed,
}

/// An ordered Marker sequence plus mode/preference and derived path metrics
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub trek: TrekId,
    pub mode: TravelMode,
    pub preference: Preference,
    pub(crate) markers: PositionalList<MarkerId>,
    pub(crate) path: Option<RoutePath>,
}

impl Route {
    /// Markers in route order
    pub fn markers(&self) -> &PositionalList<MarkerId> {
        &self.markers
    }

    /// Derived fields, `None` until a successful computation
    pub fn path(&self) -> Option<&RoutePath> {
        self.path.as_ref()
    }

    pub fn distance(&self) -> Option<f64> {
        self.path.as_ref().map(|p| p.distance)
    }

    pub fn ascent(&self) -> Option<f64> {
        self.path.as_ref().map(|p| p.ascent)
    }

    pub fn descent(&self) -> Option<f64> {
        self.path.as_ref().map(|p| p.descent)
    }

    pub fn geometry(&self) -> Option<&str> {
        self.path.as_ref().map(|p| p.geometry.as_str())
    }

    pub fn state(&self) -> RouteState {
        match (self.markers.len(), &self.path) {
            (0 | 1, _) => RouteState::Empty,
            (_, None) => RouteState::Stale,
            (_, Some(_)) => RouteState::Computed,
        }
    }

    /// Drop derived fields; returns whether anything was cleared
    pub(crate) fn invalidate(&mut self) -> bool {
        let cleared = self.path.take().is_some();
        if cleared {
            tracing::debug!("Invalidated {} ({})", self.id, self.name);
        }
        cleared
    }
}

/// Resolved position of a Marker
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: Option<f64>,
}

impl Location {
    #[inline]
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// A named geographic point; outlives every Route that references it
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Marker {
    pub id: MarkerId,
    pub name: String,
    pub address: Option<String>,
    pub location: Option<Location>,
    pub folder: Option<String>,
    pub country: Option<String>,
    pub owner: UserId,
}

/// Fields for creating a [`Marker`]
#[derive(Clone, Debug, Default)]
pub struct NewMarker {
    pub name: String,
    pub address: Option<String>,
    pub location: Option<Location>,
    pub folder: Option<String>,
    pub country: Option<String>,
}

impl NewMarker {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn at(mut self, longitude: f64, latitude: f64, elevation: Option<f64>) -> Self {
        self.location = Some(Location {
            longitude,
            latitude,
            elevation,
        });
        self
    }
}

/// A join row: `marker` sits at `position` within `route`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteMarker {
    pub route: RouteId,
    pub marker: MarkerId,
    pub position: usize,
}
