//! Trek Library - Route Composition & Geodata Aggregation
//!
//! This library turns ordered sequences of user-selected waypoints into
//! geographically accurate, aggregated treks. Routing, geocoding and elevation
//! lookups are delegated to an external [`GeoProvider`]; everything else
//! (ordering, invalidation, aggregation, GPX export) happens here.
//!
//! # Architecture
//!
//! - **[`PositionalList`]**: contiguous 0-based ordering for Routes-in-Trek and
//!   Markers-in-Route
//! - **[`codec`]**: decoding of the provider's encoded geometry
//! - **[`TrekStore`]**: entity lookup store with explicit cascade rules
//! - **[`Composer`]**: per-Route recomputation state machine around the provider
//! - **[`aggregate`]**: Trek totals and the elevation profile
//! - **[`export`]**: GPX interchange document writer
//!
//! # Example
//!
//! ```rust
//! use trek_lib::{NewMarker, RouteDefaults, RouteOptions, TrekStore, aggregate};
//!
//! # fn main() -> trek_lib::Result<()> {
//! let mut store = TrekStore::new();
//! let user = store.add_user("alice", "alice@example.org")?;
//! let trek = store.create_trek("Alps", user, RouteDefaults::default())?;
//! let route = store.create_route(trek, "Day 1", RouteOptions::default())?;
//! let start = store.create_marker(user, NewMarker::named("Start").at(5.72, 45.18, None))?;
//! store.append_marker(route, start)?;
//!
//! let summary = aggregate::summarize(&store, trek)?;
//! assert_eq!(summary.route_count, 1);
//! assert_eq!(summary.total_distance, 0.0);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod codec;
mod composer;
pub mod export;
mod model;
mod ordering;
mod provider;
#[cfg(feature = "serde")]
pub mod snapshot;
mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

// Public API exports
pub use codec::Coordinate;
pub use composer::{Composer, RecomputeOutcome, ResolveOutcome, RetryReason};
pub use model::{
    Location, Marker, MarkerId, NewMarker, Preference, Route, RouteDefaults, RouteId,
    RouteMarker, RoutePath, RouteState, TravelMode, Trek, TrekId, User, UserId,
};
pub use ordering::{PositionalList, Slot};
pub use provider::{Directions, GeoProvider};
pub use store::{RouteOptions, TrekStore};

/// Persisted bound on the encoded geometry column
pub const DEFAULT_MAX_GEOMETRY_LEN: usize = 8192;

/// Configuration for the [`Composer`]
#[derive(Debug, Clone)]
pub struct Config {
    /// Mode and preference given to new Treks (and inherited by their Routes)
    pub route_defaults: RouteDefaults,
    /// Upper bound on every provider call
    pub provider_timeout: Duration,
    /// Longest encoded geometry a Route may store.
    /// Longer provider output is rejected instead of truncated.
    pub max_geometry_len: usize,
    /// Sphere radius used for elevation-profile distances.
    ///
    /// The default [`utils::MEAN_EARTH_RADIUS_M`] (6,371,000 m) gives
    /// 111.19 km per degree of latitude. [`utils::PROVIDER_EARTH_RADIUS_M`]
    /// (6,372,800 m) gives 111.23 km and matches the distances of tools built
    /// on that radius. Pick one per deployment; profiles are not comparable
    /// across radii.
    pub earth_radius_m: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            route_defaults: RouteDefaults::default(),
            provider_timeout: Duration::from_secs(10),
            max_geometry_len: DEFAULT_MAX_GEOMETRY_LEN,
            earth_radius_m: utils::MEAN_EARTH_RADIUS_M,
        }
    }
}

/// Error types for the trek library
#[derive(Debug, thiserror::Error)]
pub enum TrekError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index {index} out of range for collection of length {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("Name already in use: {0}")]
    DuplicateName(String),

    #[error("{0} has no resolved coordinates")]
    UnresolvedMarker(MarkerId),

    #[error("Encoded geometry of {len} characters exceeds the {max} character limit")]
    GeometryTooLong { len: usize, max: usize },

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrekError>;
