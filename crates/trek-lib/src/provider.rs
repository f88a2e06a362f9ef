//! Capability surface of the external geodata provider
//!
//! The concrete network client lives outside this crate. Every method returns
//! `None` when the provider cannot answer (connection failure, empty result);
//! callers treat that as "try again", never as a hard error.

use crate::model::{Preference, TravelMode};
use async_trait::async_trait;
use geo::Point;

/// Directions result for an ordered list of waypoints
#[derive(Clone, Debug, PartialEq)]
pub struct Directions {
    /// Encoded geometry with elevation, see [`crate::codec`]
    pub geometry: String,
    pub distance: f64,
    pub ascent: f64,
    pub descent: f64,
}

/// Geocoding, elevation and routing capabilities
///
/// Points are `(x = longitude, y = latitude)` in degrees.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Resolve a free-form address to a position
    async fn search(&self, address: &str) -> Option<Point<f64>>;

    /// Ground elevation in meters at a position
    async fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64>;

    /// Route through `waypoints` in order, with elevation-augmented geometry
    async fn directions(
        &self,
        waypoints: &[Point<f64>],
        mode: TravelMode,
        preference: Preference,
    ) -> Option<Directions>;
}
