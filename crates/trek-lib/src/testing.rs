//! Scripted provider used by the unit tests

use crate::codec::{self, Coordinate};
use crate::model::{Preference, TravelMode};
use crate::provider::{Directions, GeoProvider};
use async_trait::async_trait;
use geo::Point;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DirectionsRequest {
    pub waypoints: Vec<Point<f64>>,
    pub mode: TravelMode,
    pub preference: Preference,
}

/// Provider answering from canned data
///
/// By default `directions` returns a straight path through the waypoints at a
/// fixed elevation with distance equal to the number of waypoints.
#[derive(Default)]
pub(crate) struct FakeProvider {
    pub available: Mutex<bool>,
    pub addresses: Mutex<HashMap<String, Point<f64>>>,
    pub elevation: Mutex<Option<f64>>,
    pub canned: Mutex<Option<Directions>>,
    pub delay: Option<Duration>,
    pub gate: Option<Arc<Semaphore>>,
    pub directions_calls: AtomicUsize,
    pub requests: Mutex<Vec<DirectionsRequest>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            available: Mutex::new(true),
            elevation: Mutex::new(Some(221.0)),
            ..Default::default()
        }
    }

    pub fn unavailable() -> Self {
        let provider = Self::new();
        provider.set_available(false);
        provider
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Directions calls block until a permit is added to the returned semaphore
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let provider = Self {
            gate: Some(gate.clone()),
            ..Self::new()
        };
        (provider, gate)
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock().unwrap() = available;
    }

    pub fn set_canned(&self, directions: Directions) {
        *self.canned.lock().unwrap() = Some(directions);
    }

    pub fn add_address(&self, address: &str, point: Point<f64>) {
        self.addresses
            .lock()
            .unwrap()
            .insert(address.to_string(), point);
    }

    pub fn calls(&self) -> usize {
        self.directions_calls.load(Ordering::SeqCst)
    }

    fn is_available(&self) -> bool {
        *self.available.lock().unwrap()
    }
}

#[async_trait]
impl GeoProvider for FakeProvider {
    async fn search(&self, address: &str) -> Option<Point<f64>> {
        if !self.is_available() {
            return None;
        }
        self.addresses.lock().unwrap().get(address).copied()
    }

    async fn elevation(&self, _latitude: f64, _longitude: f64) -> Option<f64> {
        if !self.is_available() {
            return None;
        }
        *self.elevation.lock().unwrap()
    }

    async fn directions(
        &self,
        waypoints: &[Point<f64>],
        mode: TravelMode,
        preference: Preference,
    ) -> Option<Directions> {
        self.directions_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(DirectionsRequest {
            waypoints: waypoints.to_vec(),
            mode,
            preference,
        });
        if let Some(gate) = &self.gate {
            gate.acquire().await.ok()?.forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.is_available() {
            return None;
        }
        if let Some(canned) = self.canned.lock().unwrap().clone() {
            return Some(canned);
        }

        let coordinates: Vec<Coordinate> = waypoints
            .iter()
            .map(|p| Coordinate::new(p.x(), p.y(), 100.0))
            .collect();
        Some(Directions {
            geometry: codec::encode(&coordinates),
            distance: waypoints.len() as f64,
            ascent: 0.0,
            descent: 0.0,
        })
    }
}
