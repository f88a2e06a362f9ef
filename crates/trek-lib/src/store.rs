//! TrekStore - entity lookup store with ordering and cascade rules
//!
//! The store owns every User, Trek, Route and Marker and is the only place
//! where relationships are followed. Deletions cascade explicitly:
//!
//! - Trek → its Routes → their RouteMarker rows (never Markers)
//! - Route → its RouteMarker rows
//! - Marker → the RouteMarker rows pointing at it; affected Routes shrink and
//!   are invalidated
//! - User → their Treks and Markers
//!
//! Every marker-sequence change clears the Route's derived fields before
//! returning. Nothing in the store talks to the directions provider.

use crate::model::{
    Location, Marker, MarkerId, NewMarker, Preference, Route, RouteDefaults, RouteId,
    RouteMarker, RoutePath, TravelMode, Trek, TrekId, User, UserId,
};
use crate::{PositionalList, Result, TrekError};
use geo::Point;
use std::collections::BTreeMap;

/// Mode/preference picked for a single Route; `None` inherits from the Trek
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteOptions {
    pub mode: Option<TravelMode>,
    pub preference: Option<Preference>,
}

#[derive(Clone, Debug, Default)]
pub struct TrekStore {
    pub(crate) next_id: u64,
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) treks: BTreeMap<TrekId, Trek>,
    pub(crate) routes: BTreeMap<RouteId, Route>,
    pub(crate) markers: BTreeMap<MarkerId, Marker>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrekStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // ---------------------------------------------------------------- users

    pub fn add_user(&mut self, username: impl Into<String>, email: impl Into<String>) -> Result<UserId> {
        let username = username.into();
        if self.users.values().any(|u| u.username == username) {
            return Err(TrekError::DuplicateName(username));
        }
        let id = UserId(self.allocate_id());
        self.users.insert(
            id,
            User {
                id,
                username,
                email: email.into(),
            },
        );
        Ok(id)
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Delete a user together with their Treks and Markers
    pub fn delete_user(&mut self, id: UserId) -> Result<()> {
        if !self.users.contains_key(&id) {
            return Err(not_found(id));
        }
        let treks: Vec<TrekId> = self
            .treks
            .values()
            .filter(|t| t.owner == id)
            .map(|t| t.id)
            .collect();
        for trek in treks {
            self.delete_trek(trek)?;
        }
        let markers: Vec<MarkerId> = self
            .markers
            .values()
            .filter(|m| m.owner == id)
            .map(|m| m.id)
            .collect();
        for marker in markers {
            self.delete_marker(marker)?;
        }
        self.users.remove(&id);
        tracing::info!("Deleted {id}");
        Ok(())
    }

    // ---------------------------------------------------------------- treks

    pub fn create_trek(
        &mut self,
        name: impl Into<String>,
        owner: UserId,
        defaults: RouteDefaults,
    ) -> Result<TrekId> {
        let name = name.into();
        if !self.users.contains_key(&owner) {
            return Err(not_found(owner));
        }
        if self.trek_by_name(&name).is_some() {
            return Err(TrekError::DuplicateName(name));
        }
        let id = TrekId(self.allocate_id());
        self.treks.insert(
            id,
            Trek {
                id,
                name,
                owner,
                defaults,
                routes: PositionalList::new(),
            },
        );
        Ok(id)
    }

    pub fn trek(&self, id: TrekId) -> Option<&Trek> {
        self.treks.get(&id)
    }

    pub fn trek_by_name(&self, name: &str) -> Option<&Trek> {
        self.treks.values().find(|t| t.name == name)
    }

    pub fn treks(&self) -> impl Iterator<Item = &Trek> + '_ {
        self.treks.values()
    }

    pub(crate) fn require_trek(&self, id: TrekId) -> Result<&Trek> {
        self.treks.get(&id).ok_or_else(|| not_found(id))
    }

    /// Delete a Trek and its Routes; Markers are left alone
    ///
    /// Returns the ids of the Routes that were removed.
    pub fn delete_trek(&mut self, id: TrekId) -> Result<Vec<RouteId>> {
        let trek = self.treks.remove(&id).ok_or_else(|| not_found(id))?;
        let removed: Vec<RouteId> = trek.routes.iter().copied().collect();
        for route in &removed {
            self.routes.remove(route);
        }
        tracing::info!("Deleted {id} ({}) with {} routes", trek.name, removed.len());
        Ok(removed)
    }

    // --------------------------------------------------------------- routes

    /// Create a Route at the end of the Trek
    pub fn create_route(
        &mut self,
        trek: TrekId,
        name: impl Into<String>,
        options: RouteOptions,
    ) -> Result<RouteId> {
        let len = self.require_trek(trek)?.routes.len();
        self.create_route_at(trek, len, name, options)
    }

    /// Create a Route at `index` within the Trek, shifting later Routes
    pub fn create_route_at(
        &mut self,
        trek: TrekId,
        index: usize,
        name: impl Into<String>,
        options: RouteOptions,
    ) -> Result<RouteId> {
        let defaults = self.require_trek(trek)?.defaults;
        let len = self.require_trek(trek)?.routes.len();
        if index > len {
            return Err(TrekError::OutOfRange { index, len });
        }

        let id = RouteId(self.allocate_id());
        if let Some(t) = self.treks.get_mut(&trek) {
            t.routes.insert(index, id)?;
        }
        self.routes.insert(
            id,
            Route {
                id,
                name: name.into(),
                trek,
                mode: options.mode.unwrap_or(defaults.mode),
                preference: options.preference.unwrap_or(defaults.preference),
                markers: PositionalList::new(),
                path: None,
            },
        );
        Ok(id)
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    pub(crate) fn require_route(&self, id: RouteId) -> Result<&Route> {
        self.routes.get(&id).ok_or_else(|| not_found(id))
    }

    fn require_route_mut(&mut self, id: RouteId) -> Result<&mut Route> {
        self.routes.get_mut(&id).ok_or_else(|| not_found(id))
    }

    /// Routes of a Trek in Trek order
    pub fn trek_routes(&self, trek: TrekId) -> Result<Vec<&Route>> {
        self.require_trek(trek)?
            .routes
            .iter()
            .map(|id| self.require_route(*id))
            .collect()
    }

    /// Move a Route to `index` within its Trek
    pub fn move_route(&mut self, route: RouteId, index: usize) -> Result<()> {
        let trek = self.require_route(route)?.trek;
        let trek = self.treks.get_mut(&trek).ok_or_else(|| not_found(trek))?;
        trek.routes.move_item(&route, index)
    }

    /// Delete a Route and its RouteMarker rows
    pub fn delete_route(&mut self, id: RouteId) -> Result<()> {
        let trek = self.require_route(id)?.trek;
        if let Some(trek) = self.treks.get_mut(&trek) {
            trek.routes.remove(&id)?;
        }
        let route = self.routes.remove(&id).ok_or_else(|| not_found(id))?;
        tracing::debug!("Deleted {id} ({})", route.name);
        Ok(())
    }

    /// Change mode and/or preference; the Route is invalidated when either changes
    pub fn set_route_options(&mut self, id: RouteId, options: RouteOptions) -> Result<bool> {
        let route = self.require_route_mut(id)?;
        let mode = options.mode.unwrap_or(route.mode);
        let preference = options.preference.unwrap_or(route.preference);
        if mode == route.mode && preference == route.preference {
            return Ok(false);
        }
        route.mode = mode;
        route.preference = preference;
        route.invalidate();
        Ok(true)
    }

    // -------------------------------------------------------------- markers

    pub fn create_marker(&mut self, owner: UserId, new: NewMarker) -> Result<MarkerId> {
        if !self.users.contains_key(&owner) {
            return Err(not_found(owner));
        }
        if self.markers.values().any(|m| m.name == new.name) {
            return Err(TrekError::DuplicateName(new.name));
        }
        if let Some(address) = &new.address {
            if self
                .markers
                .values()
                .any(|m| m.address.as_deref() == Some(address.as_str()))
            {
                return Err(TrekError::DuplicateName(address.clone()));
            }
        }

        let id = MarkerId(self.allocate_id());
        self.markers.insert(
            id,
            Marker {
                id,
                name: new.name,
                address: new.address,
                location: new.location,
                folder: new.folder,
                country: new.country,
                owner,
            },
        );
        Ok(id)
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    pub(crate) fn require_marker(&self, id: MarkerId) -> Result<&Marker> {
        self.markers.get(&id).ok_or_else(|| not_found(id))
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> + '_ {
        self.markers.values()
    }

    /// Routes whose sequence contains `marker`, in id order
    pub fn routes_with_marker(&self, marker: MarkerId) -> Vec<RouteId> {
        self.routes
            .values()
            .filter(|r| r.markers.contains(&marker))
            .map(|r| r.id)
            .collect()
    }

    /// Replace a Marker's resolved location, invalidating every Route using it
    pub fn set_marker_location(
        &mut self,
        id: MarkerId,
        location: Option<Location>,
    ) -> Result<Vec<RouteId>> {
        let marker = self.markers.get_mut(&id).ok_or_else(|| not_found(id))?;
        if marker.location == location {
            return Ok(Vec::new());
        }
        marker.location = location;

        let affected = self.routes_with_marker(id);
        for route in &affected {
            if let Some(route) = self.routes.get_mut(route) {
                route.invalidate();
            }
        }
        Ok(affected)
    }

    /// Delete a Marker; Routes that referenced it shrink and are invalidated
    ///
    /// Returns the ids of the affected Routes.
    pub fn delete_marker(&mut self, id: MarkerId) -> Result<Vec<RouteId>> {
        let marker = self.markers.remove(&id).ok_or_else(|| not_found(id))?;
        let mut affected = Vec::new();
        for route in self.routes.values_mut() {
            if route.markers.retain(|m| *m != id) > 0 {
                route.invalidate();
                affected.push(route.id);
            }
        }
        tracing::info!(
            "Deleted {id} ({}), shrinking {} routes",
            marker.name,
            affected.len()
        );
        Ok(affected)
    }

    // ------------------------------------------------- route marker sequence

    /// Append a Marker to the Route's sequence
    pub fn append_marker(&mut self, route: RouteId, marker: MarkerId) -> Result<usize> {
        self.require_marker(marker)?;
        let route = self.require_route_mut(route)?;
        let position = route.markers.append(marker);
        route.invalidate();
        Ok(position)
    }

    /// Insert a Marker at `index` in the Route's sequence
    pub fn insert_marker(&mut self, route: RouteId, index: usize, marker: MarkerId) -> Result<()> {
        self.require_marker(marker)?;
        let route = self.require_route_mut(route)?;
        route.markers.insert(index, marker)?;
        route.invalidate();
        Ok(())
    }

    /// Remove the first occurrence of a Marker from the Route's sequence
    pub fn remove_marker(&mut self, route: RouteId, marker: MarkerId) -> Result<usize> {
        let route = self.require_route_mut(route)?;
        let position = route.markers.remove(&marker)?;
        route.invalidate();
        Ok(position)
    }

    /// Move the first occurrence of a Marker to `index`
    pub fn move_marker(&mut self, route: RouteId, marker: MarkerId, index: usize) -> Result<()> {
        let route = self.require_route_mut(route)?;
        route.markers.move_item(&marker, index)?;
        route.invalidate();
        Ok(())
    }

    /// Ordered `(longitude, latitude)` waypoints of a Route
    ///
    /// Fails with [`TrekError::UnresolvedMarker`] when any Marker lacks coordinates.
    pub fn waypoints(&self, route: RouteId) -> Result<Vec<Point<f64>>> {
        self.require_route(route)?
            .markers
            .iter()
            .map(|id| {
                self.require_marker(*id)?
                    .location
                    .map(|l| l.point())
                    .ok_or(TrekError::UnresolvedMarker(*id))
            })
            .collect()
    }

    /// Store provider output; all four derived fields are written together
    pub(crate) fn apply_path(&mut self, route: RouteId, path: RoutePath) -> Result<()> {
        let route = self.require_route_mut(route)?;
        debug_assert!(route.markers.len() >= 2, "path stored on a route without two markers");
        route.path = Some(path);
        Ok(())
    }

    // ----------------------------------------------------------- inspection

    /// RouteMarker join rows of one Route, in position order
    pub fn route_markers(&self, route: RouteId) -> Result<Vec<RouteMarker>> {
        let route = self.require_route(route)?;
        Ok(route
            .markers
            .slots()
            .iter()
            .map(|slot| RouteMarker {
                route: route.id,
                marker: slot.value,
                position: slot.position,
            })
            .collect())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn trek_count(&self) -> usize {
        self.treks.len()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn route_marker_count(&self) -> usize {
        self.routes.values().map(|r| r.markers.len()).sum()
    }

    /// Verify ordering, reference and derived-field invariants
    pub fn check_invariants(&self) -> Result<()> {
        for trek in self.treks.values() {
            if !self.users.contains_key(&trek.owner) {
                return Err(corrupt(format!("{} owned by missing {}", trek.id, trek.owner)));
            }
            if !trek.routes.is_contiguous() {
                return Err(corrupt(format!("{} has gapped route positions", trek.id)));
            }
            for route in trek.routes.iter() {
                match self.routes.get(route) {
                    Some(r) if r.trek == trek.id => {}
                    _ => return Err(corrupt(format!("{} lists foreign {route}", trek.id))),
                }
            }
        }
        for route in self.routes.values() {
            let listed = self
                .treks
                .get(&route.trek)
                .map(|t| t.routes.iter().filter(|r| **r == route.id).count());
            if listed != Some(1) {
                return Err(corrupt(format!("{} not listed once by {}", route.id, route.trek)));
            }
            if !route.markers.is_contiguous() {
                return Err(corrupt(format!("{} has gapped marker positions", route.id)));
            }
            if let Some(missing) = route.markers.iter().find(|m| !self.markers.contains_key(*m)) {
                return Err(corrupt(format!("{} references missing {missing}", route.id)));
            }
            if route.path.is_some() && route.markers.len() < 2 {
                return Err(corrupt(format!("{} has a path with fewer than two markers", route.id)));
            }
        }
        for marker in self.markers.values() {
            if !self.users.contains_key(&marker.owner) {
                return Err(corrupt(format!("{} owned by missing {}", marker.id, marker.owner)));
            }
        }
        Ok(())
    }
}

fn not_found(id: impl std::fmt::Display) -> TrekError {
    TrekError::NotFound(id.to_string())
}

fn corrupt(reason: String) -> TrekError {
    TrekError::CorruptSnapshot(reason)
}
