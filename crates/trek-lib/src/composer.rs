//! Composer - Route recomputation controller around a shared [`TrekStore`]
//!
//! A Route moves between three states (see [`RouteState`]):
//!
//! - any marker add/remove/reorder clears its derived fields at once
//!   (`Stale` with two or more markers, `Empty` otherwise);
//! - [`Composer::recompute`] on a `Stale` Route asks the provider for
//!   directions and stores the result atomically (`Computed`), or leaves the
//!   Route `Stale` and reports [`RecomputeOutcome::Retry`].
//!
//! Each Route has its own async mutex. Marker mutations and the whole
//! recompute (including the provider call) run under it, so a recompute always
//! reflects a settled marker sequence. The store lock itself is only held for
//! short synchronous sections, never across a provider call. Dropping a
//! recompute future cancels it without writing anything.

use crate::aggregate::{self, ProfileSample, TrekSummary};
use crate::export::{self, GpxExport};
use crate::model::{
    Location, MarkerId, NewMarker, RouteId, RoutePath, RouteState, TrekId, UserId,
};
use crate::provider::GeoProvider;
use crate::store::{RouteOptions, TrekStore};
use crate::{Config, Result, TrekError};
use dashmap::DashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Why a provider-backed operation should be retried later
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryReason {
    /// The provider returned no answer
    Unavailable,
    /// The provider did not answer within [`Config::provider_timeout`]
    TimedOut,
}

/// Result of [`Composer::recompute`] / [`Composer::refresh`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// Fewer than two markers; nothing was requested
    Empty,
    /// Derived fields were already valid; nothing was requested
    UpToDate,
    /// Derived fields were stored for the current marker sequence
    Computed,
    /// The provider failed; the Route is unchanged
    Retry(RetryReason),
}

/// Result of [`Composer::resolve_marker`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResolveOutcome {
    Resolved(Location),
    Retry(RetryReason),
}

pub struct Composer {
    store: RwLock<TrekStore>,
    provider: Arc<dyn GeoProvider>,
    config: Config,
    route_locks: DashMap<RouteId, Arc<Mutex<()>>>,
}

impl Composer {
    pub fn new(store: TrekStore, provider: Arc<dyn GeoProvider>, config: Config) -> Self {
        Self {
            store: RwLock::new(store),
            provider,
            config,
            route_locks: DashMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `f` against a consistent view of the store
    pub fn read<R>(&self, f: impl FnOnce(&TrekStore) -> R) -> R {
        f(&self.read_store())
    }

    pub fn into_store(self) -> TrekStore {
        self.store
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_store(&self) -> RwLockReadGuard<'_, TrekStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, TrekStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn route_lock(&self, route: RouteId) -> Arc<Mutex<()>> {
        self.route_locks.entry(route).or_default().clone()
    }

    async fn lock_route(&self, route: RouteId) -> OwnedMutexGuard<()> {
        self.route_lock(route).lock_owned().await
    }

    /// Lock several Routes in id order so that concurrent callers cannot deadlock
    async fn lock_routes(&self, mut routes: Vec<RouteId>) -> Vec<OwnedMutexGuard<()>> {
        routes.sort_unstable();
        routes.dedup();
        let mut guards = Vec::with_capacity(routes.len());
        for route in routes {
            guards.push(self.lock_route(route).await);
        }
        guards
    }

    fn forget_routes(&self, routes: &[RouteId]) {
        for route in routes {
            self.route_locks.remove(route);
        }
    }

    // ------------------------------------------------- entity construction

    pub fn add_user(&self, username: &str, email: &str) -> Result<UserId> {
        self.write_store().add_user(username, email)
    }

    /// Create a Trek using [`Config::route_defaults`]
    pub fn create_trek(&self, name: &str, owner: UserId) -> Result<TrekId> {
        let defaults = self.config.route_defaults;
        self.write_store().create_trek(name, owner, defaults)
    }

    pub fn create_route(&self, trek: TrekId, name: &str, options: RouteOptions) -> Result<RouteId> {
        self.write_store().create_route(trek, name, options)
    }

    pub fn create_route_at(
        &self,
        trek: TrekId,
        index: usize,
        name: &str,
        options: RouteOptions,
    ) -> Result<RouteId> {
        self.write_store().create_route_at(trek, index, name, options)
    }

    pub fn move_route(&self, route: RouteId, index: usize) -> Result<()> {
        self.write_store().move_route(route, index)
    }

    pub fn create_marker(&self, owner: UserId, marker: NewMarker) -> Result<MarkerId> {
        self.write_store().create_marker(owner, marker)
    }

    // ------------------------------------------------------ route mutation

    pub async fn append_marker(&self, route: RouteId, marker: MarkerId) -> Result<usize> {
        let _guard = self.lock_route(route).await;
        self.write_store().append_marker(route, marker)
    }

    pub async fn insert_marker(&self, route: RouteId, index: usize, marker: MarkerId) -> Result<()> {
        let _guard = self.lock_route(route).await;
        self.write_store().insert_marker(route, index, marker)
    }

    pub async fn remove_marker(&self, route: RouteId, marker: MarkerId) -> Result<usize> {
        let _guard = self.lock_route(route).await;
        self.write_store().remove_marker(route, marker)
    }

    pub async fn move_marker(&self, route: RouteId, marker: MarkerId, index: usize) -> Result<()> {
        let _guard = self.lock_route(route).await;
        self.write_store().move_marker(route, marker, index)
    }

    pub async fn set_route_options(&self, route: RouteId, options: RouteOptions) -> Result<bool> {
        let _guard = self.lock_route(route).await;
        self.write_store().set_route_options(route, options)
    }

    pub async fn delete_route(&self, route: RouteId) -> Result<()> {
        let _guard = self.lock_route(route).await;
        self.write_store().delete_route(route)?;
        self.forget_routes(&[route]);
        Ok(())
    }

    pub async fn delete_trek(&self, trek: TrekId) -> Result<Vec<RouteId>> {
        loop {
            let affected = self.trek_routes_in(&self.read_store(), trek)?;
            let _guards = self.lock_routes(affected.clone()).await;
            let deleted = {
                let mut store = self.write_store();
                // A Route may have been created in the Trek while we waited
                if self.trek_routes_in(&store, trek)? == affected {
                    Some(store.delete_trek(trek))
                } else {
                    None
                }
            };
            if let Some(result) = deleted {
                let removed = result?;
                self.forget_routes(&removed);
                return Ok(removed);
            }
        }
    }

    fn trek_routes_in(&self, store: &TrekStore, trek: TrekId) -> Result<Vec<RouteId>> {
        let mut routes: Vec<RouteId> = store.require_trek(trek)?.routes().iter().copied().collect();
        routes.sort_unstable();
        Ok(routes)
    }

    /// Delete a user with their Treks and Markers
    pub async fn delete_user(&self, user: UserId) -> Result<()> {
        loop {
            let affected = self.user_routes(user);
            let _guards = self.lock_routes(affected.clone()).await;
            let deleted = {
                let mut store = self.write_store();
                if self.user_routes_in(&store, user) == affected {
                    let removed: Vec<RouteId> = store
                        .treks()
                        .filter(|t| t.owner == user)
                        .flat_map(|t| t.routes().iter().copied())
                        .collect();
                    Some(store.delete_user(user).map(|()| removed))
                } else {
                    None
                }
            };
            if let Some(result) = deleted {
                self.forget_routes(&result?);
                return Ok(());
            }
        }
    }

    fn user_routes(&self, user: UserId) -> Vec<RouteId> {
        self.user_routes_in(&self.read_store(), user)
    }

    /// Routes in the user's Treks plus Routes using any of the user's Markers
    fn user_routes_in(&self, store: &TrekStore, user: UserId) -> Vec<RouteId> {
        let mut routes: Vec<RouteId> = store
            .treks()
            .filter(|t| t.owner == user)
            .flat_map(|t| t.routes().iter().copied())
            .collect();
        for marker in store.markers().filter(|m| m.owner == user) {
            routes.extend(store.routes_with_marker(marker.id));
        }
        routes.sort_unstable();
        routes.dedup();
        routes
    }

    /// Delete a Marker, shrinking and invalidating every Route that used it
    pub async fn delete_marker(&self, marker: MarkerId) -> Result<Vec<RouteId>> {
        loop {
            let affected = self.read_store().routes_with_marker(marker);
            let _guards = self.lock_routes(affected.clone()).await;
            let deleted = {
                let mut store = self.write_store();
                // The marker may have been added to another Route while we waited
                if store.routes_with_marker(marker) == affected {
                    Some(store.delete_marker(marker))
                } else {
                    None
                }
            };
            if let Some(result) = deleted {
                return result;
            }
        }
    }

    /// Replace a Marker's location, invalidating every Route that used it
    pub async fn set_marker_location(
        &self,
        marker: MarkerId,
        location: Option<Location>,
    ) -> Result<Vec<RouteId>> {
        loop {
            let affected = self.read_store().routes_with_marker(marker);
            let _guards = self.lock_routes(affected.clone()).await;
            let updated = {
                let mut store = self.write_store();
                if store.routes_with_marker(marker) == affected {
                    Some(store.set_marker_location(marker, location))
                } else {
                    None
                }
            };
            if let Some(result) = updated {
                return result;
            }
        }
    }

    // -------------------------------------------------------- provider I/O

    async fn bounded<T>(&self, call: impl Future<Output = Option<T>>) -> std::result::Result<T, RetryReason> {
        match tokio::time::timeout(self.config.provider_timeout, call).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(RetryReason::Unavailable),
            Err(_) => Err(RetryReason::TimedOut),
        }
    }

    /// Compute a `Stale` Route's derived fields; no-op when `Empty` or `Computed`
    pub async fn recompute(&self, route: RouteId) -> Result<RecomputeOutcome> {
        self.compute(route, false).await
    }

    /// Like [`Composer::recompute`] but also asks the provider again when `Computed`
    pub async fn refresh(&self, route: RouteId) -> Result<RecomputeOutcome> {
        self.compute(route, true).await
    }

    async fn compute(&self, route: RouteId, force: bool) -> Result<RecomputeOutcome> {
        let _guard = self.lock_route(route).await;

        let (waypoints, mode, preference) = {
            let store = self.read_store();
            let r = store.require_route(route)?;
            match r.state() {
                RouteState::Empty => return Ok(RecomputeOutcome::Empty),
                RouteState::Computed if !force => return Ok(RecomputeOutcome::UpToDate),
                RouteState::Stale | RouteState::Computed => {}
            }
            (store.waypoints(route)?, r.mode, r.preference)
        };

        tracing::debug!(
            "Requesting directions for {route}: {} waypoints, {}/{}",
            waypoints.len(),
            mode.provider_profile(),
            preference.provider_name()
        );

        let directions = match self
            .bounded(self.provider.directions(&waypoints, mode, preference))
            .await
        {
            Ok(directions) => directions,
            Err(reason) => {
                tracing::warn!("Directions for {route} failed ({reason:?}); try again later");
                return Ok(RecomputeOutcome::Retry(reason));
            }
        };

        let len = directions.geometry.chars().count();
        if len > self.config.max_geometry_len {
            tracing::warn!("Directions for {route} returned {len} characters of geometry");
            return Err(TrekError::GeometryTooLong {
                len,
                max: self.config.max_geometry_len,
            });
        }

        self.write_store().apply_path(
            route,
            RoutePath {
                geometry: directions.geometry,
                distance: directions.distance,
                ascent: directions.ascent,
                descent: directions.descent,
            },
        )?;
        tracing::info!(
            "Computed {route}: {:.0} m, +{:.0} m / -{:.0} m",
            directions.distance,
            directions.ascent,
            directions.descent
        );
        Ok(RecomputeOutcome::Computed)
    }

    /// Geocode a Marker's address and look up its elevation
    ///
    /// Longitude, latitude and elevation are written together, only when both
    /// provider calls succeed.
    pub async fn resolve_marker(&self, marker: MarkerId) -> Result<ResolveOutcome> {
        let address = self
            .read_store()
            .require_marker(marker)?
            .address
            .clone()
            .ok_or_else(|| TrekError::NotFound(format!("address of {marker}")))?;

        let point = match self.bounded(self.provider.search(&address)).await {
            Ok(point) => point,
            Err(reason) => {
                tracing::warn!("Geocoding {marker} ({address}) failed ({reason:?})");
                return Ok(ResolveOutcome::Retry(reason));
            }
        };
        let elevation = match self
            .bounded(self.provider.elevation(point.y(), point.x()))
            .await
        {
            Ok(elevation) => elevation,
            Err(reason) => {
                tracing::warn!("Elevation lookup for {marker} failed ({reason:?})");
                return Ok(ResolveOutcome::Retry(reason));
            }
        };

        let location = Location {
            longitude: point.x(),
            latitude: point.y(),
            elevation: Some(elevation),
        };
        self.set_marker_location(marker, Some(location)).await?;
        Ok(ResolveOutcome::Resolved(location))
    }

    // --------------------------------------------------------- aggregation

    pub fn summary(&self, trek: TrekId) -> Result<TrekSummary> {
        aggregate::summarize(&self.read_store(), trek)
    }

    pub fn elevation_profile(&self, trek: TrekId) -> Result<Vec<ProfileSample>> {
        aggregate::elevation_profile(&self.read_store(), trek, self.config.earth_radius_m)
    }

    pub fn export_gpx(&self, trek: TrekId) -> Result<GpxExport> {
        export::export_trek(&self.read_store(), trek)
    }
}
