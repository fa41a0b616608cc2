#[cfg(test)]
#[path = "../../tests/unit/editing/registry_test.rs"]
mod registry_test;

use crate::construction::RoutePlan;
use crate::models::*;
use crate::services::RouteDocument;
use crate::utils::GenericResult;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// A handler called when route is changed or removed (then route is `None`).
pub type RouteChangedHandler = Box<dyn Fn(&RouteKey, Option<&Route>)>;

/// Provides uniform access to every route in view regardless of its category: main routes with
/// fixed keys, routes created by operator and read-only routes of the same scheduling window.
#[derive(Default)]
pub struct RouteRegistry {
    main: BTreeMap<usize, Route>,
    dynamic: BTreeMap<char, Route>,
    external: BTreeMap<PersistedId, Route>,
    unassigned: Vec<Stop>,
    handlers: FxHashMap<RouteKey, Vec<RouteChangedHandler>>,
}

impl RouteRegistry {
    /// Creates registry from the initial plan: each planned group becomes a draft main route,
    /// overflow stops go to the unassigned pool.
    pub fn from_plan(plan: &RoutePlan) -> Self {
        let mut registry = Self::default();

        plan.routes.iter().enumerate().for_each(|(idx, stops)| {
            let key = RouteKey::Main(idx + 1);
            registry.main.insert(idx + 1, Route::new(key, plan.origin).with_stops(stops.clone()));
        });
        registry.unassigned = plan.overflow.clone();

        registry
    }

    /// Gets route by its key.
    pub fn get(&self, key: &RouteKey) -> Option<&Route> {
        match key {
            RouteKey::Main(number) => self.main.get(number),
            RouteKey::Dynamic(letter) => self.dynamic.get(letter),
            RouteKey::External(id) => self.external.get(id),
        }
    }

    /// Updates route using given function: it receives current route (if any) and returns a new one,
    /// `None` removes the route. Subscribers are notified when the route has changed.
    pub fn set<F>(&mut self, key: &RouteKey, func: F)
    where
        F: FnOnce(Option<Route>) -> Option<Route>,
    {
        let old = self.take(key);
        let old_copy = if self.handlers.contains_key(key) { old.clone() } else { None };

        let new = func(old).map(|mut route| {
            route.key = key.clone();
            route
        });

        let is_changed = old_copy != new;

        if let Some(route) = new {
            self.put(route);
        }

        if is_changed {
            self.fire(key);
        }
    }

    /// Removes route from registry.
    pub fn remove(&mut self, key: &RouteKey) -> Option<Route> {
        let removed = self.take(key);

        if removed.is_some() {
            self.fire(key);
        }

        removed
    }

    /// Returns keys of all routes: main first, then dynamic and external.
    pub fn keys(&self) -> Vec<RouteKey> {
        self.main
            .keys()
            .map(|number| RouteKey::Main(*number))
            .chain(self.dynamic.keys().map(|letter| RouteKey::Dynamic(*letter)))
            .chain(self.external.keys().map(|id| RouteKey::External(id.clone())))
            .collect()
    }

    /// Returns all routes.
    pub fn routes(&self) -> impl Iterator<Item = &Route> + '_ {
        self.main.values().chain(self.dynamic.values()).chain(self.external.values())
    }

    /// Adds a new empty draft route with the next free letter and returns its key.
    pub fn add_route(&mut self, origin: Coordinate) -> GenericResult<RouteKey> {
        // main routes are displayed as first letters of the alphabet
        let letter = ('A'..='Z')
            .skip(self.main.len())
            .find(|letter| !self.dynamic.contains_key(letter))
            .ok_or_else(|| format!("cannot add more than {} routes", ('A'..='Z').count()))?;

        let key = RouteKey::Dynamic(letter);
        self.set(&key, |_| Some(Route::new(key.clone(), origin)));

        Ok(key)
    }

    /// Adds a read-only route from the same scheduling window, keyed by its persisted id.
    pub fn add_external(&mut self, route: Route) -> GenericResult<RouteKey> {
        let id = route.persisted_id.clone().ok_or("external route must have persisted id")?;
        let key = RouteKey::External(id);

        self.set(&key, |_| Some(route));

        Ok(key)
    }

    /// Returns true if the route can be changed only through the two-route transfer path.
    pub fn is_read_only(&self, key: &RouteKey) -> bool {
        key.is_external()
    }

    /// Finds the key of the route which has given persisted id.
    pub fn find_by_persisted_id(&self, id: &str) -> Option<RouteKey> {
        self.routes().find(|route| route.persisted_id.as_deref() == Some(id)).map(|route| route.key.clone())
    }

    /// Applies route snapshot received from the store. Local geometry is kept when the snapshot has
    /// none, unless the route has no stops anymore.
    pub fn apply_snapshot(&mut self, key: &RouteKey, document: &RouteDocument) {
        self.set(key, |route| {
            route.map(|route| Route {
                stops: document.stops.clone(),
                status: document.status,
                agent_id: document.agent_id.clone(),
                geometry: if document.stops.is_empty() { None } else { document.geometry.clone().or(route.geometry) },
                parent_group_id: document.parent_group_id.clone().or(route.parent_group_id),
                ..route
            })
        });
    }

    /// Registers a handler called whenever route with given key changes.
    pub fn on_route_changed(&mut self, key: RouteKey, handler: RouteChangedHandler) {
        self.handlers.entry(key).or_default().push(handler);
    }

    /// Returns stops which are not assigned to any route.
    pub fn unassigned(&self) -> &[Stop] {
        self.unassigned.as_slice()
    }

    /// Adds stops to unassigned pool skipping already present ones.
    pub fn add_unassigned(&mut self, stops: impl IntoIterator<Item = Stop>) {
        stops.into_iter().for_each(|stop| {
            if !self.unassigned.iter().any(|existing| existing.id == stop.id) {
                self.unassigned.push(stop);
            }
        });
    }

    /// Takes stop out of unassigned pool.
    pub fn take_unassigned(&mut self, stop_id: &str) -> Option<Stop> {
        let idx = self.unassigned.iter().position(|stop| stop.id == stop_id)?;
        Some(self.unassigned.remove(idx))
    }

    fn take(&mut self, key: &RouteKey) -> Option<Route> {
        match key {
            RouteKey::Main(number) => self.main.remove(number),
            RouteKey::Dynamic(letter) => self.dynamic.remove(letter),
            RouteKey::External(id) => self.external.remove(id),
        }
    }

    fn put(&mut self, route: Route) {
        match route.key.clone() {
            RouteKey::Main(number) => self.main.insert(number, route),
            RouteKey::Dynamic(letter) => self.dynamic.insert(letter, route),
            RouteKey::External(id) => self.external.insert(id, route),
        };
    }

    fn fire(&self, key: &RouteKey) {
        if let Some(handlers) = self.handlers.get(key) {
            let route = self.get(key);
            handlers.iter().for_each(|handler| handler(key, route));
        }
    }
}
