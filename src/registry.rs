//! # Route Registry Module
//!
//! Holds the routes an engine will attach and hands them back in
//! registration order.
//!
//! Routes are keyed by [`RouteId`], so registering the same route twice is a
//! no-op. Structurally identical routes built separately keep distinct ids and
//! are both kept. Order is decided by the registry's [`RouteOrdering`]; with
//! [`SpecificityOrdering`] a route can never be registered after another route
//! that would shadow it.

use crate::route::{Route, RouteId, RouteOrdering, Routes, SpecificityOrdering};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct RouteRegistry<C> {
    routes: HashMap<RouteId, Route<C>>,
    ordering: Arc<dyn RouteOrdering<C>>,
}

impl<C: Send + Sync + 'static> Default for RouteRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Send + Sync + 'static> RouteRegistry<C> {
    /// Empty registry ordered by [`SpecificityOrdering`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_ordering(Arc::new(SpecificityOrdering))
    }

    #[must_use]
    pub fn with_ordering(ordering: Arc<dyn RouteOrdering<C>>) -> Self {
        Self {
            routes: HashMap::new(),
            ordering,
        }
    }

    /// Add routes. Already-registered routes are skipped.
    pub fn register<I>(&mut self, routes: I) -> &mut Self
    where
        I: IntoIterator<Item = Route<C>>,
    {
        for route in routes {
            let id = route.id();
            if self.routes.contains_key(&id) {
                debug!(route_id = %id, path = %route.path(), "Route already registered");
                continue;
            }
            debug!(
                route_id = %id,
                path = %route.path(),
                methods = ?route.methods(),
                async_route = route.is_async(),
                "Route added to registry"
            );
            self.routes.insert(id, route);
        }
        self
    }

    /// Add every route a [`Routes`] source produces.
    pub fn register_source(&mut self, source: &dyn Routes<C>) -> &mut Self {
        self.register(source.routes())
    }

    /// Snapshot of all routes in registration order
    #[must_use]
    pub fn all_routes(&self) -> Vec<Route<C>> {
        let mut routes: Vec<Route<C>> = self.routes.values().cloned().collect();
        self.ordering.sort(&mut routes);
        routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, route: &Route<C>) -> bool {
        self.routes.contains_key(&route.id())
    }
}
