#[cfg(test)]
#[path = "../../tests/unit/construction/planner_test.rs"]
mod planner_test;

use crate::construction::cluster_stops;
use crate::models::{ClusteringLimits, Coordinate, Stop};
use crate::utils::Environment;
use serde::Serialize;

/// An initial route assignment.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    /// A depot where every route starts.
    pub origin: Coordinate,
    /// Sequenced stops of each route.
    pub routes: Vec<Vec<Stop>>,
    /// Stops which did not fit any route because of capacity.
    pub overflow: Vec<Stop>,
    /// Stops without usable coordinates, they need manual correction before planning.
    pub needs_correction: Vec<Stop>,
}

impl RoutePlan {
    /// Returns true if some stops were not assigned to any route.
    pub fn has_unassigned(&self) -> bool {
        !self.overflow.is_empty() || !self.needs_correction.is_empty()
    }
}

/// Builds initial routes: stops without usable coordinates are set aside, the rest are clustered
/// into capacity-bounded groups and sequenced by proximity.
pub fn plan_routes(origin: Coordinate, stops: Vec<Stop>, limits: &ClusteringLimits, environment: &Environment) -> RoutePlan {
    let (stops, needs_correction): (Vec<_>, Vec<_>) = stops.into_iter().partition(|stop| !stop.needs_correction());

    if !needs_correction.is_empty() {
        (environment.logger)(&format!("{} stop(s) have no usable coordinates and need correction", needs_correction.len()));
    }

    let groups = cluster_stops(origin, stops, limits, environment.random.as_ref());

    if !groups.overflow.is_empty() {
        (environment.logger)(&format!(
            "{} stop(s) exceed capacity of {} route(s) with {} stops max",
            groups.overflow.len(),
            groups.groups.len(),
            limits.max_stops_per_group
        ));
    }

    RoutePlan { origin, routes: groups.groups, overflow: groups.overflow, needs_correction }
}
