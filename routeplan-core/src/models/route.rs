use crate::models::{Coordinate, Stop};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// An identifier of the route in the persistent store.
pub type PersistedId = String;

/// A stable key of the route within the current editing session.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum RouteKey {
    /// A main route with fixed, 1-based number.
    Main(usize),
    /// A route created by operator, keyed by auto-assigned letter.
    Dynamic(char),
    /// A read-only route of the same scheduling window, keyed by its persisted id.
    External(PersistedId),
}

impl RouteKey {
    /// Returns true if route is read-only for staged editing.
    pub fn is_external(&self) -> bool {
        matches!(self, RouteKey::External(_))
    }
}

impl Display for RouteKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteKey::Main(number) => write!(f, "route-{number}"),
            RouteKey::Dynamic(letter) => write!(f, "route-{letter}"),
            RouteKey::External(id) => write!(f, "external-{id}"),
        }
    }
}

/// A dispatch status of the route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    /// Route is being prepared, no agent is working on it.
    #[default]
    Draft,
    /// Route is handed over to an agent.
    Dispatched,
    /// Agent has started the route.
    InProgress,
    /// Route is finished.
    Completed,
}

/// A computed travel geometry of the route.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGeometry {
    /// Total distance in meters.
    pub distance_meters: f64,
    /// Total duration in seconds.
    pub duration: f64,
    /// Encoded polyline of the route path.
    pub encoded_polyline: String,
}

/// Presentation attributes of the route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAppearance {
    /// Display color.
    pub color: String,
    /// Whether route is shown.
    pub visible: bool,
}

impl Default for RouteAppearance {
    fn default() -> Self {
        Self { color: "#3b82f6".to_string(), visible: true }
    }
}

/// Represents a route: an ordered list of committed stops with its travel geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Route key.
    pub key: RouteKey,
    /// A depot where route starts.
    pub origin: Coordinate,
    /// Committed stops.
    pub stops: Vec<Stop>,
    /// Computed geometry, if any.
    pub geometry: Option<RouteGeometry>,
    /// Presentation attributes.
    pub appearance: RouteAppearance,
    /// Dispatch status.
    pub status: RouteStatus,
    /// An assigned agent.
    pub agent_id: Option<String>,
    /// A parent group (e.g. service) the route belongs to.
    pub parent_group_id: Option<PersistedId>,
    /// An id in the persistent store, absent until first committed.
    pub persisted_id: Option<PersistedId>,
}

impl Route {
    /// Creates a new draft route without stops.
    pub fn new(key: RouteKey, origin: Coordinate) -> Self {
        Self {
            key,
            origin,
            stops: vec![],
            geometry: None,
            appearance: RouteAppearance::default(),
            status: RouteStatus::Draft,
            agent_id: None,
            parent_group_id: None,
            persisted_id: None,
        }
    }

    /// Sets stops.
    pub fn with_stops(mut self, stops: Vec<Stop>) -> Self {
        self.stops = stops;
        self
    }

    /// Finds stop position by its id.
    pub fn position_of(&self, stop_id: &str) -> Option<usize> {
        self.stops.iter().position(|stop| stop.id == stop_id)
    }
}
