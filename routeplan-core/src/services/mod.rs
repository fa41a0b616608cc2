//! Specifies external collaborators of the engine: the persistent route store, the route geometry
//! service and the agent notification service.

mod memory;
pub use self::memory::InMemoryRouteStore;

use crate::models::*;
use crate::utils::GenericResult;
use serde::{Deserialize, Serialize};

/// A persisted route document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDocument {
    /// Committed stops.
    pub stops: Vec<Stop>,
    /// Stops which were taken out of routes and wait for assignment.
    #[serde(default)]
    pub unassigned_stops: Vec<Stop>,
    /// Dispatch status.
    #[serde(default)]
    pub status: RouteStatus,
    /// Assigned agent.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// A depot where route starts.
    pub origin: Coordinate,
    /// Last computed geometry.
    #[serde(default)]
    pub geometry: Option<RouteGeometry>,
    /// A parent group the route is referenced from.
    #[serde(default)]
    pub parent_group_id: Option<PersistedId>,
    /// Modifications made by the last commit.
    #[serde(default)]
    pub modifications: Vec<StopModification>,
}

impl RouteDocument {
    /// Creates a document from in-memory route and its clean stops.
    pub fn from_route(route: &Route, stops: Vec<Stop>, geometry: Option<RouteGeometry>) -> Self {
        Self {
            stops,
            unassigned_stops: vec![],
            status: route.status,
            agent_id: route.agent_id.clone(),
            origin: route.origin,
            geometry,
            parent_group_id: route.parent_group_id.clone(),
            modifications: vec![],
        }
    }
}

/// A partial update of the route document. Absent optional fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteUpdate {
    /// New stops.
    pub stops: Option<Vec<Stop>>,
    /// New modifications.
    pub modifications: Option<Vec<StopModification>>,
    /// New geometry: `Some(None)` clears the stored one.
    pub geometry: Option<Option<RouteGeometry>>,
    /// New status.
    pub status: Option<RouteStatus>,
    /// New agent.
    pub agent_id: Option<String>,
}

/// A single write within atomic batch.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchWrite {
    /// Updates route document.
    Update {
        /// Route document id.
        id: PersistedId,
        /// Update to apply.
        update: RouteUpdate,
    },
    /// Adds route reference to the parent group document.
    LinkToGroup {
        /// Group document id.
        group_id: PersistedId,
        /// Route document id.
        route_id: PersistedId,
    },
    /// Appends stops to unassigned list of the document (route or group), see [RouteStore::append_unassigned].
    AppendUnassigned {
        /// Route or group document id.
        id: PersistedId,
        /// Stops to append.
        stops: Vec<Stop>,
    },
    /// Deletes route document.
    Delete {
        /// Route document id.
        id: PersistedId,
    },
}

/// A persistent store with one document per route.
pub trait RouteStore: Send + Sync {
    /// Reads route document.
    fn read_one(&self, id: &str) -> GenericResult<Option<RouteDocument>>;

    /// Updates a single route document.
    fn update_one(&self, id: &str, update: RouteUpdate) -> GenericResult<()>;

    /// Applies all writes atomically: either all of them land or none.
    fn batch_update(&self, writes: Vec<BatchWrite>) -> GenericResult<()>;

    /// Creates a new route document and returns its id.
    fn create_one(&self, document: RouteDocument) -> GenericResult<PersistedId>;

    /// Deletes route document.
    fn delete_one(&self, id: &str) -> GenericResult<()>;

    /// Appends stops to unassigned list of the document (route or group) skipping already present ones.
    fn append_unassigned(&self, id: &str, stops: &[Stop]) -> GenericResult<()>;
}

/// Computes travel geometry for an ordered list of stops.
pub trait GeometryService: Send + Sync {
    /// Computes geometry of the route starting at `origin` and visiting `stops` in order.
    fn compute(&self, origin: Coordinate, stops: &[Stop]) -> GenericResult<RouteGeometry>;
}

/// A notification about changes in the route sent to its agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentNotification {
    /// Route document id.
    pub route_id: PersistedId,
    /// Agent id.
    pub agent_id: String,
    /// Detected changes.
    pub changes: Vec<ChangeRecord>,
}

/// Delivers notifications to agents.
pub trait NotificationService: Send + Sync {
    /// Notifies agent about route changes.
    fn notify(&self, notification: &AgentNotification) -> GenericResult<()>;
}
