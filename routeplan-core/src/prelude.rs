//! This module reimports commonly used types.

pub use crate::construction::{RoutePlan, plan_routes};

pub use crate::editing::{
    CommitCoordinator, CommitError, CommitResult, DispatchAction, DispatchLifecycle, EditBuffer, MoveOutcome,
    RouteRegistry,
};
pub use crate::editing::{detect_route_changes, mark_modified_stops};

pub use crate::models::{
    ChangeRecord, ChangeType, ClusteringLimits, Config, Coordinate, MarkedStop, Route, RouteKey, RouteStatus, Stop,
};

pub use crate::services::{GeometryService, NotificationService, RouteStore};

pub use crate::utils::{DefaultRandom, Environment, GenericError, GenericResult, InfoLogger, Random};
