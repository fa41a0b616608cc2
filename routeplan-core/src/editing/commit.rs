#[cfg(test)]
#[path = "../../tests/unit/editing/commit_test.rs"]
mod commit_test;

use crate::editing::*;
use crate::models::*;
use crate::services::*;
use crate::utils::{Environment, GenericError, parallel_collect};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// An error which aborts commit.
#[derive(Clone, Debug, PartialEq)]
pub enum CommitError {
    /// Route cannot be changed in its current state.
    Refused {
        /// Route key.
        key: RouteKey,
        /// Human readable reason.
        reason: String,
    },
    /// The store has failed, nothing was committed and staged edits are preserved.
    Persistence(GenericError),
}

impl CommitError {
    /// Returns true if operation can be retried as is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommitError::Persistence(_))
    }

    fn refused(key: &RouteKey, reason: impl Into<String>) -> Self {
        CommitError::Refused { key: key.clone(), reason: reason.into() }
    }
}

impl Display for CommitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitError::Refused { key, reason } => write!(f, "{key} cannot be changed: {reason}"),
            CommitError::Persistence(err) => write!(f, "cannot persist changes, try again: {err}"),
        }
    }
}

impl std::error::Error for CommitError {}

impl From<CommitError> for GenericError {
    fn from(value: CommitError) -> Self {
        GenericError::from(value.to_string())
    }
}

/// A result of successful commit.
#[derive(Clone, Debug, Default)]
pub struct CommitResult {
    /// Keys of routes which were committed.
    pub applied: Vec<RouteKey>,
    /// Routes which got persisted identity during this commit.
    pub created: Vec<(RouteKey, PersistedId)>,
    /// Detected changes of previously persisted routes.
    pub changes: BTreeMap<RouteKey, Vec<ChangeRecord>>,
    /// Committed stops annotated with their modifications.
    pub marked: BTreeMap<RouteKey, Vec<MarkedStop>>,
    /// Routes committed without refreshed geometry.
    pub geometry_failures: Vec<RouteKey>,
    /// Amount of delivered notifications.
    pub notifications_sent: usize,
    /// Amount of notifications which failed to deliver.
    pub notification_failures: usize,
}

/// Commits staged edits of all affected routes as one logical operation.
pub struct CommitCoordinator {
    store: Arc<dyn RouteStore>,
    geometry: Arc<dyn GeometryService>,
    notifier: Arc<dyn NotificationService>,
    lifecycle: DispatchLifecycle,
    environment: Arc<Environment>,
    notify_agents: bool,
}

struct PendingRoute {
    route: Route,
    stops: Vec<Stop>,
    /// `None` keeps the previous geometry, `Some(None)` clears it.
    geometry: Option<Option<RouteGeometry>>,
}

struct PreparedUpdate {
    write: BatchWrite,
    changes: Vec<ChangeRecord>,
    marked: Vec<MarkedStop>,
    notification: Option<AgentNotification>,
}

impl CommitCoordinator {
    /// Creates a new instance of `CommitCoordinator`.
    pub fn new(
        store: Arc<dyn RouteStore>,
        geometry: Arc<dyn GeometryService>,
        notifier: Arc<dyn NotificationService>,
        environment: Arc<Environment>,
    ) -> Self {
        Self { store, geometry, notifier, lifecycle: DispatchLifecycle, environment, notify_agents: true }
    }

    /// Applies commit related settings from config.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.notify_agents = config.notify_agents();
        self
    }

    /// Commits every route with staged edits. On success, staged entries are cleared, registry gets
    /// committed snapshots and agents of dispatched routes are notified (best-effort). On failure,
    /// buffer and registry are left untouched so that commit can be retried.
    pub fn apply_all(&self, buffer: &mut EditBuffer, registry: &mut RouteRegistry) -> Result<CommitResult, CommitError> {
        let keys = buffer.pending_keys();
        if keys.is_empty() {
            return Ok(CommitResult::default());
        }

        let pending = keys
            .iter()
            .map(|key| {
                let route = registry.get(key).ok_or_else(|| CommitError::refused(key, "route is unknown"))?;
                if !self.lifecycle.can_mutate(route.status) {
                    return Err(CommitError::refused(key, format!("route is {:?}", route.status)));
                }

                let stops = buffer.candidate(key).map(|stops| stops.to_vec()).unwrap_or_default();

                Ok(PendingRoute { route: route.clone(), stops, geometry: None })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = CommitResult::default();
        let pending = self.compute_geometries(pending, &mut result);

        let (mut to_update, rest): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(|pending| pending.route.persisted_id.is_some());
        let (to_create, local_only): (Vec<_>, Vec<_>) = rest.into_iter().partition(|pending| !pending.stops.is_empty());

        let mut writes = Vec::with_capacity(to_update.len());
        let mut notifications = Vec::new();

        for pending in to_update.iter_mut() {
            let prepared = self.prepare_update(pending)?;

            writes.push(prepared.write);
            notifications.extend(prepared.notification);
            result.changes.insert(pending.route.key.clone(), prepared.changes);
            result.marked.insert(pending.route.key.clone(), prepared.marked);
        }

        let created = self.create_routes(&to_create)?;
        writes.extend(created.iter().zip(to_create.iter()).filter_map(|(route_id, pending)| {
            pending
                .route
                .parent_group_id
                .clone()
                .map(|group_id| BatchWrite::LinkToGroup { group_id, route_id: route_id.clone() })
        }));

        if !writes.is_empty() {
            if let Err(err) = self.store.batch_update(writes) {
                self.compensate(&created);
                (self.environment.logger)(&format!("commit of {} route(s) has failed: {err}", keys.len()));

                return Err(CommitError::Persistence(err));
            }
        }

        buffer.clear(&keys);

        to_update.into_iter().chain(local_only).for_each(|pending| update_registry(registry, pending, None));
        to_create.into_iter().zip(created).for_each(|(pending, route_id)| {
            result.created.push((pending.route.key.clone(), route_id.clone()));
            update_registry(registry, pending, Some(route_id));
        });

        result.applied = keys;
        self.send_notifications(notifications, &mut result);

        (self.environment.logger)(&format!(
            "committed {} route(s): {} created, {} notification(s) sent, {} failed",
            result.applied.len(),
            result.created.len(),
            result.notifications_sent,
            result.notification_failures
        ));

        Ok(result)
    }

    /// Moves a committed stop from the source route to a read-only route of the same scheduling
    /// window. Both routes are written in a single atomic batch.
    pub fn transfer_to_external(
        &self,
        registry: &mut RouteRegistry,
        buffer: &EditBuffer,
        source: &RouteKey,
        stop_index: usize,
        target: &RouteKey,
    ) -> Result<CommitResult, CommitError> {
        if !registry.is_read_only(target) {
            return Err(CommitError::refused(target, "transfer target should be an external route"));
        }

        if buffer.is_pending(source) {
            return Err(CommitError::refused(source, "route has staged edits, apply or cancel them first"));
        }

        let source_route = self.get_persisted(registry, source)?;
        let target_route = self.get_persisted(registry, target)?;

        let stop = source_route
            .stops
            .get(stop_index)
            .cloned()
            .ok_or_else(|| CommitError::refused(source, format!("no stop at position {stop_index}")))?;

        if target_route.position_of(&stop.id).is_some() {
            return Err(CommitError::refused(target, format!("stop '{}' is already in the route", stop.id)));
        }

        let source_stops = source_route.stops.iter().filter(|other| other.id != stop.id).cloned().collect::<Vec<_>>();
        let target_stops = target_route.stops.iter().cloned().chain(std::iter::once(stop)).collect::<Vec<_>>();

        let mut result = CommitResult::default();
        let mut pending = self.compute_geometries(
            vec![
                PendingRoute { route: source_route, stops: source_stops, geometry: None },
                PendingRoute { route: target_route, stops: target_stops, geometry: None },
            ],
            &mut result,
        );

        let mut writes = Vec::with_capacity(2);
        let mut notifications = Vec::new();
        for pending in pending.iter_mut() {
            let prepared = self.prepare_update(pending)?;

            writes.push(prepared.write);
            notifications.extend(prepared.notification);
            result.changes.insert(pending.route.key.clone(), prepared.changes);
            result.marked.insert(pending.route.key.clone(), prepared.marked);
        }

        self.store.batch_update(writes).map_err(CommitError::Persistence)?;

        result.applied = pending.iter().map(|pending| pending.route.key.clone()).collect();
        pending.into_iter().for_each(|pending| update_registry(registry, pending, None));

        self.send_notifications(notifications, &mut result);

        Ok(result)
    }

    /// Moves route to the next lifecycle status and persists it. Dispatch requires an agent.
    pub fn transition_route(
        &self,
        registry: &mut RouteRegistry,
        key: &RouteKey,
        action: DispatchAction,
        agent_id: Option<String>,
    ) -> Result<RouteStatus, CommitError> {
        let route = self.get_persisted(registry, key)?;
        let status = self
            .lifecycle
            .transition(route.status, action)
            .map_err(|err| CommitError::refused(key, err.to_string()))?;

        let agent_id = agent_id.or(route.agent_id);
        if action == DispatchAction::Dispatch && agent_id.is_none() {
            return Err(CommitError::refused(key, "route cannot be dispatched without an agent"));
        }

        let id = route.persisted_id.unwrap_or_default();
        let update = RouteUpdate { status: Some(status), agent_id: agent_id.clone(), ..RouteUpdate::default() };
        self.store.update_one(&id, update).map_err(CommitError::Persistence)?;

        registry.set(key, |route| route.map(|route| Route { status, agent_id, ..route }));

        Ok(status)
    }

    /// Deletes a draft route: its committed stops return to the unassigned pool. For a persisted
    /// route, the stops are appended to the parent group's pool and the document is deleted within
    /// one atomic batch, so a route without a parent group can be deleted only when it is empty.
    pub fn delete_route(
        &self,
        registry: &mut RouteRegistry,
        buffer: &EditBuffer,
        key: &RouteKey,
    ) -> Result<Vec<Stop>, CommitError> {
        let route = registry.get(key).ok_or_else(|| CommitError::refused(key, "route is unknown"))?;

        if registry.is_read_only(key) || !self.lifecycle.can_delete(route.status) {
            return Err(CommitError::refused(key, format!("{:?} route cannot be deleted", route.status)));
        }

        if buffer.is_pending(key) {
            return Err(CommitError::refused(key, "route has staged edits, apply or cancel them first"));
        }

        if let Some(id) = route.persisted_id.clone() {
            let mut writes = Vec::with_capacity(2);

            match (route.parent_group_id.clone(), route.stops.is_empty()) {
                (Some(group_id), false) => {
                    writes.push(BatchWrite::AppendUnassigned { id: group_id, stops: route.stops.clone() })
                }
                (None, false) => {
                    return Err(CommitError::refused(key, "route has no parent group to keep its stops"));
                }
                (_, true) => {}
            }

            writes.push(BatchWrite::Delete { id });

            self.store.batch_update(writes).map_err(|err| {
                (self.environment.logger)(&format!("cannot delete {key}: {err}"));
                CommitError::Persistence(err)
            })?;
        }

        let stops = registry.remove(key).map(|route| route.stops).unwrap_or_default();
        registry.add_unassigned(stops.iter().cloned());

        Ok(stops)
    }

    fn get_persisted(&self, registry: &RouteRegistry, key: &RouteKey) -> Result<Route, CommitError> {
        let route = registry.get(key).ok_or_else(|| CommitError::refused(key, "route is unknown"))?;

        if route.persisted_id.is_none() {
            return Err(CommitError::refused(key, "route is not committed yet"));
        }

        if !self.lifecycle.can_mutate(route.status) {
            return Err(CommitError::refused(key, format!("route is {:?}", route.status)));
        }

        Ok(route.clone())
    }

    /// Requests geometry for every non-empty route concurrently. An empty route gets its geometry
    /// cleared, a failed request only degrades its route to stale geometry.
    fn compute_geometries(&self, pending: Vec<PendingRoute>, result: &mut CommitResult) -> Vec<PendingRoute> {
        let geometry = self.geometry.as_ref();
        let responses = parallel_collect(pending.as_slice(), |pending| {
            if pending.stops.is_empty() { None } else { Some(geometry.compute(pending.route.origin, &pending.stops)) }
        });

        pending
            .into_iter()
            .zip(responses)
            .map(|(mut pending, response)| {
                match response {
                    Some(Ok(geometry)) => pending.geometry = Some(Some(geometry)),
                    Some(Err(err)) => {
                        (self.environment.logger)(&format!(
                            "cannot compute geometry of {}, stops are saved without it: {err}",
                            pending.route.key
                        ));
                        result.geometry_failures.push(pending.route.key.clone());
                    }
                    None => pending.geometry = Some(None),
                }

                pending
            })
            .collect()
    }

    /// Builds the store update of the persisted route and refreshes its status and agent from the
    /// store document, which can be changed by agents meanwhile.
    fn prepare_update(&self, pending: &mut PendingRoute) -> Result<PreparedUpdate, CommitError> {
        let key = &pending.route.key;
        let id = pending.route.persisted_id.as_deref().unwrap_or_default();
        let stops = pending.stops.clone();

        let document = self
            .store
            .read_one(id)
            .map_err(CommitError::Persistence)?
            .ok_or_else(|| CommitError::Persistence(format!("route document '{id}' is not found").into()))?;

        if !self.lifecycle.can_mutate(document.status) {
            return Err(CommitError::refused(key, format!("route is {:?}", document.status)));
        }

        let changes = detect_route_changes(&document.stops, &stops);
        let marked = mark_modified_stops(&stops, &changes);
        let modifications = marked.iter().filter_map(|stop| stop.modification.clone()).collect();

        let notification = self
            .lifecycle
            .notification_target(document.status, document.agent_id.as_deref(), &changes)
            .map(|agent_id| AgentNotification {
                route_id: id.to_string(),
                agent_id: agent_id.to_string(),
                changes: changes.clone(),
            });

        let update = RouteUpdate {
            stops: Some(stops),
            modifications: Some(modifications),
            geometry: pending.geometry.clone(),
            ..RouteUpdate::default()
        };
        let write = BatchWrite::Update { id: id.to_string(), update };

        pending.route.status = document.status;
        pending.route.agent_id = document.agent_id.clone();

        Ok(PreparedUpdate { write, changes, marked, notification })
    }

    /// Creates documents for routes without persisted identity, stops at the first failure.
    fn create_routes(&self, to_create: &[PendingRoute]) -> Result<Vec<PersistedId>, CommitError> {
        let mut created = Vec::with_capacity(to_create.len());

        for pending in to_create {
            let document = RouteDocument::from_route(&pending.route, pending.stops.clone(), pending.geometry.clone().flatten());

            match self.store.create_one(document) {
                Ok(id) => created.push(id),
                Err(err) => {
                    self.compensate(&created);
                    return Err(CommitError::Persistence(err));
                }
            }
        }

        Ok(created)
    }

    /// Deletes routes created by the failed commit so that no orphan documents are left.
    fn compensate(&self, created: &[PersistedId]) {
        created.iter().for_each(|id| {
            if let Err(err) = self.store.delete_one(id) {
                (self.environment.logger)(&format!("cannot delete orphan route '{id}': {err}"));
            }
        });
    }

    fn send_notifications(&self, notifications: Vec<AgentNotification>, result: &mut CommitResult) {
        if !self.notify_agents {
            return;
        }

        notifications.iter().for_each(|notification| match self.notifier.notify(notification) {
            Ok(_) => result.notifications_sent += 1,
            Err(err) => {
                result.notification_failures += 1;
                (self.environment.logger)(&format!(
                    "cannot notify agent '{}' about changes in route '{}': {err}",
                    notification.agent_id, notification.route_id
                ));
            }
        });
    }
}

fn update_registry(registry: &mut RouteRegistry, pending: PendingRoute, created_id: Option<PersistedId>) {
    let PendingRoute { route, stops, geometry } = pending;

    registry.set(&route.key, |current| {
        current.map(|current| Route {
            stops,
            status: route.status,
            agent_id: route.agent_id,
            geometry: geometry.unwrap_or(current.geometry),
            persisted_id: created_id.or(current.persisted_id),
            ..current
        })
    });
}
