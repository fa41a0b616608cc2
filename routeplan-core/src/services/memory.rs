#[cfg(test)]
#[path = "../../tests/unit/services/memory_test.rs"]
mod memory_test;

use super::*;
use rustc_hash::FxHashMap;
use std::sync::RwLock;

/// A parent group document which references routes and keeps a pool of unassigned stops.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupDocument {
    /// Referenced route ids.
    pub route_ids: Vec<PersistedId>,
    /// Unassigned stops.
    pub unassigned_stops: Vec<Stop>,
}

#[derive(Clone, Default)]
struct StoreState {
    routes: FxHashMap<PersistedId, RouteDocument>,
    groups: FxHashMap<PersistedId, GroupDocument>,
}

/// A thread safe, in-memory implementation of [RouteStore].
#[derive(Default)]
pub struct InMemoryRouteStore {
    state: RwLock<StoreState>,
}

impl InMemoryRouteStore {
    /// Inserts route document with given id, replacing existing one.
    pub fn insert(&self, id: impl Into<PersistedId>, document: RouteDocument) {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.routes.insert(id.into(), document);
    }

    /// Returns a copy of the group document.
    pub fn read_group(&self, id: &str) -> Option<GroupDocument> {
        self.read_state(|state| state.groups.get(id).cloned())
    }

    /// Returns amount of route documents.
    pub fn size(&self) -> usize {
        self.read_state(|state| state.routes.len())
    }

    fn read_state<R>(&self, func: impl FnOnce(&StoreState) -> R) -> R {
        let state = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        func(&state)
    }

    fn write_state<R>(&self, func: impl FnOnce(&mut StoreState) -> GenericResult<R>) -> GenericResult<R> {
        let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        func(&mut state)
    }
}

impl RouteStore for InMemoryRouteStore {
    fn read_one(&self, id: &str) -> GenericResult<Option<RouteDocument>> {
        Ok(self.read_state(|state| state.routes.get(id).cloned()))
    }

    fn update_one(&self, id: &str, update: RouteUpdate) -> GenericResult<()> {
        self.write_state(|state| apply_update(state, id, update))
    }

    fn batch_update(&self, writes: Vec<BatchWrite>) -> GenericResult<()> {
        self.write_state(|state| {
            // apply on a copy so that a failed write leaves the store untouched
            let mut staged = state.clone();
            writes.into_iter().try_for_each(|write| match write {
                BatchWrite::Update { id, update } => apply_update(&mut staged, &id, update),
                BatchWrite::LinkToGroup { group_id, route_id } => {
                    if !staged.routes.contains_key(&route_id) {
                        return Err(format!("cannot link unknown route '{route_id}' to group '{group_id}'").into());
                    }

                    let group = staged.groups.entry(group_id).or_default();
                    if !group.route_ids.contains(&route_id) {
                        group.route_ids.push(route_id);
                    }

                    Ok(())
                }
                BatchWrite::AppendUnassigned { id, stops } => apply_append_unassigned(&mut staged, &id, &stops),
                BatchWrite::Delete { id } => apply_delete(&mut staged, &id),
            })?;

            *state = staged;

            Ok(())
        })
    }

    fn create_one(&self, document: RouteDocument) -> GenericResult<PersistedId> {
        let id = uuid::Uuid::new_v4().to_string();

        self.write_state(|state| {
            state.routes.insert(id.clone(), document);
            Ok(id)
        })
    }

    fn delete_one(&self, id: &str) -> GenericResult<()> {
        self.write_state(|state| apply_delete(state, id))
    }

    fn append_unassigned(&self, id: &str, stops: &[Stop]) -> GenericResult<()> {
        self.write_state(|state| apply_append_unassigned(state, id, stops))
    }
}

fn apply_update(state: &mut StoreState, id: &str, update: RouteUpdate) -> GenericResult<()> {
    let document = state.routes.get_mut(id).ok_or_else(|| format!("cannot update unknown route '{id}'"))?;

    if let Some(stops) = update.stops {
        document.stops = stops;
    }

    if let Some(modifications) = update.modifications {
        document.modifications = modifications;
    }

    if let Some(geometry) = update.geometry {
        document.geometry = geometry;
    }

    if let Some(status) = update.status {
        document.status = status;
    }

    if let Some(agent_id) = update.agent_id {
        document.agent_id = Some(agent_id);
    }

    Ok(())
}

fn apply_delete(state: &mut StoreState, id: &str) -> GenericResult<()> {
    state.routes.remove(id).ok_or_else(|| format!("cannot delete unknown route '{id}'"))?;
    state.groups.values_mut().for_each(|group| group.route_ids.retain(|route_id| route_id != id));

    Ok(())
}

fn apply_append_unassigned(state: &mut StoreState, id: &str, stops: &[Stop]) -> GenericResult<()> {
    let unassigned = match state.routes.get_mut(id) {
        Some(route) => &mut route.unassigned_stops,
        None => &mut state.groups.entry(id.to_string()).or_default().unassigned_stops,
    };

    stops.iter().for_each(|stop| {
        if !unassigned.iter().any(|existing| existing.id == stop.id) {
            unassigned.push(stop.clone());
        }
    });

    Ok(())
}
