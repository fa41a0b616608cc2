#[cfg(test)]
#[path = "../../tests/unit/editing/buffer_test.rs"]
mod buffer_test;

use crate::editing::{DispatchLifecycle, RouteRegistry};
use crate::models::{RouteKey, Stop, StopId};
use crate::utils::GenericResult;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Transient staging information about the stop, lives only while the stop is in the buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedStopMeta {
    /// Position of the stop before it was first moved.
    pub original_index: Option<usize>,
    /// Whether stop was moved by operator.
    pub was_moved: bool,
    /// A route the stop was dragged from.
    pub moved_from_route: Option<RouteKey>,
}

/// A result of cross-route move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Stop was inserted into the target route.
    Inserted,
    /// Stop was already staged in the target route and was reordered there instead.
    DuplicateResolved,
}

#[derive(Clone, Debug, Default)]
struct PendingEntry {
    stops: Vec<Stop>,
    meta: FxHashMap<StopId, StagedStopMeta>,
}

/// Keeps uncommitted candidate stop lists per route. A route without entry has no staged edits.
///
/// A stop id is present in at most one candidate list: every cross-route action updates both
/// source and target entries at once.
#[derive(Clone, Debug, Default)]
pub struct EditBuffer {
    entries: BTreeMap<RouteKey, PendingEntry>,
    lifecycle: DispatchLifecycle,
}

impl EditBuffer {
    /// Returns candidate stops of the route, if it has staged edits.
    pub fn candidate(&self, key: &RouteKey) -> Option<&[Stop]> {
        self.entries.get(key).map(|entry| entry.stops.as_slice())
    }

    /// Returns stops which should be displayed for the route: candidate ones or committed.
    pub fn candidate_or_committed(&self, key: &RouteKey, registry: &RouteRegistry) -> Option<Vec<Stop>> {
        self.candidate(key).map(|stops| stops.to_vec()).or_else(|| registry.get(key).map(|route| route.stops.clone()))
    }

    /// Returns staging metadata of the stop within route's candidate list.
    pub fn meta(&self, key: &RouteKey, stop_id: &str) -> Option<&StagedStopMeta> {
        self.entries.get(key).and_then(|entry| entry.meta.get(stop_id))
    }

    /// Returns true if route has staged edits.
    pub fn is_pending(&self, key: &RouteKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns keys of all routes with staged edits.
    pub fn pending_keys(&self) -> Vec<RouteKey> {
        self.entries.keys().cloned().collect()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves stop within the same route.
    pub fn reorder(&mut self, registry: &RouteRegistry, key: &RouteKey, from: usize, to: usize) -> GenericResult<()> {
        let mut entry = self.checkout(registry, key)?;
        let stop = remove_at(&mut entry, key, from)?;

        let meta = entry.meta.entry(stop.id.clone()).or_default();
        meta.original_index.get_or_insert(from);
        meta.was_moved = true;

        let to = to.min(entry.stops.len());
        entry.stops.insert(to, stop);

        self.entries.insert(key.clone(), entry);

        Ok(())
    }

    /// Moves stop from one route to another. When the stop is already staged in the target route,
    /// it is reordered there to the drop position and removed from the source.
    pub fn move_stop(
        &mut self,
        registry: &RouteRegistry,
        source: &RouteKey,
        target: &RouteKey,
        from: usize,
        drop_index: usize,
    ) -> GenericResult<MoveOutcome> {
        if source == target {
            return self.reorder(registry, source, from, drop_index).map(|_| MoveOutcome::Inserted);
        }

        let mut source_entry = self.checkout(registry, source)?;
        let mut target_entry = self.checkout(registry, target)?;

        let stop = remove_at(&mut source_entry, source, from)?;
        let source_meta = source_entry.meta.remove(&stop.id).unwrap_or_default();
        let original_index = source_meta.original_index.unwrap_or(from);

        let outcome = match target_entry.stops.iter().position(|existing| existing.id == stop.id) {
            Some(existing_idx) => {
                let existing = target_entry.stops.remove(existing_idx);
                let meta = target_entry.meta.entry(existing.id.clone()).or_default();
                meta.original_index.get_or_insert(existing_idx);
                meta.was_moved = true;
                meta.moved_from_route.get_or_insert_with(|| source.clone());

                target_entry.stops.insert(drop_index.min(target_entry.stops.len()), existing);

                MoveOutcome::DuplicateResolved
            }
            None => {
                target_entry.meta.insert(
                    stop.id.clone(),
                    StagedStopMeta {
                        original_index: Some(original_index),
                        was_moved: true,
                        moved_from_route: Some(source.clone()),
                    },
                );
                target_entry.stops.insert(drop_index.min(target_entry.stops.len()), stop);

                MoveOutcome::Inserted
            }
        };

        self.entries.insert(source.clone(), source_entry);
        self.entries.insert(target.clone(), target_entry);

        Ok(outcome)
    }

    /// Stages insertion of a stop which is not part of any route yet (e.g. manually entered or
    /// taken from the unassigned pool).
    pub fn insert_stop(&mut self, registry: &RouteRegistry, key: &RouteKey, stop: Stop, index: usize) -> GenericResult<()> {
        if let Some(other) = self.find_displayed(registry, &stop.id) {
            return Err(format!("stop '{}' is already in {other}", stop.id).into());
        }

        let mut entry = self.checkout(registry, key)?;

        entry.meta.insert(stop.id.clone(), StagedStopMeta { was_moved: true, ..StagedStopMeta::default() });
        entry.stops.insert(index.min(entry.stops.len()), stop);

        self.entries.insert(key.clone(), entry);

        Ok(())
    }

    /// Stages removal of the stop from the route and returns it.
    pub fn remove_stop(&mut self, registry: &RouteRegistry, key: &RouteKey, index: usize) -> GenericResult<Stop> {
        let mut entry = self.checkout(registry, key)?;
        let stop = remove_at(&mut entry, key, index)?;
        entry.meta.remove(&stop.id);

        self.entries.insert(key.clone(), entry);

        Ok(stop)
    }

    /// Discards staged edits of the route together with edits of every route which exchanged stops
    /// with it, so that reverting to committed lists cannot duplicate or lose a stop. Returns keys
    /// of all discarded routes.
    pub fn discard(&mut self, registry: &RouteRegistry, key: &RouteKey) -> Vec<RouteKey> {
        let mut discarded = Vec::new();
        let mut queue = vec![key.clone()];

        while let Some(key) = queue.pop() {
            let Some(entry) = self.entries.remove(&key) else { continue };
            let committed = registry.get(&key).map(|route| route.stops.as_slice()).unwrap_or_default();

            queue.extend(
                self.entries
                    .iter()
                    .filter(|(other, other_entry)| {
                        let other_committed = registry.get(other).map(|route| route.stops.as_slice()).unwrap_or_default();

                        has_moved_between(committed, &entry.stops, other_committed, &other_entry.stops)
                            || has_moved_between(other_committed, &other_entry.stops, committed, &entry.stops)
                    })
                    .map(|(other, _)| other.clone()),
            );

            discarded.push(key);
        }

        discarded
    }

    /// Drops staged edits of given routes as they are, e.g. after they were committed together.
    pub fn clear(&mut self, keys: &[RouteKey]) {
        keys.iter().for_each(|key| {
            self.entries.remove(key);
        });
    }

    /// Discards all staged edits.
    pub fn reset_all(&mut self) {
        self.entries.clear();
    }

    /// Returns a copy of the route's entry: existing candidate or created from committed stops.
    fn checkout(&self, registry: &RouteRegistry, key: &RouteKey) -> GenericResult<PendingEntry> {
        if registry.is_read_only(key) {
            return Err(format!("{key} is read-only, use transfer to change it").into());
        }

        let route = registry.get(key).ok_or_else(|| format!("unknown route: {key}"))?;
        if !self.lifecycle.can_mutate(route.status) {
            return Err(format!("{key} is {:?} and cannot be changed", route.status).into());
        }

        Ok(self
            .entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| PendingEntry { stops: route.stops.clone(), meta: FxHashMap::default() }))
    }

    /// Finds a route which displays the stop: either in its candidate list or, when the route has
    /// no staged edits, in its committed list.
    fn find_displayed(&self, registry: &RouteRegistry, stop_id: &str) -> Option<RouteKey> {
        registry.keys().into_iter().find(|key| match self.entries.get(key) {
            Some(entry) => entry.stops.iter().any(|stop| stop.id == stop_id),
            None => registry.get(key).is_some_and(|route| route.position_of(stop_id).is_some()),
        })
    }
}

/// Checks whether some stop left the `from` route (committed there, but not in its candidate list)
/// and was staged into the `to` route (in its candidate list, but not committed there).
fn has_moved_between(
    from_committed: &[Stop],
    from_candidate: &[Stop],
    to_committed: &[Stop],
    to_candidate: &[Stop],
) -> bool {
    let contains = |stops: &[Stop], id: &str| stops.iter().any(|stop| stop.id == id);

    from_committed
        .iter()
        .filter(|stop| !contains(from_candidate, stop.id.as_str()))
        .any(|stop| contains(to_candidate, stop.id.as_str()) && !contains(to_committed, stop.id.as_str()))
}

fn remove_at(entry: &mut PendingEntry, key: &RouteKey, index: usize) -> GenericResult<Stop> {
    if index >= entry.stops.len() {
        return Err(format!("{key} has no stop at position {index}, size is {}", entry.stops.len()).into());
    }

    Ok(entry.stops.remove(index))
}
