//! This module contains visit sequencing heuristics.

#[cfg(test)]
#[path = "../../../tests/unit/algorithms/sequencing/nearest_neighbor_test.rs"]
mod nearest_neighbor_test;

use crate::models::Coordinate;

/// Orders items into a visit sequence using nearest neighbor heuristic: starting from `origin`,
/// repeatedly visits the closest remaining item. The earliest item wins ties, so the result is
/// deterministic for a fixed input.
pub fn sequence_by_nearest_neighbor<T, F>(origin: Coordinate, items: Vec<T>, location_fn: F) -> Vec<T>
where
    F: Fn(&T) -> Coordinate,
{
    let mut remaining = items.into_iter().map(|item| (location_fn(&item), item)).collect::<Vec<_>>();
    let mut sequence = Vec::with_capacity(remaining.len());
    let mut current = origin;

    while !remaining.is_empty() {
        let nearest_idx = remaining
            .iter()
            .enumerate()
            .map(|(idx, (location, _))| (idx, current.distance_to(location)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| idx)
            .unwrap_or_default();

        let (location, item) = remaining.remove(nearest_idx);
        current = location;
        sequence.push(item);
    }

    sequence
}
