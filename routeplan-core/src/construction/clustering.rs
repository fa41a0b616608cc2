#[cfg(test)]
#[path = "../../tests/unit/construction/clustering_test.rs"]
mod clustering_test;

use crate::algorithms::clustering::create_kmeans;
use crate::construction::sequence_stops;
use crate::models::{ClusteringLimits, Coordinate, Stop};
use crate::utils::{Random, parallel_into_collect};
use serde::Serialize;

/// Stop groups produced by clustering.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StopGroups {
    /// Sequenced groups of stops, one per requested group.
    pub groups: Vec<Vec<Stop>>,
    /// Stops which cannot be placed into any group without exceeding its capacity.
    pub overflow: Vec<Stop>,
}

impl StopGroups {
    /// Returns total amount of stops in groups and overflow.
    pub fn total(&self) -> usize {
        self.groups.iter().map(|group| group.len()).sum::<usize>() + self.overflow.len()
    }
}

/// Partitions stops into geographically coherent groups bounded by `limits.max_stops_per_group`.
///
/// With two groups, stops are split by latitude relative to `origin`: stops at or above origin
/// latitude go to the first group. With more groups, constrained k-means is used. Groups are
/// sequenced from `origin` and the excess of over-capacity groups (the tail of the sequence) is
/// moved into spare capacity of the nearest other group. What does not fit anywhere is returned
/// as overflow. Stops without a valid coordinate cannot be placed and go to overflow as well.
pub fn cluster_stops(origin: Coordinate, stops: Vec<Stop>, limits: &ClusteringLimits, random: &dyn Random) -> StopGroups {
    let group_count = limits.group_count.max(1);
    let max_stops = limits.max_stops_per_group.max(1);

    let (stops, mut overflow): (Vec<_>, Vec<_>) = stops.into_iter().partition(|stop| stop.coordinate().is_some());

    let groups = match group_count {
        1 => vec![stops],
        2 => split_by_latitude(origin, stops),
        _ => split_by_kmeans(stops, group_count, limits.max_iterations, random),
    };

    let groups = parallel_into_collect(groups, |group| sequence_stops(origin, group));
    let (groups, excess) = rebalance(origin, groups, max_stops);

    overflow.extend(excess);

    StopGroups { groups, overflow }
}

fn split_by_latitude(origin: Coordinate, stops: Vec<Stop>) -> Vec<Vec<Stop>> {
    let (north, south) = stops
        .into_iter()
        .partition(|stop| stop.coordinate().is_some_and(|coordinate| coordinate.lat >= origin.lat));

    vec![north, south]
}

fn split_by_kmeans(stops: Vec<Stop>, group_count: usize, max_iterations: usize, random: &dyn Random) -> Vec<Vec<Stop>> {
    let points = stops.iter().filter_map(|stop| stop.coordinate()).collect::<Vec<_>>();
    let result = create_kmeans(points.as_slice(), group_count, max_iterations, random);

    let mut stops = stops.into_iter().map(Some).collect::<Vec<_>>();

    result
        .clusters
        .into_iter()
        .map(|cluster| cluster.into_iter().filter_map(|idx| stops[idx].take()).collect())
        .collect()
}

/// Moves the excess of over-capacity groups into other groups, returns what was left unplaced.
fn rebalance(origin: Coordinate, mut groups: Vec<Vec<Stop>>, max_stops: usize) -> (Vec<Vec<Stop>>, Vec<Stop>) {
    let excess = groups
        .iter_mut()
        .enumerate()
        .filter(|(_, group)| group.len() > max_stops)
        .flat_map(|(group_idx, group)| group.split_off(max_stops).into_iter().map(move |stop| (group_idx, stop)))
        .collect::<Vec<_>>();

    if excess.is_empty() {
        return (groups, vec![]);
    }

    let centroids = groups.iter().map(|group| centroid_of(group).unwrap_or(origin)).collect::<Vec<_>>();
    let mut received = vec![false; groups.len()];
    let mut overflow = vec![];

    for (source_idx, stop) in excess {
        let location = stop.coordinate().unwrap_or(origin);
        let target_idx = groups
            .iter()
            .enumerate()
            .filter(|(idx, group)| *idx != source_idx && group.len() < max_stops)
            .map(|(idx, _)| (idx, location.distance_to(&centroids[idx])))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| idx);

        match target_idx {
            Some(target_idx) => {
                groups[target_idx].push(stop);
                received[target_idx] = true;
            }
            None => overflow.push(stop),
        }
    }

    let groups = groups
        .into_iter()
        .zip(received)
        .map(|(group, received)| if received { sequence_stops(origin, group) } else { group })
        .collect();

    (groups, overflow)
}

fn centroid_of(stops: &[Stop]) -> Option<Coordinate> {
    let points = stops.iter().filter_map(|stop| stop.coordinate()).collect::<Vec<_>>();

    if points.is_empty() {
        return None;
    }

    let (lat, lng) = points.iter().fold((0., 0.), |(lat, lng), point| (lat + point.lat, lng + point.lng));
    let size = points.len() as f64;

    Some(Coordinate::new(lat / size, lng / size))
}
