use crate::algorithms::sequencing::sequence_by_nearest_neighbor;
use crate::models::{Coordinate, Stop};

/// Orders stops into a visit sequence starting from `origin` using proximity (nearest neighbor)
/// heuristic. Stops without a valid coordinate are kept at the end in their original order.
pub fn sequence_stops(origin: Coordinate, stops: Vec<Stop>) -> Vec<Stop> {
    let (located, unlocated): (Vec<_>, Vec<_>) = stops.into_iter().partition(|stop| stop.coordinate().is_some());

    let mut sequence =
        sequence_by_nearest_neighbor(origin, located, |stop| stop.coordinate().unwrap_or(origin));
    sequence.extend(unlocated);

    sequence
}
