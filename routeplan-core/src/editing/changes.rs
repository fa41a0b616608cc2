#[cfg(test)]
#[path = "../../tests/unit/editing/changes_test.rs"]
mod changes_test;

use crate::models::*;
use rustc_hash::FxHashMap;

/// Detects differences between committed stops (`old_stops`) and candidate ones (`new_stops`).
///
/// Records are emitted in the following order: removed stops in committed order, added stops in
/// candidate order, then sequence, address and data changes of shared stops in candidate order.
/// A shared stop can produce more than one record.
pub fn detect_route_changes(old_stops: &[Stop], new_stops: &[Stop]) -> Vec<ChangeRecord> {
    let old_index = index_stops(old_stops);
    let new_index = index_stops(new_stops);

    let removed = old_stops.iter().enumerate().filter(|(_, stop)| !new_index.contains_key(stop.id.as_str())).map(
        |(idx, stop)| ChangeRecord {
            stop_id: stop.id.clone(),
            stop_index: idx,
            change_type: ChangeType::Removed,
            old_value: Some(ChangeValue::Stop { stop: Box::new(stop.clone()) }),
            new_value: None,
        },
    );

    let added = new_stops.iter().enumerate().filter(|(_, stop)| !old_index.contains_key(stop.id.as_str())).map(
        |(idx, stop)| ChangeRecord {
            stop_id: stop.id.clone(),
            stop_index: idx,
            change_type: ChangeType::Added,
            old_value: None,
            new_value: Some(ChangeValue::Stop { stop: Box::new(stop.clone()) }),
        },
    );

    let modified = new_stops.iter().enumerate().flat_map(|(new_idx, new_stop)| {
        let mut records = Vec::new();

        if let Some(&(old_idx, old_stop)) = old_index.get(new_stop.id.as_str()) {
            let record = |change_type, old_value, new_value| ChangeRecord {
                stop_id: new_stop.id.clone(),
                stop_index: new_idx,
                change_type,
                old_value: Some(old_value),
                new_value: Some(new_value),
            };

            if old_idx != new_idx {
                records.push(record(
                    ChangeType::Sequence,
                    ChangeValue::Index { index: old_idx },
                    ChangeValue::Index { index: new_idx },
                ));
            }

            if old_stop.is_address_different(new_stop) {
                records.push(record(
                    ChangeType::Address,
                    ChangeValue::address_of(old_stop),
                    ChangeValue::address_of(new_stop),
                ));
            }

            if old_stop.is_data_different(new_stop) {
                records.push(record(ChangeType::Data, ChangeValue::data_of(old_stop), ChangeValue::data_of(new_stop)));
            }
        }

        records
    });

    removed.chain(added).chain(modified).collect()
}

/// Annotates stops with a single, highest priority modification found in `changes`
/// (`removed > added > address > sequence > data`). The original position is kept only when the
/// winning modification is a sequence change.
pub fn mark_modified_stops(stops: &[Stop], changes: &[ChangeRecord]) -> Vec<MarkedStop> {
    let winners = changes.iter().fold(FxHashMap::<&str, &ChangeRecord>::default(), |mut acc, change| {
        acc.entry(change.stop_id.as_str())
            .and_modify(|winner| {
                if change.change_type.priority() > winner.change_type.priority() {
                    *winner = change;
                }
            })
            .or_insert(change);
        acc
    });

    stops
        .iter()
        .map(|stop| MarkedStop {
            stop: stop.clone(),
            modification: winners.get(stop.id.as_str()).map(|winner| StopModification {
                stop_id: stop.id.clone(),
                modification_type: winner.change_type,
                original_sequence: match (winner.change_type, &winner.old_value) {
                    (ChangeType::Sequence, Some(ChangeValue::Index { index })) => Some(*index),
                    _ => None,
                },
            }),
        })
        .collect()
}

fn index_stops(stops: &[Stop]) -> FxHashMap<&str, (usize, &Stop)> {
    stops.iter().enumerate().map(|(idx, stop)| (stop.id.as_str(), (idx, stop))).collect()
}
