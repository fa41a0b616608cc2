//! Detects changes between committed and candidate stop lists.

#[cfg(test)]
#[path = "../../tests/unit/extensions/diff_test.rs"]
mod diff_test;

use routeplan_core::prelude::*;
use serde::Serialize;
use std::io::{BufReader, BufWriter, Read, Write};

/// A result of comparison.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOutput {
    /// Detected changes.
    pub changes: Vec<ChangeRecord>,
    /// Candidate stops annotated with their modifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marked: Option<Vec<MarkedStop>>,
}

/// Reads two stop lists and compares them.
pub fn diff_stops<R1: Read, R2: Read>(
    old_reader: BufReader<R1>,
    new_reader: BufReader<R2>,
    is_marked: bool,
) -> GenericResult<DiffOutput> {
    let old_stops = read_stops(old_reader, "old")?;
    let new_stops = read_stops(new_reader, "new")?;

    let changes = detect_route_changes(&old_stops, &new_stops);
    let marked = if is_marked { Some(mark_modified_stops(&new_stops, &changes)) } else { None };

    Ok(DiffOutput { changes, marked })
}

/// Writes comparison result as json.
pub fn write_diff<W: Write>(writer: BufWriter<W>, output: &DiffOutput) -> GenericResult<()> {
    serde_json::to_writer_pretty(writer, output).map_err(|err| format!("cannot write changes: '{err}'").into())
}

fn read_stops<R: Read>(reader: BufReader<R>, description: &str) -> GenericResult<Vec<Stop>> {
    serde_json::from_reader(reader).map_err(|err| format!("cannot deserialize {description} stops: '{err}'").into())
}
