use crate::models::{Coordinate, Stop, StopId};
use serde::{Deserialize, Serialize};

/// A type of the difference between committed and candidate stop lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    /// Stop is new in the route.
    Added,
    /// Stop has left the route.
    Removed,
    /// Stop position has changed.
    Sequence,
    /// Stop location or address text has changed.
    Address,
    /// Customer or order data has changed.
    Data,
}

impl ChangeType {
    /// Returns priority used to pick a single modification type per stop, higher wins.
    pub fn priority(&self) -> usize {
        match self {
            ChangeType::Removed => 5,
            ChangeType::Added => 4,
            ChangeType::Address => 3,
            ChangeType::Sequence => 2,
            ChangeType::Data => 1,
        }
    }
}

/// A value carried by the change record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ChangeValue {
    /// A whole stop, used by added and removed changes.
    Stop {
        /// The stop.
        stop: Box<Stop>,
    },
    /// A position in the route.
    Index {
        /// Zero-based position.
        index: usize,
    },
    /// An address snapshot.
    #[serde(rename_all = "camelCase")]
    Address {
        /// Address text.
        address: String,
        /// Coordinate.
        location: Option<Coordinate>,
    },
    /// A customer data snapshot.
    #[serde(rename_all = "camelCase")]
    Data {
        /// Customer name.
        customer_name: String,
        /// Phone.
        phone: String,
        /// Notes.
        notes: String,
        /// Order reference.
        order_number: String,
    },
}

impl ChangeValue {
    /// Takes address snapshot of the stop.
    pub fn address_of(stop: &Stop) -> Self {
        ChangeValue::Address { address: stop.address.clone(), location: stop.location }
    }

    /// Takes customer data snapshot of the stop.
    pub fn data_of(stop: &Stop) -> Self {
        ChangeValue::Data {
            customer_name: stop.customer_name.clone(),
            phone: stop.phone.clone(),
            notes: stop.notes.clone(),
            order_number: stop.order_number.clone(),
        }
    }
}

/// A single difference detected between committed and candidate stop lists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Stop id.
    pub stop_id: StopId,
    /// Stop position: in the committed list for removed stops, in the candidate list otherwise.
    pub stop_index: usize,
    /// Change type.
    pub change_type: ChangeType,
    /// Value before the change.
    pub old_value: Option<ChangeValue>,
    /// Value after the change.
    pub new_value: Option<ChangeValue>,
}

/// Describes how the stop was modified by the last commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopModification {
    /// Stop id.
    pub stop_id: StopId,
    /// A single, highest priority modification type.
    pub modification_type: ChangeType,
    /// A previous position, set only for sequence modification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_sequence: Option<usize>,
}

/// A stop annotated with its modification, consumed by notifications and highlighting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedStop {
    /// The stop.
    #[serde(flatten)]
    pub stop: Stop,
    /// Modification, if stop was modified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification: Option<StopModification>,
}

impl MarkedStop {
    /// Returns true if stop was modified.
    pub fn was_modified(&self) -> bool {
        self.modification.is_some()
    }
}
