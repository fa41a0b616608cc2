#[cfg(test)]
#[path = "../../tests/unit/models/stop_test.rs"]
mod stop_test;

use serde::{Deserialize, Serialize};

/// A stop identifier.
pub type StopId = String;

/// Represents a geographic coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

impl Coordinate {
    /// Creates a new instance of `Coordinate`.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns true if coordinate can be used for planning: finite and not exactly at (0, 0), which
    /// is what upstream uses for "not geocoded".
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && !(self.lat == 0. && self.lng == 0.)
    }

    /// Computes euclidean distance to `other` in coordinate space.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let delta_lat = self.lat - other.lat;
        let delta_lng = self.lng - other.lng;

        (delta_lat * delta_lat + delta_lng * delta_lng).sqrt()
    }
}

/// A delivery outcome of the stop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryOutcome {
    /// Not visited yet.
    #[default]
    Pending,
    /// Delivered.
    Completed,
    /// Delivery attempt failed.
    Failed,
}

/// A time window when customer expects delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start, as provided by ingestion.
    pub start: String,
    /// Window end, as provided by ingestion.
    pub end: String,
}

/// Represents a single delivery location with associated order and customer data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    /// Unique stop id.
    pub id: StopId,
    /// An optional id of the place in external geocoding service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    /// Stop coordinate, absent when it was not geocoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
    /// Address text.
    #[serde(default)]
    pub address: String,
    /// Customer name.
    #[serde(default)]
    pub customer_name: String,
    /// Customer phone.
    #[serde(default)]
    pub phone: String,
    /// Order reference.
    #[serde(default)]
    pub order_number: String,
    /// Free text notes.
    #[serde(default)]
    pub notes: String,
    /// Expected delivery time window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
    /// Delivery outcome.
    #[serde(default)]
    pub outcome: DeliveryOutcome,
}

impl Stop {
    /// Creates a pending stop with given id and location.
    pub fn new(id: impl Into<StopId>, location: Option<Coordinate>) -> Self {
        Self { id: id.into(), location, ..Self::default() }
    }

    /// Returns a coordinate usable for planning, if any.
    pub fn coordinate(&self) -> Option<Coordinate> {
        self.location.filter(|location| location.is_valid())
    }

    /// Returns true if stop needs manual coordinate correction.
    pub fn needs_correction(&self) -> bool {
        self.coordinate().is_none()
    }

    /// Returns true if address related data (location or address text) differs from `other`.
    pub(crate) fn is_address_different(&self, other: &Stop) -> bool {
        self.location != other.location || self.address != other.address
    }

    /// Returns true if customer/order data differs from `other`.
    pub(crate) fn is_data_different(&self, other: &Stop) -> bool {
        self.customer_name != other.customer_name
            || self.phone != other.phone
            || self.notes != other.notes
            || self.order_number != other.order_number
    }
}
