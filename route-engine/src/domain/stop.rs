//! Stop records and insertion candidates.

use serde::{Deserialize, Serialize};

use super::StopId;

/// An address entry owned by exactly one Route.
///
/// `count` records how many insert requests for the same address have
/// collapsed into this Stop. It is always at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub street: String,
    pub city: String,
    pub count: u32,
}

impl Stop {
    /// Create a Stop with a fresh identifier and a count of 1.
    pub fn new(street: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: StopId::generate(),
            street: street.into(),
            city: city.into(),
            count: 1,
        }
    }

    /// Create a Stop from an insertion candidate.
    pub fn from_primitive(primitive: &StopPrimitive) -> Self {
        Self::new(primitive.street.clone(), primitive.city.clone())
    }

    /// Record one more insert request for this address.
    pub fn bump(&mut self) {
        self.count = self.count.saturating_add(1);
    }
}

/// A transient street/city pair used to request an insert.
///
/// Two addresses are the same Stop when both fields are exactly equal.
/// Comparison is case-sensitive and nothing is normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopPrimitive {
    pub street: String,
    pub city: String,
}

impl StopPrimitive {
    pub fn new(street: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
        }
    }

    /// Whether `stop` holds the same address as this candidate.
    pub fn matches(&self, stop: &Stop) -> bool {
        self.street == stop.street && self.city == stop.city
    }
}

impl From<&Stop> for StopPrimitive {
    fn from(stop: &Stop) -> Self {
        Self::new(stop.street.clone(), stop.city.clone())
    }
}
