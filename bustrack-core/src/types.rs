//! Shared types and the error enum for bustrack-core.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// All errors produced by bustrack-core.
#[derive(Debug, Error)]
pub enum TransitError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: expected {expected} fields, got {actual}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {row}: route id {id:?} has no namespace prefix")]
    UnqualifiedRoute { row: usize, id: String },
    #[error("invalid service code {0:?}")]
    ServiceCode(String),
    #[error("row {row}: invalid {field} value {value:?}")]
    InvalidField {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("coordinates out of range: ({lat}, {lon})")]
    InvalidCoordinates { lat: f64, lon: f64 },
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("malformed feed document: {0}")]
    Feed(String),
    #[error("no fleet data available")]
    NoData,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransitError>;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A validated (latitude, longitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    /// Construct a coordinate pair, rejecting values outside
    /// lat [-90, 90] / lon [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(TransitError::InvalidCoordinates { lat, lon });
        }
        Ok(LatLon { lat, lon })
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6},{:.6})", self.lat, self.lon)
    }
}

// ---------------------------------------------------------------------------
// Live fleet state
// ---------------------------------------------------------------------------

/// Operating state reported by a bus. Opaque tag from the feed; the
/// only interpretation applied is naming the known codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusStatus {
    /// Code 2: the bus has stopped.
    Stopped,
    /// Code 3: the bus has departed.
    Departed,
    /// Code 4: main switch off; messages arrive every two minutes.
    SwitchOff,
    /// Code 5: main switch on; messages arrive every 15 seconds.
    SwitchOn,
    /// Code 6: running, 15+ seconds since the last message.
    Running,
    /// Code 7: arrived at a stop.
    Arrived,
    /// Any unrecognized code.
    Other(u8),
}

impl BusStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            2 => BusStatus::Stopped,
            3 => BusStatus::Departed,
            4 => BusStatus::SwitchOff,
            5 => BusStatus::SwitchOn,
            6 => BusStatus::Running,
            7 => BusStatus::Arrived,
            other => BusStatus::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            BusStatus::Stopped => 2,
            BusStatus::Departed => 3,
            BusStatus::SwitchOff => 4,
            BusStatus::SwitchOn => 5,
            BusStatus::Running => 6,
            BusStatus::Arrived => 7,
            BusStatus::Other(code) => *code,
        }
    }
}

impl fmt::Display for BusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusStatus::Stopped => write!(f, "stopped"),
            BusStatus::Departed => write!(f, "departed"),
            BusStatus::SwitchOff => write!(f, "switch off"),
            BusStatus::SwitchOn => write!(f, "switch on"),
            BusStatus::Running => write!(f, "running"),
            BusStatus::Arrived => write!(f, "arrived"),
            BusStatus::Other(code) => write!(f, "code {code}"),
        }
    }
}

/// One live bus position from the feed. The stop ids are foreign keys
/// into the stop directory, resolved lazily by callers; they may be
/// absent when the bus reports no stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusSighting {
    pub route_id: String,
    pub location: LatLon,
    pub heading: f64,
    pub stop_id: Option<String>,
    pub next_stop_id: Option<String>,
    pub status: BusStatus,
}

/// The complete set of live bus positions, keyed by route id, plus the
/// capture timestamp. Replaced wholesale on each refresh, never
/// mutated in place.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    pub buses: HashMap<String, Vec<BusSighting>>,
    pub captured_at: DateTime<Utc>,
}

impl FleetSnapshot {
    /// Sightings on one route. A route with no live buses yields an
    /// empty slice; "route unknown" is a timetable concern, not ours.
    pub fn on_route(&self, route_id: &str) -> &[BusSighting] {
        self.buses.get(route_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_buses(&self) -> usize {
        self.buses.values().map(Vec::len).sum()
    }

    /// Route ids with at least one sighting, sorted numerically where
    /// possible ("2" before "15"), otherwise lexically.
    pub fn route_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.buses.keys().map(String::as_str).collect();
        ids.sort_by_key(|id| (id.len(), id.to_string()));
        ids
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlon_validation() {
        assert!(LatLon::new(64.15, -21.95).is_ok());
        assert!(LatLon::new(90.0, 180.0).is_ok());
        assert!(LatLon::new(90.1, 0.0).is_err());
        assert!(LatLon::new(0.0, -180.5).is_err());
    }

    #[test]
    fn test_latlon_format() {
        let loc = LatLon::new(64.156896, -21.9512).unwrap();
        assert_eq!(loc.to_string(), "(64.156896,-21.951200)");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BusStatus::from_code(2), BusStatus::Stopped);
        assert_eq!(BusStatus::from_code(7), BusStatus::Arrived);
        assert_eq!(BusStatus::from_code(1), BusStatus::Other(1));
        assert_eq!(BusStatus::from_code(6).code(), 6);
        assert_eq!(BusStatus::Other(42).code(), 42);
    }

    #[test]
    fn test_snapshot_on_route_empty() {
        let snap = FleetSnapshot {
            buses: HashMap::new(),
            captured_at: Utc::now(),
        };
        assert!(snap.on_route("14").is_empty());
        assert_eq!(snap.total_buses(), 0);
    }

    #[test]
    fn test_route_id_ordering() {
        let mut buses = HashMap::new();
        for id in ["15", "2", "1", "s4"] {
            buses.insert(id.to_string(), Vec::new());
        }
        let snap = FleetSnapshot {
            buses,
            captured_at: Utc::now(),
        };
        assert_eq!(snap.route_ids(), vec!["1", "2", "15", "s4"]);
    }
}
