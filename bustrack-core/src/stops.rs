//! Stop directory: id → named, geolocated stop.

use std::collections::HashMap;
use std::io::Read;

use serde::Serialize;

use crate::types::{LatLon, Result, TransitError};

/// Expected field count of a stop table row:
/// `stop_id,stop_name,stop_lat,stop_lon,location_type`
const STOP_ROW_FIELDS: usize = 5;

/// A named boarding/alighting point. Immutable once loaded.
#[derive(Debug, Clone, Serialize)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub location: LatLon,
}

/// Owned registry of stops, built by [`StopDirectory::load`] and
/// read-only afterwards.
#[derive(Debug, Default)]
pub struct StopDirectory {
    stops: HashMap<String, Stop>,
}

impl StopDirectory {
    /// Parse the stop table. The header row is skipped; every data row
    /// must have exactly 5 fields with in-range coordinates. The
    /// trailing location type is ignored.
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let mut directory = StopDirectory::default();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        for (idx, rec) in rdr.records().enumerate() {
            let rec = rec?;
            let row = idx + 2; // 1-based, counting the header
            if rec.len() != STOP_ROW_FIELDS {
                return Err(TransitError::RowWidth {
                    row,
                    expected: STOP_ROW_FIELDS,
                    actual: rec.len(),
                });
            }

            let lat = parse_coord(&rec[2], "stop_lat", row)?;
            let lon = parse_coord(&rec[3], "stop_lon", row)?;
            let stop = Stop {
                id: rec[0].trim().to_string(),
                name: rec[1].trim().to_string(),
                location: LatLon::new(lat, lon)?,
            };
            directory.stops.insert(stop.id.clone(), stop);
        }
        Ok(directory)
    }

    /// Look up a stop by id. Unknown ids are not an error.
    pub fn lookup(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.get(stop_id)
    }

    pub fn stops(&self) -> impl Iterator<Item = &Stop> {
        self.stops.values()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

fn parse_coord(value: &str, field: &'static str, row: usize) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| TransitError::InvalidField {
            row,
            field,
            value: value.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "stop_id,stop_name,stop_lat,stop_lon,location_type\n";

    #[test]
    fn test_load_and_lookup() {
        let data = format!(
            "{HEADER}\
             90000170,Hlemmur,64.143196,-21.905391,0\n\
             90000060,Laekjartorg,64.147876,-21.937515,0\n"
        );
        let directory = StopDirectory::load(data.as_bytes()).unwrap();

        assert_eq!(directory.len(), 2);
        let stop = directory.lookup("90000170").unwrap();
        assert_eq!(stop.name, "Hlemmur");
        assert!((stop.location.lat - 64.143196).abs() < 1e-9);

        assert!(directory.lookup("nope").is_none());
    }

    #[test]
    fn test_fields_are_trimmed() {
        let data = format!("{HEADER} 1 , Main Square ,64.1,-21.9,0\n");
        let directory = StopDirectory::load(data.as_bytes()).unwrap();
        assert_eq!(directory.lookup("1").unwrap().name, "Main Square");
    }

    #[test]
    fn test_short_row_fails_load() {
        let data = format!("{HEADER}90000170,Hlemmur,64.143196,-21.905391\n");
        assert!(matches!(
            StopDirectory::load(data.as_bytes()),
            Err(TransitError::RowWidth {
                expected: 5,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_bad_coordinate_fails_load() {
        let data = format!("{HEADER}1,Somewhere,north,-21.9,0\n");
        assert!(matches!(
            StopDirectory::load(data.as_bytes()),
            Err(TransitError::InvalidField {
                field: "stop_lat",
                ..
            })
        ));
    }

    #[test]
    fn test_out_of_range_coordinate_fails_load() {
        let data = format!("{HEADER}1,Somewhere,95.0,-21.9,0\n");
        assert!(matches!(
            StopDirectory::load(data.as_bytes()),
            Err(TransitError::InvalidCoordinates { .. })
        ));
    }
}
