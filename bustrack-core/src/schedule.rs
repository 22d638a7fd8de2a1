//! Static timetable: routes, dated services, and trips.
//!
//! Loaded once at startup from the comma-delimited trip table and
//! read-only afterwards. Lookups never mutate; the get-or-create
//! registration steps are private to the load path.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::types::{Result, TransitError};

/// Expected field count of a trip table row:
/// `route_id,service_id,trip_id,trip_headsign,trip_short_name,direction_id,block_id,shape_id`
const TRIP_ROW_FIELDS: usize = 8;

/// Total length of a service code: `YYYYMMDD`, a separator character,
/// then a 7-character Monday-first weekday mask.
const SERVICE_CODE_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A named bus line, aggregating the services offered under it.
#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub id: String,
    pub service_codes: BTreeSet<String>,
}

/// A dated, weekday-patterned schedule variant of a route.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub code: String,
    pub valid_from: NaiveDate,
    /// Monday-first weekday activation flags.
    pub weekdays: [bool; 7],
    pub trips: Vec<Trip>,
}

/// Trip direction. 0 is outbound, 1 is inbound; the assignment is
/// arbitrary in the source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outbound,
    Inbound,
}

/// One scheduled run within a service.
#[derive(Debug, Clone, Serialize)]
pub struct Trip {
    pub id: String,
    pub headsign: String,
    pub short_name: String,
    pub direction: Direction,
    pub block_id: String,
}

impl Service {
    /// Decode a service code into its validity start date and weekday
    /// mask. Any character other than `-` marks the weekday active.
    pub fn decode(code: &str) -> Result<Self> {
        if code.len() != SERVICE_CODE_LEN || !code.is_ascii() {
            return Err(TransitError::ServiceCode(code.to_string()));
        }
        let bad = || TransitError::ServiceCode(code.to_string());
        let year: i32 = code[0..4].parse().map_err(|_| bad())?;
        let month: u32 = code[4..6].parse().map_err(|_| bad())?;
        let day: u32 = code[6..8].parse().map_err(|_| bad())?;
        let valid_from = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)?;

        let mut weekdays = [false; 7];
        for (i, c) in code[9..16].chars().enumerate() {
            weekdays[i] = c != '-';
        }

        Ok(Service {
            code: code.to_string(),
            valid_from,
            weekdays,
            trips: Vec::new(),
        })
    }

    /// A service is active on a date iff the date is on or after
    /// `valid_from` and its weekday flag is set.
    pub fn is_active_on(&self, on_date: NaiveDate) -> bool {
        on_date >= self.valid_from
            && self.weekdays[on_date.weekday().num_days_from_monday() as usize]
    }

    pub fn is_active_on_weekday(&self, weekday: chrono::Weekday) -> bool {
        self.weekdays[weekday.num_days_from_monday() as usize]
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Owned registry of routes and services, built by [`ScheduleCatalog::load`].
///
/// Reloading means constructing a new catalog; a failed load leaves no
/// partial state behind.
#[derive(Debug, Default)]
pub struct ScheduleCatalog {
    routes: HashMap<String, Route>,
    services: HashMap<String, Service>,
}

impl ScheduleCatalog {
    /// Parse the trip table. The header row is skipped; every data row
    /// must have exactly 8 fields. The qualified route id (`ST.17`) is
    /// reduced to its canonical form (`17`). The trailing shape id is
    /// ignored.
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let mut catalog = ScheduleCatalog::default();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        for (idx, rec) in rdr.records().enumerate() {
            let rec = rec?;
            let row = idx + 2; // 1-based, counting the header
            if rec.len() != TRIP_ROW_FIELDS {
                return Err(TransitError::RowWidth {
                    row,
                    expected: TRIP_ROW_FIELDS,
                    actual: rec.len(),
                });
            }

            let route_id = canonical_route_id(&rec[0], row)?;
            let service_code = rec[1].to_string();
            let direction = match rec[5].trim() {
                "0" => Direction::Outbound,
                "1" => Direction::Inbound,
                other => {
                    return Err(TransitError::InvalidField {
                        row,
                        field: "direction_id",
                        value: other.to_string(),
                    })
                }
            };
            let trip = Trip {
                id: rec[2].to_string(),
                headsign: rec[3].to_string(),
                short_name: rec[4].to_string(),
                direction,
                block_id: rec[6].to_string(),
            };

            catalog.register_service(&service_code)?.trips.push(trip);
            catalog
                .register_route(&route_id)
                .service_codes
                .insert(service_code);
        }
        Ok(catalog)
    }

    /// Look up a route by canonical id. Never mutates.
    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// Look up a service by code. Never mutates.
    pub fn service(&self, code: &str) -> Option<&Service> {
        self.services.get(code)
    }

    /// All services of a route active on the given date, in
    /// unspecified order. Unknown route ids yield an empty list.
    pub fn active_services(&self, route_id: &str, on_date: NaiveDate) -> Vec<&Service> {
        let Some(route) = self.routes.get(route_id) else {
            return Vec::new();
        };
        route
            .service_codes
            .iter()
            .filter_map(|code| self.services.get(code))
            .filter(|service| service.is_active_on(on_date))
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    fn register_route(&mut self, id: &str) -> &mut Route {
        self.routes.entry(id.to_string()).or_insert_with(|| Route {
            id: id.to_string(),
            service_codes: BTreeSet::new(),
        })
    }

    fn register_service(&mut self, code: &str) -> Result<&mut Service> {
        match self.services.entry(code.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(Service::decode(code)?)),
        }
    }
}

/// Strip the namespace prefix from a qualified route id (`ST.17` → `17`).
fn canonical_route_id(qualified: &str, row: usize) -> Result<String> {
    match qualified.split_once('.') {
        Some((_, id)) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(TransitError::UnqualifiedRoute {
            row,
            id: qualified.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
