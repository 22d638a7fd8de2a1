//! bustrack-core: static timetable model + live fleet state cache.
//!
//! No async, no HTTP — the live feed is injected through the
//! [`FeedSource`] trait and the only I/O here is reading local files
//! (static tables, the fallback snapshot, the config file). This crate
//! is the shared core used by the `bustrack` CLI and JSON API.

pub mod cache;
pub mod config;
pub mod feed;
pub mod geo;
pub mod schedule;
pub mod stops;
pub mod types;

// Re-export commonly used types at crate root
pub use cache::{FeedSource, FleetStateCache, DEFAULT_STALENESS};
pub use schedule::{Direction, Route, ScheduleCatalog, Service, Trip};
pub use stops::{Stop, StopDirectory};
pub use types::*;
