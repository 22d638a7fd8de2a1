//! bustrack: CLI + JSON API for live bus fleet state.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use comfy_table::Table;

use bustrack_core::{
    config, geo, BusSighting, FleetStateCache, LatLon, Result, ScheduleCatalog, StopDirectory,
};

mod source;
mod web;

use source::HttpFeedSource;

#[derive(Parser)]
#[command(name = "bustrack", version, about = "Live bus fleet state over a static timetable")]
struct Cli {
    /// Config file path
    #[arg(long, env = "BUSTRACK_CONFIG", default_value = "bustrack.yaml")]
    config: PathBuf,

    /// Override the live-feed URL
    #[arg(long)]
    feed_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every route with its active services and live buses
    Fleet {
        /// Sort buses by distance to this LAT,LON reference point
        #[arg(long, value_parser = parse_latlon)]
        near: Option<LatLon>,

        /// Service activation date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Print live buses on one route
    Route {
        route_id: String,

        /// Sort buses by distance to this LAT,LON reference point
        #[arg(long, value_parser = parse_latlon)]
        near: Option<LatLon>,

        /// Service activation date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show a stop by id
    Stop { stop_id: String },

    /// Run the JSON API server
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut cfg = config::load(&cli.config);
    if let Some(url) = cli.feed_url {
        cfg.feed.url = url;
    }

    let catalog = ScheduleCatalog::load(File::open(&cfg.data.trips)?)?;
    let stops = StopDirectory::load(File::open(&cfg.data.stops)?)?;
    let feed = HttpFeedSource::new(&cfg.feed.url, Duration::from_secs(cfg.feed.timeout_sec))?;
    let cache = FleetStateCache::new(
        Box::new(feed),
        &cfg.data.fallback,
        Duration::from_secs(cfg.feed.stale_sec),
    );

    match cli.command {
        Commands::Fleet { near, date } => {
            let snapshot = cache.snapshot()?;
            let on_date = date.unwrap_or_else(|| Local::now().date_naive());
            for route_id in snapshot.route_ids() {
                print_route(&catalog, &stops, route_id, snapshot.on_route(route_id), near, on_date);
            }
            Ok(())
        }
        Commands::Route {
            route_id,
            near,
            date,
        } => {
            let buses = cache.buses_on_route(&route_id)?;
            let on_date = date.unwrap_or_else(|| Local::now().date_naive());
            print_route(&catalog, &stops, &route_id, &buses, near, on_date);
            Ok(())
        }
        Commands::Stop { stop_id } => {
            match stops.lookup(&stop_id) {
                Some(stop) => println!("{}: {} at {}", stop.id, stop.name, stop.location),
                None => println!("{stop_id}: ?"),
            }
            Ok(())
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(cfg.server.host);
            let port = port.unwrap_or(cfg.server.port);
            let state = Arc::new(web::AppState {
                catalog,
                stops,
                cache,
            });
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(web::serve(state, host, port))?;
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

fn print_route(
    catalog: &ScheduleCatalog,
    stops: &StopDirectory,
    route_id: &str,
    buses: &[BusSighting],
    near: Option<LatLon>,
    on_date: NaiveDate,
) {
    match catalog.route(route_id) {
        Some(route) => println!(
            "Route {} with {} services:",
            route.id,
            route.service_codes.len()
        ),
        None => println!("Route {route_id} (not in timetable):"),
    }

    let mut active = catalog.active_services(route_id, on_date);
    active.sort_by(|a, b| a.code.cmp(&b.code));
    for service in active {
        println!("   service {} (from {})", service.code, service.valid_from);
    }

    let mut buses = buses.to_vec();
    if let Some(origin) = near {
        buses.sort_by(|a, b| {
            geo::distance_km(origin, a.location).total_cmp(&geo::distance_km(origin, b.location))
        });
    }
    print_bus_table(stops, &buses, near);
}

fn print_bus_table(stops: &StopDirectory, buses: &[BusSighting], near: Option<LatLon>) {
    if buses.is_empty() {
        println!("   (no live buses)");
        return;
    }

    let mut table = Table::new();
    let mut header = vec!["Location", "Heading", "Stop", "Next", "Status"];
    if near.is_some() {
        header.push("Distance (km)");
    }
    table.set_header(header);

    for bus in buses {
        let mut row = vec![
            bus.location.to_string(),
            format!("{:6.2}", bus.heading),
            stop_name(stops, &bus.stop_id),
            stop_name(stops, &bus.next_stop_id),
            bus.status.to_string(),
        ];
        if let Some(origin) = near {
            row.push(format!("{:.2}", geo::distance_km(origin, bus.location)));
        }
        table.add_row(row);
    }
    println!("{table}");
}

/// Unresolved stops print a placeholder rather than failing; a bus
/// referencing a stop missing from the static feed is normal.
fn stop_name(stops: &StopDirectory, stop_id: &Option<String>) -> String {
    stop_id
        .as_deref()
        .and_then(|id| stops.lookup(id))
        .map(|stop| stop.name.clone())
        .unwrap_or_else(|| "?".to_string())
}

fn parse_latlon(value: &str) -> std::result::Result<LatLon, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| "expected LAT,LON".to_string())?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("bad latitude {lat:?}"))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("bad longitude {lon:?}"))?;
    LatLon::new(lat, lon).map_err(|err| err.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
