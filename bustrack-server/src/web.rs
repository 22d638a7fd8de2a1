//! Web server — axum JSON API over the core query surface.
//!
//! The cache refresh may block on the remote fetch, so handlers run
//! cache access on the blocking pool.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use bustrack_core::{FleetStateCache, ScheduleCatalog, StopDirectory, TransitError};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub catalog: ScheduleCatalog,
    pub stops: StopDirectory,
    pub cache: FleetStateCache,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/fleet", axum::routing::get(api_fleet))
        .route(
            "/api/routes/:route_id/buses",
            axum::routing::get(api_route_buses),
        )
        .route(
            "/api/routes/:route_id/services",
            axum::routing::get(api_route_services),
        )
        .route("/api/stops/:stop_id", axum::routing::get(api_stop))
        .with_state(state)
        .layer(cors)
}

/// Start the web server.
pub async fn serve(state: Arc<AppState>, host: String, port: u16) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    info!("bustrack API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/fleet — the whole snapshot, keyed by route id.
async fn api_fleet(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let st = Arc::clone(&state);
    match tokio::task::spawn_blocking(move || st.cache.snapshot()).await {
        Ok(Ok(snapshot)) => (
            StatusCode::OK,
            Json(json!({
                "captured_at": snapshot.captured_at,
                "buses": snapshot.buses,
            })),
        ),
        Ok(Err(err)) => error_response(err),
        Err(join_err) => internal_error(&join_err),
    }
}

/// GET /api/routes/:route_id/buses — live buses on one route. A route
/// with no sightings is an empty array, not an error.
async fn api_route_buses(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let st = Arc::clone(&state);
    match tokio::task::spawn_blocking(move || st.cache.buses_on_route(&route_id)).await {
        Ok(Ok(buses)) => (StatusCode::OK, Json(json!(buses))),
        Ok(Err(err)) => error_response(err),
        Err(join_err) => internal_error(&join_err),
    }
}

#[derive(Deserialize)]
struct ServicesQuery {
    /// Activation date, ISO format; defaults to today.
    date: Option<NaiveDate>,
}

/// GET /api/routes/:route_id/services?date=YYYY-MM-DD
async fn api_route_services(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<String>,
    Query(query): Query<ServicesQuery>,
) -> (StatusCode, Json<Value>) {
    let on_date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let services = state.catalog.active_services(&route_id, on_date);
    (
        StatusCode::OK,
        Json(json!({
            "route_id": route_id,
            "date": on_date,
            "services": services,
        })),
    )
}

/// GET /api/stops/:stop_id
async fn api_stop(
    State(state): State<Arc<AppState>>,
    Path(stop_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.stops.lookup(&stop_id) {
        Some(stop) => (StatusCode::OK, Json(json!(stop))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("unknown stop {stop_id}")})),
        ),
    }
}

fn error_response(err: TransitError) -> (StatusCode, Json<Value>) {
    let status = match err {
        TransitError::NoData => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": err.to_string()})))
}

fn internal_error(err: &tokio::task::JoinError) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": err.to_string()})),
    )
}
