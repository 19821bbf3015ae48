use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use super::AppState;
use crate::models::{Point, RouteOption};

#[derive(Debug, Deserialize, IntoParams)]
pub struct RouteQuery {
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
    /// transit, driving, walking, ...
    pub transport_type: String,
    /// Target arrival, milliseconds since epoch.
    pub arrival_time: i64,
    /// Optional line filter (e.g. a bus number).
    #[serde(default)]
    pub route_name: String,
}

/// Search for route options arriving around the requested time.
#[utoipa::path(
    get,
    path = "/api/get-routes",
    params(RouteQuery),
    responses(
        (status = 200, description = "Matching route options", body = [RouteOption])
    ),
    tag = "routes"
)]
pub async fn get_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Json<Vec<RouteOption>> {
    let routes = state
        .finder
        .find_routes(
            Point {
                lat: query.origin_lat,
                lng: query.origin_lng,
            },
            Point {
                lat: query.dest_lat,
                lng: query.dest_lng,
            },
            &query.transport_type,
            query.arrival_time,
            &query.route_name,
        )
        .await;
    Json(routes)
}
