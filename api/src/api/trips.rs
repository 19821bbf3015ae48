use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{AppError, AppState, ErrorResponse};
use crate::models::TripSchedule;

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserQuery {
    pub user_id: String,
}

/// Identifies a trip together with the user who scheduled it, so one user
/// cannot modify another's trips.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TripRef {
    pub trip_id: String,
    pub user_id: String,
}

/// All trips scheduled by a user.
#[utoipa::path(
    get,
    path = "/api/get-scheduled-trips",
    params(UserQuery),
    responses(
        (status = 200, description = "The user's scheduled trips", body = [TripSchedule]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn get_scheduled_trips(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<TripSchedule>>, AppError> {
    let trips = state.store.trips_for_user(&query.user_id).await?;
    Ok(Json(trips))
}

/// Schedule a trip. The server assigns the id; the watcher picks the trip
/// up on its next scan.
#[utoipa::path(
    post,
    path = "/api/schedule-trip",
    request_body = TripSchedule,
    responses(
        (status = 200, description = "The stored trip with its assigned id", body = TripSchedule),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn schedule_trip(
    State(state): State<AppState>,
    Json(mut trip): Json<TripSchedule>,
) -> Result<Json<TripSchedule>, AppError> {
    if trip.route.departure_time > trip.route.arrival_time {
        return Err(AppError::BadRequest(
            "route departs after it arrives".to_string(),
        ));
    }
    trip.id = Uuid::new_v4().to_string();
    state.store.schedule_trip(&trip).await?;
    Ok(Json(trip))
}

/// Toggle a trip between enabled and disabled.
#[utoipa::path(
    post,
    path = "/api/enable-disable-trip",
    request_body = TripRef,
    responses(
        (status = 204, description = "Trip toggled"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn enable_disable_trip(
    State(state): State<AppState>,
    Json(trip): Json<TripRef>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .toggle_enabled(&trip.trip_id, &trip.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a scheduled trip.
#[utoipa::path(
    delete,
    path = "/api/delete-trip",
    request_body = TripRef,
    responses(
        (status = 204, description = "Trip deleted"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "trips"
)]
pub async fn delete_trip(
    State(state): State<AppState>,
    Json(trip): Json<TripRef>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .delete_trip(&trip.trip_id, &trip.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
