//! HTTP surface for user registration, trip CRUD and route search.

pub mod error;
pub mod health;
pub mod routes;
pub mod trips;
pub mod users;

pub use error::{AppError, ErrorResponse};

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::finders::RouteFinder;
use crate::store::TripStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TripStore>,
    pub finder: Arc<dyn RouteFinder>,
}

pub fn router(store: Arc<dyn TripStore>, finder: Arc<dyn RouteFinder>) -> Router {
    let state = AppState { store, finder };
    Router::new()
        .route("/register-user", post(users::register_user))
        .route("/get-scheduled-trips", get(trips::get_scheduled_trips))
        .route("/schedule-trip", post(trips::schedule_trip))
        .route("/enable-disable-trip", post(trips::enable_disable_trip))
        .route("/delete-trip", delete(trips::delete_trip))
        .route("/get-routes", get(routes::get_routes))
        .route("/health", get(health::health_check))
        .with_state(state)
}
