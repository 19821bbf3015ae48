//! Durable storage contract for trips and users.

pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{TripSchedule, UserInfo};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("malformed row: {0}")]
    MalformedRow(String),
}

/// The narrow CRUD surface the watcher and the API server depend on.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Every scheduled trip on the server. Used by the watcher's periodic
    /// scan.
    async fn all_trips(&self) -> Result<Vec<TripSchedule>, StoreError>;

    /// All trips scheduled by one user.
    async fn trips_for_user(&self, user_id: &str) -> Result<Vec<TripSchedule>, StoreError>;

    /// Persist a new trip.
    async fn schedule_trip(&self, trip: &TripSchedule) -> Result<(), StoreError>;

    /// Insert the user, or refresh their notification token if present.
    async fn upsert_user(&self, user: &UserInfo) -> Result<(), StoreError>;

    /// Record when the last alert for a trip went out.
    async fn set_last_notification(&self, trip_id: &str, timestamp_ms: i64)
        -> Result<(), StoreError>;

    /// Flip a trip between enabled and disabled. The user id guards against
    /// toggling someone else's trip.
    async fn toggle_enabled(&self, trip_id: &str, user_id: &str) -> Result<(), StoreError>;

    /// Remove a trip. The user id guards against deleting someone else's
    /// trip.
    async fn delete_trip(&self, trip_id: &str, user_id: &str) -> Result<(), StoreError>;

    /// Whether the trip is currently enabled. A deleted trip reports
    /// `false`; on a transient store error the trip's last-known value is
    /// returned instead, so a flaky database never suppresses or forces an
    /// alert on its own.
    async fn is_enabled(&self, trip: &TripSchedule) -> bool;
}
