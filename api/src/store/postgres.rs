//! Postgres-backed [`TripStore`].
//!
//! Rows are joined with their owning user on read so a trip always carries
//! a complete `UserInfo`. Malformed rows are logged and skipped rather than
//! failing a whole listing.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::warn;

use super::{StoreError, TripStore};
use crate::models::{DeviceOs, LocalTimestamp, Point, RouteOption, TripSchedule, UserInfo};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const TRIP_COLUMNS: &str = "\
    trips.id, trips.description, trips.origin_lat, trips.origin_lng, \
    trips.dest_lat, trips.dest_lng, trips.input_arrival_time, \
    trips.input_arrival_local_date, trips.timezone_location, \
    trips.route_departure_time, trips.route_arrival_time, \
    trips.waiting_window, trips.transport_type, trips.route_name, \
    trips.repeat_days, trips.enabled, trips.last_notification_sent, \
    users.user_id, users.notification_token, users.os";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        PostgresStore { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        MIGRATOR.run(&pool).await.map_err(sqlx::Error::from)?;
        Ok(PostgresStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn collect_trips(rows: Vec<PgRow>) -> Vec<TripSchedule> {
        rows.iter()
            .filter_map(|row| match trip_from_row(row) {
                Ok(trip) => Some(trip),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed trip row");
                    None
                }
            })
            .collect()
    }
}

fn trip_from_row(row: &PgRow) -> Result<TripSchedule, StoreError> {
    let os: String = row.try_get("os")?;
    let device_os: DeviceOs = os
        .parse()
        .map_err(|e: String| StoreError::MalformedRow(e))?;
    let repeat_days: Vec<bool> = row.try_get("repeat_days")?;
    let repeat_days: [bool; 7] = repeat_days
        .try_into()
        .map_err(|days: Vec<bool>| {
            StoreError::MalformedRow(format!("repeat_days has length {}", days.len()))
        })?;

    Ok(TripSchedule {
        id: row.try_get("id")?,
        user: UserInfo {
            id: row.try_get("user_id")?,
            notification_token: row.try_get("notification_token")?,
            device_os,
        },
        origin: Point {
            lat: row.try_get("origin_lat")?,
            lng: row.try_get("origin_lng")?,
        },
        destination: Point {
            lat: row.try_get("dest_lat")?,
            lng: row.try_get("dest_lng")?,
        },
        route: RouteOption::new(
            row.try_get("route_departure_time")?,
            row.try_get("route_arrival_time")?,
            row.try_get::<String, _>("route_name")?,
            row.try_get::<String, _>("description")?,
        ),
        input_arrival_time: LocalTimestamp {
            instant_ms: row.try_get("input_arrival_time")?,
            local_string: row.try_get("input_arrival_local_date")?,
            tz_name: row.try_get("timezone_location")?,
        },
        waiting_window_ms: row.try_get("waiting_window")?,
        transport_type: row.try_get("transport_type")?,
        repeat_days,
        enabled: row.try_get("enabled")?,
        last_notification_sent: row.try_get("last_notification_sent")?,
    })
}

#[async_trait]
impl TripStore for PostgresStore {
    async fn all_trips(&self) -> Result<Vec<TripSchedule>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips JOIN users ON trips.user_id = users.user_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(Self::collect_trips(rows))
    }

    async fn trips_for_user(&self, user_id: &str) -> Result<Vec<TripSchedule>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips JOIN users ON trips.user_id = users.user_id \
             WHERE trips.user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Self::collect_trips(rows))
    }

    async fn schedule_trip(&self, trip: &TripSchedule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO trips \
             (id, user_id, description, origin_lat, origin_lng, dest_lat, dest_lng, \
              input_arrival_time, input_arrival_local_date, timezone_location, \
              route_departure_time, route_arrival_time, waiting_window, transport_type, \
              route_name, repeat_days, enabled, last_notification_sent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(&trip.id)
        .bind(&trip.user.id)
        .bind(&trip.route.description)
        .bind(trip.origin.lat)
        .bind(trip.origin.lng)
        .bind(trip.destination.lat)
        .bind(trip.destination.lng)
        .bind(trip.input_arrival_time.instant_ms)
        .bind(&trip.input_arrival_time.local_string)
        .bind(&trip.input_arrival_time.tz_name)
        .bind(trip.route.departure_time)
        .bind(trip.route.arrival_time)
        .bind(trip.waiting_window_ms)
        .bind(&trip.transport_type)
        .bind(&trip.route.name)
        .bind(trip.repeat_days.to_vec())
        .bind(trip.enabled)
        .bind(trip.last_notification_sent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_user(&self, user: &UserInfo) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (user_id, notification_token, os) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET \
             notification_token = EXCLUDED.notification_token, os = EXCLUDED.os",
        )
        .bind(&user.id)
        .bind(&user.notification_token)
        .bind(user.device_os.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_last_notification(
        &self,
        trip_id: &str,
        timestamp_ms: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE trips SET last_notification_sent = $1 WHERE id = $2")
            .bind(timestamp_ms)
            .bind(trip_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn toggle_enabled(&self, trip_id: &str, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE trips SET enabled = NOT enabled WHERE id = $1 AND user_id = $2")
            .bind(trip_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_trip(&self, trip_id: &str, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM trips WHERE id = $1 AND user_id = $2")
            .bind(trip_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_enabled(&self, trip: &TripSchedule) -> bool {
        let result = sqlx::query_scalar::<_, bool>("SELECT enabled FROM trips WHERE id = $1")
            .bind(&trip.id)
            .fetch_one(&self.pool)
            .await;
        match result {
            Ok(enabled) => enabled,
            // a missing trip has been deleted, therefore it is disabled
            Err(sqlx::Error::RowNotFound) => false,
            Err(e) => {
                warn!(trip = %trip.id, error = %e, "Enabled check failed, using last-known value");
                trip.enabled
            }
        }
    }
}
