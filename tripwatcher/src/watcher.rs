//! The supervisor scan and the per-trip worker loop.
//!
//! The supervisor lists all scheduled trips once a minute and spawns one
//! worker per trip not already being watched. A worker re-fetches the
//! trip's route at a cadence that tightens as departure approaches, racing
//! each fetch against a deadline so a slow route provider can never push an
//! alert past its time, then fires the notification and advances or
//! deletes the trip.

use std::sync::Arc;
use std::time::Duration;

use api::calendar;
use api::models::{now_ms, RouteOption, TripSchedule};
use api::notifier::Notifier;
use api::scheduling;
use api::store::TripStore;
use tracing::{info, warn};

use crate::generator::RouteGenerator;
use crate::watchlist::WatchList;

/// How often the store is scanned for new trips.
pub const DB_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Extra margin on top of the user's waiting window; push delivery is not
/// instant.
pub const SAFETY_THRESHOLD_MS: i64 = 30 * 1000;

/// A disabled one-shot trip is deleted this long after its arrival time.
const DELETE_GRACE_MS: i64 = 2 * 60 * 60 * 1000;

const HOUR_MS: i64 = 60 * 60 * 1000;
const MINUTE_MS: i64 = 60 * 1000;

/// How long to sleep before re-fetching, given the time remaining until
/// the notification instant.
///
/// Beyond an hour out, wake an hour before the target. Inside the hour,
/// sleep a quarter of the remaining minutes, rounded up to a whole minute
/// so progress is always made; once under a quarter minute of that, sleep
/// the rest and finish.
pub fn round_to_next_interval(ms: i64) -> i64 {
    if ms > HOUR_MS {
        return ms - HOUR_MS;
    }
    let quarter_minutes = (ms as f64 / MINUTE_MS as f64) / 4.0;
    if quarter_minutes < 0.25 {
        return ms;
    }
    (quarter_minutes as i64 + 1) * MINUTE_MS
}

/// Rebase a stored route onto the civil date of `departure_ms`, keeping
/// each end's time of day. Returns the route unchanged when it is already
/// on that date.
pub fn update_route_dates(
    route: &RouteOption,
    departure_ms: i64,
    tz: chrono_tz::Tz,
) -> RouteOption {
    if calendar::same_civil_date(route.departure_time, departure_ms, tz) {
        return route.clone();
    }
    RouteOption {
        departure_time: calendar::with_date_of(route.departure_time, departure_ms, tz),
        arrival_time: calendar::with_date_of(route.arrival_time, departure_ms, tz),
        name: route.name.clone(),
        description: route.description.clone(),
        transit_details: None,
    }
}

fn sleep_ms(ms: i64) -> tokio::time::Sleep {
    tokio::time::sleep(Duration::from_millis(ms.max(0) as u64))
}

/// Follow a trip until its notification instant and return the freshest
/// route seen.
///
/// Each iteration races a route fetch against a deadline. A fetch result
/// revises the notification instant and schedules the next wake-up; a
/// fired deadline either finishes the watch or re-arms for another fetch.
/// A fetch that produces nothing falls back to the last good route, so the
/// alert always goes out on time with the best information available.
pub async fn watch_trip(trip: &TripSchedule, generator: &dyn RouteGenerator) -> RouteOption {
    let safety_buffer = trip.waiting_window_ms + SAFETY_THRESHOLD_MS;
    let departure_time = scheduling::departure_time(trip);
    let mut notification_time = departure_time - safety_buffer;
    let mut timeout = notification_time - now_ms();
    // the stored route with its dates bumped to the occurrence being
    // watched; always a valid answer if nothing fresher arrives
    let mut prev_route = update_route_dates(&trip.route, departure_time, trip.timezone());
    loop {
        let mut fetch = generator.generate_route(trip);
        tokio::select! {
            route = fetch.recv() => {
                if let Some(route) = route.flatten() {
                    prev_route = route;
                }
                notification_time = prev_route.departure_time - safety_buffer;
                let time_left = notification_time - now_ms();
                if time_left <= 0 {
                    return prev_route;
                }
                // never sleep past the notification instant
                let next_check = round_to_next_interval(time_left).min(time_left);
                sleep_ms(next_check).await;
                if now_ms() >= notification_time {
                    return prev_route;
                }
                timeout = notification_time - now_ms();
            }
            _ = sleep_ms(timeout) => {
                if notification_time - now_ms() <= 0 {
                    return prev_route;
                }
                // the fetch is taking too long but there is still time;
                // re-arm and try again
                timeout = notification_time - now_ms();
            }
        }
    }
}

/// Supervisor owning the scan loop and the watch list.
pub struct TripWatcher {
    store: Arc<dyn TripStore>,
    notifier: Arc<dyn Notifier>,
    generator: Arc<dyn RouteGenerator>,
    watchlist: Arc<WatchList>,
}

impl TripWatcher {
    pub fn new(
        store: Arc<dyn TripStore>,
        notifier: Arc<dyn Notifier>,
        generator: Arc<dyn RouteGenerator>,
    ) -> Self {
        TripWatcher {
            store,
            notifier,
            generator,
            watchlist: Arc::new(WatchList::new()),
        }
    }

    /// Scan the store forever, admitting new trips as they appear. The
    /// first scan runs immediately.
    pub async fn run(self: Arc<Self>) {
        info!(
            interval_secs = DB_CHECK_INTERVAL.as_secs(),
            "Starting trip watcher"
        );
        let mut interval = tokio::time::interval(DB_CHECK_INTERVAL);
        loop {
            interval.tick().await;
            match self.store.all_trips().await {
                Ok(trips) => self.clone().watch_trips(trips).await,
                Err(e) => warn!(error = %e, "Failed to list scheduled trips"),
            }
        }
    }

    /// Admit every trip not already being watched and spawn its worker.
    async fn watch_trips(self: Arc<Self>, trips: Vec<TripSchedule>) {
        for trip in trips {
            if self.watchlist.contains(&trip.id) {
                continue;
            }
            if !trip.enabled && !trip.is_repeating() {
                // disabled one-shot trips are cleared once safely past
                if now_ms() - trip.route.arrival_time > DELETE_GRACE_MS {
                    if let Err(e) = self.store.delete_trip(&trip.id, &trip.user.id).await {
                        warn!(trip = %trip.id, error = %e, "Failed to delete expired trip");
                    }
                }
                continue;
            }
            if !self.watchlist.insert(&trip.id) {
                continue;
            }
            let watcher = self.clone();
            tokio::spawn(async move {
                watcher.watch_to_completion(trip).await;
            });
        }
    }

    /// Run one trip's watch to its end: notify if still enabled, then
    /// delete or roll the trip forward, and release the watch-list slot.
    async fn watch_to_completion(&self, trip: TripSchedule) {
        let route = watch_trip(&trip, self.generator.as_ref()).await;
        if self.store.is_enabled(&trip).await {
            info!(trip = %trip.id, route = %route.description, "Sending departure alert");
            if let Err(e) = self.notifier.send(&route, &trip.user).await {
                warn!(trip = %trip.id, error = %e, "Failed to send departure alert");
            }
        }
        if !trip.is_repeating() {
            if let Err(e) = self.store.delete_trip(&trip.id, &trip.user.id).await {
                warn!(trip = %trip.id, error = %e, "Failed to delete completed trip");
            }
        } else if let Err(e) = self.store.set_last_notification(&trip.id, now_ms()).await {
            warn!(trip = %trip.id, error = %e, "Failed to record notification time");
        }
        self.watchlist.remove(&trip.id);
    }
}
