//! Trip-level time helpers and route selection.
//!
//! A repeating trip's stored instants are rolled forward to the next active
//! weekday once its first alert has gone out; until then (and for one-shot
//! trips) the stored instants are used as-is.

use chrono::Utc;
use thiserror::Error;

use crate::calendar;
use crate::finders::RouteFinder;
use crate::models::{instant, RouteOption, TripSchedule};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("no routes found")]
    NoRoutes,
}

/// The trip's next effective departure instant.
pub fn departure_time(trip: &TripSchedule) -> i64 {
    effective_instant(trip, trip.route.departure_time)
}

/// The trip's next effective arrival instant.
pub fn arrival_time(trip: &TripSchedule) -> i64 {
    effective_instant(trip, trip.route.arrival_time)
}

/// The arrival instant the user originally searched with, rolled forward
/// for repeating trips. Used to re-query the route finder for options close
/// to what the user picked.
pub fn input_arrival_time(trip: &TripSchedule) -> i64 {
    effective_instant(trip, trip.input_arrival_time.instant_ms)
}

/// Roll a stored instant forward to the trip's next active occurrence.
///
/// Only applies once the original alert has been sent and the trip repeats;
/// otherwise the stored instant stands. The instant's wall-clock time is
/// preserved in the trip's own zone.
fn effective_instant(trip: &TripSchedule, ts: i64) -> i64 {
    if !(trip.alert_already_sent() && trip.is_repeating()) {
        return ts;
    }
    let tz = trip.timezone();
    let anchor = instant(ts).with_timezone(&tz);
    let last = instant(trip.last_notification_sent).with_timezone(&tz);
    let now = Utc::now().with_timezone(&tz);
    calendar::next_occurrence(now, last, anchor, &trip.repeat_days)
}

/// Pick the candidate most like the route the user scheduled.
///
/// A unique description match wins outright. With several matches, the one
/// arriving closest to the trip's effective arrival time is taken; with
/// none, the closest-arriving candidate overall. Ties go to the earliest
/// candidate in provider order.
pub fn select_route(
    trip: &TripSchedule,
    candidates: &[RouteOption],
) -> Result<RouteOption, MatchError> {
    if candidates.is_empty() {
        return Err(MatchError::NoRoutes);
    }
    let matching: Vec<&RouteOption> = candidates
        .iter()
        .filter(|c| c.description == trip.route.description)
        .collect();
    let target = arrival_time(trip);
    match matching.len() {
        1 => Ok(matching[0].clone()),
        0 => Ok(closest_to_arrival(target, candidates.iter())),
        _ => Ok(closest_to_arrival(target, matching.into_iter())),
    }
}

fn closest_to_arrival<'a>(
    target: i64,
    candidates: impl Iterator<Item = &'a RouteOption>,
) -> RouteOption {
    candidates
        .min_by_key(|c| (c.arrival_time - target).abs())
        .expect("candidates checked non-empty")
        .clone()
}

/// Query the finder for the trip and select the best-matching candidate.
pub async fn find_route(
    finder: &dyn RouteFinder,
    trip: &TripSchedule,
) -> Result<RouteOption, MatchError> {
    let candidates = finder
        .find_routes(
            trip.origin,
            trip.destination,
            &trip.transport_type,
            input_arrival_time(trip),
            &trip.route.name,
        )
        .await;
    select_route(trip, &candidates)
}
