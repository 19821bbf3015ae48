//! Real-time overlay over a schedule-based route finder.
//!
//! Wraps an inner finder and, for transit options departing soon, replaces
//! scheduled times with live ones from the NXTBUS stop monitor. Every check
//! along the way is a fallback: when live data is missing, stale, for the
//! wrong operator or unparseable, the scheduled option passes through
//! unchanged. The overlay never adds or removes candidates.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::nxtbus::{parse_visit_time, MonitoredStopVisit, NxtBusClient, NxtBusError, StopMonitor};
use super::RouteFinder;
use crate::models::{now_ms, Point, RouteOption};

/// Live data only applies within this window before departure.
pub const PROXIMITY_WINDOW_MS: i64 = 90 * 60 * 1000;

/// A visit matches a scheduled departure when its aimed time is within this
/// distance of the schedule.
pub const AIMED_MATCH_WINDOW_MS: i64 = 2 * 60 * 1000;

/// Operator whose visits the NXTBUS feed covers.
pub const TRANSPORT_CANBERRA: &str = "Transport Canberra";

/// Route finder decorating `inner` with NXTBUS real-time departures.
pub struct NxtBusFinder {
    monitor: Arc<dyn StopMonitor>,
    inner: Arc<dyn RouteFinder>,
    agency_name: String,
}

impl NxtBusFinder {
    pub fn new(api_key: &str, inner: Arc<dyn RouteFinder>) -> Result<Self, NxtBusError> {
        Ok(Self::with_monitor(Arc::new(NxtBusClient::new(api_key)?), inner))
    }

    /// Build the overlay around an explicit monitor. This is the test seam.
    pub fn with_monitor(monitor: Arc<dyn StopMonitor>, inner: Arc<dyn RouteFinder>) -> Self {
        NxtBusFinder {
            monitor,
            inner,
            agency_name: TRANSPORT_CANBERRA.to_string(),
        }
    }

    /// Try to revise one option with live data; on any missing piece the
    /// option is returned as it came from the schedule.
    async fn revise(&self, option: RouteOption) -> RouteOption {
        let Some(details) = option.transit_details.as_ref() else {
            return option;
        };
        if details.agency_name != self.agency_name {
            return option;
        }

        let visits = match self.monitor.visits(&details.departure_stop).await {
            Ok(visits) => visits,
            Err(e) => {
                debug!(stop = %details.departure_stop, error = %e, "Stop monitoring unavailable, keeping schedule");
                return option;
            }
        };

        let Some(best) = closest_matching_visit(&visits, &option.name, details.scheduled_departure)
        else {
            return option;
        };
        let Some(expected) = parse_visit_time(best.expected_departure_time.as_deref()) else {
            return option;
        };

        // Positive delta means the vehicle is running early; shifting by
        // -delta moves both ends by the same amount, preserving duration.
        let delta = details.scheduled_departure - expected;
        let mut revised = option;
        revised.departure_time -= delta;
        revised.arrival_time -= delta;
        revised
    }
}

/// The visit on `line_name` whose aimed departure is nearest the scheduled
/// one, provided it is within the match window.
fn closest_matching_visit<'a>(
    visits: &'a [MonitoredStopVisit],
    line_name: &str,
    scheduled_departure: i64,
) -> Option<&'a MonitoredStopVisit> {
    let mut best: Option<(&MonitoredStopVisit, i64)> = None;
    for visit in visits {
        if visit.line_name != line_name {
            continue;
        }
        let Some(aimed) = parse_visit_time(visit.aimed_departure_time.as_deref()) else {
            continue;
        };
        let distance = (aimed - scheduled_departure).abs();
        if distance > AIMED_MATCH_WINDOW_MS {
            continue;
        }
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((visit, distance));
        }
    }
    best.map(|(visit, _)| visit)
}

#[async_trait]
impl RouteFinder for NxtBusFinder {
    async fn find_routes(
        &self,
        origin: Point,
        destination: Point,
        transport_type: &str,
        arrival_time: i64,
        route_name: &str,
    ) -> Vec<RouteOption> {
        let options = self
            .inner
            .find_routes(origin, destination, transport_type, arrival_time, route_name)
            .await;
        if transport_type != "transit" {
            return options;
        }

        let now = now_ms();
        let mut revised = Vec::with_capacity(options.len());
        for option in options {
            if option.departure_time - now >= PROXIMITY_WINDOW_MS {
                revised.push(option);
            } else {
                revised.push(self.revise(option).await);
            }
        }
        revised
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finders::nxtbus::format_visit_time;
    use crate::models::TransitDetails;

    struct FixedFinder {
        options: Vec<RouteOption>,
    }

    #[async_trait]
    impl RouteFinder for FixedFinder {
        async fn find_routes(&self, _: Point, _: Point, _: &str, _: i64, _: &str) -> Vec<RouteOption> {
            self.options.clone()
        }
    }

    struct FixedMonitor {
        visits: Option<Vec<MonitoredStopVisit>>,
    }

    #[async_trait]
    impl StopMonitor for FixedMonitor {
        async fn visits(&self, _: &str) -> Result<Vec<MonitoredStopVisit>, NxtBusError> {
            self.visits
                .clone()
                .ok_or_else(|| NxtBusError::Api("no data".into()))
        }
    }

    fn point() -> Point {
        Point { lat: -35.28, lng: 149.13 }
    }

    fn transit_option(departure: i64, arrival: i64, line: &str, agency: &str) -> RouteOption {
        let mut option = RouteOption::new(departure, arrival, line, "Via Barry Drive");
        option.transit_details = Some(TransitDetails {
            line_name: line.to_string(),
            agency_name: agency.to_string(),
            departure_stop: "City Interchange".to_string(),
            scheduled_departure: departure,
        });
        option
    }

    fn visit(line: &str, aimed: i64, expected_departure: Option<i64>) -> MonitoredStopVisit {
        MonitoredStopVisit {
            line_name: line.to_string(),
            aimed_departure_time: Some(format_visit_time(aimed)),
            expected_departure_time: expected_departure.map(format_visit_time),
            ..Default::default()
        }
    }

    fn overlay(
        options: Vec<RouteOption>,
        visits: Option<Vec<MonitoredStopVisit>>,
    ) -> NxtBusFinder {
        NxtBusFinder::with_monitor(
            Arc::new(FixedMonitor { visits }),
            Arc::new(FixedFinder { options }),
        )
    }

    #[tokio::test]
    async fn revises_departure_and_arrival_by_the_same_delta() {
        let now = now_ms();
        let departure = now + 10 * 60 * 1000;
        let arrival = now + 25 * 60 * 1000;
        let option = transit_option(departure, arrival, "729", TRANSPORT_CANBERRA);
        // Aimed matches the schedule to the minute, expected runs 3 minutes
        // late.
        let expected_departure = departure + 3 * 60 * 1000;
        let visits = vec![
            visit("300", departure, Some(departure)),
            visit("729", departure + 60 * 1000, Some(expected_departure)),
        ];
        let finder = overlay(vec![option.clone()], Some(visits));

        let routes = finder
            .find_routes(point(), point(), "transit", arrival, "")
            .await;
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].departure_time, departure + 3 * 60 * 1000);
        assert_eq!(routes[0].arrival_time, arrival + 3 * 60 * 1000);
        // Duration is preserved exactly.
        assert_eq!(
            routes[0].arrival_time - routes[0].departure_time,
            arrival - departure
        );
    }

    #[tokio::test]
    async fn keeps_schedule_when_departure_is_beyond_the_window() {
        let now = now_ms();
        let departure = now + 100 * 60 * 1000;
        let option = transit_option(departure, departure + 600000, "729", TRANSPORT_CANBERRA);
        let visits = vec![visit("729", departure, Some(departure - 60 * 1000))];
        let finder = overlay(vec![option.clone()], Some(visits));

        let routes = finder
            .find_routes(point(), point(), "transit", departure, "")
            .await;
        assert_eq!(routes, vec![option]);
    }

    #[tokio::test]
    async fn keeps_schedule_for_other_agencies() {
        let now = now_ms();
        let departure = now + 10 * 60 * 1000;
        let option = transit_option(departure, departure + 600000, "729", "Different Bus Company");
        let visits = vec![visit("729", departure, Some(departure - 60 * 1000))];
        let finder = overlay(vec![option.clone()], Some(visits));

        let routes = finder
            .find_routes(point(), point(), "transit", departure, "")
            .await;
        assert_eq!(routes, vec![option]);
    }

    #[tokio::test]
    async fn keeps_schedule_for_non_transit_modes() {
        let now = now_ms();
        let departure = now + 10 * 60 * 1000;
        let option = transit_option(departure, departure + 600000, "729", TRANSPORT_CANBERRA);
        let visits = vec![visit("729", departure, Some(departure - 60 * 1000))];
        let finder = overlay(vec![option.clone()], Some(visits));

        let routes = finder
            .find_routes(point(), point(), "driving", departure, "")
            .await;
        assert_eq!(routes, vec![option]);
    }

    #[tokio::test]
    async fn keeps_schedule_when_monitoring_fails() {
        let now = now_ms();
        let departure = now + 10 * 60 * 1000;
        let option = transit_option(departure, departure + 600000, "729", TRANSPORT_CANBERRA);
        let finder = overlay(vec![option.clone()], None);

        let routes = finder
            .find_routes(point(), point(), "transit", departure, "")
            .await;
        assert_eq!(routes, vec![option]);
    }

    #[tokio::test]
    async fn keeps_schedule_when_expected_time_is_missing() {
        let now = now_ms();
        let departure = now + 10 * 60 * 1000;
        let option = transit_option(departure, departure + 600000, "729", TRANSPORT_CANBERRA);
        let visits = vec![visit("729", departure, None)];
        let finder = overlay(vec![option.clone()], Some(visits));

        let routes = finder
            .find_routes(point(), point(), "transit", departure, "")
            .await;
        assert_eq!(routes, vec![option]);
    }

    #[tokio::test]
    async fn keeps_schedule_when_no_aimed_time_is_close_enough() {
        let now = now_ms();
        let departure = now + 10 * 60 * 1000;
        let option = transit_option(departure, departure + 600000, "729", TRANSPORT_CANBERRA);
        // Aimed departure is five minutes off the schedule, outside the
        // match window.
        let visits = vec![visit("729", departure + 5 * 60 * 1000, Some(departure))];
        let finder = overlay(vec![option.clone()], Some(visits));

        let routes = finder
            .find_routes(point(), point(), "transit", departure, "")
            .await;
        assert_eq!(routes, vec![option]);
    }

    #[test]
    fn closest_matching_visit_prefers_minimum_distance() {
        let scheduled = 1506729600000;
        let visits = vec![
            visit("729", scheduled + 90 * 1000, Some(scheduled)),
            visit("729", scheduled + 30 * 1000, Some(scheduled)),
            visit("300", scheduled, Some(scheduled)),
        ];
        let best = closest_matching_visit(&visits, "729", scheduled).unwrap();
        assert_eq!(
            best.aimed_departure_time.as_deref(),
            Some(format_visit_time(scheduled + 30 * 1000).as_str())
        );
    }
}
