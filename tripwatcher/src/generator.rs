//! Route generation for the worker's fetch-or-timeout race.
//!
//! Each call spawns a task that resolves the trip's best current route and
//! writes exactly one value to a private channel. The worker races that
//! channel against a deadline; a fetch that loses the race still runs to
//! completion and its value is dropped with the receiver.

use std::sync::Arc;

use api::finders::RouteFinder;
use api::models::{RouteOption, TripSchedule};
use api::scheduling;
use tokio::sync::mpsc;
use tracing::debug;

/// Produces route updates for a trip, one per call, over a channel.
pub trait RouteGenerator: Send + Sync {
    /// Start a fetch for the trip's best current route. The returned
    /// receiver yields `Some(route)` on success and `None` when no usable
    /// route came back.
    fn generate_route(&self, trip: &TripSchedule) -> mpsc::Receiver<Option<RouteOption>>;
}

/// Generator that queries a [`RouteFinder`] and matches the result against
/// the trip's chosen route.
pub struct FinderRouteGenerator {
    finder: Arc<dyn RouteFinder>,
}

impl FinderRouteGenerator {
    pub fn new(finder: Arc<dyn RouteFinder>) -> Self {
        FinderRouteGenerator { finder }
    }
}

impl RouteGenerator for FinderRouteGenerator {
    fn generate_route(&self, trip: &TripSchedule) -> mpsc::Receiver<Option<RouteOption>> {
        let (tx, rx) = mpsc::channel(1);
        let finder = self.finder.clone();
        let trip = trip.clone();
        tokio::spawn(async move {
            let value = match scheduling::find_route(finder.as_ref(), &trip).await {
                Ok(route) => Some(route),
                Err(e) => {
                    debug!(trip = %trip.id, error = %e, "Route fetch produced nothing");
                    None
                }
            };
            // the receiver may already have lost interest; that is fine
            let _ = tx.send(value).await;
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::models::Point;
    use async_trait::async_trait;

    struct FixedFinder {
        options: Vec<RouteOption>,
    }

    #[async_trait]
    impl RouteFinder for FixedFinder {
        async fn find_routes(&self, _: Point, _: Point, _: &str, _: i64, _: &str) -> Vec<RouteOption> {
            self.options.clone()
        }
    }

    fn trip() -> TripSchedule {
        serde_json::from_value(serde_json::json!({
            "id": "trip-1",
            "user": {"id": "user-1", "notification_token": "t", "device_os": "ios"},
            "origin": {"lat": -35.28, "lng": 149.13},
            "destination": {"lat": -35.24, "lng": 149.07},
            "route": {
                "departure_time": 1500101524000i64,
                "arrival_time": 1500101584000i64,
                "name": "729",
                "description": "Via Barry Drive"
            },
            "input_arrival_time": {
                "instant_ms": 1500101584000i64,
                "local_string": "2017-07-15T17:33:04+10:00",
                "tz_name": "Australia/Sydney"
            },
            "waiting_window_ms": 0,
            "transport_type": "transit",
            "repeat_days": [false, false, false, false, false, false, false]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn delivers_the_matched_route() {
        let route = RouteOption::new(1500101524000, 1500101584000, "729", "Via Barry Drive");
        let generator = FinderRouteGenerator::new(Arc::new(FixedFinder {
            options: vec![route.clone()],
        }));
        let mut rx = generator.generate_route(&trip());
        assert_eq!(rx.recv().await, Some(Some(route)));
        // channel closes after the single value
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn delivers_none_when_no_routes_come_back() {
        let generator = FinderRouteGenerator::new(Arc::new(FixedFinder { options: vec![] }));
        let mut rx = generator.generate_route(&trip());
        assert_eq!(rx.recv().await, Some(None));
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_wedge_the_fetch() {
        let generator = FinderRouteGenerator::new(Arc::new(FixedFinder { options: vec![] }));
        let rx = generator.generate_route(&trip());
        drop(rx);
        // nothing to assert beyond the spawned task completing; yield so it
        // gets a chance to run its send against the closed channel
        tokio::task::yield_now().await;
    }
}
