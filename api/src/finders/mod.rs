//! Route finders: a schedule-based provider and a real-time decorator.

pub mod googlemaps;
pub mod nxtbus;
pub mod realtime;

use async_trait::async_trait;

use crate::models::{Point, RouteOption};

/// A source of route options for a planned journey.
///
/// Implementations never fail the caller: transient provider errors are
/// logged and produce an empty list.
#[async_trait]
pub trait RouteFinder: Send + Sync {
    /// Find routes from `origin` to `destination` arriving around
    /// `arrival_time` (milliseconds since epoch). When `route_name` is
    /// non-empty, only options on that line are returned, in provider
    /// order.
    async fn find_routes(
        &self,
        origin: Point,
        destination: Point,
        transport_type: &str,
        arrival_time: i64,
        route_name: &str,
    ) -> Vec<RouteOption>;
}
