//! Schedule-based route finder backed by the Google Maps Directions API.
//!
//! Queries alternatives targeting the requested arrival time and flattens
//! each directions result into a [`RouteOption`]. Only the fields the rest
//! of the system consumes are deserialized.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use super::RouteFinder;
use crate::models::{Point, RouteOption, TransitDetails};

const DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Line name used when a route has no transit step to take one from.
const UNKNOWN_ROUTE_NAME: &str = "Unknown";

#[derive(Debug, Error)]
pub enum DirectionsError {
    #[error("network error: {0}")]
    Network(String),
    #[error("directions API error: {0}")]
    Api(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Route finder that searches Google Maps for options.
pub struct GoogleMapsFinder {
    client: Client,
    api_key: String,
}

impl GoogleMapsFinder {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DirectionsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DirectionsError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(GoogleMapsFinder {
            client,
            api_key: api_key.into(),
        })
    }

    async fn directions(
        &self,
        origin: Point,
        destination: Point,
        transport_type: &str,
        arrival_time: i64,
    ) -> Result<DirectionsResponse, DirectionsError> {
        let response = self
            .client
            .get(DIRECTIONS_URL)
            .query(&[
                ("origin", format!("{}, {}", origin.lat, origin.lng)),
                (
                    "destination",
                    format!("{}, {}", destination.lat, destination.lng),
                ),
                ("mode", transport_type.to_string()),
                // The directions API takes seconds
                ("arrival_time", (arrival_time / 1000).to_string()),
                ("alternatives", "true".to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| DirectionsError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectionsError::Api(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }

        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|e| DirectionsError::Parse(e.to_string()))?;

        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(body),
            other => Err(DirectionsError::Api(format!(
                "{}: {}",
                other,
                body.error_message.as_deref().unwrap_or("no detail")
            ))),
        }
    }
}

#[async_trait]
impl RouteFinder for GoogleMapsFinder {
    async fn find_routes(
        &self,
        origin: Point,
        destination: Point,
        transport_type: &str,
        arrival_time: i64,
        route_name: &str,
    ) -> Vec<RouteOption> {
        match self
            .directions(origin, destination, transport_type, arrival_time)
            .await
        {
            Ok(response) => map_routes(&response.routes, arrival_time, route_name),
            Err(e) => {
                warn!(error = %e, "Directions request failed");
                Vec::new()
            }
        }
    }
}

/// Flatten directions results into route options, filtering on `route_name`
/// when one is given. Provider order is preserved.
fn map_routes(routes: &[MapsRoute], arrival_target: i64, route_name: &str) -> Vec<RouteOption> {
    let mut options = Vec::new();
    for route in routes {
        let Some(option) = map_route(route, arrival_target) else {
            continue;
        };
        if !route_name.is_empty() && option.name != route_name {
            continue;
        }
        options.push(option);
    }
    options
}

fn map_route(route: &MapsRoute, arrival_target: i64) -> Option<RouteOption> {
    let first_leg = route.legs.first()?;
    let last_leg = route.legs.last()?;

    let departure = match &first_leg.departure_time {
        Some(t) => t.value * 1000,
        None => arrival_target - first_leg.duration.as_ref().map_or(0, |d| d.value * 1000),
    };
    let arrival = match &last_leg.arrival_time {
        Some(t) => t.value * 1000,
        None => arrival_target,
    };

    let transit = first_transit_step(route);
    let name = transit
        .and_then(|step| step.transit_details.as_ref())
        .and_then(|d| d.line.as_ref())
        .and_then(|l| l.short_name.as_deref())
        .unwrap_or(UNKNOWN_ROUTE_NAME);

    let mut option = RouteOption::new(departure, arrival, name, route.summary.as_deref().unwrap_or(""));
    option.transit_details =
        transit.and_then(|step| step.transit_details.as_ref().and_then(to_transit_details));
    Some(option)
}

fn first_transit_step(route: &MapsRoute) -> Option<&MapsStep> {
    route
        .legs
        .iter()
        .flat_map(|leg| leg.steps.iter())
        .find(|step| step.travel_mode == "TRANSIT")
}

fn to_transit_details(details: &MapsTransitDetails) -> Option<TransitDetails> {
    let line = details.line.as_ref()?;
    Some(TransitDetails {
        line_name: line.short_name.clone().unwrap_or_default(),
        agency_name: line
            .agencies
            .first()
            .and_then(|a| a.name.clone())
            .unwrap_or_default(),
        departure_stop: details
            .departure_stop
            .as_ref()
            .and_then(|s| s.name.clone())
            .unwrap_or_default(),
        scheduled_departure: details.departure_time.as_ref().map_or(0, |t| t.value * 1000),
    })
}

// Response structures (only the consumed subset)

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<MapsRoute>,
}

#[derive(Debug, Deserialize)]
struct MapsRoute {
    summary: Option<String>,
    #[serde(default)]
    legs: Vec<MapsLeg>,
}

#[derive(Debug, Deserialize)]
struct MapsLeg {
    duration: Option<TimeValue>,
    departure_time: Option<TimeValue>,
    arrival_time: Option<TimeValue>,
    #[serde(default)]
    steps: Vec<MapsStep>,
}

#[derive(Debug, Deserialize)]
struct MapsStep {
    #[serde(default)]
    travel_mode: String,
    transit_details: Option<MapsTransitDetails>,
}

#[derive(Debug, Deserialize)]
struct MapsTransitDetails {
    line: Option<MapsLine>,
    departure_stop: Option<MapsStop>,
    departure_time: Option<TimeValue>,
}

#[derive(Debug, Deserialize)]
struct MapsLine {
    short_name: Option<String>,
    #[serde(default)]
    agencies: Vec<MapsAgency>,
}

#[derive(Debug, Deserialize)]
struct MapsAgency {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MapsStop {
    name: Option<String>,
}

/// Seconds-valued time or duration field.
#[derive(Debug, Deserialize)]
struct TimeValue {
    value: i64,
}
