//! Domain types shared by the API server and the trip watcher.
//!
//! Instants are milliseconds since the UNIX epoch throughout. Civil
//! (wall-clock) times only appear where a trip's time zone matters, via
//! [`LocalTimestamp`].

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Convert a millisecond epoch timestamp into a UTC instant.
///
/// Out-of-range values clamp to the epoch rather than panicking; stored
/// timestamps are always in range in practice.
pub fn instant(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Current time as a millisecond epoch timestamp.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

/// Device platform a notification token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOs {
    Ios,
    Android,
}

impl DeviceOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceOs::Ios => "ios",
            DeviceOs::Android => "android",
        }
    }
}

impl std::str::FromStr for DeviceOs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(DeviceOs::Ios),
            "android" => Ok(DeviceOs::Android),
            other => Err(format!("unknown device os: {other}")),
        }
    }
}

/// A registered user and their push-notification endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub notification_token: String,
    pub device_os: DeviceOs,
}

/// An absolute instant paired with the civil time the user entered.
///
/// Carrying both lets the watcher preserve the requested wall-clock hour
/// across daylight-savings transitions when a repeating trip rolls forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocalTimestamp {
    pub instant_ms: i64,
    pub local_string: String,
    pub tz_name: String,
}

impl LocalTimestamp {
    /// The named zone this timestamp was entered in, falling back to UTC
    /// when the stored name is not a valid IANA identifier.
    pub fn timezone(&self) -> Tz {
        self.tz_name.parse::<Tz>().unwrap_or(chrono_tz::UTC)
    }
}

/// Transit leg details captured from the schedule provider.
///
/// Provider-opaque: only the fields the real-time overlay consumes are kept.
/// Never serialized onto the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitDetails {
    pub line_name: String,
    pub agency_name: String,
    pub departure_stop: String,
    pub scheduled_departure: i64,
}

/// A route search result shown to the user and re-fetched by the watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouteOption {
    pub departure_time: i64,
    pub arrival_time: i64,
    pub name: String,
    pub description: String,
    #[serde(skip)]
    pub transit_details: Option<TransitDetails>,
}

impl RouteOption {
    /// Build a route option. An empty description defaults to the route
    /// name so that clients always have something to display.
    pub fn new(
        departure_time: i64,
        arrival_time: i64,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let mut description = description.into();
        if description.is_empty() {
            description = name.clone();
        }
        RouteOption {
            departure_time,
            arrival_time,
            name,
            description,
            transit_details: None,
        }
    }
}

/// A scheduled trip: the user's chosen route plus when and how often to
/// alert them before it departs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TripSchedule {
    /// Assigned by the server when the trip is scheduled; clients may omit
    /// it.
    #[serde(default)]
    pub id: String,
    pub user: UserInfo,
    pub origin: Point,
    pub destination: Point,
    pub route: RouteOption,
    /// The arrival time the user typed when searching for routes.
    pub input_arrival_time: LocalTimestamp,
    /// The alert fires this many milliseconds before departure.
    pub waiting_window_ms: i64,
    pub transport_type: String,
    /// Active weekdays, Monday at index 0.
    pub repeat_days: [bool; 7],
    /// New trips start enabled unless the client says otherwise.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// When the last alert for this trip went out; 0 means never.
    #[serde(default)]
    pub last_notification_sent: i64,
}

fn default_enabled() -> bool {
    true
}

impl TripSchedule {
    pub fn is_repeating(&self) -> bool {
        self.repeat_days.iter().any(|&d| d)
    }

    /// Whether the original (first-occurrence) alert has been delivered.
    pub fn alert_already_sent(&self) -> bool {
        self.last_notification_sent > 0
    }

    pub fn timezone(&self) -> Tz {
        self.input_arrival_time.timezone()
    }
}
