//! Stop-monitoring client for the ACT NXTBUS service.
//!
//! NXTBUS keys its stop-monitoring endpoint by stop id, while the directions
//! provider only hands us stop names. The client therefore fetches the ACT
//! open-data stop register once on demand and keeps a name-to-id table in
//! memory, the same fetch-then-cache approach used for the directions data.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

const NXTBUS_BASE_URL: &str = "http://siri.nxtbus.act.gov.au:11000";
const STOPS_URL: &str = "https://www.data.act.gov.au/resource/bus-stops.json";

/// Zone the NXTBUS feed reports naive timestamps in. Canberra shares the
/// Sydney rules.
pub const NXTBUS_TZ: Tz = chrono_tz::Australia::Sydney;

/// Visit timestamps look like `2017-09-30T00:04:05.000000`.
const VISIT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Error)]
pub enum NxtBusError {
    #[error("network error: {0}")]
    Network(String),
    #[error("NXTBUS API error: {0}")]
    Api(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown stop: {0}")]
    UnknownStop(String),
}

/// A single monitored vehicle visit at a stop.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitoredStopVisit {
    #[serde(default, rename = "LineName")]
    pub line_name: String,
    #[serde(rename = "AimedArrivalTime")]
    pub aimed_arrival_time: Option<String>,
    #[serde(rename = "AimedDepartureTime")]
    pub aimed_departure_time: Option<String>,
    #[serde(rename = "ExpectedArrivalTime")]
    pub expected_arrival_time: Option<String>,
    #[serde(rename = "ExpectedDepartureTime")]
    pub expected_departure_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StopMonitoringResponse {
    #[serde(rename = "StopMonitoringDelivery")]
    stop_monitoring_delivery: Option<StopMonitoringDelivery>,
}

#[derive(Debug, Deserialize)]
struct StopMonitoringDelivery {
    #[serde(default, rename = "MonitoredStopVisits")]
    monitored_stop_visits: Vec<MonitoredStopVisit>,
}

#[derive(Debug, Deserialize)]
struct StopRecord {
    stop_code: Option<String>,
    stop_name: Option<String>,
}

/// Source of live visits at a named stop. The production implementation is
/// [`NxtBusClient`]; tests substitute their own.
#[async_trait]
pub trait StopMonitor: Send + Sync {
    async fn visits(&self, stop_name: &str) -> Result<Vec<MonitoredStopVisit>, NxtBusError>;
}

/// NXTBUS stop-monitoring API client.
pub struct NxtBusClient {
    client: Client,
    api_key: String,
    stop_ids: RwLock<Option<HashMap<String, String>>>,
}

impl NxtBusClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, NxtBusError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NxtBusError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(NxtBusClient {
            client,
            api_key: api_key.into(),
            stop_ids: RwLock::new(None),
        })
    }

    /// Resolve a stop name to the provider's stop id, loading the register
    /// on first use.
    async fn stop_id(&self, stop_name: &str) -> Result<String, NxtBusError> {
        {
            let table = self.stop_ids.read().await;
            if let Some(table) = table.as_ref() {
                return table
                    .get(stop_name)
                    .cloned()
                    .ok_or_else(|| NxtBusError::UnknownStop(stop_name.to_string()));
            }
        }

        let records: Vec<StopRecord> = self
            .client
            .get(STOPS_URL)
            .send()
            .await
            .map_err(|e| NxtBusError::Network(e.to_string()))?
            .json()
            .await
            .map_err(|e| NxtBusError::Parse(e.to_string()))?;

        let table: HashMap<String, String> = records
            .into_iter()
            .filter_map(|r| Some((r.stop_name?, r.stop_code?)))
            .collect();
        info!(stops = table.len(), "Loaded NXTBUS stop register");

        let mut guard = self.stop_ids.write().await;
        let table = guard.get_or_insert(table);
        table
            .get(stop_name)
            .cloned()
            .ok_or_else(|| NxtBusError::UnknownStop(stop_name.to_string()))
    }
}

#[async_trait]
impl StopMonitor for NxtBusClient {
    async fn visits(&self, stop_name: &str) -> Result<Vec<MonitoredStopVisit>, NxtBusError> {
        let stop_id = self.stop_id(stop_name).await?;
        let url = format!(
            "{}/{}/sm/service?stop_id={}",
            NXTBUS_BASE_URL,
            self.api_key,
            urlencoding::encode(&stop_id)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NxtBusError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NxtBusError::Api(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }

        let body: StopMonitoringResponse = response
            .json()
            .await
            .map_err(|e| NxtBusError::Parse(e.to_string()))?;

        Ok(body
            .stop_monitoring_delivery
            .map(|d| d.monitored_stop_visits)
            .unwrap_or_default())
    }
}

/// Parse a visit timestamp into a millisecond instant, or `None` when the
/// field is absent or malformed. The feed reports naive Canberra time.
pub fn parse_visit_time(value: Option<&str>) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(value?, VISIT_TIME_FORMAT).ok()?;
    NXTBUS_TZ
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// Format a millisecond instant the way the feed reports times. Mostly a
/// test aid, kept beside the parser so the two stay in sync.
pub fn format_visit_time(ms: i64) -> String {
    crate::models::instant(ms)
        .with_timezone(&NXTBUS_TZ)
        .format(VISIT_TIME_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_visit_time_round_trips_through_format() {
        let ms = 1506693845000;
        assert_eq!(parse_visit_time(Some(&format_visit_time(ms))), Some(ms));
    }

    #[test]
    fn parse_visit_time_rejects_garbage() {
        assert_eq!(parse_visit_time(None), None);
        assert_eq!(parse_visit_time(Some("")), None);
        assert_eq!(parse_visit_time(Some("not a date")), None);
        assert_eq!(parse_visit_time(Some("2017-13-40T99:00:00.000000")), None);
    }

    #[test]
    fn parse_visit_time_reads_naive_canberra_time() {
        let ms = parse_visit_time(Some("2017-09-30T10:00:00.000000")).unwrap();
        // AEST is UTC+10 before the October changeover.
        assert_eq!(ms, 1506729600000);
    }

    #[test]
    fn stop_monitoring_response_tolerates_missing_delivery() {
        let body: StopMonitoringResponse = serde_json::from_str("{}").unwrap();
        assert!(body.stop_monitoring_delivery.is_none());

        let body: StopMonitoringResponse = serde_json::from_str(
            r#"{"StopMonitoringDelivery": {"MonitoredStopVisits": [
                {"LineName": "729", "AimedDepartureTime": "2017-09-30T10:00:00.000000"}
            ]}}"#,
        )
        .unwrap();
        let visits = body.stop_monitoring_delivery.unwrap().monitored_stop_visits;
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].line_name, "729");
        assert!(visits[0].expected_departure_time.is_none());
    }
}
