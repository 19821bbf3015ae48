//! Push notification dispatch.
//!
//! Alerts go out through a gorush-compatible push gateway: the notifier
//! POSTs a notification batch and the gateway handles the APNs/FCM
//! specifics. Which platform a token belongs to is decided by the user's
//! registered device OS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::PushConfig;
use crate::models::{DeviceOs, RouteOption, UserInfo};

/// Platform discriminators used by the gateway wire format.
const PLATFORM_IOS: u8 = 1;
const PLATFORM_ANDROID: u8 = 2;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("network error: {0}")]
    Network(String),
    #[error("push gateway error: {0}")]
    Gateway(String),
    #[error("{0} notifications are disabled")]
    PlatformDisabled(&'static str),
}

/// Sends the departure alert for a route to a user's device.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, route: &RouteOption, user: &UserInfo) -> Result<(), NotifyError>;
}

/// The text a user sees when it is time to leave.
pub fn alert_message(route: &RouteOption) -> String {
    format!("Time to leave for route: {}", route.description)
}

#[derive(Debug, Serialize)]
struct PushRequest {
    notifications: Vec<PushNotification>,
}

#[derive(Debug, Serialize)]
struct PushNotification {
    tokens: Vec<String>,
    platform: u8,
    message: String,
    sound: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
}

/// Notifier backed by an HTTP push gateway.
pub struct PushNotifier {
    client: Client,
    config: PushConfig,
}

impl PushNotifier {
    pub fn new(config: PushConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gateway.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(PushNotifier { client, config })
    }

    fn notification(
        &self,
        route: &RouteOption,
        user: &UserInfo,
    ) -> Result<PushNotification, NotifyError> {
        let (platform, topic) = match user.device_os {
            DeviceOs::Ios => {
                if !self.config.ios.enabled {
                    return Err(NotifyError::PlatformDisabled("ios"));
                }
                (PLATFORM_IOS, self.config.ios.topic.clone())
            }
            DeviceOs::Android => {
                if !self.config.android.enabled {
                    return Err(NotifyError::PlatformDisabled("android"));
                }
                (PLATFORM_ANDROID, None)
            }
        };
        Ok(PushNotification {
            tokens: vec![user.notification_token.clone()],
            platform,
            message: alert_message(route),
            sound: "default".to_string(),
            topic,
        })
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    async fn send(&self, route: &RouteOption, user: &UserInfo) -> Result<(), NotifyError> {
        let request = PushRequest {
            notifications: vec![self.notification(route, user)?],
        };

        let response = self
            .client
            .post(&self.config.gateway.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Gateway(format!(
                "HTTP error: {}",
                response.status().as_u16()
            )));
        }

        info!(user = %user.id, os = user.device_os.as_str(), "Delivered departure alert");
        Ok(())
    }
}
