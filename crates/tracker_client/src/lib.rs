use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{DeviceId, Telemetry},
    error::DashboardError,
    protocol::CommandAck,
};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

mod wire;

use wire::{telemetry_for, DeviceGroup, SendCommandPayload};

pub const DEVICES_ENDPOINT: &str = "/api/get_devices";
pub const COMMAND_ENDPOINT: &str = "/api/send_gprs_command";

/// Boundary to the third-party tracking service.
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Live telemetry for the given ids. Ids the service does not know are
    /// absent from the returned map.
    async fn fetch_telemetry(
        &self,
        device_ids: &[DeviceId],
    ) -> Result<HashMap<DeviceId, Telemetry>, TrackerError>;

    /// Hand a raw command string to the service for delivery to the device.
    async fn send_command(
        &self,
        device_id: &DeviceId,
        command: &str,
    ) -> Result<CommandAck, TrackerError>;

    /// Fails when requests cannot be made at all, before anything is sent.
    fn ensure_configured(&self) -> Result<(), TrackerError> {
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("USER_API_HASH is not configured")]
    MissingCredentials,
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: &'static str },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} answered with HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("could not decode {endpoint} response: {reason}")]
    Decode {
        endpoint: &'static str,
        reason: String,
    },
}

impl From<TrackerError> for DashboardError {
    fn from(value: TrackerError) -> Self {
        let reason = value.to_string();
        match value {
            TrackerError::MissingCredentials => DashboardError::Misconfigured { reason },
            _ => DashboardError::UpstreamUnavailable { reason },
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub base_url: Url,
    pub user_api_hash: Option<String>,
    pub lang: String,
    pub devices_timeout: Duration,
    pub command_timeout: Duration,
}

/// [`TrackerApi`] over the service's HTTP JSON API.
#[derive(Debug, Clone)]
pub struct HttpTrackerApi {
    http: Client,
    config: TrackerConfig,
}

impl HttpTrackerApi {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn user_api_hash(&self) -> Result<&str, TrackerError> {
        self.config
            .user_api_hash
            .as_deref()
            .filter(|hash| !hash.trim().is_empty())
            .ok_or(TrackerError::MissingCredentials)
    }

    fn endpoint_url(&self, endpoint: &'static str) -> Result<Url, TrackerError> {
        self.config
            .base_url
            .join(endpoint)
            .map_err(|error| TrackerError::Decode {
                endpoint,
                reason: format!("invalid endpoint url: {error}"),
            })
    }
}

fn classify(endpoint: &'static str, source: reqwest::Error) -> TrackerError {
    if source.is_timeout() {
        TrackerError::Timeout { endpoint }
    } else if let Some(status) = source.status() {
        TrackerError::Status { endpoint, status }
    } else if source.is_decode() {
        TrackerError::Decode {
            endpoint,
            reason: source.to_string(),
        }
    } else {
        TrackerError::Transport { endpoint, source }
    }
}

#[async_trait]
impl TrackerApi for HttpTrackerApi {
    async fn fetch_telemetry(
        &self,
        device_ids: &[DeviceId],
    ) -> Result<HashMap<DeviceId, Telemetry>, TrackerError> {
        let user_api_hash = self.user_api_hash()?;
        let url = self.endpoint_url(DEVICES_ENDPOINT)?;

        let groups: Vec<DeviceGroup> = self
            .http
            .get(url)
            .query(&[("lang", self.config.lang.as_str()), ("user_api_hash", user_api_hash)])
            .timeout(self.config.devices_timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| classify(DEVICES_ENDPOINT, error))?
            .json()
            .await
            .map_err(|error| classify(DEVICES_ENDPOINT, error))?;

        let snapshot = telemetry_for(groups, device_ids);
        if snapshot.len() < device_ids.len() {
            warn!(
                requested = device_ids.len(),
                reported = snapshot.len(),
                "tracking service omitted some configured devices"
            );
        }
        Ok(snapshot)
    }

    async fn send_command(
        &self,
        device_id: &DeviceId,
        command: &str,
    ) -> Result<CommandAck, TrackerError> {
        let user_api_hash = self.user_api_hash()?;
        let url = self.endpoint_url(COMMAND_ENDPOINT)?;
        let payload = SendCommandPayload {
            user_api_hash,
            device_id: device_id.as_str(),
            kind: "custom",
            data: command,
        };

        let ack: CommandAck = self
            .http
            .post(url)
            .json(&payload)
            .timeout(self.config.command_timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| classify(COMMAND_ENDPOINT, error))?
            .json()
            .await
            .map_err(|error| classify(COMMAND_ENDPOINT, error))?;

        info!(
            %device_id,
            status = ack.status,
            message = %ack.message,
            "tracking service acknowledged command"
        );
        Ok(ack)
    }

    fn ensure_configured(&self) -> Result<(), TrackerError> {
        self.user_api_hash().map(|_| ())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
