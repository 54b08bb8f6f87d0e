//! Network Relay - pushes one telemetry record to the ingestion endpoint.
//!
//! No retries here: the next poll cycle is the only retry.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::NetworkConfig;
use crate::telemetry::TelemetryRecord;

pub const RELAY_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("network disabled (simulated outage)")]
    NetworkDisabled,

    #[error("endpoint answered HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to serialize telemetry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Wire body: the credential followed by the record's own fields.
#[derive(Serialize)]
struct IngestBody<'a> {
    api_key: &'a str,
    #[serde(flatten)]
    record: &'a TelemetryRecord,
}

pub struct NetworkRelay {
    client: Client,
    endpoint: String,
    network: NetworkConfig,
}

impl NetworkRelay {
    pub fn new(endpoint: impl Into<String>, network: NetworkConfig) -> Result<Self, RelayError> {
        let client = Client::builder().timeout(RELAY_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            network,
        })
    }

    /// Returns the byte count credited to stats on HTTP 200: the serialized
    /// record without the credential.
    pub async fn send(
        &self,
        record: &TelemetryRecord,
        api_key: &str,
        network_enabled: bool,
    ) -> Result<usize, RelayError> {
        if !network_enabled {
            return Err(RelayError::NetworkDisabled);
        }

        if let Some(delay) = self.link_delay() {
            debug!("Simulated link latency {:?}", delay);
            tokio::time::sleep(delay).await;
        }

        let bytes = serde_json::to_string(record)?.len();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&IngestBody { api_key, record })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(bytes),
            other => Err(RelayError::Status(other.as_u16())),
        }
    }

    fn link_delay(&self) -> Option<Duration> {
        if !self.network.simulate_latency {
            return None;
        }
        let ms = rand::thread_rng().gen_range(self.network.latency_min_ms..=self.network.latency_max_ms);
        Some(Duration::from_millis(ms))
    }
}
