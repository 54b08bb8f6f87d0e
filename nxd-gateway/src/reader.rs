//! Device Reader - one fresh Modbus TCP connection per poll.
//!
//! Connect, read the 10-register window, drop the connection, decode.
//! Every failure comes back as a `ReadError` value carrying the device
//! name; nothing escapes this boundary as a panic or a hung task.

use std::time::Duration;

use nxd_modbus::{layout, ModbusError, ModbusTcpClient};
use thiserror::Error;
use tracing::debug;

use crate::config::DeviceConfig;
use crate::telemetry::{DecodeError, TelemetryRecord};

pub const READ_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Error)]
#[error("{device}: {kind}")]
pub struct ReadError {
    pub device: String,
    pub kind: ReadErrorKind,
}

#[derive(Debug, Error)]
pub enum ReadErrorKind {
    #[error("{0}")]
    Modbus(#[from] ModbusError),

    #[error("{0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone)]
pub struct DeviceReader {
    timeout: Duration,
}

impl Default for DeviceReader {
    fn default() -> Self {
        Self::new(READ_TIMEOUT)
    }
}

impl DeviceReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn read(&self, device: &DeviceConfig) -> Result<TelemetryRecord, ReadError> {
        let wrap = |kind: ReadErrorKind| ReadError {
            device: device.name.clone(),
            kind,
        };

        let registers = tokio::time::timeout(self.timeout, read_window(device))
            .await
            .map_err(|_| wrap(ModbusError::Timeout(self.timeout).into()))?
            .map_err(|e| wrap(e.into()))?;

        debug!("{}: read {:?}", device.name, registers);
        TelemetryRecord::from_registers(device, &registers).map_err(|e| wrap(e.into()))
    }
}

async fn read_window(device: &DeviceConfig) -> Result<Vec<u16>, ModbusError> {
    let mut client = ModbusTcpClient::connect(&device.host, device.port, device.station_id).await?;
    client
        .read_holding_registers(layout::WINDOW_START, layout::WINDOW_LEN)
        .await
    // client dropped here: connection closed whatever the outcome
}
