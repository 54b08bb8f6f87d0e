//! Telemetry record - decoded, labeled snapshot of one device's registers.
//!
//! Field names of `Tags` are the ingestion contract and must not change.

use nxd_modbus::layout;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DeviceConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub device_id: String,
    pub brand: String,
    pub protocol: String,
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tags {
    #[serde(rename = "Status_Producao")]
    pub production_status: bool,
    #[serde(rename = "Temperatura_Molde")]
    pub mold_temperature: f64,
    #[serde(rename = "Pressao_Injecao")]
    pub injection_pressure: f64,
    #[serde(rename = "Tempo_Ciclo")]
    pub cycle_time: f64,
    #[serde(rename = "Total_Pecas")]
    pub total_pieces: u32,
    #[serde(rename = "Consumo_Energia_kWh")]
    pub energy_kwh: f64,
    #[serde(rename = "Health_Score")]
    pub health_score: u16,
    #[serde(rename = "Alarme_Temperatura")]
    pub temperature_alarm: bool,
    #[serde(rename = "Custo_Hora_Parada")]
    pub downtime_cost: f64,
}

#[derive(Debug, Error, PartialEq)]
#[error("expected {expected} registers, got {actual}")]
pub struct DecodeError {
    pub expected: usize,
    pub actual: usize,
}

impl Tags {
    /// Inverse of the device-side encoding. `registers[0]` is address 0.
    pub fn decode(registers: &[u16]) -> Result<Self, DecodeError> {
        let expected = layout::WINDOW_LEN as usize;
        if registers.len() < expected {
            return Err(DecodeError {
                expected,
                actual: registers.len(),
            });
        }
        let reg = |addr: u16| registers[addr as usize];

        Ok(Tags {
            production_status: reg(layout::PRODUCTION_STATUS) == 1,
            mold_temperature: f64::from(reg(layout::MOLD_TEMPERATURE)) / 10.0,
            injection_pressure: f64::from(reg(layout::INJECTION_PRESSURE)) / 10.0,
            cycle_time: f64::from(reg(layout::CYCLE_TIME)) / 10.0,
            total_pieces: u32::from(reg(layout::PIECES_LOW))
                + (u32::from(reg(layout::PIECES_HIGH)) << 16),
            energy_kwh: f64::from(reg(layout::ENERGY)) / 100.0,
            health_score: reg(layout::HEALTH_SCORE),
            temperature_alarm: reg(layout::TEMPERATURE_ALARM) == 1,
            downtime_cost: f64::from(reg(layout::DOWNTIME_COST)),
        })
    }
}

impl TelemetryRecord {
    pub fn from_registers(device: &DeviceConfig, registers: &[u16]) -> Result<Self, DecodeError> {
        Ok(Self {
            device_id: device.name.clone(),
            brand: device.brand.clone(),
            protocol: device.protocol.clone(),
            tags: Tags::decode(registers)?,
        })
    }

    /// One-line operator summary, e.g. `🟢 [Siemens] 120 pieces | 65.3°C | 95% health`.
    pub fn summary(&self) -> String {
        let status = if self.tags.production_status { "🟢" } else { "🔴" };
        format!(
            "{} [{}] {} pieces | {}°C | {}% health",
            status, self.brand, self.tags.total_pieces, self.tags.mold_temperature, self.tags.health_score
        )
    }
}
