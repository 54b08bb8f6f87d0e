//! Static device profiles
//!
//! Both simulated brands run the same machine model; they differ only in
//! numeric ranges and in which fault their operator panel can inject.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brand {
    Siemens,
    Delta,
}

impl Brand {
    pub fn profile(self) -> &'static DeviceProfile {
        match self {
            Brand::Siemens => &SIEMENS,
            Brand::Delta => &DELTA,
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Brand::Siemens => write!(f, "Siemens"),
            Brand::Delta => write!(f, "Delta"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown brand '{0}' (expected siemens or delta)")]
pub struct UnknownBrand(String);

impl FromStr for Brand {
    type Err = UnknownBrand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "siemens" => Ok(Brand::Siemens),
            "delta" => Ok(Brand::Delta),
            other => Err(UnknownBrand(other.to_string())),
        }
    }
}

/// Fault a brand's panel can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Temperature forced to `OVERHEAT_TEMPERATURE`, health dropped.
    Overheat,
    /// Device keeps answering but production is cut off.
    CommFailure,
}

impl FaultKind {
    /// Long console command and its one-letter panel shortcut.
    pub fn command(self) -> (&'static str, &'static str) {
        match self {
            FaultKind::Overheat => ("overheat", "s"),
            FaultKind::CommFailure => ("commfail", "c"),
        }
    }
}

pub const OVERHEAT_TEMPERATURE: f64 = 95.0;
pub const OVERHEAT_HEALTH: f64 = 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub brand: Brand,
    pub model: &'static str,
    pub port: u16,
    pub station_id: u8,

    /// Start-up and post-resume temperature (°C).
    pub nominal_temperature: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    /// Max per-tick temperature drift while producing (±).
    pub temperature_jitter: f64,
    /// Stopped machines cool down towards this floor.
    pub ambient_temperature: f64,
    pub cooling_step: f64,
    /// Alarm raised when temperature is strictly above this.
    pub alarm_threshold: f64,

    pub pieces_per_tick: RangeInclusive<u64>,
    /// Half-open: `energy_min <= x < energy_max` kWh per tick.
    pub energy_min: f64,
    pub energy_max: f64,

    pub initial_health: f64,
    pub health_min: f64,
    pub health_jitter: f64,

    /// Register 2 / 3 are cosmetic: nominal x10 plus jitter.
    pub nominal_pressure: u16,
    pub pressure_jitter: u16,
    pub nominal_cycle_time: u16,
    pub cycle_time_jitter: u16,

    pub downtime_cost: u16,
    pub fault: FaultKind,
}

pub const SIEMENS: DeviceProfile = DeviceProfile {
    brand: Brand::Siemens,
    model: "S7-1200",
    port: 502,
    station_id: 1,
    nominal_temperature: 65.0,
    temperature_min: 55.0,
    temperature_max: 90.0,
    temperature_jitter: 1.0,
    ambient_temperature: 40.0,
    cooling_step: 0.5,
    alarm_threshold: 85.0,
    pieces_per_tick: 1..=3,
    energy_min: 0.8,
    energy_max: 1.0,
    initial_health: 95.0,
    health_min: 60.0,
    health_jitter: 0.25,
    nominal_pressure: 1200,
    pressure_jitter: 50,
    nominal_cycle_time: 450,
    cycle_time_jitter: 25,
    downtime_cost: 850,
    fault: FaultKind::Overheat,
};

pub const DELTA: DeviceProfile = DeviceProfile {
    brand: Brand::Delta,
    model: "DVP-28SV",
    port: 503,
    station_id: 2,
    nominal_temperature: 58.0,
    temperature_min: 50.0,
    temperature_max: 85.0,
    temperature_jitter: 0.75,
    ambient_temperature: 35.0,
    cooling_step: 0.3,
    alarm_threshold: 80.0,
    pieces_per_tick: 1..=2,
    energy_min: 0.6,
    energy_max: 0.8,
    initial_health: 92.0,
    health_min: 70.0,
    health_jitter: 0.15,
    nominal_pressure: 1150,
    pressure_jitter: 40,
    nominal_cycle_time: 480,
    cycle_time_jitter: 20,
    downtime_cost: 650,
    fault: FaultKind::CommFailure,
};

impl DeviceProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }
}
