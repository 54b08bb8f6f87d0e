//! NXD DX Gateway
//!
//! Edge gateway between simulated PLCs and the NXD ingestion API:
//! - Polls every configured device over Modbus TCP on a fixed delay
//! - Decodes the 10-register window into a labeled telemetry record
//! - Relays each record over a (simulated) cellular uplink
//! - Operator console for start/stop, outage simulation and credentials

pub mod config;
pub mod console;
pub mod reader;
pub mod relay;
pub mod runtime;
pub mod scheduler;
pub mod stats;
pub mod telemetry;

pub use config::{ConfigError, DeviceConfig, GatewayConfig, NetworkConfig};
pub use console::{Gateway, OperatorCommand, Reply, StartError};
pub use reader::{DeviceReader, ReadError};
pub use relay::{NetworkRelay, RelayError};
pub use runtime::RuntimeFlags;
pub use scheduler::{CycleReport, DeviceOutcome, PollScheduler};
pub use stats::{GatewayStats, StatsSnapshot};
pub use telemetry::{Tags, TelemetryRecord};
