//! NXD PLC simulator
//!
//! Emulates an injection-molding machine controller behind a Modbus TCP
//! listener:
//! - Two brand profiles (Siemens S7-1200, Delta DVP-28SV)
//! - 1 s machine-state ticks re-encoded into 10 holding registers
//! - Operator console driving stop / resume / fault injection

pub mod console;
pub mod device;
pub mod machine;
pub mod profile;
pub mod simulator;

pub use device::Device;
pub use machine::{MachineState, Mode};
pub use profile::{Brand, DeviceProfile, FaultKind, DELTA, SIEMENS};
