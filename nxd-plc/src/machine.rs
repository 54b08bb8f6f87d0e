//! Machine state - the source of truth of one simulated device.
//!
//! Registers are a projection of this state re-encoded every tick; they are
//! never written directly.

use crate::profile::{DeviceProfile, FaultKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Running,
    Stopped,
    Faulted(FaultKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    pub running: bool,
    /// Unbounded; the register projection keeps only the low 32 bits.
    pub total_pieces: u64,
    pub cumulative_energy: f64,
    pub temperature: f64,
    pub health_score: f64,
    /// Latched fault, cleared only by `resume`.
    pub fault: Option<FaultKind>,
}

impl MachineState {
    pub fn initial(profile: &DeviceProfile) -> Self {
        Self {
            running: true,
            total_pieces: 0,
            cumulative_energy: 0.0,
            temperature: profile.nominal_temperature,
            health_score: profile.initial_health,
            fault: None,
        }
    }

    pub fn comm_fault(&self) -> bool {
        self.fault == Some(FaultKind::CommFailure)
    }

    /// Producing only while running without a communication fault.
    pub fn is_producing(&self) -> bool {
        self.running && !self.comm_fault()
    }

    pub fn mode(&self) -> Mode {
        match self.fault {
            Some(kind) => Mode::Faulted(kind),
            None if self.running => Mode::Running,
            None => Mode::Stopped,
        }
    }
}
