//! One simulated PLC: profile, machine state, and the register projection
//! the responder serves.

use nxd_modbus::{RegisterBank, RegisterMap};
use rand::Rng;

use crate::console::ConsoleCommand;
use crate::machine::MachineState;
use crate::profile::DeviceProfile;
use crate::simulator;

#[derive(Debug, Clone)]
pub struct Device {
    profile: &'static DeviceProfile,
    state: MachineState,
    registers: RegisterMap,
}

impl Device {
    pub fn new(profile: &'static DeviceProfile) -> Self {
        Self {
            profile,
            state: MachineState::initial(profile),
            registers: simulator::initial_registers(profile),
        }
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Advance one tick and re-encode the registers.
    pub fn tick<R: Rng>(&mut self, rng: &mut R) {
        simulator::tick(&mut self.state, self.profile, rng);
        self.registers = simulator::encode(&self.state, self.profile, rng);
    }

    /// Run one console line. Registers follow on the next tick.
    pub fn handle_input(&mut self, line: &str) -> String {
        ConsoleCommand::parse(self.profile, line).apply(&mut self.state, self.profile)
    }
}

impl RegisterBank for Device {
    fn read(&self, address: u16) -> u16 {
        self.registers.get(address)
    }
}
