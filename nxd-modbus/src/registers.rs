//! Holding register storage
//!
//! A device exposes a sparse map of 16-bit slots. Any address without an
//! explicit value reads as 0: a read is never an error.

use std::collections::BTreeMap;

/// Bit-exact layout of the 10-register window every NXD device exposes.
pub mod layout {
    /// 0 = stopped, 1 = producing
    pub const PRODUCTION_STATUS: u16 = 0;
    /// Mold temperature x10 (°C)
    pub const MOLD_TEMPERATURE: u16 = 1;
    /// Injection pressure x10 (bar)
    pub const INJECTION_PRESSURE: u16 = 2;
    /// Cycle time x10 (s)
    pub const CYCLE_TIME: u16 = 3;
    pub const PIECES_LOW: u16 = 4;
    pub const PIECES_HIGH: u16 = 5;
    /// Energy x100 (kWh)
    pub const ENERGY: u16 = 6;
    /// 0-100
    pub const HEALTH_SCORE: u16 = 7;
    /// 0 = normal, 1 = alarm
    pub const TEMPERATURE_ALARM: u16 = 8;
    /// Downtime cost per hour (currency units)
    pub const DOWNTIME_COST: u16 = 9;

    pub const WINDOW_START: u16 = 0;
    pub const WINDOW_LEN: u16 = 10;
}

/// Anything the Register Responder can answer reads from.
pub trait RegisterBank {
    fn read(&self, address: u16) -> u16;

    /// Contiguous read with the same default-fill rule per address.
    /// Addresses past `u16::MAX` read as 0.
    fn read_block(&self, start: u16, count: u16) -> Vec<u16> {
        (0..count)
            .map(|offset| start.checked_add(offset).map_or(0, |addr| self.read(addr)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterMap {
    slots: BTreeMap<u16, u16>,
}

impl RegisterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(address, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u16, u16)>,
    {
        Self {
            slots: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, address: u16) -> u16 {
        self.slots.get(&address).copied().unwrap_or(0)
    }

    pub fn set(&mut self, address: u16, value: u16) {
        self.slots.insert(address, value);
    }
}

impl RegisterBank for RegisterMap {
    fn read(&self, address: u16) -> u16 {
        self.get(address)
    }
}
