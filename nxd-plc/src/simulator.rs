//! Machine-State Simulator
//!
//! `tick` advances the physical state once; `encode` projects it onto the
//! holding registers. Both take the RNG explicitly so tests can seed it.

use std::time::Duration;

use nxd_modbus::layout;
use nxd_modbus::RegisterMap;
use rand::Rng;
use tokio::time::{interval_at, Instant, Interval};

use crate::machine::MachineState;
use crate::profile::DeviceProfile;

/// Advance `state` by one tick (1 s of machine time).
pub fn tick<R: Rng>(state: &mut MachineState, profile: &DeviceProfile, rng: &mut R) {
    if state.is_producing() {
        state.total_pieces += rng.gen_range(profile.pieces_per_tick.clone());
        state.cumulative_energy += rng.gen_range(profile.energy_min..profile.energy_max);

        let drift = rng.gen_range(-profile.temperature_jitter..=profile.temperature_jitter);
        state.temperature =
            (state.temperature + drift).clamp(profile.temperature_min, profile.temperature_max);

        let wear = rng.gen_range(-profile.health_jitter..=profile.health_jitter);
        state.health_score = (state.health_score + wear).clamp(profile.health_min, 100.0);
    } else {
        state.temperature =
            (state.temperature - profile.cooling_step).max(profile.ambient_temperature);
    }
}

/// Project `state` onto the 10-register window.
///
/// Piece count and energy keep only their low bits: past 2^32 pieces the
/// counter wraps exactly like the field device does.
pub fn encode<R: Rng>(state: &MachineState, profile: &DeviceProfile, rng: &mut R) -> RegisterMap {
    let mut registers = RegisterMap::new();

    registers.set(layout::PRODUCTION_STATUS, u16::from(state.running));
    registers.set(layout::MOLD_TEMPERATURE, scaled(state.temperature, 10.0));
    registers.set(
        layout::INJECTION_PRESSURE,
        jittered(profile.nominal_pressure, profile.pressure_jitter, rng),
    );
    registers.set(
        layout::CYCLE_TIME,
        jittered(profile.nominal_cycle_time, profile.cycle_time_jitter, rng),
    );
    registers.set(layout::PIECES_LOW, (state.total_pieces & 0xFFFF) as u16);
    registers.set(layout::PIECES_HIGH, ((state.total_pieces >> 16) & 0xFFFF) as u16);
    registers.set(layout::ENERGY, scaled(state.cumulative_energy, 100.0));
    registers.set(layout::HEALTH_SCORE, scaled(state.health_score, 1.0));
    registers.set(
        layout::TEMPERATURE_ALARM,
        u16::from(state.temperature > profile.alarm_threshold),
    );
    registers.set(layout::DOWNTIME_COST, profile.downtime_cost);

    registers
}

/// Registers a device exposes before its first tick.
pub fn initial_registers(profile: &DeviceProfile) -> RegisterMap {
    let state = MachineState::initial(profile);
    RegisterMap::from_pairs([
        (layout::PRODUCTION_STATUS, u16::from(state.running)),
        (layout::MOLD_TEMPERATURE, scaled(state.temperature, 10.0)),
        (layout::INJECTION_PRESSURE, profile.nominal_pressure),
        (layout::CYCLE_TIME, profile.nominal_cycle_time),
        (layout::PIECES_LOW, 0),
        (layout::PIECES_HIGH, 0),
        (layout::ENERGY, 0),
        (layout::HEALTH_SCORE, scaled(state.health_score, 1.0)),
        (layout::TEMPERATURE_ALARM, 0),
        (layout::DOWNTIME_COST, profile.downtime_cost),
    ])
}

/// Periodic timer whose first tick lands one `period` from now.
pub fn cadence(period: Duration) -> Interval {
    interval_at(Instant::now() + period, period)
}

fn scaled(value: f64, factor: f64) -> u16 {
    // negative never happens in practice; wrap the rest to 16 bits
    ((value * factor).round().max(0.0) as u64 & 0xFFFF) as u16
}

fn jittered<R: Rng>(nominal: u16, jitter: u16, rng: &mut R) -> u16 {
    let jitter = i32::from(jitter);
    (i32::from(nominal) + rng.gen_range(-jitter..=jitter)).clamp(0, i32::from(u16::MAX)) as u16
}
