//! Device Command Console - the operator panel of one simulated PLC.
//!
//! Single-line, case-insensitive commands drive the Running / Stopped /
//! Faulted state machine. Anything unrecognized prints a status snapshot.
//! No command history is kept.

use crate::machine::{MachineState, Mode};
use crate::profile::{DeviceProfile, FaultKind, OVERHEAT_HEALTH, OVERHEAT_TEMPERATURE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Stop,
    Resume,
    Fault(FaultKind),
    Status,
}

impl ConsoleCommand {
    /// Parse one input line against the panel of `profile`. A fault command
    /// belonging to the other brand is not recognized.
    pub fn parse(profile: &DeviceProfile, line: &str) -> Self {
        let input = line.trim().to_lowercase();
        let (fault_long, fault_short) = profile.fault.command();

        match input.as_str() {
            "stop" | "p" => ConsoleCommand::Stop,
            "resume" | "r" => ConsoleCommand::Resume,
            cmd if cmd == fault_long || cmd == fault_short => ConsoleCommand::Fault(profile.fault),
            _ => ConsoleCommand::Status,
        }
    }

    /// Apply to `state` and return the operator message.
    pub fn apply(self, state: &mut MachineState, profile: &DeviceProfile) -> String {
        match self {
            ConsoleCommand::Stop => {
                state.running = false;
                "🔴 Machine STOPPED".to_string()
            }
            ConsoleCommand::Resume => {
                state.running = true;
                state.fault = None;
                state.temperature = profile.nominal_temperature;
                "🟢 Machine RESUMED production".to_string()
            }
            ConsoleCommand::Fault(FaultKind::Overheat) => {
                state.running = false;
                state.fault = Some(FaultKind::Overheat);
                state.temperature = OVERHEAT_TEMPERATURE;
                state.health_score = OVERHEAT_HEALTH;
                "🌡️ OVERHEAT! Machine stopped automatically".to_string()
            }
            ConsoleCommand::Fault(FaultKind::CommFailure) => {
                state.running = false;
                state.fault = Some(FaultKind::CommFailure);
                "📡 COMMUNICATION FAILURE! Machine offline".to_string()
            }
            ConsoleCommand::Status => render_status(state, profile),
        }
    }
}

/// Full status box, shown on unrecognized input.
pub fn render_status(state: &MachineState, profile: &DeviceProfile) -> String {
    let status = match state.mode() {
        Mode::Running => "🟢 PRODUCING",
        Mode::Stopped => "🔴 STOPPED",
        Mode::Faulted(FaultKind::Overheat) => "🌡️ OVERHEATED",
        Mode::Faulted(FaultKind::CommFailure) => "📡 COMM FAILURE",
    };
    let (fault_long, fault_short) = profile.fault.command();
    let title = format!("PLC {} - SIMULATOR", profile.display_name().to_uppercase());

    let mut out = String::new();
    out.push_str("┌─────────────────────────────────────────────────────┐\n");
    out.push_str(&format!("│  {:<51}│\n", title));
    out.push_str("├─────────────────────────────────────────────────────┤\n");
    out.push_str(&format!("│  Status:       {:<37}│\n", status));
    out.push_str(&format!("│  Pieces:       {:<37}│\n", state.total_pieces));
    out.push_str(&format!("│  Temperature:  {:<37}│\n", format!("{:.1}°C", state.temperature)));
    out.push_str(&format!("│  Energy:       {:<37}│\n", format!("{:.2} kWh", state.cumulative_energy)));
    out.push_str(&format!("│  Health:       {:<37}│\n", format!("{:.0}%", state.health_score)));
    out.push_str("├─────────────────────────────────────────────────────┤\n");
    out.push_str(&format!(
        "│  {:<51}│\n",
        format!("Commands: stop (p)  resume (r)  {} ({})", fault_long, fault_short)
    ));
    out.push_str("└─────────────────────────────────────────────────────┘");
    out
}

/// One-line heartbeat for the periodic status display.
pub fn status_line(state: &MachineState, profile: &DeviceProfile) -> String {
    match state.mode() {
        Mode::Faulted(FaultKind::CommFailure) => {
            format!("📡 {}: COMMUNICATION FAILURE", profile.brand)
        }
        Mode::Running => format!(
            "🟢 {}: {} pieces | {:.1}°C | {:.0}% health",
            profile.brand, state.total_pieces, state.temperature, state.health_score
        ),
        _ => format!("🔴 {}: STOPPED | {:.1}°C", profile.brand, state.temperature),
    }
}
