//! Operator CLI for the DX gateway
//!
//! Parses one stdin line into an `OperatorCommand` and applies it to the
//! `Gateway`. Every command returns its text instead of printing so the
//! binary owns the prompt and tests can read the output.

use std::fmt::Write as _;
use std::sync::Arc;

use nxd_modbus::{new_state, snapshot, Shared};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::GatewayConfig;
use crate::reader::DeviceReader;
use crate::relay::{NetworkRelay, RelayError};
use crate::runtime::RuntimeFlags;
use crate::scheduler::PollScheduler;
use crate::stats::{GatewayStats, StatsSnapshot};

const RULE: &str = "────────────────────────────────────────";

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    Start,
    Stop,
    Status,
    Network,
    Config,
    /// `None` when no key followed `api`.
    Api(Option<String>),
    Help,
    Exit,
    Empty,
    Unknown(String),
}

impl OperatorCommand {
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return OperatorCommand::Empty;
        };

        match head.to_lowercase().as_str() {
            "start" => OperatorCommand::Start,
            "stop" => OperatorCommand::Stop,
            "status" => OperatorCommand::Status,
            "network" => OperatorCommand::Network,
            "config" => OperatorCommand::Config,
            "help" => OperatorCommand::Help,
            "exit" | "quit" => OperatorCommand::Exit,
            "api" => {
                let key = words.collect::<Vec<_>>().join(" ").to_uppercase();
                OperatorCommand::Api((!key.is_empty()).then_some(key))
            }
            _ => OperatorCommand::Unknown(head.to_string()),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StartError {
    #[error("API key not configured. Use: api <key>")]
    MissingCredential,

    #[error("gateway is already running")]
    AlreadyRunning,
}

#[derive(Debug, PartialEq)]
pub enum Reply {
    Print(String),
    Silent,
    Exit(String),
}

pub struct Gateway {
    config: GatewayConfig,
    flags: Shared<RuntimeFlags>,
    stats: Shared<GatewayStats>,
    scheduler: Arc<PollScheduler>,
    poll_task: Option<JoinHandle<()>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, RelayError> {
        let flags = new_state(RuntimeFlags::from_config(&config));
        let stats = new_state(GatewayStats::new());
        let relay = NetworkRelay::new(config.endpoint.clone(), config.network.clone())?;
        let scheduler = Arc::new(PollScheduler::new(
            config.devices.clone(),
            DeviceReader::default(),
            relay,
            flags.clone(),
            stats.clone(),
        ));

        Ok(Self {
            config,
            flags,
            stats,
            scheduler,
            poll_task: None,
        })
    }

    pub fn flags(&self) -> RuntimeFlags {
        snapshot(&self.flags)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.lock().snapshot()
    }

    pub fn handle_line(&mut self, line: &str) -> Reply {
        self.handle(OperatorCommand::parse(line))
    }

    pub fn handle(&mut self, command: OperatorCommand) -> Reply {
        match command {
            OperatorCommand::Start => Reply::Print(match self.start() {
                Ok(()) => format!(
                    "🚀 Gateway started: polling {} devices every {} ms",
                    self.config.devices.len(),
                    self.flags.lock().poll_interval_ms
                ),
                Err(e) => format!("❌ {}", e),
            }),
            OperatorCommand::Stop => Reply::Print(if self.stop() {
                "⏹️  Gateway stopped (current cycle finishes first)".to_string()
            } else {
                "ℹ️  Gateway is not running".to_string()
            }),
            OperatorCommand::Status => Reply::Print(self.render_status()),
            OperatorCommand::Network => Reply::Print(if self.toggle_network() {
                "🌐 Network ENABLED".to_string()
            } else {
                "📵 Network DISABLED (simulated outage)".to_string()
            }),
            OperatorCommand::Config => Reply::Print(self.render_config()),
            OperatorCommand::Api(Some(key)) => {
                self.set_api_key(key);
                Reply::Print("🔑 API key updated".to_string())
            }
            OperatorCommand::Api(None) => Reply::Print("Usage: api <key>".to_string()),
            OperatorCommand::Help => Reply::Print(help_text()),
            OperatorCommand::Exit => {
                self.stop();
                Reply::Exit("👋 Shutting down gateway".to_string())
            }
            OperatorCommand::Empty => Reply::Silent,
            OperatorCommand::Unknown(word) => {
                Reply::Print(format!("❓ Unknown command: {} (type 'help')", word))
            }
        }
    }

    pub fn start(&mut self) -> Result<(), StartError> {
        {
            let mut flags = self.flags.lock();
            if flags.running {
                return Err(StartError::AlreadyRunning);
            }
            if !flags.has_credential() {
                return Err(StartError::MissingCredential);
            }
            flags.running = true;
        }
        self.stats.lock().mark_started();

        // A loop still finishing its last cycle or sleep picks the flag back up.
        let alive = self.poll_task.as_ref().is_some_and(|task| !task.is_finished());
        if !alive {
            self.poll_task = Some(tokio::spawn(self.scheduler.clone().run()));
        }
        info!("Gateway started");
        Ok(())
    }

    /// Returns whether the gateway was running.
    pub fn stop(&mut self) -> bool {
        let mut flags = self.flags.lock();
        let was_running = flags.running;
        flags.running = false;
        if was_running {
            info!("Gateway stopped");
        }
        was_running
    }

    /// Returns the new state.
    pub fn toggle_network(&mut self) -> bool {
        let mut flags = self.flags.lock();
        flags.network_enabled = !flags.network_enabled;
        info!("Network {}", if flags.network_enabled { "enabled" } else { "disabled" });
        flags.network_enabled
    }

    pub fn set_api_key(&mut self, key: String) {
        self.flags.lock().api_key = key;
        info!("API key updated");
    }

    pub fn render_status(&self) -> String {
        let flags = self.flags();
        let stats = self.stats();
        let mut out = String::new();

        let _ = writeln!(out, "📊 GATEWAY STATUS");
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(
            out,
            "Gateway:   {}",
            if flags.running { "🟢 RUNNING" } else { "🔴 STOPPED" }
        );
        let _ = writeln!(
            out,
            "Network:   {}",
            if flags.network_enabled { "🌐 ONLINE" } else { "📵 OFFLINE" }
        );
        let _ = writeln!(out, "Started:   {}", stats.started_display());
        let _ = writeln!(out, "Uptime:    {}", stats.uptime_display());
        let _ = writeln!(out, "Messages:  {} total", stats.messages_total);
        let _ = writeln!(out, "Success:   {}", stats.messages_success);
        let _ = writeln!(out, "Errors:    {}", stats.messages_error);
        let _ = writeln!(out, "Data sent: {}", stats.kilobytes_display());
        let _ = write!(
            out,
            "Last error: {}",
            stats.last_error.as_deref().unwrap_or("none")
        );
        out
    }

    pub fn render_config(&self) -> String {
        let flags = self.flags();
        let mut out = String::new();

        let _ = writeln!(out, "⚙️  GATEWAY CONFIGURATION");
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "Endpoint:  {}", self.config.endpoint);
        let _ = writeln!(
            out,
            "API key:   {}",
            flags.masked_key().unwrap_or_else(|| "❌ not configured".to_string())
        );
        let _ = writeln!(out, "Interval:  {} ms", flags.poll_interval_ms);
        let network = &self.config.network;
        if network.simulate_latency {
            let _ = writeln!(
                out,
                "Latency:   {}-{} ms (simulated)",
                network.latency_min_ms, network.latency_max_ms
            );
        } else {
            let _ = writeln!(out, "Latency:   off");
        }
        let _ = write!(out, "Devices:");
        for (i, device) in self.config.devices.iter().enumerate() {
            let _ = write!(
                out,
                "\n  {}. {} ({}) → {}:{}",
                i + 1,
                device.name,
                device.brand,
                device.host,
                device.port
            );
        }
        out
    }
}

pub fn help_text() -> String {
    [
        "📖 COMMANDS",
        RULE,
        "start       Start polling devices",
        "stop        Stop after the current cycle",
        "status      Show counters and flags",
        "network     Toggle the simulated uplink",
        "config      Show endpoint, key and devices",
        "api <key>   Set the API key",
        "help        Show this help",
        "exit        Quit",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceConfig, NetworkConfig};
    use nxd_devkit::{spawn_device, MockIngest};
    use nxd_modbus::RegisterMap;
    use std::time::Duration;

    fn config_for(endpoint: String, port: u16) -> GatewayConfig {
        GatewayConfig {
            endpoint,
            api_key: String::new(),
            poll_interval_ms: 20,
            network: NetworkConfig {
                simulate_latency: false,
                ..NetworkConfig::default()
            },
            devices: vec![DeviceConfig {
                name: "PRESS_A".to_string(),
                brand: "Siemens".to_string(),
                model: "S7-1200".to_string(),
                host: "127.0.0.1".to_string(),
                port,
                station_id: 1,
                protocol: "Modbus TCP".to_string(),
            }],
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(OperatorCommand::parse("  START "), OperatorCommand::Start);
        assert_eq!(OperatorCommand::parse("Quit"), OperatorCommand::Exit);
        assert_eq!(OperatorCommand::parse(""), OperatorCommand::Empty);
        assert_eq!(OperatorCommand::parse("   "), OperatorCommand::Empty);
        assert_eq!(OperatorCommand::parse("api"), OperatorCommand::Api(None));
        assert_eq!(
            OperatorCommand::parse("api nxd_abc   def"),
            OperatorCommand::Api(Some("NXD_ABC DEF".to_string()))
        );
        assert_eq!(
            OperatorCommand::parse("reboot now"),
            OperatorCommand::Unknown("reboot".to_string())
        );
    }

    #[tokio::test]
    async fn test_start_without_key_is_rejected() {
        let mut gateway = Gateway::new(GatewayConfig::default()).unwrap();

        assert_eq!(gateway.start(), Err(StartError::MissingCredential));
        assert!(!gateway.flags().running);
        assert!(gateway.poll_task.is_none());
        assert_eq!(gateway.stats().messages_total, 0);
        assert_eq!(gateway.stats().uptime_seconds, 0);

        let Reply::Print(text) = gateway.handle_line("start") else {
            panic!("start should print");
        };
        assert!(text.contains("API key not configured"));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut gateway = Gateway::new(GatewayConfig::default()).unwrap();
        gateway.handle_line("api nxd_key");

        assert_eq!(gateway.start(), Ok(()));
        assert_eq!(gateway.start(), Err(StartError::AlreadyRunning));
        gateway.stop();
    }

    #[tokio::test]
    async fn test_stop_twice_changes_nothing() {
        let mut gateway = Gateway::new(GatewayConfig::default()).unwrap();
        let before = gateway.stats();

        assert!(!gateway.stop());
        assert!(!gateway.stop());
        assert!(!gateway.flags().running);
        assert_eq!(gateway.stats(), before);
    }

    #[tokio::test]
    async fn test_network_toggle_and_api_key() {
        let mut gateway = Gateway::new(GatewayConfig::default()).unwrap();

        assert_eq!(
            gateway.handle_line("network"),
            Reply::Print("📵 Network DISABLED (simulated outage)".to_string())
        );
        assert!(!gateway.flags().network_enabled);
        gateway.handle_line("NETWORK");
        assert!(gateway.flags().network_enabled);

        gateway.handle_line("api nxd_live_key");
        assert_eq!(gateway.flags().api_key, "NXD_LIVE_KEY");
        assert_eq!(gateway.handle_line("api"), Reply::Print("Usage: api <key>".to_string()));
        assert_eq!(gateway.flags().api_key, "NXD_LIVE_KEY");
    }

    #[tokio::test]
    async fn test_config_view() {
        let mut gateway = Gateway::new(GatewayConfig::default()).unwrap();
        let text = gateway.render_config();
        assert!(text.contains("not configured"));
        assert!(text.contains("1. INJETORA_SIEMENS_01 (Siemens) → localhost:502"));
        assert!(text.contains("2. INJETORA_DELTA_01 (Delta) → localhost:503"));
        assert!(text.contains("100-500 ms"));

        gateway.set_api_key("NXD_0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string());
        assert!(gateway.render_config().contains("NXD_0123456789ABCDEFGHIJKLMNOP..."));
    }

    #[tokio::test]
    async fn test_status_view() {
        let gateway = Gateway::new(GatewayConfig::default()).unwrap();
        let text = gateway.render_status();
        assert!(text.contains("🔴 STOPPED"));
        assert!(text.contains("Started:   never"));
        assert!(text.contains("0h 0m 0s"));
        assert!(text.contains("0.00 KB"));
        assert!(text.contains("Last error: none"));
    }

    #[tokio::test]
    async fn test_empty_unknown_and_exit() {
        let mut gateway = Gateway::new(GatewayConfig::default()).unwrap();
        assert_eq!(gateway.handle_line(""), Reply::Silent);
        assert!(matches!(gateway.handle_line("foo"), Reply::Print(t) if t.contains("foo")));
        assert!(matches!(gateway.handle_line("exit"), Reply::Exit(_)));
        assert!(!gateway.flags().running);
    }

    #[tokio::test]
    async fn test_start_stop_restart_delivers() {
        let mock = MockIngest::start().await.unwrap();
        let device = spawn_device(RegisterMap::from_pairs([(0, 1), (1, 650), (7, 95)]), 1)
            .await
            .unwrap();
        let mut gateway = Gateway::new(config_for(mock.url(), device.port())).unwrap();
        gateway.handle_line("api nxd_key");

        gateway.start().unwrap();
        assert!(mock.wait_for(1, Duration::from_secs(5)).await);
        assert_eq!(mock.last().unwrap()["api_key"], "NXD_KEY");

        assert!(gateway.stop());
        gateway.start().unwrap();
        let seen = mock.count();
        assert!(mock.wait_for(seen + 1, Duration::from_secs(5)).await);
        gateway.stop();

        let stats = gateway.stats();
        assert!(stats.messages_success >= 2);
        assert!(stats.started_at.is_some());
    }
}
