//! Poll Scheduler
//!
//! One cycle = every configured device in list order, each fully read and
//! relayed before the next starts. A device failure is recorded and the
//! cycle moves on. Cycles are fixed-delay: the next one starts
//! `poll_interval_ms` after the previous one completes. Clearing `running`
//! never interrupts a cycle in flight; it only stops the next one.

use std::sync::Arc;
use std::time::Duration;

use nxd_modbus::{snapshot, Shared};
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::reader::DeviceReader;
use crate::relay::NetworkRelay;
use crate::runtime::RuntimeFlags;
use crate::stats::GatewayStats;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceOutcome {
    Delivered { bytes: usize },
    ReadFailed(String),
    RelayFailed(String),
}

impl DeviceOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeviceOutcome::Delivered { .. })
    }
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcomes: Vec<(String, DeviceOutcome)>,
}

impl CycleReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_delivered()).count()
    }

    pub fn outcome(&self, device: &str) -> Option<&DeviceOutcome> {
        self.outcomes.iter().find(|(name, _)| name == device).map(|(_, o)| o)
    }
}

pub struct PollScheduler {
    devices: Vec<DeviceConfig>,
    reader: DeviceReader,
    relay: NetworkRelay,
    flags: Shared<RuntimeFlags>,
    stats: Shared<GatewayStats>,
}

impl PollScheduler {
    pub fn new(
        devices: Vec<DeviceConfig>,
        reader: DeviceReader,
        relay: NetworkRelay,
        flags: Shared<RuntimeFlags>,
        stats: Shared<GatewayStats>,
    ) -> Self {
        Self {
            devices,
            reader,
            relay,
            flags,
            stats,
        }
    }

    fn is_running(&self) -> bool {
        self.flags.lock().running
    }

    /// Loop until `running` is cleared. Checked before each cycle, after
    /// it completes and after the inter-cycle sleep.
    pub async fn run(self: Arc<Self>) {
        info!("Poll loop started ({} devices)", self.devices.len());

        while self.is_running() {
            let report = self.run_cycle().await;
            debug!("Cycle done: {}/{} delivered", report.delivered(), report.outcomes.len());

            if !self.is_running() {
                break;
            }
            let interval = self.flags.lock().poll_interval_ms;
            tokio::time::sleep(Duration::from_millis(interval)).await;
        }

        info!("Poll loop stopped");
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        for device in &self.devices {
            let outcome = self.poll_device(device).await;
            report.outcomes.push((device.name.clone(), outcome));
        }
        report
    }

    async fn poll_device(&self, device: &DeviceConfig) -> DeviceOutcome {
        let record = match self.reader.read(device).await {
            Ok(record) => record,
            Err(e) => {
                let message = e.to_string();
                warn!("Read failed: {}", message);
                println!("❌ {}", message);
                self.stats.lock().record_failure(message.clone());
                return DeviceOutcome::ReadFailed(message);
            }
        };
        println!("📊 {} {}", device.name, record.summary());

        let flags = snapshot(&self.flags);
        self.stats.lock().record_attempt();

        match self.relay.send(&record, &flags.api_key, flags.network_enabled).await {
            Ok(bytes) => {
                self.stats.lock().record_success(bytes);
                println!("   ☁️  {} sent ({} bytes)", device.name, bytes);
                DeviceOutcome::Delivered { bytes }
            }
            Err(e) => {
                let message = format!("{}: {}", device.name, e);
                warn!("Relay failed: {}", message);
                println!("   ⚠️  {}", message);
                self.stats.lock().record_failure(message.clone());
                DeviceOutcome::RelayFailed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, NetworkConfig};
    use nxd_devkit::{spawn_device, DeviceHandle, MockIngest};
    use nxd_modbus::{new_state, RegisterMap};
    use std::time::Instant;
    use tokio::net::{TcpListener, TcpStream};

    fn device_config(name: &str, port: u16, station_id: u8) -> DeviceConfig {
        DeviceConfig {
            name: name.to_string(),
            brand: "Siemens".to_string(),
            model: "S7-1200".to_string(),
            host: "127.0.0.1".to_string(),
            port,
            station_id,
            protocol: "Modbus TCP".to_string(),
        }
    }

    async fn live_device() -> DeviceHandle {
        let registers = RegisterMap::from_pairs([(0, 1), (1, 650), (2, 1200), (3, 450), (7, 95), (9, 850)]);
        spawn_device(registers, 1).await.unwrap()
    }

    async fn dead_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    /// Relays to `upstream` but holds each connection for `delay` first.
    /// Returns the port and the arrival time of every connection.
    async fn slow_link(upstream: u16, delay: Duration) -> (u16, Shared<Vec<Instant>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let arrivals = new_state(Vec::new());
        let seen = arrivals.clone();

        tokio::spawn(async move {
            while let Ok((mut inbound, _)) = listener.accept().await {
                seen.lock().push(Instant::now());
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Ok(mut outbound) = TcpStream::connect(("127.0.0.1", upstream)).await {
                        let _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await;
                    }
                });
            }
        });
        (port, arrivals)
    }

    fn scheduler(
        devices: Vec<DeviceConfig>,
        endpoint: String,
        network_enabled: bool,
    ) -> (PollScheduler, Shared<RuntimeFlags>, Shared<GatewayStats>) {
        let mut flags = RuntimeFlags::from_config(&GatewayConfig::default());
        flags.api_key = "NXD_TEST_KEY".to_string();
        flags.network_enabled = network_enabled;
        flags.poll_interval_ms = 20;
        let flags = new_state(flags);
        let stats = new_state(GatewayStats::new());

        let network = NetworkConfig {
            simulate_latency: false,
            ..NetworkConfig::default()
        };
        let relay = NetworkRelay::new(endpoint, network).unwrap();
        let scheduler = PollScheduler::new(
            devices,
            DeviceReader::new(Duration::from_millis(500)),
            relay,
            flags.clone(),
            stats.clone(),
        );
        (scheduler, flags, stats)
    }

    #[tokio::test]
    async fn test_failed_device_does_not_block_the_next() {
        let mock = MockIngest::start().await.unwrap();
        let good = live_device().await;
        let devices = vec![
            device_config("PRESS_DOWN", dead_port().await, 1),
            device_config("PRESS_UP", good.port(), 1),
        ];
        let (scheduler, _, stats) = scheduler(devices, mock.url(), true);

        let report = scheduler.run_cycle().await;

        assert_eq!(report.outcomes.len(), 2);
        assert!(matches!(report.outcome("PRESS_DOWN"), Some(DeviceOutcome::ReadFailed(_))));
        assert!(report.outcome("PRESS_UP").unwrap().is_delivered());
        assert_eq!(mock.count(), 1);
        assert_eq!(mock.last().unwrap()["device_id"], "PRESS_UP");

        let snap = stats.lock().snapshot();
        assert_eq!(snap.messages_total, 1);
        assert_eq!(snap.messages_success, 1);
        assert_eq!(snap.messages_error, 1);
        assert!(snap.last_error.unwrap().starts_with("PRESS_DOWN"));
    }

    #[tokio::test]
    async fn test_network_disabled_fails_every_relay() {
        let mock = MockIngest::start().await.unwrap();
        let good = live_device().await;
        let devices = vec![
            device_config("PRESS_A", good.port(), 1),
            device_config("PRESS_B", good.port(), 1),
        ];
        let (scheduler, _, stats) = scheduler(devices, mock.url(), false);

        let report = scheduler.run_cycle().await;

        assert_eq!(report.delivered(), 0);
        assert_eq!(mock.count(), 0);
        let snap = stats.lock().snapshot();
        assert_eq!(snap.messages_total, 2);
        assert_eq!(snap.messages_success, 0);
        assert_eq!(snap.messages_error, 2);
        assert!(snap.last_error.unwrap().contains("network disabled"));
    }

    #[tokio::test]
    async fn test_endpoint_error_is_recorded() {
        let mock = MockIngest::start().await.unwrap();
        mock.respond_with(500);
        let good = live_device().await;
        let (scheduler, _, stats) = scheduler(vec![device_config("PRESS_A", good.port(), 1)], mock.url(), true);

        let report = scheduler.run_cycle().await;

        assert!(matches!(report.outcome("PRESS_A"), Some(DeviceOutcome::RelayFailed(_))));
        let snap = stats.lock().snapshot();
        assert_eq!(snap.messages_total, 1);
        assert_eq!(snap.messages_success, 0);
        assert!(snap.last_error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_success_counts_record_bytes() {
        let mock = MockIngest::start().await.unwrap();
        let good = live_device().await;
        let (scheduler, _, stats) = scheduler(vec![device_config("PRESS_A", good.port(), 1)], mock.url(), true);

        let report = scheduler.run_cycle().await;

        let Some(DeviceOutcome::Delivered { bytes }) = report.outcome("PRESS_A") else {
            panic!("expected delivery, got {:?}", report.outcomes);
        };
        let body = mock.last().unwrap();
        assert_eq!(body["api_key"], "NXD_TEST_KEY");
        assert_eq!(body["tags"]["Temperatura_Molde"], 65.0);

        // credited size is the record alone, credential excluded
        let mut record = body.clone();
        record.as_object_mut().unwrap().remove("api_key");
        assert_eq!(serde_json::to_string(&record).unwrap().len(), *bytes);
        assert_eq!(stats.lock().snapshot().bytes_transmitted, *bytes as u64);
    }

    #[tokio::test]
    async fn test_loop_exits_when_running_cleared() {
        let mock = MockIngest::start().await.unwrap();
        let good = live_device().await;
        let (scheduler, flags, _) = scheduler(vec![device_config("PRESS_A", good.port(), 1)], mock.url(), true);

        flags.lock().running = true;
        let task = tokio::spawn(Arc::new(scheduler).run());

        assert!(mock.wait_for(2, Duration::from_secs(5)).await);
        flags.lock().running = false;

        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        let delivered = mock.count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.count(), delivered);
    }

    #[tokio::test]
    async fn test_stop_mid_cycle_lets_the_cycle_finish() {
        let mock = MockIngest::start().await.unwrap();
        let good = live_device().await;
        let (slow_port, _) = slow_link(good.port(), Duration::from_millis(300)).await;
        let devices = vec![
            device_config("PRESS_SLOW", slow_port, 1),
            device_config("PRESS_FAST", good.port(), 1),
        ];
        let (scheduler, flags, stats) = scheduler(devices, mock.url(), true);

        flags.lock().running = true;
        let task = tokio::spawn(Arc::new(scheduler).run());

        // still waiting on the slow device
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.count(), 0);
        flags.lock().running = false;

        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        let order: Vec<_> = mock.received().iter().map(|body| body["device_id"].clone()).collect();
        assert_eq!(order, vec!["PRESS_SLOW", "PRESS_FAST"]);
        assert_eq!(stats.lock().snapshot().messages_success, 2);
    }

    #[tokio::test]
    async fn test_interval_counts_from_cycle_end() {
        let mock = MockIngest::start().await.unwrap();
        let good = live_device().await;
        let read_delay = Duration::from_millis(150);
        let (slow_port, arrivals) = slow_link(good.port(), read_delay).await;
        let (scheduler, flags, _) = scheduler(vec![device_config("PRESS_SLOW", slow_port, 1)], mock.url(), true);

        flags.lock().poll_interval_ms = 200;
        flags.lock().running = true;
        let task = tokio::spawn(Arc::new(scheduler).run());

        assert!(mock.wait_for(2, Duration::from_secs(5)).await);
        flags.lock().running = false;
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

        // first cycle ends no earlier than read_delay after it began; the
        // next one may only begin a full interval after that
        let arrivals = snapshot(&arrivals);
        let gap = arrivals[1].duration_since(arrivals[0]);
        assert!(
            gap >= read_delay + Duration::from_millis(200) - Duration::from_millis(10),
            "cycles {:?} apart",
            gap
        );
    }

    #[tokio::test]
    async fn test_loop_never_starts_when_not_running() {
        let mock = MockIngest::start().await.unwrap();
        let good = live_device().await;
        let (scheduler, _, stats) = scheduler(vec![device_config("PRESS_A", good.port(), 1)], mock.url(), true);

        Arc::new(scheduler).run().await;

        assert_eq!(mock.count(), 0);
        assert_eq!(stats.lock().snapshot().messages_total, 0);
    }
}
