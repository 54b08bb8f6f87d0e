//! Stats Tracker - pure accounting for the operator `status` view.
//!
//! `messages_total` counts relay attempts only; read failures land in
//! `messages_error` and `last_error` without an attempt.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct GatewayStats {
    messages_total: u64,
    messages_success: u64,
    messages_error: u64,
    bytes_transmitted: u64,
    last_error: Option<String>,
    start_time: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub messages_total: u64,
    pub messages_success: u64,
    pub messages_error: u64,
    pub bytes_transmitted: u64,
    pub last_error: Option<String>,
    pub uptime_seconds: u64,
    pub started_at: Option<DateTime<Utc>>,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self) {
        self.messages_total += 1;
    }

    pub fn record_success(&mut self, bytes: usize) {
        self.messages_success += 1;
        self.bytes_transmitted += bytes as u64;
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.messages_error += 1;
        self.last_error = Some(message.into());
    }

    /// First start only; later restarts keep the first uptime origin.
    pub fn mark_started(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
            self.started_at = Some(Utc::now());
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_total: self.messages_total,
            messages_success: self.messages_success,
            messages_error: self.messages_error,
            bytes_transmitted: self.bytes_transmitted,
            last_error: self.last_error.clone(),
            uptime_seconds: self.uptime().as_secs(),
            started_at: self.started_at,
        }
    }
}

impl StatsSnapshot {
    /// `Hh Mm Ss`
    pub fn uptime_display(&self) -> String {
        let secs = self.uptime_seconds;
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    /// Wall-clock time of the first start, or `never`.
    pub fn started_display(&self) -> String {
        self.started_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    }

    pub fn kilobytes_display(&self) -> String {
        format!("{:.2} KB", self.bytes_transmitted as f64 / 1024.0)
    }
}
