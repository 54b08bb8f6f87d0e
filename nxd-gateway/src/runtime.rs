//! Runtime flags shared by the operator console and the poll loop.

use crate::config::GatewayConfig;

const MASK_VISIBLE_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeFlags {
    pub running: bool,
    pub network_enabled: bool,
    pub api_key: String,
    pub poll_interval_ms: u64,
}

impl RuntimeFlags {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            running: false,
            network_enabled: true,
            api_key: config.api_key.clone(),
            poll_interval_ms: config.poll_interval_ms,
        }
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn masked_key(&self) -> Option<String> {
        if !self.has_credential() {
            return None;
        }
        let visible: String = self.api_key.chars().take(MASK_VISIBLE_CHARS).collect();
        Some(format!("{}...", visible))
    }
}
