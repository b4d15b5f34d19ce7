use std::path::PathBuf;
use serde::Deserialize;
use tokio::time::Duration;

use crate::device::constants::{CONNECTION_POLL_DELAY, DISCOVERY_INTERVAL, IS_CONNECTED_DEADLINE, LIVENESS_INTERVAL, MANUFACTURER_ID, WRITE_DEADLINE};
use crate::device::discovery::DeviceFilter;
use crate::device::session::SessionTimings;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub notifications_file: PathBuf,
    // only connect to the device with this address
    pub address: Option<String>,
    pub discovery_interval_ms: u64,
    pub connection_poll_ms: u64,
    pub liveness_interval_ms: u64,
    pub write_deadline_ms: u64,
    pub is_connected_deadline_ms: u64,
}

impl Config {
    /// Every timing drives a timer or a polling loop, zero is rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timings = [
            ("discoveryIntervalMs", self.discovery_interval_ms),
            ("connectionPollMs", self.connection_poll_ms),
            ("livenessIntervalMs", self.liveness_interval_ms),
            ("writeDeadlineMs", self.write_deadline_ms),
            ("isConnectedDeadlineMs", self.is_connected_deadline_ms),
        ];

        match timings.into_iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::ZeroTiming { field }),
            None => Ok(()),
        }
    }

    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            discovery_interval: Duration::from_millis(self.discovery_interval_ms),
            connection_poll: Duration::from_millis(self.connection_poll_ms),
            liveness_interval: Duration::from_millis(self.liveness_interval_ms),
            is_connected_deadline: Duration::from_millis(self.is_connected_deadline_ms),
            write_deadline: Duration::from_millis(self.write_deadline_ms),
        }
    }

    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter {
            manufacturer_id: MANUFACTURER_ID,
            address: self.address.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            notifications_file: PathBuf::from("notifications.txt"),
            address: None,
            discovery_interval_ms: DISCOVERY_INTERVAL,
            connection_poll_ms: CONNECTION_POLL_DELAY,
            liveness_interval_ms: LIVENESS_INTERVAL,
            write_deadline_ms: WRITE_DEADLINE,
            is_connected_deadline_ms: IS_CONNECTED_DEADLINE,
        }
    }
}
