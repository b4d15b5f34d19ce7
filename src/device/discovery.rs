use log::{debug, info, warn};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::device::transport::Transport;
use crate::device::types::DiscoveredDevice;

/// Which advertisements are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub manufacturer_id: u16,
    pub address: Option<String>,
}

impl DeviceFilter {
    pub fn new(manufacturer_id: u16) -> Self {
        DeviceFilter { manufacturer_id, address: None }
    }

    pub fn matches(&self, device: &DiscoveredDevice) -> bool {
        if !device.has_manufacturer(self.manufacturer_id) {
            return false;
        }

        match &self.address {
            Some(address) => address.eq_ignore_ascii_case(&device.address),
            None => true,
        }
    }
}

/// Returns the first matching advertisement.
pub fn select<I>(advertisements: I, filter: &DeviceFilter) -> Option<DiscoveredDevice>
where
    I: IntoIterator<Item = DiscoveredDevice>,
{
    advertisements.into_iter().find(|device| filter.matches(device))
}

/// Keeps issuing discovery rounds, `interval` apart, until a matching device is found.
/// Returns `None` only if `cancel` is cancelled.
pub async fn discover_device<T: Transport>(
    transport: &T,
    filter: &DeviceFilter,
    interval: Duration,
    cancel: &CancellationToken,
) -> Option<DiscoveredDevice> {
    let mut retry = false;

    loop {
        if retry {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = sleep(interval) => {},
            }
        }
        retry = true;

        let advertisements = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = transport.discover() => match result {
                Ok(advertisements) => advertisements,
                Err(err) => {
                    warn!("Discovery failed: {}", err);
                    continue;
                },
            },
        };

        match select(advertisements, filter) {
            Some(device) => {
                info!(
                    "Using device {} {}",
                    device.address,
                    device.name.as_deref().unwrap_or("NONE"),
                );
                return Some(device);
            },
            None => debug!("No devices matched"),
        }
    }
}
