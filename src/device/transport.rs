use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::device::types::{Characteristic, DiscoveredDevice, RawNotification};
use crate::error::DeviceError;

pub type NotificationStream = BoxStream<'static, RawNotification>;

/// The BLE stack the session runs on top of.
#[async_trait]
pub trait Transport: Send + Sync {
    type Connection: Connection;

    /// One discovery round. Returns every advertisement seen so far.
    async fn discover(&self) -> Result<Vec<DiscoveredDevice>, DeviceError>;

    /// Creates a connection to a discovered device. The connection might not be live yet.
    async fn connect(&self, device: &DiscoveredDevice) -> Result<Self::Connection, DeviceError>;
}

#[async_trait]
pub trait Connection: Send + Sync + 'static {
    async fn is_connected(&self) -> Result<bool, DeviceError>;

    async fn subscribe(&self, characteristic: Characteristic) -> Result<(), DeviceError>;

    /// Notifications for every subscribed characteristic, in the order the device sent them.
    /// The stream ends when the connection is lost.
    async fn notifications(&self) -> Result<NotificationStream, DeviceError>;

    async fn write(&self, characteristic: Characteristic, payload: &[u8]) -> Result<(), DeviceError>;

    async fn disconnect(&self) -> Result<(), DeviceError>;
}
