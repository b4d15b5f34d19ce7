use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::device::codec::to_hex;
use crate::device::constants::{make_notification_uuid, make_rocking_uuid, make_status_uuid};
use crate::error::{CodecError, DeviceError};

/// The vendor characteristics this crate talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Status,
    Notification,
    Rocking,
}

impl Characteristic {
    /// Subscriptions are registered in this order.
    pub const ALL: [Characteristic; 3] = [
        Characteristic::Status,
        Characteristic::Notification,
        Characteristic::Rocking,
    ];

    pub fn uuid(&self) -> Uuid {
        match self {
            Characteristic::Status => make_status_uuid(),
            Characteristic::Notification => make_notification_uuid(),
            Characteristic::Rocking => make_rocking_uuid(),
        }
    }

    pub fn from_uuid(uuid: &Uuid) -> Option<Characteristic> {
        Characteristic::ALL.into_iter().find(|c| c.uuid() == *uuid)
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            Characteristic::Status => "status",
            Characteristic::Notification => "notification",
            Characteristic::Rocking => "rocking",
        };

        write!(f, "{}", result)
    }
}

/// A single advertisement as reported by the transport during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: Option<String>,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
}

impl DiscoveredDevice {
    pub fn has_manufacturer(&self, manufacturer_id: u16) -> bool {
        self.manufacturer_data.contains_key(&manufacturer_id)
    }
}

/// Bytes pushed by the device on a subscribed characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub raw: Vec<u8>,
    pub battery_percent: u8, // [0, 100]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub source_id: Uuid,
    pub raw: Vec<u8>,
    pub hex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RockingError {
    None,
    Unknown,
    BrakeNotEngaged,
}

impl fmt::Display for RockingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            RockingError::None => "none",
            RockingError::Unknown => "unknown",
            RockingError::BrakeNotEngaged => "brake not eng.",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RockingEvent {
    pub error: RockingError,
    pub intensity: u8, // [0, 15]
    pub time_left_seconds: u16,
    pub set_time_seconds: u16,
    pub disc_engaged: bool,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    Status(StatusEvent),
    Notification(NotificationEvent),
    Rocking(RockingEvent),
}

impl fmt::Display for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEvent::Status(event) => write!(
                f,
                "Battery percentage: {}, raw: {}",
                event.battery_percent,
                to_hex(&event.raw),
            ),
            TelemetryEvent::Notification(event) => write!(
                f,
                "Received notification on {}: {}",
                event.source_id,
                event.hex,
            ),
            TelemetryEvent::Rocking(event) => write!(
                f,
                "Rock! error: {}, intensity: {}, time_left: {}, set_time: {}, disc: {} - raw: {}",
                event.error,
                event.intensity,
                event.time_left_seconds,
                event.set_time_seconds,
                event.disc_engaged,
                to_hex(&event.raw),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportLevel {
    Eco = 1,
    Tour = 2,
    Boost = 3,
}

impl TryFrom<i64> for SupportLevel {
    type Error = CodecError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SupportLevel::Eco),
            2 => Ok(SupportLevel::Tour),
            3 => Ok(SupportLevel::Boost),
            _ => Err(CodecError::InvalidIntent { field: "support_level", value }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RockingIntensity {
    Off = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl TryFrom<i64> for RockingIntensity {
    type Error = CodecError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RockingIntensity::Off),
            1 => Ok(RockingIntensity::High),
            2 => Ok(RockingIntensity::Medium),
            3 => Ok(RockingIntensity::Low),
            _ => Err(CodecError::InvalidIntent { field: "rocking_intensity", value }),
        }
    }
}

/// A validated command. Out of range values are rejected when the intent is constructed, so an
/// intent can always be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandIntent {
    SetSupportLevel { level: SupportLevel },
    SetRocking { intensity: RockingIntensity, stop_on_disconnect: bool },
}

impl CommandIntent {
    pub fn support_level(level: i64) -> Result<CommandIntent, CodecError> {
        Ok(CommandIntent::SetSupportLevel { level: SupportLevel::try_from(level)? })
    }

    pub fn rocking(intensity: i64, stop_on_disconnect: bool) -> Result<CommandIntent, CodecError> {
        Ok(CommandIntent::SetRocking {
            intensity: RockingIntensity::try_from(intensity)?,
            stop_on_disconnect,
        })
    }

    /// The characteristic the encoded intent is written to.
    pub fn characteristic(&self) -> Characteristic {
        match self {
            CommandIntent::SetSupportLevel { .. } => Characteristic::Notification,
            CommandIntent::SetRocking { .. } => Characteristic::Rocking,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    Shutdown,
    ConnectFailed(String),
    SubscriptionFailed(Characteristic, String),
    TransportDisconnected,
    TransportError(String),
}

impl From<&DeviceError> for TerminationReason {
    fn from(err: &DeviceError) -> Self {
        match err {
            DeviceError::TransportDisconnected => TerminationReason::TransportDisconnected,
            DeviceError::SubscriptionFailed { characteristic, source } => {
                TerminationReason::SubscriptionFailed(*characteristic, source.to_string())
            },
            err => TerminationReason::TransportError(err.to_string()),
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Shutdown => write!(f, "shutdown requested"),
            TerminationReason::ConnectFailed(message) => write!(f, "failed to connect: {}", message),
            TerminationReason::SubscriptionFailed(characteristic, message) => {
                write!(f, "failed to subscribe to {}: {}", characteristic, message)
            },
            TerminationReason::TransportDisconnected => write!(f, "connection lost"),
            TerminationReason::TransportError(message) => write!(f, "transport error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Discovering,
    Connecting,
    AwaitingConnection,
    Subscribing,
    Active,
    Terminated(TerminationReason),
}
