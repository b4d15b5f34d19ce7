use std::io;
use std::str::Utf8Error;
use thiserror::Error;
use tokio::task::JoinError;
use uuid::Uuid;
use btleplug;
use serde_json;

use crate::device::types::{Characteristic, TerminationReason};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed {characteristic} payload of {length} bytes")]
    MalformedPayload { characteristic: Characteristic, length: usize },

    #[error("Invalid value {value} for {field}")]
    InvalidIntent { field: &'static str, value: i64 },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("Device {address} is no longer known to the bluetooth adapter")]
    UnknownDevice { address: String },

    #[error("A required bluetooth characteristic is not available: {uuid}")]
    MissingCharacteristic { uuid: Uuid },

    #[error("Failed to subscribe to the {characteristic} characteristic: {source}")]
    SubscriptionFailed { characteristic: Characteristic, source: Box<DeviceError> },

    #[error("The connection to the device was lost")]
    TransportDisconnected,
}

/// Outcome of a single submitted command, as seen by the submitter.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to write to device: {source}")]
    Write { #[from] source: DeviceError },

    #[error("Writing to the device took too long")]
    WriteTimeout,

    #[error("The device session has ended")]
    SessionClosed,
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Expected a number but got {input:?}")]
    NotANumber { input: String },

    #[error("Unknown selection {selection}")]
    UnknownSelection { selection: i64 },

    #[error("{source}")]
    OutOfRange { #[from] source: CodecError },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to append to the notifications file: {source}")]
    IOError { #[from] source: io::Error },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse config file: {source}")]
    JsonError { #[from] source: serde_json::Error },

    #[error("Config value {field} must be greater than zero")]
    ZeroTiming { field: &'static str },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start (bluetooth): {source}")]
    DeviceError { #[from] source: DeviceError },

    #[error("Failed to start (notifications file): {source}")]
    SinkError { #[from] source: SinkError },

    #[error("Failed to start (runtime): {source}")]
    IOError { #[from] source: io::Error },

    #[error("Session task failed: {source}")]
    Join { #[from] source: JoinError },

    #[error("Session terminated: {reason}")]
    SessionTerminated { reason: TerminationReason },
}
