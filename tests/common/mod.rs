#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use tokio::time::{sleep, Duration};

use rockctl::device::constants::MANUFACTURER_ID;
use rockctl::device::transport::{Connection, NotificationStream, Transport};
use rockctl::device::types::{Characteristic, DiscoveredDevice, RawNotification, TelemetryEvent};
use rockctl::error::{DeviceError, SinkError};
use rockctl::sink::TelemetrySink;

pub fn device(address: &str, manufacturer_ids: &[u16]) -> DiscoveredDevice {
    DiscoveredDevice {
        address: address.to_string(),
        name: Some("fake".to_string()),
        manufacturer_data: manufacturer_ids.iter().map(|id| (*id, vec![0x00, 0x01])).collect::<HashMap<_, _>>(),
    }
}

pub fn rocker() -> DiscoveredDevice {
    device("C0:FF:EE:00:00:01", &[MANUFACTURER_ID])
}

/// Everything a test can observe or steer about the fake connection.
#[derive(Default)]
pub struct FakeDevice {
    // is_connected reports false this many times before the connection becomes live
    pub connect_polls: AtomicUsize,
    pub is_connected_calls: AtomicUsize,
    pub connected: AtomicBool,
    pub fail_subscribe: Mutex<Option<Characteristic>>,
    pub fail_writes: AtomicBool,
    // writes never complete while set
    pub hang_writes: AtomicBool,
    pub subscriptions: Mutex<Vec<Characteristic>>,
    pub writes: Mutex<Vec<(Characteristic, Vec<u8>)>>,
    pub disconnects: AtomicUsize,
}

impl FakeDevice {
    pub fn writes(&self) -> Vec<(Characteristic, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<Characteristic> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

pub struct FakeTransport {
    rounds: Mutex<VecDeque<Result<Vec<DiscoveredDevice>, DeviceError>>>,
    pub discover_calls: Arc<AtomicUsize>,
    pub fail_connect: bool,
    pub device: Arc<FakeDevice>,
    notifications: Mutex<Option<UnboundedReceiver<RawNotification>>>,
}

impl FakeTransport {
    /// Every discover call returns the next round, once they run out the last round repeats.
    pub fn new(rounds: Vec<Vec<DiscoveredDevice>>) -> (Self, UnboundedSender<RawNotification>) {
        Self::with_results(rounds.into_iter().map(Ok).collect())
    }

    pub fn with_results(rounds: Vec<Result<Vec<DiscoveredDevice>, DeviceError>>) -> (Self, UnboundedSender<RawNotification>) {
        let (sender, receiver) = unbounded();
        let device = FakeDevice::default();
        device.connected.store(true, Ordering::SeqCst);

        let transport = FakeTransport {
            rounds: Mutex::new(rounds.into_iter().collect()),
            discover_calls: Arc::new(AtomicUsize::new(0)),
            fail_connect: false,
            device: Arc::new(device),
            notifications: Mutex::new(Some(receiver)),
        };

        (transport, sender)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    type Connection = FakeConnection;

    async fn discover(&self) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);

        let mut rounds = self.rounds.lock().unwrap();
        if rounds.len() > 1 {
            return rounds.pop_front().unwrap();
        }

        match rounds.front() {
            Some(Ok(devices)) => Ok(devices.clone()),
            Some(Err(_)) => Err(DeviceError::NoAdapter),
            None => Ok(vec![]),
        }
    }

    async fn connect(&self, device: &DiscoveredDevice) -> Result<FakeConnection, DeviceError> {
        if self.fail_connect {
            return Err(DeviceError::UnknownDevice { address: device.address.clone() });
        }

        Ok(FakeConnection {
            device: self.device.clone(),
            notifications: Mutex::new(self.notifications.lock().unwrap().take()),
        })
    }
}

pub struct FakeConnection {
    device: Arc<FakeDevice>,
    notifications: Mutex<Option<UnboundedReceiver<RawNotification>>>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn is_connected(&self) -> Result<bool, DeviceError> {
        self.device.is_connected_calls.fetch_add(1, Ordering::SeqCst);

        let pending = self.device.connect_polls.load(Ordering::SeqCst);
        if pending > 0 {
            self.device.connect_polls.store(pending - 1, Ordering::SeqCst);
            return Ok(false);
        }

        Ok(self.device.connected.load(Ordering::SeqCst))
    }

    async fn subscribe(&self, characteristic: Characteristic) -> Result<(), DeviceError> {
        if *self.device.fail_subscribe.lock().unwrap() == Some(characteristic) {
            return Err(DeviceError::MissingCharacteristic { uuid: characteristic.uuid() });
        }

        self.device.subscriptions.lock().unwrap().push(characteristic);
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream, DeviceError> {
        let receiver = self.notifications.lock().unwrap().take()
            .ok_or(DeviceError::TransportDisconnected)?;
        Ok(receiver.boxed())
    }

    async fn write(&self, characteristic: Characteristic, payload: &[u8]) -> Result<(), DeviceError> {
        if self.device.hang_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.device.fail_writes.load(Ordering::SeqCst) {
            return Err(DeviceError::MissingCharacteristic { uuid: characteristic.uuid() });
        }

        self.device.writes.lock().unwrap().push((characteristic, payload.to_vec()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.device.disconnects.fetch_add(1, Ordering::SeqCst);
        self.device.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn append(&self, event: &TelemetryEvent) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Waits (in virtual time) until `condition` holds.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }

    panic!("condition was not met in time");
}
