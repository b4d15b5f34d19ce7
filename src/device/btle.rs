use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;
use btleplug::api::{Central, Characteristic as BtleCharacteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::OnceCell;

use crate::device::transport::{Connection, NotificationStream, Transport};
use crate::device::types::{Characteristic, DiscoveredDevice, RawNotification};
use crate::error::DeviceError;

/// Transport backed by the platform bluetooth stack.
pub struct BtleTransport {
    manager: Manager,
    adapters: OnceCell<Vec<Adapter>>,
    // peripherals seen during discovery, by address
    peripherals: Mutex<HashMap<String, Peripheral>>,
}

impl BtleTransport {
    pub async fn new() -> Result<Self, DeviceError> {
        Ok(BtleTransport {
            manager: Manager::new().await?,
            adapters: OnceCell::new(),
            peripherals: Mutex::new(HashMap::new()),
        })
    }

    async fn start_scanning(&self) -> Result<&Vec<Adapter>, DeviceError> {
        self.adapters.get_or_try_init(|| async {
            let adapters = self.manager.adapters().await?;
            if adapters.is_empty() {
                return Err(DeviceError::NoAdapter);
            }

            for adapter in &adapters {
                info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
                // Manufacturer data can not be filtered on, so scan for everything
                adapter.start_scan(ScanFilter::default()).await?;
            }

            Ok::<_, DeviceError>(adapters)
        }).await
    }

    fn remember(&self, address: &str, peripheral: Peripheral) {
        if let Ok(mut peripherals) = self.peripherals.lock() {
            peripherals.insert(address.to_string(), peripheral);
        }
    }

    fn lookup(&self, address: &str) -> Option<Peripheral> {
        self.peripherals.lock().ok().and_then(|peripherals| peripherals.get(address).cloned())
    }
}

#[async_trait]
impl Transport for BtleTransport {
    type Connection = BtleConnection;

    async fn discover(&self) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        let adapters = self.start_scanning().await?;
        let mut devices = vec![];

        for adapter in adapters {
            let peripherals = match adapter.peripherals().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripherals: {}", err);
                    continue;
                },
            };

            for peripheral in peripherals {
                match peripheral.properties().await {
                    Err(err) => {
                        warn!("Could not query peripheral for properties: {:?}", err);
                    },
                    Ok(None) => {
                        debug!("Peripheral has no properties");
                    },
                    Ok(Some(properties)) => {
                        let address = properties.address.to_string();
                        devices.push(DiscoveredDevice {
                            address: address.clone(),
                            name: properties.local_name,
                            manufacturer_data: properties.manufacturer_data,
                        });
                        self.remember(&address, peripheral);
                    },
                }
            }
        }

        Ok(devices)
    }

    async fn connect(&self, device: &DiscoveredDevice) -> Result<BtleConnection, DeviceError> {
        let peripheral = self.lookup(&device.address)
            .ok_or_else(|| DeviceError::UnknownDevice { address: device.address.clone() })?;

        info!("Connecting to peripheral {}...", device.address);
        peripheral.connect().await?;

        info!("Connected; Discovering services...");
        peripheral.discover_services().await?;

        let characteristics = peripheral.characteristics()
            .into_iter()
            .filter_map(|characteristic| {
                Characteristic::from_uuid(&characteristic.uuid).map(|known| (known, characteristic))
            })
            .collect();

        Ok(BtleConnection { peripheral, characteristics })
    }
}

pub struct BtleConnection {
    peripheral: Peripheral,
    characteristics: HashMap<Characteristic, BtleCharacteristic>,
}

impl BtleConnection {
    fn characteristic(&self, characteristic: Characteristic) -> Result<&BtleCharacteristic, DeviceError> {
        self.characteristics.get(&characteristic)
            .ok_or(DeviceError::MissingCharacteristic { uuid: characteristic.uuid() })
    }
}

#[async_trait]
impl Connection for BtleConnection {
    async fn is_connected(&self) -> Result<bool, DeviceError> {
        Ok(self.peripheral.is_connected().await?)
    }

    async fn subscribe(&self, characteristic: Characteristic) -> Result<(), DeviceError> {
        let btle_characteristic = self.characteristic(characteristic)?;

        info!("Subscribing to characteristic {} {:?}", characteristic, btle_characteristic.uuid);
        self.peripheral.subscribe(btle_characteristic).await?;
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream, DeviceError> {
        let stream = self.peripheral.notifications().await?;

        Ok(stream
            .map(|notification| RawNotification { uuid: notification.uuid, value: notification.value })
            .boxed())
    }

    async fn write(&self, characteristic: Characteristic, payload: &[u8]) -> Result<(), DeviceError> {
        let btle_characteristic = self.characteristic(characteristic)?;
        self.peripheral.write(btle_characteristic, payload, WriteType::WithResponse).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        for characteristic in self.characteristics.values() {
            if let Err(err) = self.peripheral.unsubscribe(characteristic).await {
                debug!("Failed to unsubscribe from {:?}: {:?}", characteristic.uuid, err);
            }
        }

        self.peripheral.disconnect().await?;
        Ok(())
    }
}
