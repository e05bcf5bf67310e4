//! NimBLE radio stack (ESP32 only).
//!
//! Adapts `esp32-nimble` to [`RadioStack`]. NimBLE invokes callbacks on its
//! own host task; every callback here only enqueues a [`PeripheralEvent`]
//! and returns. Reads are served from the callback with the fixed greeting
//! while NimBLE holds the characteristic lock, so they never wait on the
//! peripheral.
//!
//! [`PeripheralEvent`]: crate::peripheral::PeripheralEvent

use crate::config::{ConnIntervalRange, PeripheralIdentity};
use crate::peripheral::{
    AdvertisementPayload, Advertiser, CharacteristicSpec, Descriptor, EventSender, Notifier,
    PeerInfo, RadioStack, StackError,
};
use esp32_nimble::utilities::mutex::Mutex;
use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{
    BLEAdvertisementData, BLEAdvertising, BLECharacteristic, BLEDevice, BLEError, BLEService,
    NimbleProperties,
};
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Supervision timeout requested with the preferred interval, in 10 ms units.
const SUPERVISION_TIMEOUT: u16 = 60;

fn ble_uuid(uuid: Uuid, operation: &'static str) -> Result<BleUuid, StackError> {
    BleUuid::from_uuid128_string(&uuid.to_string())
        .map_err(|e| StackError::new(operation, e.to_string()))
}

fn stack_error(operation: &'static str) -> impl Fn(BLEError) -> StackError {
    move |e| StackError::new(operation, format!("{:?}", e))
}

fn properties(spec: &CharacteristicSpec) -> NimbleProperties {
    NimbleProperties::from_bits_truncate(spec.capabilities.bits() as u16)
}

/// The ESP32's NimBLE host.
pub struct NimbleStack {
    device: &'static mut BLEDevice,
    preferred_interval: ConnIntervalRange,
    services: Vec<(Uuid, Arc<Mutex<BLEService>>)>,
}

impl NimbleStack {
    /// Take the NimBLE device singleton.
    ///
    /// `preferred_interval` is requested from every central right after it
    /// connects.
    pub fn take(preferred_interval: ConnIntervalRange) -> Self {
        Self {
            device: BLEDevice::take(),
            preferred_interval,
            services: Vec::new(),
        }
    }

    fn service(&self, uuid: Uuid, operation: &'static str) -> Result<&Arc<Mutex<BLEService>>, StackError> {
        self.services
            .iter()
            .find(|(id, _)| *id == uuid)
            .map(|(_, service)| service)
            .ok_or_else(|| StackError::new(operation, format!("unknown service {}", uuid)))
    }
}

impl RadioStack for NimbleStack {
    type Advertiser = NimbleAdvertiser;
    type Notifier = NimbleNotifier;

    fn init(&mut self, identity: &PeripheralIdentity) -> Result<(), StackError> {
        BLEDevice::set_device_name(&identity.device_name).map_err(stack_error("init"))?;
        info!("NimBLE initialized as {:?}", identity.device_name);
        Ok(())
    }

    fn create_server(&mut self, events: EventSender) -> Result<(), StackError> {
        let server = self.device.get_server();
        // Restart is handled by the lifecycle handler, not by NimBLE
        server.advertise_on_disconnect(false);

        let interval = self.preferred_interval;
        let connect_events = events.clone();
        server.on_connect(move |server, desc| {
            let peer = PeerInfo::new(desc.conn_handle(), desc.address().to_string());
            if let Err(e) = server.update_conn_params(
                desc.conn_handle(),
                interval.min,
                interval.max,
                0,
                SUPERVISION_TIMEOUT,
            ) {
                warn!("Connection parameter update rejected: {:?}", e);
            }
            if connect_events.connected(peer).is_err() {
                warn!("Connect dropped, peripheral is gone");
            }
        });

        server.on_disconnect(move |desc, reason| {
            let peer = PeerInfo::new(desc.conn_handle(), desc.address().to_string());
            let reason = match reason {
                Ok(()) => "normal".to_string(),
                Err(e) => format!("{:?}", e),
            };
            if events.disconnected(peer, reason).is_err() {
                warn!("Disconnect dropped, peripheral is gone");
            }
        });

        Ok(())
    }

    fn create_service(&mut self, service_uuid: Uuid) -> Result<(), StackError> {
        let uuid = ble_uuid(service_uuid, "create service")?;
        let service = self.device.get_server().create_service(uuid);
        self.services.push((service_uuid, service));
        Ok(())
    }

    fn create_characteristic(
        &mut self,
        service_uuid: Uuid,
        spec: &CharacteristicSpec,
        events: EventSender,
    ) -> Result<NimbleNotifier, StackError> {
        let uuid = ble_uuid(spec.uuid, "create characteristic")?;
        let service = self.service(service_uuid, "create characteristic")?;
        let characteristic = service
            .lock()
            .create_characteristic(uuid, properties(spec));

        let greeting = spec.read_greeting.clone();
        let read_events = events.clone();
        characteristic
            .lock()
            .set_value(&spec.initial_value)
            .on_read(move |value, _desc| {
                value.set_value(&greeting);
                if read_events.read().is_err() {
                    warn!("Read not reported, peripheral is gone");
                }
            })
            .on_write(move |args| {
                if events.write(args.recv_data().to_vec()).is_err() {
                    warn!("Write dropped, peripheral is gone");
                }
            });

        Ok(NimbleNotifier { characteristic })
    }

    fn add_descriptor(
        &mut self,
        characteristic_uuid: Uuid,
        descriptor: Descriptor,
    ) -> Result<(), StackError> {
        match descriptor {
            // NimBLE adds the CCCD itself for NOTIFY characteristics
            Descriptor::ClientCharacteristicConfiguration => debug!(
                "CCCD {:#06x} on {} provided by NimBLE",
                descriptor.uuid16(),
                characteristic_uuid
            ),
        }
        Ok(())
    }

    fn start_service(&mut self, service_uuid: Uuid) -> Result<(), StackError> {
        // Registered with the GATT server when advertising first starts
        self.service(service_uuid, "start service")?;
        debug!("Service {} queued for registration", service_uuid);
        Ok(())
    }

    fn advertiser(&mut self) -> Result<NimbleAdvertiser, StackError> {
        Ok(NimbleAdvertiser {
            advertising: self.device.get_advertising(),
        })
    }
}

/// NimBLE advertising handle.
pub struct NimbleAdvertiser {
    advertising: &'static Mutex<BLEAdvertising>,
}

impl Advertiser for NimbleAdvertiser {
    fn set_data(&mut self, payload: &AdvertisementPayload) -> Result<(), StackError> {
        let mut data = BLEAdvertisementData::new();
        data.name(&payload.device_name);
        for uuid in &payload.service_uuids {
            data.add_service_uuid(ble_uuid(*uuid, "set advertising data")?);
        }

        let mut advertising = self.advertising.lock();
        advertising.scan_response(payload.scan_response);
        advertising
            .set_data(&mut data)
            .map_err(stack_error("set advertising data"))
    }

    fn start(&mut self) -> Result<(), StackError> {
        self.advertising
            .lock()
            .start()
            .map_err(stack_error("start advertising"))
    }

    fn is_advertising(&self) -> bool {
        self.advertising.lock().is_advertising()
    }
}

/// Notification handle for the characteristic.
pub struct NimbleNotifier {
    characteristic: Arc<Mutex<BLECharacteristic>>,
}

impl Notifier for NimbleNotifier {
    fn notify(&mut self, value: &[u8]) -> Result<(), StackError> {
        self.characteristic.lock().set_value(value).notify();
        Ok(())
    }
}
