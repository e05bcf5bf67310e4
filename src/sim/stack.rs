//! Simulated radio stack.

use crate::peripheral::{
    AdvertisementPayload, Advertiser, BootstrapStep, Capabilities, CharacteristicSpec, Descriptor,
    EventSender, Notifier, PeerInfo, RadioStack, StackError,
};
use crate::config::PeripheralIdentity;
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// A characteristic as registered in the simulated GATT table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCharacteristic {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// GATT properties fixed at creation.
    pub capabilities: Capabilities,
    /// Stack-side attribute value.
    pub value: Vec<u8>,
    /// Served by the read callback before the peripheral hears of the read.
    pub read_greeting: Vec<u8>,
    /// Whether the CCCD (0x2902) is attached.
    pub has_cccd: bool,
}

#[derive(Debug)]
pub(super) struct SimService {
    pub uuid: Uuid,
    pub started: bool,
    pub characteristic: Option<SimCharacteristic>,
}

/// Everything the simulated controller knows. Shared with [`super::SimulatedCentral`].
#[derive(Debug, Default)]
pub(super) struct SimState {
    pub device_name: Option<String>,
    pub server_events: Option<EventSender>,
    pub characteristic_events: Option<EventSender>,
    pub services: Vec<SimService>,
    pub advertising: bool,
    pub advertisement: Option<AdvertisementPayload>,
    pub advertising_start_calls: usize,
    pub fail_advertising_start: bool,
    pub fail_at: Option<BootstrapStep>,
    pub completed: Vec<BootstrapStep>,
    pub connected: Option<PeerInfo>,
    pub subscribed: bool,
    pub notifications: Vec<Vec<u8>>,
    pub next_conn_handle: u16,
}

impl SimState {
    fn check(&self, step: BootstrapStep, operation: &'static str) -> Result<(), StackError> {
        if self.fail_at == Some(step) {
            warn!("Simulated fault injected at {}", step);
            return Err(StackError::new(operation, "injected fault"));
        }
        Ok(())
    }

    fn complete(&mut self, step: BootstrapStep) {
        if !self.completed.contains(&step) {
            self.completed.push(step);
        }
    }

    pub fn service_mut(&mut self, uuid: Uuid) -> Option<&mut SimService> {
        self.services.iter_mut().find(|s| s.uuid == uuid)
    }

    pub fn characteristic_mut(&mut self) -> Option<&mut SimCharacteristic> {
        self.services
            .iter_mut()
            .find_map(|s| s.characteristic.as_mut())
    }
}

pub(super) fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Simulated stack mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// In-process BLE controller.
///
/// Behaves like NimBLE where it matters to the peripheral: advertising stops
/// by itself when a central connects, and callbacks are delivered through the
/// event queue handed over at bootstrap.
#[derive(Debug, Clone, Default)]
pub struct SimulatedStack {
    pub(super) state: Arc<Mutex<SimState>>,
}

impl SimulatedStack {
    /// Create an idle stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the stack operation behind `step` fail.
    pub fn fail_at(&self, step: BootstrapStep) {
        lock(&self.state).fail_at = Some(step);
    }

    /// Make every advertising start fail until cleared.
    pub fn fail_advertising_start(&self, fail: bool) {
        lock(&self.state).fail_advertising_start = fail;
    }

    /// Bootstrap steps the stack has completed, in order.
    pub fn completed_steps(&self) -> Vec<BootstrapStep> {
        lock(&self.state).completed.clone()
    }

    /// Whether the controller is advertising.
    pub fn is_advertising(&self) -> bool {
        lock(&self.state).advertising
    }

    /// How many times advertising start was requested.
    pub fn advertising_start_calls(&self) -> usize {
        lock(&self.state).advertising_start_calls
    }

    /// The installed advertisement, if any.
    pub fn advertisement(&self) -> Option<AdvertisementPayload> {
        lock(&self.state).advertisement.clone()
    }

    /// The registered device name.
    pub fn device_name(&self) -> Option<String> {
        lock(&self.state).device_name.clone()
    }
}

impl RadioStack for SimulatedStack {
    type Advertiser = SimAdvertiser;
    type Notifier = SimNotifier;

    fn init(&mut self, identity: &PeripheralIdentity) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        state.check(BootstrapStep::InitStack, "init")?;
        state.device_name = Some(identity.device_name.clone());
        state.complete(BootstrapStep::InitStack);
        Ok(())
    }

    fn create_server(&mut self, events: EventSender) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        state.check(BootstrapStep::CreateServer, "create server")?;
        if state.device_name.is_none() {
            return Err(StackError::new("create server", "stack not initialized"));
        }
        state.server_events = Some(events);
        state.complete(BootstrapStep::CreateServer);
        Ok(())
    }

    fn create_service(&mut self, service_uuid: Uuid) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        state.check(BootstrapStep::CreateService, "create service")?;
        if state.server_events.is_none() {
            return Err(StackError::new("create service", "no server"));
        }
        state.services.push(SimService {
            uuid: service_uuid,
            started: false,
            characteristic: None,
        });
        state.complete(BootstrapStep::CreateService);
        Ok(())
    }

    fn create_characteristic(
        &mut self,
        service_uuid: Uuid,
        spec: &CharacteristicSpec,
        events: EventSender,
    ) -> Result<SimNotifier, StackError> {
        let mut state = lock(&self.state);
        state.check(BootstrapStep::CreateCharacteristic, "create characteristic")?;
        let service = state
            .service_mut(service_uuid)
            .ok_or_else(|| StackError::new("create characteristic", "unknown service"))?;
        service.characteristic = Some(SimCharacteristic {
            uuid: spec.uuid,
            capabilities: spec.capabilities,
            value: spec.initial_value.clone(),
            read_greeting: spec.read_greeting.clone(),
            has_cccd: false,
        });
        state.characteristic_events = Some(events);
        state.complete(BootstrapStep::CreateCharacteristic);
        Ok(SimNotifier {
            state: self.state.clone(),
        })
    }

    fn add_descriptor(
        &mut self,
        characteristic_uuid: Uuid,
        descriptor: Descriptor,
    ) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        state.check(BootstrapStep::AttachDescriptor, "add descriptor")?;
        let characteristic = state
            .characteristic_mut()
            .filter(|c| c.uuid == characteristic_uuid)
            .ok_or_else(|| StackError::new("add descriptor", "unknown characteristic"))?;
        match descriptor {
            Descriptor::ClientCharacteristicConfiguration => characteristic.has_cccd = true,
        }
        debug!("Descriptor {:#06x} attached", descriptor.uuid16());
        state.complete(BootstrapStep::AttachDescriptor);
        Ok(())
    }

    fn start_service(&mut self, service_uuid: Uuid) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        state.check(BootstrapStep::StartService, "start service")?;
        let service = state
            .service_mut(service_uuid)
            .ok_or_else(|| StackError::new("start service", "unknown service"))?;
        service.started = true;
        state.complete(BootstrapStep::StartService);
        Ok(())
    }

    fn advertiser(&mut self) -> Result<SimAdvertiser, StackError> {
        lock(&self.state).check(BootstrapStep::ConfigureAdvertising, "get advertising")?;
        Ok(SimAdvertiser {
            state: self.state.clone(),
        })
    }
}

/// Advertising handle of a [`SimulatedStack`].
#[derive(Debug)]
pub struct SimAdvertiser {
    state: Arc<Mutex<SimState>>,
}

impl Advertiser for SimAdvertiser {
    fn set_data(&mut self, payload: &AdvertisementPayload) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        state.check(BootstrapStep::ConfigureAdvertising, "set advertising data")?;
        state.advertisement = Some(payload.clone());
        state.complete(BootstrapStep::ConfigureAdvertising);
        Ok(())
    }

    fn start(&mut self) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        state.advertising_start_calls += 1;
        state.check(BootstrapStep::StartAdvertising, "start advertising")?;
        if state.fail_advertising_start {
            return Err(StackError::new("start advertising", "controller busy"));
        }
        state.advertising = true;
        state.complete(BootstrapStep::StartAdvertising);
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        lock(&self.state).advertising
    }
}

/// Notification handle of a [`SimulatedStack`].
#[derive(Debug)]
pub struct SimNotifier {
    state: Arc<Mutex<SimState>>,
}

impl Notifier for SimNotifier {
    fn notify(&mut self, value: &[u8]) -> Result<(), StackError> {
        let mut state = lock(&self.state);
        let characteristic = state
            .characteristic_mut()
            .ok_or_else(|| StackError::new("notify", "no characteristic"))?;
        characteristic.value = value.to_vec();
        if state.connected.is_some() && state.subscribed {
            state.notifications.push(value.to_vec());
        }
        Ok(())
    }
}
