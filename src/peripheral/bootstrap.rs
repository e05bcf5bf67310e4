//! One-shot bootstrap of the GATT server and advertising.
//!
//! Runs once at power-up, in this order:
//!
//! 1. Initialize the stack with the device name
//! 2. Create the server (connect/disconnect callbacks)
//! 3. Create the service
//! 4. Create the characteristic with its initial value (read/write callbacks)
//! 5. Attach the CCCD so centrals can subscribe
//! 6. Start the service
//! 7. Configure advertising (service UUID, scan response, interval hint)
//! 8. Start advertising
//!
//! Any failure aborts the sequence; the error names the step.

use super::advertising::{AdvertisingController, AdvertisingError};
use super::characteristic::CharacteristicSpec;
use super::events::{event_queue, EventReceiver, EventSender};
use super::handler::Peripheral;
use super::stack::{RadioStack, StackError};
use crate::config::{ConfigError, PeripheralConfig};
use log::{debug, error, info};
use std::fmt;

/// Bootstrap steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapStep {
    /// Bring up the stack and set the device name.
    InitStack,
    /// Create the GATT server and hook connect/disconnect.
    CreateServer,
    /// Create the primary service.
    CreateService,
    /// Create the characteristic and hook read/write.
    CreateCharacteristic,
    /// Attach the CCCD.
    AttachDescriptor,
    /// Make the service discoverable.
    StartService,
    /// Install the advertisement payload.
    ConfigureAdvertising,
    /// Begin advertising.
    StartAdvertising,
}

impl BootstrapStep {
    /// Every step, in order.
    pub const ALL: [BootstrapStep; 8] = [
        Self::InitStack,
        Self::CreateServer,
        Self::CreateService,
        Self::CreateCharacteristic,
        Self::AttachDescriptor,
        Self::StartService,
        Self::ConfigureAdvertising,
        Self::StartAdvertising,
    ];
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitStack => "init stack",
            Self::CreateServer => "create server",
            Self::CreateService => "create service",
            Self::CreateCharacteristic => "create characteristic",
            Self::AttachDescriptor => "attach descriptor",
            Self::StartService => "start service",
            Self::ConfigureAdvertising => "configure advertising",
            Self::StartAdvertising => "start advertising",
        };
        write!(f, "{}", name)
    }
}

/// A running peripheral plus both ends of its event queue.
pub struct Bootstrapped<A, N> {
    /// The peripheral, advertising and ready for connections.
    pub peripheral: Peripheral<A, N>,
    /// Consumer side; drive it with [`Peripheral::run`] or
    /// [`Peripheral::process_pending`].
    pub events: EventReceiver,
    /// Application-side sender, for notifications.
    pub sender: EventSender,
}

/// Build the GATT server, start advertising and return the peripheral.
pub fn bootstrap<S: RadioStack>(
    stack: &mut S,
    config: &PeripheralConfig,
) -> Result<Bootstrapped<S::Advertiser, S::Notifier>, BootstrapError> {
    config.validate()?;

    let identity = &config.identity;
    let (sender, events) = event_queue();
    info!("Starting BLE peripheral {:?}", identity.device_name);

    run_step(BootstrapStep::InitStack, stack.init(identity))?;
    run_step(BootstrapStep::CreateServer, stack.create_server(sender.clone()))?;
    run_step(
        BootstrapStep::CreateService,
        stack.create_service(identity.service_uuid),
    )?;

    let spec = CharacteristicSpec::from_config(config);
    let notifier = run_step(
        BootstrapStep::CreateCharacteristic,
        stack.create_characteristic(identity.service_uuid, &spec, sender.clone()),
    )?;
    debug!("Characteristic {} ({})", spec.uuid, spec.capabilities);

    for descriptor in &spec.descriptors {
        run_step(
            BootstrapStep::AttachDescriptor,
            stack.add_descriptor(spec.uuid, *descriptor),
        )?;
    }

    run_step(
        BootstrapStep::StartService,
        stack.start_service(identity.service_uuid),
    )?;

    let backend = run_step(BootstrapStep::ConfigureAdvertising, stack.advertiser())?;
    let mut advertising = AdvertisingController::new(backend);
    advertising
        .configure(identity, &config.advertising)
        .map_err(|source| advertising_failed(BootstrapStep::ConfigureAdvertising, source))?;
    advertising
        .start()
        .map_err(|source| advertising_failed(BootstrapStep::StartAdvertising, source))?;

    info!("Characteristic defined, ready for clients to read it");

    Ok(Bootstrapped {
        peripheral: Peripheral::new(config, advertising, notifier),
        events,
        sender,
    })
}

fn run_step<T>(step: BootstrapStep, result: Result<T, StackError>) -> Result<T, BootstrapError> {
    match result {
        Ok(value) => {
            debug!("Bootstrap: {} ok", step);
            Ok(value)
        }
        Err(source) => {
            error!("Bootstrap: {} failed: {}", step, source);
            Err(BootstrapError::Stack { step, source })
        }
    }
}

fn advertising_failed(step: BootstrapStep, source: AdvertisingError) -> BootstrapError {
    error!("Bootstrap: {} failed: {}", step, source);
    BootstrapError::Advertising { step, source }
}

/// Errors that can occur during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// Configuration rejected before touching the stack.
    InvalidConfig(ConfigError),
    /// A stack operation failed.
    Stack {
        step: BootstrapStep,
        source: StackError,
    },
    /// Advertising could not be configured or started.
    Advertising {
        step: BootstrapStep,
        source: AdvertisingError,
    },
}

impl BootstrapError {
    /// The step that failed, if the stack was involved.
    pub fn step(&self) -> Option<BootstrapStep> {
        match self {
            Self::InvalidConfig(_) => None,
            Self::Stack { step, .. } | Self::Advertising { step, .. } => Some(*step),
        }
    }
}

impl From<ConfigError> for BootstrapError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfig(e)
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(e) => write!(f, "invalid configuration: {}", e),
            Self::Stack { step, source } => write!(f, "bootstrap failed at {}: {}", step, source),
            Self::Advertising { step, source } => {
                write!(f, "bootstrap failed at {}: {}", step, source)
            }
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfig(e) => Some(e),
            Self::Stack { source, .. } => Some(source),
            Self::Advertising { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CHARACTERISTIC_UUID, SERVICE_UUID};
    use crate::peripheral::characteristic::Capabilities;
    use crate::peripheral::state::{AdvertisingState, ConnectionState};
    use crate::sim::{SimulatedCentral, SimulatedStack};

    #[test]
    fn test_bootstrap_runs_steps_in_order() {
        let mut stack = SimulatedStack::new();
        bootstrap(&mut stack, &PeripheralConfig::default()).unwrap();
        assert_eq!(stack.completed_steps(), BootstrapStep::ALL.to_vec());
    }

    #[test]
    fn test_bootstrap_leaves_peripheral_discoverable() {
        let mut stack = SimulatedStack::new();
        let booted = bootstrap(&mut stack, &PeripheralConfig::default()).unwrap();

        assert_eq!(booted.peripheral.advertising_state(), AdvertisingState::Advertising);
        assert_eq!(booted.peripheral.connection_state(), ConnectionState::Disconnected);
        assert_eq!(booted.peripheral.value(), b"Initial Value");

        let central = SimulatedCentral::new(&stack, "aa:bb:cc:dd:ee:ff");
        let seen = central.scan().unwrap();
        assert_eq!(seen.device_name, "ESP32 BLE Demo");
        assert!(seen.service_uuids.contains(&SERVICE_UUID));
    }

    #[test]
    fn test_bootstrap_builds_gatt_table() {
        let mut stack = SimulatedStack::new();
        bootstrap(&mut stack, &PeripheralConfig::default()).unwrap();
        let central = SimulatedCentral::new(&stack, "aa:bb:cc:dd:ee:ff");
        central.connect().unwrap();

        let characteristic = central.discover(SERVICE_UUID).unwrap();
        assert_eq!(characteristic.uuid, CHARACTERISTIC_UUID);
        assert_eq!(characteristic.capabilities, Capabilities::READ_WRITE_NOTIFY);
        assert!(characteristic.has_cccd);
        assert_eq!(characteristic.value, b"Initial Value");
    }

    #[test]
    fn test_invalid_config_never_touches_stack() {
        let mut stack = SimulatedStack::new();
        let config = PeripheralConfig::default().with_device_name("");

        let err = bootstrap(&mut stack, &config).err().unwrap();
        assert_eq!(err, BootstrapError::InvalidConfig(ConfigError::DeviceNameEmpty));
        assert_eq!(err.step(), None);
        assert!(stack.completed_steps().is_empty());
    }

    #[test]
    fn test_failure_at_each_step_is_reported() {
        for step in BootstrapStep::ALL {
            let mut stack = SimulatedStack::new();
            stack.fail_at(step);

            let err = bootstrap(&mut stack, &PeripheralConfig::default())
                .err()
                .unwrap();
            assert_eq!(err.step(), Some(step), "{}", err);
            assert!(err.to_string().contains(&step.to_string()));
            assert!(!stack.completed_steps().contains(&step));
        }
    }

    #[test]
    fn test_failure_aborts_remaining_steps() {
        let mut stack = SimulatedStack::new();
        stack.fail_at(BootstrapStep::CreateService);

        assert!(bootstrap(&mut stack, &PeripheralConfig::default()).is_err());
        assert_eq!(
            stack.completed_steps(),
            vec![BootstrapStep::InitStack, BootstrapStep::CreateServer]
        );
        assert!(!stack.is_advertising());
    }
}
