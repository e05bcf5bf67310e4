//! Property-based tests for the peripheral lifecycle and characteristic contract
//!
//! Random sequences of central actions are applied to a bootstrapped
//! peripheral on the simulated stack and checked against a small model.

use ble_demo_esp32::config::{PeripheralConfig, INITIAL_VALUE, READ_GREETING};
use ble_demo_esp32::peripheral::{
    bootstrap, AdvertisingState, ConnectionState, EventReceiver, EventSender, Peripheral,
};
use ble_demo_esp32::sim::{SimAdvertiser, SimNotifier, SimulatedCentral, SimulatedStack};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Action {
    Connect,
    Disconnect,
    Read,
    Write(Vec<u8>),
    Notify(Vec<u8>),
    FailAdvertising(bool),
}

fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => Just(Action::Connect),
        3 => Just(Action::Disconnect),
        2 => Just(Action::Read),
        3 => arb_payload().prop_map(Action::Write),
        1 => arb_payload().prop_map(Action::Notify),
    ]
}

fn arb_action_with_faults() -> impl Strategy<Value = Action> {
    prop_oneof![
        10 => arb_action(),
        1 => any::<bool>().prop_map(Action::FailAdvertising),
    ]
}

struct Rig {
    stack: SimulatedStack,
    central: SimulatedCentral,
    peripheral: Peripheral<SimAdvertiser, SimNotifier>,
    events: EventReceiver,
    app: EventSender,
}

impl Rig {
    fn new() -> Self {
        let mut stack = SimulatedStack::new();
        let booted = bootstrap(&mut stack, &PeripheralConfig::default()).expect("bootstrap");
        let central = SimulatedCentral::new(&stack, "11:22:33:44:55:66");
        Self {
            stack,
            central,
            peripheral: booted.peripheral,
            events: booted.events,
            app: booted.sender,
        }
    }

    fn pump(&mut self) {
        self.peripheral.process_pending(&mut self.events);
    }
}

/// What the peripheral should look like after each action.
#[derive(Debug)]
struct Model {
    connected: bool,
    advertising: bool,
    value: Vec<u8>,
    fail_advertising: bool,
}

impl Model {
    fn new() -> Self {
        Self {
            connected: false,
            advertising: true,
            value: INITIAL_VALUE.to_vec(),
            fail_advertising: false,
        }
    }
}

/// Apply `action` to both rig and model. Returns the value served by a read.
fn apply(rig: &mut Rig, model: &mut Model, action: &Action) -> Option<Vec<u8>> {
    let mut served = None;
    match action {
        Action::Connect => {
            let accepted = rig.central.connect().is_ok();
            assert_eq!(accepted, !model.connected && model.advertising);
            if accepted {
                model.connected = true;
                model.advertising = false;
            }
        }
        Action::Disconnect => {
            let accepted = rig.central.disconnect().is_ok();
            assert_eq!(accepted, model.connected);
            if accepted {
                model.connected = false;
                model.advertising = !model.fail_advertising;
            }
        }
        Action::Read => {
            if let Ok(value) = rig.central.read() {
                served = Some(value);
                model.value = READ_GREETING.to_vec();
            }
        }
        Action::Write(data) => {
            if rig.central.write(data).is_ok() && !data.is_empty() {
                model.value = data.clone();
            }
        }
        Action::Notify(data) => {
            rig.app.notify(data.clone()).expect("queue open");
            model.value = data.clone();
        }
        Action::FailAdvertising(fail) => {
            rig.stack.fail_advertising_start(*fail);
            model.fail_advertising = *fail;
        }
    }
    rig.pump();
    served
}

fn check(rig: &Rig, model: &Model) -> Result<(), TestCaseError> {
    let expected_connection = if model.connected {
        ConnectionState::Connected
    } else {
        ConnectionState::Disconnected
    };
    let expected_advertising = if model.advertising {
        AdvertisingState::Advertising
    } else {
        AdvertisingState::Stopped
    };
    prop_assert_eq!(rig.peripheral.connection_state(), expected_connection);
    prop_assert_eq!(rig.peripheral.advertising_state(), expected_advertising);
    prop_assert_eq!(rig.peripheral.value(), model.value.as_slice());
    Ok(())
}

proptest! {
    /// Property: Without stack faults, a disconnected peripheral is always discoverable
    #[test]
    fn disconnected_implies_advertising(actions in prop::collection::vec(arb_action(), 0..60)) {
        let mut rig = Rig::new();
        let mut model = Model::new();

        for action in &actions {
            apply(&mut rig, &mut model, action);
            if rig.peripheral.connection_state() == ConnectionState::Disconnected {
                prop_assert_eq!(rig.peripheral.advertising_state(), AdvertisingState::Advertising);
                prop_assert!(rig.central.scan().is_some());
            }
        }
    }

    /// Property: Connection, advertising and value always match the model
    #[test]
    fn state_matches_model(actions in prop::collection::vec(arb_action_with_faults(), 0..60)) {
        let mut rig = Rig::new();
        let mut model = Model::new();

        for action in &actions {
            apply(&mut rig, &mut model, action);
            check(&rig, &model)?;
        }
    }

    /// Property: Every read serves the greeting, whatever was written before
    #[test]
    fn reads_always_serve_greeting(writes in prop::collection::vec(arb_payload(), 0..10)) {
        let mut rig = Rig::new();
        let mut model = Model::new();
        apply(&mut rig, &mut model, &Action::Connect);

        for data in writes {
            apply(&mut rig, &mut model, &Action::Write(data));
        }
        let first = apply(&mut rig, &mut model, &Action::Read);
        let second = apply(&mut rig, &mut model, &Action::Read);

        prop_assert_eq!(first.as_deref(), Some(READ_GREETING));
        prop_assert_eq!(first, second);
    }

    /// Property: Every disconnect either restarted advertising or was counted as a failure
    #[test]
    fn every_disconnect_requests_restart(actions in prop::collection::vec(arb_action_with_faults(), 0..60)) {
        let mut rig = Rig::new();
        let mut model = Model::new();

        for action in &actions {
            apply(&mut rig, &mut model, action);
        }

        let counters = rig.peripheral.counters();
        prop_assert_eq!(
            counters.disconnections,
            counters.advertising_restarts + counters.advertising_failures
        );
        prop_assert!(counters.connections >= counters.disconnections);
    }
}
