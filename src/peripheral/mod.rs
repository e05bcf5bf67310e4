//! BLE peripheral core.
//!
//! Platform-independent model of a single-connection GATT peripheral with one
//! service holding one read/write/notify characteristic.
//!
//! # Architecture
//!
//! ```text
//!  radio stack callbacks               application
//!  (connect, disconnect,               (notify)
//!   read, write)                          │
//!        │                                │
//!        └────────► EventSender ◄─────────┘
//!                        │
//!                        ▼ (arrival order)
//!                   EventReceiver
//!                        │
//!                        ▼
//!                    Peripheral ──► ConnectionLifecycle ──► AdvertisingController
//!                        │                                        │
//!                        └──► CharacteristicHandler ──► ValueStore │
//!                        │                                        ▼
//!                        └──► Notifier                       Advertiser
//! ```
//!
//! # Components
//!
//! - [`bootstrap()`] - one-shot GATT/advertising setup against a [`RadioStack`]
//! - [`Peripheral`] - single consumer of the event queue
//! - [`ConnectionLifecycle`] - connection state, restarts advertising on disconnect
//! - [`AdvertisingController`] - idempotent advertising start
//! - [`CharacteristicHandler`] - read/write contract over the [`ValueStore`]

mod advertising;
mod bootstrap;
mod characteristic;
mod events;
mod handler;
mod lifecycle;
mod stack;
mod state;
mod value;

pub use advertising::{AdvertisementPayload, AdvertisingController, AdvertisingError, StartOutcome};
pub use bootstrap::{bootstrap, BootstrapError, BootstrapStep, Bootstrapped};
pub use characteristic::{
    Capabilities, CharacteristicHandler, CharacteristicSpec, Descriptor, WriteOutcome,
};
pub use events::{event_queue, EventReceiver, EventSender, PeripheralEvent, QueueClosed};
pub use handler::{NotifyError, NotifyOutcome, Peripheral, PeripheralCallbacks};
pub use lifecycle::ConnectionLifecycle;
pub use stack::{Advertiser, Notifier, RadioStack, StackError};
pub use state::{AdvertisingState, ConnectionState, PeerInfo};
pub use value::{format_value, ValueStore};
