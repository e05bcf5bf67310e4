//! Advertising controller.
//!
//! Owns the advertised identity and discoverability hints, and starts
//! advertising. It never stops advertising itself: the stack does that when
//! a central connects, and the lifecycle handler calls [`start`] again after
//! every disconnect.
//!
//! [`start`]: AdvertisingController::start

use super::stack::{Advertiser, StackError};
use super::state::AdvertisingState;
use crate::config::{AdvertisingConfig, ConnIntervalRange, PeripheralIdentity};
use log::{debug, info};
use std::fmt;
use uuid::Uuid;

/// Data placed in the advertisement and scan response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementPayload {
    /// Device name.
    pub device_name: String,
    /// Complete list of 128-bit service UUIDs.
    pub service_uuids: Vec<Uuid>,
    /// Whether scan requests are answered.
    pub scan_response: bool,
    /// Preferred connection interval hint.
    pub preferred_interval: ConnIntervalRange,
}

impl AdvertisementPayload {
    /// Returns true if the payload advertises `service`.
    pub fn advertises(&self, service: &Uuid) -> bool {
        self.service_uuids.contains(service)
    }
}

/// Result of a successful [`AdvertisingController::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Advertising was stopped and has been started.
    Started,
    /// Advertising was already active; nothing was done.
    AlreadyAdvertising,
}

/// Controls discoverability through an [`Advertiser`] backend.
pub struct AdvertisingController<A> {
    backend: A,
    payload: Option<AdvertisementPayload>,
}

impl<A: Advertiser> AdvertisingController<A> {
    /// Wrap an advertiser backend. Call [`configure`](Self::configure) before starting.
    pub fn new(backend: A) -> Self {
        Self {
            backend,
            payload: None,
        }
    }

    /// Set the identity to advertise and the discoverability hints.
    ///
    /// The advertised service is always the identity's service, so scanners
    /// can never see a service id other than the one the characteristic lives in.
    pub fn configure(
        &mut self,
        identity: &PeripheralIdentity,
        config: &AdvertisingConfig,
    ) -> Result<(), AdvertisingError> {
        let payload = AdvertisementPayload {
            device_name: identity.device_name.clone(),
            service_uuids: vec![identity.service_uuid],
            scan_response: config.scan_response,
            preferred_interval: config.preferred_interval,
        };
        self.backend.set_data(&payload)?;
        debug!(
            "Advertising configured: name={:?} service={} scan_response={} interval={}-{} ms",
            payload.device_name,
            identity.service_uuid,
            payload.scan_response,
            payload.preferred_interval.min_ms(),
            payload.preferred_interval.max_ms()
        );
        self.payload = Some(payload);
        Ok(())
    }

    /// Start advertising.
    ///
    /// Idempotent: returns [`StartOutcome::AlreadyAdvertising`] without
    /// touching the stack if advertising is already active.
    pub fn start(&mut self) -> Result<StartOutcome, AdvertisingError> {
        if self.payload.is_none() {
            return Err(AdvertisingError::NotConfigured);
        }
        if self.backend.is_advertising() {
            debug!("Advertising already active");
            return Ok(StartOutcome::AlreadyAdvertising);
        }
        self.backend.start()?;
        info!("Advertising started");
        Ok(StartOutcome::Started)
    }

    /// Current advertising state as reported by the stack.
    pub fn state(&self) -> AdvertisingState {
        if self.backend.is_advertising() {
            AdvertisingState::Advertising
        } else {
            AdvertisingState::Stopped
        }
    }

    /// The configured payload, if any.
    pub fn payload(&self) -> Option<&AdvertisementPayload> {
        self.payload.as_ref()
    }

    /// Access the backend.
    pub fn backend(&self) -> &A {
        &self.backend
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut A {
        &mut self.backend
    }
}

/// Errors that can occur while advertising.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvertisingError {
    /// `start` was called before `configure`.
    NotConfigured,
    /// The stack refused the operation.
    Stack(StackError),
}

impl From<StackError> for AdvertisingError {
    fn from(e: StackError) -> Self {
        Self::Stack(e)
    }
}

impl fmt::Display for AdvertisingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "advertising not configured"),
            Self::Stack(e) => write!(f, "advertising stack error: {}", e),
        }
    }
}

impl std::error::Error for AdvertisingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stack(e) => Some(e),
            Self::NotConfigured => None,
        }
    }
}
