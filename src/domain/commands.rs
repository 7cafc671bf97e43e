//! Requests the tracker asks the transport to perform, and the completions
//! that come back.
//!
//! Every request carries the identity it was issued under (selection token,
//! intent token or per-address generation) and its completion echoes it, so
//! the tracker can drop results that were superseded while in flight.

use crate::domain::models::{
    AdapterState, CharacteristicId, CharacteristicInfo, PeripheralInfo, ServiceId, ServiceInfo,
};
use crate::error::TransportError;
use uuid::Uuid;

/// Minted by every `select()`; the latest one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SelectionToken(pub u64);

impl SelectionToken {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Minted by every user selection intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IntentToken(pub u64);

impl IntentToken {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Why a peripheral's services are being enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServicesPurpose {
    /// Initial population of the registry.
    Startup { display_name: String, generation: u64 },
    /// Deferred removal check after a target service disappeared.
    Removal { generation: u64 },
    /// The user picked this peripheral.
    UserSelection { intent: IntentToken },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportRequest {
    GetAdapterState,
    ListPeripherals,
    ListServices {
        address: String,
        purpose: ServicesPurpose,
    },
    GetPeripheral {
        address: String,
        service_uuid: Uuid,
        generation: u64,
    },
    GetCharacteristics {
        service: ServiceId,
        token: SelectionToken,
    },
    StartNotifications {
        characteristic: CharacteristicId,
        token: SelectionToken,
    },
    StopNotifications {
        characteristic: CharacteristicId,
    },
    ReadValue {
        characteristic: CharacteristicId,
        token: SelectionToken,
    },
}

impl TransportRequest {
    /// Short operation name used in logs and timeout errors.
    pub fn operation(&self) -> &'static str {
        match self {
            TransportRequest::GetAdapterState => "adapter_state",
            TransportRequest::ListPeripherals => "devices",
            TransportRequest::ListServices { .. } => "services",
            TransportRequest::GetPeripheral { .. } => "device",
            TransportRequest::GetCharacteristics { .. } => "characteristics",
            TransportRequest::StartNotifications { .. } => "start_notifications",
            TransportRequest::StopNotifications { .. } => "stop_notifications",
            TransportRequest::ReadValue { .. } => "read_characteristic_value",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Completion {
    AdapterState(Result<Option<AdapterState>, TransportError>),
    Peripherals(Result<Vec<PeripheralInfo>, TransportError>),
    Services {
        address: String,
        purpose: ServicesPurpose,
        result: Result<Vec<ServiceInfo>, TransportError>,
    },
    Peripheral {
        address: String,
        service_uuid: Uuid,
        generation: u64,
        result: Result<PeripheralInfo, TransportError>,
    },
    Characteristics {
        service: ServiceId,
        token: SelectionToken,
        result: Result<Vec<CharacteristicInfo>, TransportError>,
    },
    NotificationsStarted {
        characteristic: CharacteristicId,
        token: SelectionToken,
        result: Result<(), TransportError>,
    },
    NotificationsStopped {
        characteristic: CharacteristicId,
        result: Result<(), TransportError>,
    },
    ValueRead {
        characteristic: CharacteristicId,
        token: SelectionToken,
        result: Result<CharacteristicInfo, TransportError>,
    },
}
