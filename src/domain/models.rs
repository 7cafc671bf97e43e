use std::fmt;
use uuid::Uuid;

/// Opaque, connection-scoped identifier of a live GATT service instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub String);

/// Opaque identifier of a characteristic instance, scoped to one service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacteristicId(pub String);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralInfo {
    pub address: String,
    // Name reported by the peripheral, if any
    pub name: Option<String>,
}

impl PeripheralInfo {
    /// Label shown in the device list; falls back to the address.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub id: ServiceId,
    pub peripheral_address: String,
    pub uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub id: CharacteristicId,
    pub service_id: ServiceId,
    pub uuid: Uuid,
    // Last known raw value; absent until a read or notification delivers one
    pub value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdapterState {
    pub name: Option<String>,
    pub address: Option<String>,
    pub powered: bool,
}

/// Asynchronous notifications delivered by the transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    ServiceAdded(ServiceInfo),
    ServiceRemoved(ServiceInfo),
    ServiceChanged(ServiceInfo),
    CharacteristicValueChanged(CharacteristicInfo),
    AdapterStateChanged(Option<AdapterState>),
}

/// Intents emitted by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    Select(Option<String>),
    Shutdown,
}
