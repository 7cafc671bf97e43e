//! Battery Service Protocol Module
//!
//! GATT UUIDs of the Battery Service and instance identifier helpers for
//! transports that do not hand out their own.

use crate::domain::models::{CharacteristicId, ServiceId};
use crate::error::TransportError;
use anyhow::Result;
use uuid::Uuid;

/// Battery Service UUID
pub const BATTERY_SERVICE_UUID: &str = "0000180f-0000-1000-8000-00805f9b34fb";

/// Battery Level characteristic UUID (single byte, percent)
pub const BATTERY_LEVEL_CHAR_UUID: &str = "00002a19-0000-1000-8000-00805f9b34fb";

/// Bluetooth Base UUID, into which 16-bit assigned numbers are placed
const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

const ID_SEPARATOR: char = '/';

pub fn battery_service() -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | (0x180f_u128 << 96))
}

pub fn battery_level() -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | (0x2a19_u128 << 96))
}

/// Parse a UUID string. Accepts the full 128-bit form (with or without
/// dashes) and 16-bit assigned numbers such as `180f`.
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid> {
    let trimmed = uuid_str.trim().trim_start_matches("0x");

    if trimmed.len() == 4 {
        let short = u16::from_str_radix(trimmed, 16)?;
        return Ok(Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96)));
    }

    Uuid::parse_str(trimmed).map_err(|e| anyhow::anyhow!("Invalid UUID format '{}': {}", uuid_str, e))
}

/// `<address>/<service uuid>`
pub fn service_id(address: &str, service_uuid: Uuid) -> ServiceId {
    ServiceId(format!("{}{}{}", address, ID_SEPARATOR, service_uuid))
}

/// `<address>/<service uuid>/<characteristic uuid>`
pub fn characteristic_id(service: &ServiceId, characteristic_uuid: Uuid) -> CharacteristicId {
    CharacteristicId(format!("{}{}{}", service.0, ID_SEPARATOR, characteristic_uuid))
}

pub fn parse_service_id(id: &ServiceId) -> Result<(String, Uuid), TransportError> {
    let invalid = || TransportError::InvalidIdentifier(id.0.clone());
    let (address, uuid) = id.0.rsplit_once(ID_SEPARATOR).ok_or_else(invalid)?;
    let uuid = Uuid::parse_str(uuid).map_err(|_| invalid())?;
    if address.is_empty() {
        return Err(invalid());
    }
    Ok((address.to_string(), uuid))
}

/// Split a characteristic id into address, service UUID and characteristic
/// UUID.
pub fn parse_characteristic_id(
    id: &CharacteristicId,
) -> Result<(String, Uuid, Uuid), TransportError> {
    let invalid = || TransportError::InvalidIdentifier(id.0.clone());
    let (service, uuid) = id.0.rsplit_once(ID_SEPARATOR).ok_or_else(invalid)?;
    let characteristic_uuid = Uuid::parse_str(uuid).map_err(|_| invalid())?;
    let (address, service_uuid) =
        parse_service_id(&ServiceId(service.to_string())).map_err(|_| invalid())?;
    Ok((address, service_uuid, characteristic_uuid))
}
