use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Peripherals that currently expose at least one live target service,
/// keyed by address.
///
/// The registry never talks to the transport. Callers enumerate and pass the
/// results in.
pub struct PeripheralRegistry {
    target_service: Uuid,
    devices: BTreeMap<String, String>,
}

impl PeripheralRegistry {
    pub fn new(target_service: Uuid) -> Self {
        Self {
            target_service,
            devices: BTreeMap::new(),
        }
    }

    /// Insert `address` if `service_uuid` is the target service. Returns
    /// whether the registry changed.
    pub fn add_if_matching(
        &mut self,
        address: &str,
        service_uuid: Uuid,
        display_name: &str,
    ) -> bool {
        if service_uuid != self.target_service {
            return false;
        }
        if self.devices.contains_key(address) {
            debug!("Peripheral {} already registered", address);
            return false;
        }

        info!("Registering peripheral {} ({})", address, display_name);
        self.devices
            .insert(address.to_string(), display_name.to_string());
        true
    }

    /// Remove `address` unless it still has a matching service. Returns
    /// whether the registry changed.
    pub fn remove_if_last_service(
        &mut self,
        address: &str,
        has_remaining_matching_service: bool,
    ) -> bool {
        if has_remaining_matching_service {
            return false;
        }
        let removed = self.devices.remove(address).is_some();
        if removed {
            info!("Removing peripheral {}", address);
        }
        removed
    }

    pub fn contains(&self, address: &str) -> bool {
        self.devices.contains_key(address)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Point-in-time copy of the registry, ordered by address.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.devices
            .iter()
            .map(|(address, name)| (address.clone(), name.clone()))
            .collect()
    }
}
