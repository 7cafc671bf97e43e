use crate::domain::battery::BatteryLevel;
use crate::domain::commands::{SelectionToken, TransportRequest};
use crate::domain::models::{CharacteristicId, CharacteristicInfo, ServiceId, ServiceInfo};
use crate::error::TransportError;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionState {
    Unselected,
    AwaitingCharacteristics {
        service: ServiceInfo,
    },
    AwaitingSubscription {
        service: ServiceInfo,
        characteristic: CharacteristicInfo,
    },
    AwaitingInitialRead {
        service: ServiceInfo,
        characteristic: CharacteristicInfo,
    },
    Active {
        service: ServiceInfo,
        characteristic: CharacteristicInfo,
    },
}

impl SelectionState {
    pub fn service(&self) -> Option<&ServiceInfo> {
        match self {
            SelectionState::Unselected => None,
            SelectionState::AwaitingCharacteristics { service }
            | SelectionState::AwaitingSubscription { service, .. }
            | SelectionState::AwaitingInitialRead { service, .. }
            | SelectionState::Active { service, .. } => Some(service),
        }
    }

    pub fn characteristic(&self) -> Option<&CharacteristicInfo> {
        match self {
            SelectionState::Unselected | SelectionState::AwaitingCharacteristics { .. } => None,
            SelectionState::AwaitingSubscription { characteristic, .. }
            | SelectionState::AwaitingInitialRead { characteristic, .. }
            | SelectionState::Active { characteristic, .. } => Some(characteristic),
        }
    }
}

/// Owns the selected service and the subscribed Battery Level
/// characteristic.
///
/// Each `select()` mints a new [`SelectionToken`]. Completions carrying an
/// older token, or naming a characteristic other than the tracked one, are
/// dropped, so the displayed level always belongs to the current selection.
pub struct SelectionController {
    target_characteristic: Uuid,
    state: SelectionState,
    token: SelectionToken,
    // Characteristic we asked to notify; always belongs to the selected service
    subscribed: Option<CharacteristicId>,
    level: Option<BatteryLevel>,
}

impl SelectionController {
    pub fn new(target_characteristic: Uuid) -> Self {
        Self {
            target_characteristic,
            state: SelectionState::Unselected,
            token: SelectionToken::default(),
            subscribed: None,
            level: None,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn token(&self) -> SelectionToken {
        self.token
    }

    pub fn selected_service(&self) -> Option<&ServiceInfo> {
        self.state.service()
    }

    pub fn subscribed(&self) -> Option<&CharacteristicId> {
        self.subscribed.as_ref()
    }

    /// Last successfully decoded level of the selected characteristic.
    pub fn level(&self) -> Option<BatteryLevel> {
        self.level
    }

    pub fn is_selected(&self, service: &ServiceId) -> bool {
        self.selected_service().map(|s| &s.id) == Some(service)
    }

    fn is_tracked(&self, characteristic: &CharacteristicId) -> bool {
        self.state.characteristic().map(|c| &c.id) == Some(characteristic)
    }

    /// Replace the selection. Any prior subscription is torn down
    /// fire-and-forget and the displayed level is cleared.
    pub fn select(&mut self, service: Option<ServiceInfo>) -> Vec<TransportRequest> {
        let mut requests = Vec::new();

        if let Some(characteristic) = self.subscribed.take() {
            debug!("Stopping Battery Level notifications on {}", characteristic);
            requests.push(TransportRequest::StopNotifications { characteristic });
        }

        self.token = self.token.next();
        self.level = None;

        match service {
            None => {
                info!("No service selected");
                self.state = SelectionState::Unselected;
            }
            Some(service) => {
                info!("GATT service selected: {}", service.id);
                requests.push(TransportRequest::GetCharacteristics {
                    service: service.id.clone(),
                    token: self.token,
                });
                self.state = SelectionState::AwaitingCharacteristics { service };
            }
        }

        requests
    }

    pub fn on_characteristics(
        &mut self,
        service: &ServiceId,
        token: SelectionToken,
        result: Result<Vec<CharacteristicInfo>, TransportError>,
    ) -> Vec<TransportRequest> {
        if token != self.token || !self.is_selected(service) {
            debug!("Dropping stale characteristics for service {}", service);
            return Vec::new();
        }

        let characteristics = match result {
            Ok(characteristics) => characteristics,
            Err(e) => {
                warn!("Failed to get characteristics of {}: {}", service, e);
                return Vec::new();
            }
        };

        if characteristics.is_empty() {
            info!("Service has no characteristics: {}", service);
            return Vec::new();
        }

        let mut found: Option<CharacteristicInfo> = None;
        for characteristic in characteristics {
            if characteristic.uuid != self.target_characteristic {
                info!(
                    "Found unexpected characteristic: {} with UUID: {}",
                    characteristic.id, characteristic.uuid
                );
                continue;
            }
            if found.is_some() {
                info!(
                    "Ignoring additional Battery Level characteristic: {}",
                    characteristic.id
                );
                continue;
            }
            found = Some(characteristic);
        }

        let Some(characteristic) = found else {
            info!("Service {} has no Battery Level characteristic", service);
            return Vec::new();
        };

        let Some(selected) = self.state.service().cloned() else {
            return Vec::new();
        };

        info!("Setting Battery Level characteristic: {}", characteristic.id);
        self.subscribed = Some(characteristic.id.clone());
        let requests = vec![
            TransportRequest::StartNotifications {
                characteristic: characteristic.id.clone(),
                token: self.token,
            },
            TransportRequest::ReadValue {
                characteristic: characteristic.id.clone(),
                token: self.token,
            },
        ];
        self.state = SelectionState::AwaitingSubscription {
            service: selected,
            characteristic,
        };
        requests
    }

    pub fn on_notifications_started(
        &mut self,
        characteristic: &CharacteristicId,
        token: SelectionToken,
        result: Result<(), TransportError>,
    ) {
        if token != self.token || !self.is_tracked(characteristic) {
            debug!("Dropping stale subscribe result for {}", characteristic);
            return;
        }

        match result {
            Ok(()) | Err(TransportError::AlreadyNotifying) => {
                info!("Battery Level notifications enabled on {}", characteristic);
            }
            Err(e) => {
                warn!("Failed to enable Battery Level notifications: {}", e);
                self.subscribed = None;
            }
        }

        // The read was issued alongside the subscribe and proceeds either way.
        if let SelectionState::AwaitingSubscription { .. } = self.state {
            let state = std::mem::replace(&mut self.state, SelectionState::Unselected);
            if let SelectionState::AwaitingSubscription {
                service,
                characteristic,
            } = state
            {
                self.state = SelectionState::AwaitingInitialRead {
                    service,
                    characteristic,
                };
            }
        }
    }

    pub fn on_notifications_stopped(
        &mut self,
        characteristic: &CharacteristicId,
        result: Result<(), TransportError>,
    ) {
        match result {
            Ok(()) => debug!("Battery Level notifications stopped on {}", characteristic),
            Err(e) => warn!("Failed to stop notifications on {}: {}", characteristic, e),
        }
    }

    /// Returns whether the displayed level changed.
    pub fn on_value_read(
        &mut self,
        characteristic: &CharacteristicId,
        token: SelectionToken,
        result: Result<CharacteristicInfo, TransportError>,
    ) -> bool {
        if token != self.token || !self.is_tracked(characteristic) {
            debug!("Dropping stale read of {}", characteristic);
            return false;
        }

        match result {
            Ok(read) if read.id == *characteristic => {
                debug!("Request to read battery level complete");
                self.store(read)
            }
            Ok(read) => {
                debug!("Dropping read answered for {}", read.id);
                false
            }
            Err(e) => {
                warn!("Failed to read Battery Level: {}", e);
                false
            }
        }
    }

    /// Steady-state path: notifications keep the value current. Returns
    /// whether the displayed level changed.
    pub fn on_value_changed(&mut self, characteristic: CharacteristicInfo) -> bool {
        if !self.is_tracked(&characteristic.id) {
            debug!("Ignoring value change of untracked {}", characteristic.id);
            return false;
        }
        debug!("Battery Level value changed");
        self.store(characteristic)
    }

    fn store(&mut self, characteristic: CharacteristicInfo) -> bool {
        let previous = self.level;
        match characteristic.value.as_deref() {
            None => debug!("No Battery Level value received yet"),
            Some(bytes) => match BatteryLevel::from_bytes(bytes) {
                Ok(level) => self.level = Some(level),
                Err(e) => warn!("{}", e),
            },
        }

        let Some(service) = self.state.service().cloned() else {
            return false;
        };
        self.state = SelectionState::Active {
            service,
            characteristic,
        };
        self.level != previous
    }
}
