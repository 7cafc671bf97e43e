use crate::domain::battery::BatteryLevel;
use crate::domain::commands::{Completion, IntentToken, ServicesPurpose, TransportRequest};
use crate::domain::models::{AdapterState, PeripheralInfo, ServiceInfo, TransportEvent};
use crate::domain::registry::PeripheralRegistry;
use crate::domain::selection::SelectionController;
use crate::error::TransportError;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Target service and characteristic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
}

/// What the view renders. Always a copy, never the live structures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewSnapshot {
    pub devices: Vec<(String, String)>,
    pub selected: Option<String>,
    pub level: Option<BatteryLevel>,
    pub adapter: Option<AdapterState>,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Startup {
    NotStarted,
    Listing,
    Enumerating(HashSet<String>),
    Done,
}

/// Reconciles transport events and completions into the registry and the
/// selection.
///
/// Sans-IO: every entry point mutates state and returns the transport work
/// it needs done. The caller executes it and feeds the completions back.
pub struct BatteryTracker {
    config: TrackerConfig,
    registry: PeripheralRegistry,
    selection: SelectionController,
    adapter: Option<AdapterState>,
    // Latest generation per address, bumped on every add/remove event.
    // Values come from one counter so a forgotten address never reuses one.
    generations: HashMap<String, u64>,
    next_generation: u64,
    intent: IntentToken,
    startup: Startup,
}

impl BatteryTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            registry: PeripheralRegistry::new(config.service_uuid),
            selection: SelectionController::new(config.characteristic_uuid),
            adapter: None,
            generations: HashMap::new(),
            next_generation: 0,
            intent: IntentToken::default(),
            startup: Startup::NotStarted,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn registry(&self) -> &PeripheralRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn is_ready(&self) -> bool {
        self.startup == Startup::Done
    }

    /// Query the adapter and enumerate every known peripheral.
    pub fn start(&mut self) -> Vec<TransportRequest> {
        let mut requests = self.selection.select(None);
        requests.push(TransportRequest::GetAdapterState);
        requests.push(TransportRequest::ListPeripherals);
        self.startup = Startup::Listing;
        requests
    }

    /// Deselect (unsubscribing) and forget every peripheral.
    pub fn shutdown(&mut self) -> Vec<TransportRequest> {
        info!("Shutting down battery tracker");
        self.intent = self.intent.next();
        let requests = self.selection.select(None);
        self.registry.clear();
        self.generations.clear();
        requests
    }

    /// The view asked to show `address`, or nothing.
    pub fn user_select(&mut self, address: Option<String>) -> Vec<TransportRequest> {
        self.intent = self.intent.next();
        match address {
            None => self.selection.select(None),
            Some(address) => {
                debug!("User selected {}", address);
                vec![TransportRequest::ListServices {
                    address,
                    purpose: ServicesPurpose::UserSelection {
                        intent: self.intent,
                    },
                }]
            }
        }
    }

    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<TransportRequest> {
        match event {
            TransportEvent::ServiceAdded(service) => self.on_service_added(service),
            TransportEvent::ServiceRemoved(service) => self.on_service_removed(service),
            TransportEvent::ServiceChanged(service) => {
                if !self.selection.is_selected(&service.id) {
                    return Vec::new();
                }
                info!("The selected service has changed");
                self.selection.select(Some(service))
            }
            TransportEvent::CharacteristicValueChanged(characteristic) => {
                self.selection.on_value_changed(characteristic);
                Vec::new()
            }
            TransportEvent::AdapterStateChanged(state) => {
                info!("Adapter state changed: {:?}", state);
                self.adapter = state;
                Vec::new()
            }
        }
    }

    pub fn handle_completion(&mut self, completion: Completion) -> Vec<TransportRequest> {
        match completion {
            Completion::AdapterState(result) => {
                self.adapter = result.unwrap_or_else(|e| {
                    warn!("Failed to get adapter state: {}", e);
                    None
                });
                Vec::new()
            }
            Completion::Peripherals(result) => self.on_peripherals(result),
            Completion::Services {
                address,
                purpose,
                result,
            } => self.on_services(address, purpose, result),
            Completion::Peripheral {
                address,
                service_uuid,
                generation,
                result,
            } => {
                if !self.is_current(&address, generation) {
                    debug!("Dropping stale device lookup for {}", address);
                    return Vec::new();
                }
                match result {
                    Ok(peripheral) => {
                        self.registry
                            .add_if_matching(&address, service_uuid, peripheral.display_name());
                    }
                    Err(e) => warn!("Failed to get device {}: {}", address, e),
                }
                Vec::new()
            }
            Completion::Characteristics {
                service,
                token,
                result,
            } => self.selection.on_characteristics(&service, token, result),
            Completion::NotificationsStarted {
                characteristic,
                token,
                result,
            } => {
                self.selection
                    .on_notifications_started(&characteristic, token, result);
                Vec::new()
            }
            Completion::NotificationsStopped {
                characteristic,
                result,
            } => {
                self.selection
                    .on_notifications_stopped(&characteristic, result);
                Vec::new()
            }
            Completion::ValueRead {
                characteristic,
                token,
                result,
            } => {
                self.selection.on_value_read(&characteristic, token, result);
                Vec::new()
            }
        }
    }

    pub fn view(&self) -> ViewSnapshot {
        ViewSnapshot {
            devices: self.registry.snapshot(),
            selected: self
                .selection
                .selected_service()
                .map(|s| s.peripheral_address.clone()),
            level: self.selection.level(),
            adapter: self.adapter.clone(),
            ready: self.is_ready(),
        }
    }

    fn generation(&self, address: &str) -> u64 {
        self.generations.get(address).copied().unwrap_or(0)
    }

    fn bump_generation(&mut self, address: &str) -> u64 {
        self.next_generation += 1;
        self.generations
            .insert(address.to_string(), self.next_generation);
        self.next_generation
    }

    /// Drop the entry of a peripheral that left the registry. Startup
    /// enumerations carry generation 0, so keep it while one is pending.
    fn forget_generation(&mut self, address: &str) {
        if let Startup::Enumerating(pending) = &self.startup {
            if pending.contains(address) {
                return;
            }
        }
        self.generations.remove(address);
    }

    fn is_current(&self, address: &str, generation: u64) -> bool {
        self.generation(address) == generation
    }

    fn on_service_added(&mut self, service: ServiceInfo) -> Vec<TransportRequest> {
        if service.uuid != self.config.service_uuid {
            return Vec::new();
        }

        info!("New Battery service added: {}", service.id);
        let generation = self.bump_generation(&service.peripheral_address);
        if self.registry.contains(&service.peripheral_address) {
            return Vec::new();
        }

        vec![TransportRequest::GetPeripheral {
            address: service.peripheral_address,
            service_uuid: service.uuid,
            generation,
        }]
    }

    fn on_service_removed(&mut self, service: ServiceInfo) -> Vec<TransportRequest> {
        if service.uuid != self.config.service_uuid {
            return Vec::new();
        }

        info!("Battery service removed: {}", service.id);
        let mut requests = Vec::new();
        if self.selection.is_selected(&service.id) {
            info!("The selected service disappeared");
            requests.extend(self.selection.select(None));
        }

        // Re-enumerate rather than count: only the transport knows what is live.
        let generation = self.bump_generation(&service.peripheral_address);
        requests.push(TransportRequest::ListServices {
            address: service.peripheral_address,
            purpose: ServicesPurpose::Removal { generation },
        });
        requests
    }

    fn on_peripherals(
        &mut self,
        result: Result<Vec<PeripheralInfo>, TransportError>,
    ) -> Vec<TransportRequest> {
        let peripherals = match result {
            Ok(peripherals) => peripherals,
            Err(e) => {
                warn!("Failed to list devices: {}", e);
                self.startup = Startup::Done;
                return Vec::new();
            }
        };

        let mut pending = HashSet::new();
        let mut requests = Vec::new();
        for peripheral in peripherals {
            if !pending.insert(peripheral.address.clone()) {
                continue;
            }
            requests.push(TransportRequest::ListServices {
                address: peripheral.address.clone(),
                purpose: ServicesPurpose::Startup {
                    display_name: peripheral.display_name().to_string(),
                    generation: self.generation(&peripheral.address),
                },
            });
        }

        self.startup = if pending.is_empty() {
            Startup::Done
        } else {
            Startup::Enumerating(pending)
        };
        requests
    }

    fn on_services(
        &mut self,
        address: String,
        purpose: ServicesPurpose,
        result: Result<Vec<ServiceInfo>, TransportError>,
    ) -> Vec<TransportRequest> {
        let target = self.config.service_uuid;
        match purpose {
            ServicesPurpose::Startup {
                display_name,
                generation,
            } => {
                self.finish_startup_enumeration(&address);
                if !self.is_current(&address, generation) {
                    debug!("Dropping stale startup enumeration for {}", address);
                    return Vec::new();
                }
                match result {
                    Ok(services) => {
                        if services.iter().any(|s| s.uuid == target) {
                            info!("Found device with Battery service: {}", address);
                            self.registry.add_if_matching(&address, target, &display_name);
                        }
                    }
                    Err(e) => warn!("Failed to get services of {}: {}", address, e),
                }
                Vec::new()
            }
            ServicesPurpose::Removal { generation } => {
                if !self.is_current(&address, generation) {
                    debug!("Dropping stale removal check for {}", address);
                    return Vec::new();
                }
                let remaining = match result {
                    Ok(services) => services.iter().any(|s| s.uuid == target),
                    Err(e) => {
                        // Treat the peripheral as gone.
                        warn!("Failed to get services of {}: {}", address, e);
                        false
                    }
                };
                if remaining && !self.registry.contains(&address) {
                    return vec![TransportRequest::GetPeripheral {
                        address,
                        service_uuid: target,
                        generation,
                    }];
                }
                self.registry.remove_if_last_service(&address, remaining);
                if !remaining {
                    self.forget_generation(&address);
                }
                Vec::new()
            }
            ServicesPurpose::UserSelection { intent } => {
                if intent != self.intent {
                    debug!("Dropping superseded selection of {}", address);
                    return Vec::new();
                }
                match result {
                    Ok(services) => {
                        let found = services.into_iter().rfind(|s| s.uuid == target);
                        self.selection.select(found)
                    }
                    Err(e) => {
                        warn!("Failed to get services of {}: {}", address, e);
                        self.selection.select(None)
                    }
                }
            }
        }
    }

    fn finish_startup_enumeration(&mut self, address: &str) {
        if let Startup::Enumerating(pending) = &mut self.startup {
            pending.remove(address);
            if pending.is_empty() {
                info!(
                    "Startup enumeration complete, {} device(s) with Battery service",
                    self.registry.len()
                );
                self.startup = Startup::Done;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CharacteristicId, CharacteristicInfo, ServiceId};
    use crate::domain::selection::SelectionState;

    const BATTERY: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);
    const LEVEL: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);
    const DEVICE_INFO: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);

    fn tracker() -> BatteryTracker {
        BatteryTracker::new(TrackerConfig {
            service_uuid: BATTERY,
            characteristic_uuid: LEVEL,
        })
    }

    fn service(address: &str, id: &str, uuid: Uuid) -> ServiceInfo {
        ServiceInfo {
            id: ServiceId(id.to_string()),
            peripheral_address: address.to_string(),
            uuid,
        }
    }

    fn peripheral(address: &str, name: Option<&str>) -> PeripheralInfo {
        PeripheralInfo {
            address: address.to_string(),
            name: name.map(str::to_string),
        }
    }

    /// Feed a ServiceAdded event and answer its device lookup.
    fn add(tracker: &mut BatteryTracker, address: &str, id: &str, name: &str) {
        let requests = tracker.handle_event(TransportEvent::ServiceAdded(service(address, id, BATTERY)));
        for request in requests {
            if let TransportRequest::GetPeripheral {
                address,
                service_uuid,
                generation,
            } = request
            {
                tracker.handle_completion(Completion::Peripheral {
                    result: Ok(peripheral(&address, Some(name))),
                    address,
                    service_uuid,
                    generation,
                });
            }
        }
    }

    fn removal_generation(requests: &[TransportRequest]) -> u64 {
        requests
            .iter()
            .find_map(|r| match r {
                TransportRequest::ListServices {
                    purpose: ServicesPurpose::Removal { generation },
                    ..
                } => Some(*generation),
                _ => None,
            })
            .expect("removal check issued")
    }

    fn select_active(tracker: &mut BatteryTracker, address: &str, id: &str, level: u8) {
        let requests = tracker.user_select(Some(address.to_string()));
        let intent = match &requests[..] {
            [TransportRequest::ListServices {
                purpose: ServicesPurpose::UserSelection { intent },
                ..
            }] => *intent,
            other => panic!("unexpected requests {:?}", other),
        };
        let requests = tracker.handle_completion(Completion::Services {
            address: address.to_string(),
            purpose: ServicesPurpose::UserSelection { intent },
            result: Ok(vec![service(address, id, BATTERY)]),
        });
        let token = tracker.selection().token();
        assert_eq!(
            requests,
            vec![TransportRequest::GetCharacteristics {
                service: ServiceId(id.to_string()),
                token,
            }]
        );
        let chrc = CharacteristicInfo {
            id: CharacteristicId(format!("{}/level", id)),
            service_id: ServiceId(id.to_string()),
            uuid: LEVEL,
            value: None,
        };
        tracker.handle_completion(Completion::Characteristics {
            service: ServiceId(id.to_string()),
            token,
            result: Ok(vec![chrc.clone()]),
        });
        tracker.handle_completion(Completion::ValueRead {
            characteristic: chrc.id.clone(),
            token,
            result: Ok(CharacteristicInfo {
                value: Some(vec![level]),
                ..chrc
            }),
        });
    }

    #[test]
    fn test_startup_collects_matching_peripherals() {
        let mut tracker = tracker();
        let requests = tracker.start();
        assert!(requests.contains(&TransportRequest::GetAdapterState));
        assert!(requests.contains(&TransportRequest::ListPeripherals));
        assert!(!tracker.is_ready());

        let requests = tracker.handle_completion(Completion::Peripherals(Ok(vec![
            peripheral("AA", Some("Keyboard")),
            peripheral("BB", None),
        ])));
        assert_eq!(requests.len(), 2);

        for request in requests {
            if let TransportRequest::ListServices { address, purpose } = request {
                let uuid = if address == "AA" { BATTERY } else { DEVICE_INFO };
                tracker.handle_completion(Completion::Services {
                    result: Ok(vec![service(&address, "s", uuid)]),
                    address,
                    purpose,
                });
            }
        }

        assert!(tracker.is_ready());
        assert_eq!(
            tracker.view().devices,
            vec![("AA".to_string(), "Keyboard".to_string())]
        );
    }

    #[test]
    fn test_startup_with_no_peripherals_is_ready() {
        let mut tracker = tracker();
        tracker.start();
        tracker.handle_completion(Completion::Peripherals(Ok(Vec::new())));
        assert!(tracker.view().ready);
    }

    #[test]
    fn test_service_added_registers_once() {
        let mut tracker = tracker();
        add(&mut tracker, "AA", "AA/1", "Keyboard");
        let again = tracker.handle_event(TransportEvent::ServiceAdded(service("AA", "AA/2", BATTERY)));
        assert!(again.is_empty());
        assert_eq!(tracker.registry().len(), 1);

        let other = tracker.handle_event(TransportEvent::ServiceAdded(service("CC", "CC/1", DEVICE_INFO)));
        assert!(other.is_empty());
    }

    #[test]
    fn test_removal_keeps_peripheral_with_remaining_service() {
        let mut tracker = tracker();
        add(&mut tracker, "AA", "AA/1", "Keyboard");

        let requests = tracker.handle_event(TransportEvent::ServiceRemoved(service("AA", "AA/1", BATTERY)));
        let generation = removal_generation(&requests);
        tracker.handle_completion(Completion::Services {
            address: "AA".to_string(),
            purpose: ServicesPurpose::Removal { generation },
            result: Ok(vec![service("AA", "AA/2", BATTERY)]),
        });
        assert!(tracker.registry().contains("AA"));
    }

    #[test]
    fn test_removal_enumeration_failure_removes_peripheral() {
        let mut tracker = tracker();
        add(&mut tracker, "AA", "AA/1", "Keyboard");

        let requests = tracker.handle_event(TransportEvent::ServiceRemoved(service("AA", "AA/1", BATTERY)));
        let generation = removal_generation(&requests);
        tracker.handle_completion(Completion::Services {
            address: "AA".to_string(),
            purpose: ServicesPurpose::Removal { generation },
            result: Err(TransportError::DeviceNotFound("AA".to_string())),
        });
        assert!(!tracker.registry().contains("AA"));
    }

    #[test]
    fn test_removed_peripheral_forgets_generation() {
        let mut tracker = tracker();
        let added = tracker.handle_event(TransportEvent::ServiceAdded(service("AA", "AA/1", BATTERY)));
        let removed = tracker.handle_event(TransportEvent::ServiceRemoved(service("AA", "AA/1", BATTERY)));
        tracker.handle_completion(Completion::Services {
            address: "AA".to_string(),
            purpose: ServicesPurpose::Removal {
                generation: removal_generation(&removed),
            },
            result: Ok(Vec::new()),
        });
        assert!(tracker.generations.is_empty());

        // The lookup issued before the removal stays stale.
        for request in added {
            if let TransportRequest::GetPeripheral {
                address,
                service_uuid,
                generation,
            } = request
            {
                tracker.handle_completion(Completion::Peripheral {
                    result: Ok(peripheral(&address, Some("Keyboard"))),
                    address,
                    service_uuid,
                    generation,
                });
            }
        }
        assert!(!tracker.registry().contains("AA"));

        add(&mut tracker, "AA", "AA/2", "Keyboard");
        assert!(tracker.registry().contains("AA"));
    }

    #[test]
    fn test_generation_kept_while_startup_enumeration_pending() {
        let mut tracker = tracker();
        tracker.start();
        tracker.handle_completion(Completion::Peripherals(Ok(vec![peripheral("AA", None)])));

        let removed = tracker.handle_event(TransportEvent::ServiceRemoved(service("AA", "AA/1", BATTERY)));
        tracker.handle_completion(Completion::Services {
            address: "AA".to_string(),
            purpose: ServicesPurpose::Removal {
                generation: removal_generation(&removed),
            },
            result: Ok(Vec::new()),
        });
        assert!(tracker.generations.contains_key("AA"));

        // The startup enumeration was issued before the removal and is dropped.
        tracker.handle_completion(Completion::Services {
            address: "AA".to_string(),
            purpose: ServicesPurpose::Startup {
                display_name: "AA".to_string(),
                generation: 0,
            },
            result: Ok(vec![service("AA", "AA/1", BATTERY)]),
        });
        assert!(tracker.is_ready());
        assert!(!tracker.registry().contains("AA"));
    }

    #[test]
    fn test_removal_cascade_of_selected_service() {
        let mut tracker = tracker();
        add(&mut tracker, "AA", "AA/1", "Keyboard");
        select_active(&mut tracker, "AA", "AA/1", 50);
        assert_eq!(tracker.view().level, Some(BatteryLevel::new(50)));

        let requests = tracker.handle_event(TransportEvent::ServiceRemoved(service("AA", "AA/1", BATTERY)));
        assert!(requests.contains(&TransportRequest::StopNotifications {
            characteristic: CharacteristicId("AA/1/level".to_string()),
        }));
        assert_eq!(tracker.selection().state(), &SelectionState::Unselected);

        let generation = removal_generation(&requests);
        tracker.handle_completion(Completion::Services {
            address: "AA".to_string(),
            purpose: ServicesPurpose::Removal { generation },
            result: Ok(Vec::new()),
        });

        let view = tracker.view();
        assert!(view.devices.is_empty());
        assert_eq!(view.selected, None);
        assert_eq!(view.level, None);
    }

    #[test]
    fn test_stale_device_lookup_after_removal_is_dropped() {
        let mut tracker = tracker();
        let added = tracker.handle_event(TransportEvent::ServiceAdded(service("AA", "AA/1", BATTERY)));
        let removed = tracker.handle_event(TransportEvent::ServiceRemoved(service("AA", "AA/1", BATTERY)));

        let generation = removal_generation(&removed);
        tracker.handle_completion(Completion::Services {
            address: "AA".to_string(),
            purpose: ServicesPurpose::Removal { generation },
            result: Ok(Vec::new()),
        });

        for request in added {
            if let TransportRequest::GetPeripheral {
                address,
                service_uuid,
                generation,
            } = request
            {
                tracker.handle_completion(Completion::Peripheral {
                    result: Ok(peripheral(&address, Some("Keyboard"))),
                    address,
                    service_uuid,
                    generation,
                });
            }
        }
        assert!(!tracker.registry().contains("AA"));
    }

    #[test]
    fn test_removal_check_recovers_missing_peripheral() {
        let mut tracker = tracker();
        let requests = tracker.handle_event(TransportEvent::ServiceRemoved(service("AA", "AA/1", BATTERY)));
        let generation = removal_generation(&requests);

        let requests = tracker.handle_completion(Completion::Services {
            address: "AA".to_string(),
            purpose: ServicesPurpose::Removal { generation },
            result: Ok(vec![service("AA", "AA/2", BATTERY)]),
        });
        assert_eq!(
            requests,
            vec![TransportRequest::GetPeripheral {
                address: "AA".to_string(),
                service_uuid: BATTERY,
                generation,
            }]
        );
    }

    #[test]
    fn test_service_changed_requeries_selected_service() {
        let mut tracker = tracker();
        add(&mut tracker, "AA", "AA/1", "Keyboard");
        select_active(&mut tracker, "AA", "AA/1", 20);
        let before = tracker.selection().token();

        let unrelated = tracker.handle_event(TransportEvent::ServiceChanged(service("BB", "BB/1", BATTERY)));
        assert!(unrelated.is_empty());

        let requests = tracker.handle_event(TransportEvent::ServiceChanged(service("AA", "AA/1", BATTERY)));
        let token = tracker.selection().token();
        assert!(token > before);
        assert!(requests.contains(&TransportRequest::GetCharacteristics {
            service: ServiceId("AA/1".to_string()),
            token,
        }));
        assert_eq!(tracker.view().level, None);
    }

    #[test]
    fn test_superseded_user_selection_is_dropped() {
        let mut tracker = tracker();
        let first = tracker.user_select(Some("AA".to_string()));
        tracker.user_select(Some("BB".to_string()));

        for request in first {
            if let TransportRequest::ListServices { address, purpose } = request {
                let requests = tracker.handle_completion(Completion::Services {
                    result: Ok(vec![service(&address, "AA/1", BATTERY)]),
                    address,
                    purpose,
                });
                assert!(requests.is_empty());
            }
        }
        assert!(tracker.selection().selected_service().is_none());
    }

    #[test]
    fn test_user_selection_failure_deselects() {
        let mut tracker = tracker();
        add(&mut tracker, "AA", "AA/1", "Keyboard");
        select_active(&mut tracker, "AA", "AA/1", 90);

        let requests = tracker.user_select(Some("AA".to_string()));
        let purpose = match &requests[..] {
            [TransportRequest::ListServices { purpose, .. }] => purpose.clone(),
            other => panic!("unexpected requests {:?}", other),
        };
        let requests = tracker.handle_completion(Completion::Services {
            address: "AA".to_string(),
            purpose,
            result: Err(TransportError::Timeout("services", 10_000)),
        });
        assert_eq!(
            requests,
            vec![TransportRequest::StopNotifications {
                characteristic: CharacteristicId("AA/1/level".to_string()),
            }]
        );
        assert_eq!(tracker.selection().state(), &SelectionState::Unselected);
    }

    #[test]
    fn test_adapter_state_tracking() {
        let mut tracker = tracker();
        tracker.handle_completion(Completion::AdapterState(Err(TransportError::Unavailable(
            "No Bluetooth adapter found",
        ))));
        assert_eq!(tracker.view().adapter, None);

        let state = AdapterState {
            name: Some("hci0".to_string()),
            address: None,
            powered: true,
        };
        tracker.handle_event(TransportEvent::AdapterStateChanged(Some(state.clone())));
        assert_eq!(tracker.view().adapter, Some(state));
    }

    #[test]
    fn test_shutdown_unsubscribes_and_clears() {
        let mut tracker = tracker();
        add(&mut tracker, "AA", "AA/1", "Keyboard");
        select_active(&mut tracker, "AA", "AA/1", 40);

        let requests = tracker.shutdown();
        assert_eq!(
            requests,
            vec![TransportRequest::StopNotifications {
                characteristic: CharacteristicId("AA/1/level".to_string()),
            }]
        );
        assert!(tracker.registry().is_empty());
        assert_eq!(tracker.view().level, None);
    }
}
