//! btleplug Transport Module
//!
//! [`Transport`] on top of btleplug. btleplug has no service level events,
//! so an event pump connects to peripherals advertising the target service,
//! diffs their discovered services and reports the difference as
//! `ServiceAdded` / `ServiceRemoved` / `ServiceChanged`.

use crate::domain::models::{
    AdapterState, CharacteristicId, CharacteristicInfo, PeripheralInfo, ServiceId, ServiceInfo,
    TransportEvent,
};
use crate::error::TransportError;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::transport::Transport;
use btleplug::api::{
    Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _,
    PeripheralProperties, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{Stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// BlueZ can block on connect forever when the device walks away.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(15);

type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

impl From<btleplug::Error> for TransportError {
    fn from(e: btleplug::Error) -> Self {
        match e {
            btleplug::Error::DeviceNotFound => TransportError::DeviceNotFound(e.to_string()),
            other => TransportError::Adapter(other.to_string()),
        }
    }
}

/// Characteristics with notifications on. Each method takes the lock for
/// the set update only.
#[derive(Clone, Default)]
struct NotificationSlots {
    active: Arc<Mutex<HashSet<CharacteristicId>>>,
}

impl NotificationSlots {
    async fn reserve(&self, characteristic: &CharacteristicId) -> Result<(), TransportError> {
        if self.active.lock().await.insert(characteristic.clone()) {
            Ok(())
        } else {
            Err(TransportError::AlreadyNotifying)
        }
    }

    async fn release(&self, characteristic: &CharacteristicId) {
        self.active.lock().await.remove(characteristic);
    }

    async fn release_peripheral(&self, address: &str) {
        let prefix = format!("{}/", address);
        self.active
            .lock()
            .await
            .retain(|c| !c.0.starts_with(&prefix));
    }
}

/// Transport backed by the first local Bluetooth adapter
pub struct BtleTransport {
    adapter: Adapter,
    target_service: Uuid,
    notifying: NotificationSlots,
    pump: JoinHandle<()>,
}

impl BtleTransport {
    /// Open the first adapter and start forwarding its events to
    /// `event_sender`.
    pub async fn new(
        target_service: Uuid,
        event_sender: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::Unavailable("No Bluetooth adapter found"))?;
        info!(
            "Using Bluetooth adapter: {}",
            adapter.adapter_info().await.unwrap_or_default()
        );

        let notifying = NotificationSlots::default();
        let events = adapter.events().await?;
        let pump = EventPump {
            adapter: adapter.clone(),
            sender: event_sender,
            target_service,
            notifying: notifying.clone(),
            connecting: Arc::new(std::sync::Mutex::new(HashSet::new())),
            connected: ConnectedPeripherals::default(),
        };
        let pump = tokio::spawn(pump.run(events));

        Ok(Self {
            adapter,
            target_service,
            notifying,
            pump,
        })
    }

    /// Start scanning. Peripherals advertising the target service get
    /// connected by the event pump.
    pub async fn start_scan(&self) -> Result<(), TransportError> {
        info!("Starting BLE scan for service UUID: {}", self.target_service);
        self.adapter.start_scan(ScanFilter::default()).await?;
        Ok(())
    }

    pub async fn stop_scan(&self) -> Result<(), TransportError> {
        info!("Stopping BLE scan...");
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn peripheral(&self, address: &str) -> Result<Peripheral, TransportError> {
        find_peripheral(&self.adapter, address).await
    }

    async fn characteristic(
        &self,
        id: &CharacteristicId,
    ) -> Result<(Peripheral, Characteristic), TransportError> {
        let (address, service_uuid, characteristic_uuid) = protocol::parse_characteristic_id(id)?;
        let peripheral = self.peripheral(&address).await?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic_uuid && c.service_uuid == service_uuid)
            .ok_or_else(|| TransportError::CharacteristicNotFound(id.0.clone()))?;
        Ok((peripheral, characteristic))
    }
}

impl Drop for BtleTransport {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl Transport for BtleTransport {
    async fn adapter_state(&self) -> Result<Option<AdapterState>, TransportError> {
        let state = self.adapter.adapter_state().await?;
        Ok(Some(AdapterState {
            name: self.adapter.adapter_info().await.ok(),
            address: None,
            powered: matches!(state, CentralState::PoweredOn),
        }))
    }

    async fn devices(&self) -> Result<Vec<PeripheralInfo>, TransportError> {
        let mut devices = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            let properties = peripheral.properties().await;
            devices.push(listed_peripheral(peripheral.id().to_string(), properties));
        }
        Ok(devices)
    }

    async fn device(&self, address: &str) -> Result<PeripheralInfo, TransportError> {
        let peripheral = self.peripheral(address).await?;
        peripheral_info(&peripheral).await
    }

    async fn services(&self, address: &str) -> Result<Vec<ServiceInfo>, TransportError> {
        let peripheral = self.peripheral(address).await?;
        // Only connected peripherals have live services.
        if !peripheral.is_connected().await? {
            return Ok(Vec::new());
        }
        if peripheral.services().is_empty() {
            peripheral.discover_services().await?;
        }
        Ok(services_of(address, &peripheral))
    }

    async fn characteristics(
        &self,
        service: &ServiceId,
    ) -> Result<Vec<CharacteristicInfo>, TransportError> {
        let (address, service_uuid) = protocol::parse_service_id(service)?;
        let peripheral = self.peripheral(&address).await?;
        let gatt_service = peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == service_uuid)
            .ok_or_else(|| TransportError::ServiceNotFound(service.0.clone()))?;

        Ok(gatt_service
            .characteristics
            .iter()
            .map(|c| CharacteristicInfo {
                id: protocol::characteristic_id(service, c.uuid),
                service_id: service.clone(),
                uuid: c.uuid,
                value: None,
            })
            .collect())
    }

    async fn read_characteristic_value(
        &self,
        characteristic: &CharacteristicId,
    ) -> Result<CharacteristicInfo, TransportError> {
        let (peripheral, gatt_characteristic) = self.characteristic(characteristic).await?;
        let value = peripheral.read(&gatt_characteristic).await?;
        let (address, service_uuid, _) = protocol::parse_characteristic_id(characteristic)?;
        Ok(CharacteristicInfo {
            id: characteristic.clone(),
            service_id: protocol::service_id(&address, service_uuid),
            uuid: gatt_characteristic.uuid,
            value: Some(value),
        })
    }

    async fn start_notifications(
        &self,
        characteristic: &CharacteristicId,
    ) -> Result<(), TransportError> {
        self.notifying.reserve(characteristic).await?;
        let subscribed = async {
            let (peripheral, gatt_characteristic) = self.characteristic(characteristic).await?;
            peripheral.subscribe(&gatt_characteristic).await?;
            Ok::<(), TransportError>(())
        }
        .await;
        if subscribed.is_err() {
            self.notifying.release(characteristic).await;
        }
        subscribed
    }

    async fn stop_notifications(
        &self,
        characteristic: &CharacteristicId,
    ) -> Result<(), TransportError> {
        let (peripheral, gatt_characteristic) = self.characteristic(characteristic).await?;
        peripheral.unsubscribe(&gatt_characteristic).await?;
        self.notifying.release(characteristic).await;
        Ok(())
    }
}

/// Turns central events into service level [`TransportEvent`]s
struct EventPump {
    adapter: Adapter,
    sender: mpsc::UnboundedSender<TransportEvent>,
    target_service: Uuid,
    notifying: NotificationSlots,
    // Connect attempts in flight
    connecting: Arc<std::sync::Mutex<HashSet<String>>>,
    connected: ConnectedPeripherals,
}

impl EventPump {
    async fn run(mut self, mut events: CentralEvents) {
        self.seed_connected().await;
        while let Some(event) = events.next().await {
            match event {
                CentralEvent::DeviceDiscovered(id) => self.connect_if_advertising(id).await,
                CentralEvent::ServicesAdvertisement { id, services } => {
                    if services.contains(&self.target_service) {
                        self.spawn_connect(id);
                    }
                }
                CentralEvent::DeviceConnected(id) => match self.adapter.peripheral(&id).await {
                    Ok(peripheral) => self.refresh_services(peripheral).await,
                    Err(e) => warn!("Connected peripheral {} not found: {}", id, e),
                },
                CentralEvent::DeviceDisconnected(id) => self.drop_services(&id).await,
                CentralEvent::StateUpdate(state) => {
                    let adapter = AdapterState {
                        name: self.adapter.adapter_info().await.ok(),
                        address: None,
                        powered: matches!(state, CentralState::PoweredOn),
                    };
                    self.send(TransportEvent::AdapterStateChanged(Some(adapter)));
                }
                _ => {}
            }
        }
        warn!("Bluetooth adapter event stream ended");
    }

    fn send(&self, event: TransportEvent) {
        if self.sender.send(event).is_err() {
            debug!("Tracker is gone, dropping transport event");
        }
    }

    async fn connect_if_advertising(&mut self, id: PeripheralId) {
        let Ok(peripheral) = self.adapter.peripheral(&id).await else {
            return;
        };
        let advertises_target = match peripheral.properties().await {
            Ok(Some(props)) => props.services.contains(&self.target_service),
            _ => false,
        };
        if advertises_target {
            self.spawn_connect(id);
        }
    }

    fn spawn_connect(&mut self, id: PeripheralId) {
        let address = id.to_string();
        if self.connected.contains(&address) {
            return;
        }
        match self.connecting.lock() {
            Ok(mut connecting) => {
                if !connecting.insert(address.clone()) {
                    return;
                }
            }
            Err(_) => return,
        }

        let adapter = self.adapter.clone();
        let connecting = self.connecting.clone();
        tokio::spawn(async move {
            info!("Connecting to {}", address);
            match adapter.peripheral(&id).await {
                Ok(peripheral) => match tokio::time::timeout(CONNECT_TIMEOUT, peripheral.connect()).await {
                    Ok(Ok(())) => info!("Connected to {}", address),
                    Ok(Err(e)) => warn!("Failed to connect to {}: {}", address, e),
                    Err(_) => warn!("Connecting to {} timed out", address),
                },
                Err(e) => warn!("Peripheral {} vanished: {}", address, e),
            }
            if let Ok(mut connecting) = connecting.lock() {
                connecting.remove(&address);
            }
        });
    }

    /// Peripherals connected before we started never raise `DeviceConnected`.
    async fn seed_connected(&mut self) {
        let peripherals = match self.adapter.peripherals().await {
            Ok(peripherals) => peripherals,
            Err(e) => {
                warn!("Could not list known peripherals: {}", e);
                return;
            }
        };
        for peripheral in peripherals {
            if peripheral.is_connected().await.unwrap_or(false) {
                self.refresh_services(peripheral).await;
            }
        }
    }

    async fn refresh_services(&mut self, peripheral: Peripheral) {
        let address = peripheral.id().to_string();
        match tokio::time::timeout(DISCOVERY_TIMEOUT, peripheral.discover_services()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Service discovery on {} failed: {}", address, e);
                return;
            }
            Err(_) => {
                warn!("Service discovery on {} timed out", address);
                return;
            }
        }

        let current = services_of(&address, &peripheral);
        debug!("{} exposes {} service(s)", address, current.len());
        let (events, start_forwarder) = self.connected.discovered(&address, current);
        for event in events {
            self.send(event);
        }

        if start_forwarder {
            tokio::spawn(forward_notifications(
                peripheral,
                address,
                self.sender.clone(),
            ));
        }
    }

    async fn drop_services(&mut self, id: &PeripheralId) {
        let address = id.to_string();
        info!("Device {} disconnected", address);
        self.notifying.release_peripheral(&address).await;
        for event in self.connected.disconnected(&address) {
            self.send(event);
        }
    }
}

/// Services last reported per connected peripheral, and the peripherals
/// whose notification stream is being forwarded.
#[derive(Default)]
struct ConnectedPeripherals {
    known: HashMap<String, Vec<ServiceInfo>>,
    forwarding: HashSet<String>,
}

impl ConnectedPeripherals {
    fn contains(&self, address: &str) -> bool {
        self.known.contains_key(address)
    }

    /// Record a service discovery. Returns the events to emit and whether a
    /// notification forwarder has to be started for the peripheral.
    fn discovered(
        &mut self,
        address: &str,
        current: Vec<ServiceInfo>,
    ) -> (Vec<TransportEvent>, bool) {
        let previous = self.known.remove(address).unwrap_or_default();
        let events = diff_services(&previous, &current);
        self.known.insert(address.to_string(), current);
        (events, self.forwarding.insert(address.to_string()))
    }

    fn disconnected(&mut self, address: &str) -> Vec<TransportEvent> {
        self.forwarding.remove(address);
        let previous = self.known.remove(address).unwrap_or_default();
        diff_services(&previous, &[])
    }
}

/// Events turning the `previous` service set of a peripheral into `current`.
/// Services present in both are reported changed: a rediscovery may have
/// replaced their characteristics.
fn diff_services(previous: &[ServiceInfo], current: &[ServiceInfo]) -> Vec<TransportEvent> {
    let removed = previous
        .iter()
        .filter(|service| !current.contains(service))
        .map(|service| TransportEvent::ServiceRemoved(service.clone()));
    let added_or_changed = current.iter().map(|service| {
        if previous.contains(service) {
            TransportEvent::ServiceChanged(service.clone())
        } else {
            TransportEvent::ServiceAdded(service.clone())
        }
    });
    removed.chain(added_or_changed).collect()
}

async fn forward_notifications(
    peripheral: Peripheral,
    address: String,
    sender: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut notifications = match peripheral.notifications().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Could not get notification stream of {}: {}", address, e);
            return;
        }
    };

    while let Some(notification) = notifications.next().await {
        let Some(characteristic) = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == notification.uuid)
        else {
            continue;
        };
        let service_id = protocol::service_id(&address, characteristic.service_uuid);
        let info = CharacteristicInfo {
            id: protocol::characteristic_id(&service_id, characteristic.uuid),
            service_id,
            uuid: characteristic.uuid,
            value: Some(notification.value),
        };
        if sender
            .send(TransportEvent::CharacteristicValueChanged(info))
            .is_err()
        {
            break;
        }
    }
    debug!("Notification stream of {} ended", address);
}

async fn find_peripheral(adapter: &Adapter, address: &str) -> Result<Peripheral, TransportError> {
    adapter
        .peripherals()
        .await?
        .into_iter()
        .find(|p| p.id().to_string() == address)
        .ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))
}

/// Entry of the peripheral list. A peripheral whose properties cannot be
/// read is still listed; its address is enough to enumerate services.
fn listed_peripheral(
    address: String,
    properties: Result<Option<PeripheralProperties>, btleplug::Error>,
) -> PeripheralInfo {
    let name = match properties {
        Ok(properties) => properties.and_then(|p| p.local_name),
        Err(e) => {
            warn!("Could not read properties of {}: {}", address, e);
            None
        }
    };
    PeripheralInfo { address, name }
}

async fn peripheral_info(peripheral: &Peripheral) -> Result<PeripheralInfo, TransportError> {
    let properties = peripheral.properties().await?;
    Ok(PeripheralInfo {
        address: peripheral.id().to_string(),
        name: properties.and_then(|p| p.local_name),
    })
}

fn services_of(address: &str, peripheral: &Peripheral) -> Vec<ServiceInfo> {
    peripheral
        .services()
        .into_iter()
        .map(|s| ServiceInfo {
            id: protocol::service_id(address, s.uuid),
            peripheral_address: address.to_string(),
            uuid: s.uuid,
        })
        .collect()
}
