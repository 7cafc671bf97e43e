//! Transport Module
//!
//! The seam between the tracker and a Bluetooth LE stack. Every call is
//! asynchronous and may fail independently; events are delivered separately
//! through an `mpsc` channel handed to the implementation.

use crate::domain::models::{
    AdapterState, CharacteristicId, CharacteristicInfo, PeripheralInfo, ServiceId, ServiceInfo,
};
use crate::error::TransportError;
use std::future::Future;

pub trait Transport: Send + Sync + 'static {
    /// `Ok(None)` when there is no adapter.
    fn adapter_state(
        &self,
    ) -> impl Future<Output = Result<Option<AdapterState>, TransportError>> + Send;

    fn devices(&self) -> impl Future<Output = Result<Vec<PeripheralInfo>, TransportError>> + Send;

    fn device(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<PeripheralInfo, TransportError>> + Send;

    /// All live services of a peripheral, of any type.
    fn services(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Vec<ServiceInfo>, TransportError>> + Send;

    fn characteristics(
        &self,
        service: &ServiceId,
    ) -> impl Future<Output = Result<Vec<CharacteristicInfo>, TransportError>> + Send;

    /// Read and return the characteristic with its current value.
    fn read_characteristic_value(
        &self,
        characteristic: &CharacteristicId,
    ) -> impl Future<Output = Result<CharacteristicInfo, TransportError>> + Send;

    /// Fails with [`TransportError::AlreadyNotifying`] if notifications are on.
    fn start_notifications(
        &self,
        characteristic: &CharacteristicId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn stop_notifications(
        &self,
        characteristic: &CharacteristicId,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
