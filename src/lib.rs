//! BLE battery monitor: tracks connected peripherals exposing the GATT
//! Battery Service and follows the battery level of the selected one.

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;
