//! Infrastructure layer: Bluetooth transport, tracker driver and logging.

pub mod bluetooth;
pub mod logging;
