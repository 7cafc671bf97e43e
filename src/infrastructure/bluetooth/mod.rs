//! Bluetooth Module
//!
//! Drives the battery tracker against a Bluetooth LE stack.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    TrackerService                        │
//! │  (event loop - runs requests, feeds completions back)    │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │ Transport │  │    Btle    │  │ Protocol │
//! │           │  │            │  │          │
//! │ - async   │  │ - btleplug │  │ - UUIDs  │
//! │   GATT API│  │ - events   │  │ - ids    │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Battery Service UUIDs and instance identifiers
//! - [`transport`] - The asynchronous transport seam
//! - [`btle`] - btleplug implementation of the transport
//! - [`service`] - Event loop driving the tracker

pub mod btle;
pub mod protocol;
pub mod service;
pub mod transport;

pub use btle::BtleTransport;
pub use service::TrackerService;
