//! Domain layer: the battery tracking core.
//!
//! - [`registry`] - peripherals exposing the Battery service
//! - [`selection`] - selected service / subscribed characteristic state machine
//! - [`tracker`] - reconciliation of transport events and completions
//! - [`commands`] - transport requests and their completions
//! - [`battery`] - Battery Level decoding and tiers
//! - [`settings`] - persisted configuration

pub mod battery;
pub mod commands;
pub mod models;
pub mod registry;
pub mod selection;
pub mod settings;
pub mod tracker;
