//! Presentation layer: renders tracker snapshots for the terminal.

pub mod console;

pub use console::ConsoleView;
