//! Async tasks
//!
//! The echo application is hardware independent. The BLE host task needs
//! the TrouBLE stack and is only built with the embedded feature.

#[cfg(feature = "embedded")]
pub mod ble;
pub mod echo;

#[cfg(feature = "embedded")]
pub use ble::nus_task;
pub use echo::{echo_once, run_echo};
