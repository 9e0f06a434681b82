#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod ble;
pub mod config;
pub mod peripheral;
pub mod tasks;
pub mod uart;

pub use config::UartConfig;
pub use peripheral::{Advertiser, BlePeripheral, ConnectionState};
pub use uart::{InboundChannel, UartError, UartStream};
