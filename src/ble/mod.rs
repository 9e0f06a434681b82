//! Bluetooth Low Energy module
//!
//! Binds the UART stream to the TrouBLE host stack via the Nordic UART
//! Service (NUS).

pub mod link;
pub mod name;

#[cfg(feature = "embedded")]
pub mod advertising;
#[cfg(feature = "embedded")]
pub mod service;

pub use link::{LinkError, NusLink};
pub use name::format_device_name;

#[cfg(feature = "embedded")]
pub use service::NordicUartService;
