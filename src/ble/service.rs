//! Nordic UART Service (NUS) definition
//!
//! - Service UUID: 6E400001-B5A3-F393-E0A9-E50E24DCCA9E
//! - RX Characteristic: 6E400002-... (write, write without response)
//! - TX Characteristic: 6E400003-... (notify)

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use trouble_host::prelude::*;

use crate::ble::link::NusPacket;

/// Nordic UART Service
#[gatt_service(uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e")]
pub struct NordicUartService {
    /// RX Characteristic - the central writes stream bytes here
    #[characteristic(uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e", write, write_without_response)]
    pub rx: NusPacket,

    /// TX Characteristic - stream bytes are notified here
    #[characteristic(uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e", notify)]
    pub tx: NusPacket,
}

/// GATT server exposing the NUS
#[gatt_server(mutex_type = CriticalSectionRawMutex)]
pub struct NusServer {
    pub nus: NordicUartService,
}
