//! Advertising payloads for the NUS server
//!
//! The NUS service UUID goes in the advertisement so centrals can filter
//! on it; the device name goes in the scan response to stay within 31 bytes.

use trouble_host::prelude::*;

use crate::ble::link::AdvertiseError;
use crate::config::ble::MAX_ADV_DATA;
use crate::config::nus::SERVICE_UUID;

/// Encoded advertisement and scan response
pub struct AdvertisementPayload {
    pub adv_data: heapless::Vec<u8, MAX_ADV_DATA>,
    pub scan_data: heapless::Vec<u8, MAX_ADV_DATA>,
}

/// Encode the advertisement for a named NUS server.
pub fn nus_advertisement(device_name: &str) -> Result<AdvertisementPayload, AdvertiseError> {
    let mut adv = [0u8; MAX_ADV_DATA];
    let adv_len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::ServiceUuids128(&[SERVICE_UUID.to_le_bytes()]),
        ],
        &mut adv,
    )
    .map_err(|_| AdvertiseError::PayloadTooLong)?;

    let mut scan = [0u8; MAX_ADV_DATA];
    let scan_len = AdStructure::encode_slice(
        &[AdStructure::CompleteLocalName(device_name.as_bytes())],
        &mut scan,
    )
    .map_err(|_| AdvertiseError::PayloadTooLong)?;

    Ok(AdvertisementPayload {
        adv_data: heapless::Vec::from_slice(&adv[..adv_len]).map_err(|_| AdvertiseError::PayloadTooLong)?,
        scan_data: heapless::Vec::from_slice(&scan[..scan_len]).map_err(|_| AdvertiseError::PayloadTooLong)?,
    })
}
