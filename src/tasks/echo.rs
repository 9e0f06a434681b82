//! Echo application
//!
//! Advertises, waits for a central, then sends every received burst of
//! bytes straight back. When the central leaves it advertises again, since
//! the stack does not do that by itself.

use core::fmt::Debug;

use embedded_hal_async::delay::DelayNs;

use crate::peripheral::{Advertiser, BlePeripheral};
use crate::uart::{Clock, UartError, UartStream};

/// How often to check for a central while advertising
const CONNECT_POLL_MS: u32 = 100;

/// Echo one burst: read until the buffer fills or the sender pauses, then
/// write it back. Returns the number of bytes echoed.
pub async fn echo_once<P, D>(stream: &UartStream<P, D>) -> Result<usize, UartError<P::Error>>
where
    P: BlePeripheral,
    D: DelayNs + Clock,
{
    let data = stream.read_vec(stream.config().buffer_size).await;
    if data.is_empty() {
        return Ok(0);
    }
    stream.write(&data).await?;
    Ok(data.len())
}

/// Run the echo server forever.
pub async fn run_echo<P, D, A, W>(
    stream: &UartStream<P, D>,
    advertiser: &A,
    adv_data: &[u8],
    scan_data: &[u8],
    mut idle: W,
) where
    P: BlePeripheral,
    P::Error: Debug,
    D: DelayNs + Clock,
    A: Advertiser,
    A::Error: Debug,
    W: DelayNs,
{
    loop {
        if let Err(e) = advertiser.start_advertising(adv_data, scan_data) {
            log::warn!("advertising failed: {:?}", e);
        }
        log::info!("advertising");

        while !stream.is_connected() {
            idle.delay_ms(CONNECT_POLL_MS).await;
        }
        log::info!("central connected");

        while stream.is_connected() {
            match echo_once(stream).await {
                Ok(0) => {}
                Ok(n) => log::debug!("echoed {} bytes", n),
                Err(e) => log::warn!("echo failed: {}", e),
            }
        }

        log::info!("central disconnected");
        stream.reset_input_buffer();
    }
}
