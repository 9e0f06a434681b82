//! Stream-facing side of the BLE host task
//!
//! `NusLink` is the [`BlePeripheral`] the UART stream talks to. It does not
//! own the GATT connection; the host task does. Notifications are handed
//! over one chunk at a time and each `notify` waits for the host task to
//! report the result, so nothing queues up between writes.
//!
//! Chunks carry a sequence number. A completion for a chunk whose `notify`
//! was dropped mid-flight is ignored by the next `notify`.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::config::ble::MAX_ADV_DATA;
use crate::config::nus::TX_CHAR_UUID;
use crate::peripheral::{Advertiser, BlePeripheral, ConnectionState, Uuid};

/// Largest single NUS value. Notifications are cut to the stream's chunk
/// size before they get here.
pub const NUS_MAX_PACKET_SIZE: usize = 128;

/// One RX write or TX notification
pub type NusPacket = heapless::Vec<u8, NUS_MAX_PACKET_SIZE>;

/// Errors reported to the stream by `notify`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Only the TX characteristic can be notified
    UnknownCharacteristic,
    /// Chunk larger than `NUS_MAX_PACKET_SIZE`
    ChunkTooLarge,
    /// The central went away before the chunk was sent
    Disconnected,
    /// The stack rejected the notification
    Notify,
}

/// Errors from advertising control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseError {
    /// Already connected; advertising resumes after disconnect
    Connected,
    /// Payload exceeds the legacy 31-byte limit
    PayloadTooLong,
}

/// Legacy advertising payload pair
pub struct AdvertiseRequest {
    pub adv_data: heapless::Vec<u8, MAX_ADV_DATA>,
    pub scan_data: heapless::Vec<u8, MAX_ADV_DATA>,
}

/// Advertising requests from the application to the host task
pub enum AdvertiseCommand {
    Start(AdvertiseRequest),
    Stop,
}

/// Sequence number and outcome of one notified chunk
type Completion = (u32, Result<(), LinkError>);

/// Shared state between the UART stream and the BLE host task
pub struct NusLink {
    state: Mutex<CriticalSectionRawMutex, Cell<ConnectionState>>,
    /// Last sequence number handed out
    issued: Mutex<CriticalSectionRawMutex, Cell<u32>>,
    /// Sequence number of the chunk the host task is sending
    in_flight: Mutex<CriticalSectionRawMutex, Cell<u32>>,
    outbound: Channel<CriticalSectionRawMutex, (u32, NusPacket), 1>,
    completion: Signal<CriticalSectionRawMutex, Completion>,
    advertise: Signal<CriticalSectionRawMutex, AdvertiseCommand>,
}

impl NusLink {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(ConnectionState::Disconnected)),
            issued: Mutex::new(Cell::new(0)),
            in_flight: Mutex::new(Cell::new(0)),
            outbound: Channel::new(),
            completion: Signal::new(),
            advertise: Signal::new(),
        }
    }

    /// Record a connection change. Called by the host task only.
    pub fn set_state(&self, state: ConnectionState) {
        self.state.lock(|cell| cell.set(state));
    }

    /// Next chunk the stream wants notified.
    pub async fn next_chunk(&self) -> NusPacket {
        let (seq, packet) = self.outbound.receive().await;
        self.in_flight.lock(|cell| cell.set(seq));
        packet
    }

    /// Report the outcome of the chunk last returned by `next_chunk`.
    pub fn complete(&self, result: Result<(), LinkError>) {
        let seq = self.in_flight.lock(|cell| cell.get());
        self.completion.signal((seq, result));
    }

    fn next_seq(&self) -> u32 {
        self.issued.lock(|cell| {
            let seq = cell.get().wrapping_add(1);
            cell.set(seq);
            seq
        })
    }

    /// Fail chunks forever. Run while no central is connected.
    pub async fn reject_chunks(&self) {
        loop {
            let _ = self.next_chunk().await;
            self.complete(Err(LinkError::Disconnected));
        }
    }

    /// Next advertising request from the application.
    pub async fn advertise_command(&self) -> AdvertiseCommand {
        self.advertise.wait().await
    }
}

impl Default for NusLink {
    fn default() -> Self {
        Self::new()
    }
}

impl BlePeripheral for NusLink {
    type Error = LinkError;

    fn connection_state(&self) -> ConnectionState {
        self.state.lock(|cell| cell.get())
    }

    async fn notify(&self, characteristic: Uuid, data: &[u8]) -> Result<(), LinkError> {
        if characteristic != TX_CHAR_UUID {
            return Err(LinkError::UnknownCharacteristic);
        }
        if data.len() > NUS_MAX_PACKET_SIZE {
            return Err(LinkError::ChunkTooLarge);
        }
        if !self.connection_state().is_connected() {
            return Err(LinkError::Disconnected);
        }

        let packet = NusPacket::from_slice(data).map_err(|_| LinkError::ChunkTooLarge)?;
        let seq = self.next_seq();
        self.outbound.send((seq, packet)).await;
        loop {
            let (done, result) = self.completion.wait().await;
            if done == seq {
                return result;
            }
            log::debug!("dropping stale completion for chunk {}", done);
        }
    }
}

impl Advertiser for NusLink {
    type Error = AdvertiseError;

    fn start_advertising(&self, adv_data: &[u8], scan_data: &[u8]) -> Result<(), AdvertiseError> {
        if self.connection_state().is_connected() {
            return Err(AdvertiseError::Connected);
        }
        let request = AdvertiseRequest {
            adv_data: heapless::Vec::from_slice(adv_data)
                .map_err(|_| AdvertiseError::PayloadTooLong)?,
            scan_data: heapless::Vec::from_slice(scan_data)
                .map_err(|_| AdvertiseError::PayloadTooLong)?,
        };
        self.advertise.signal(AdvertiseCommand::Start(request));
        Ok(())
    }

    fn stop_advertising(&self) {
        self.advertise.signal(AdvertiseCommand::Stop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::FutureExt;

    fn connected_link() -> NusLink {
        let link = NusLink::new();
        link.set_state(ConnectionState::Connected);
        link
    }

    #[test]
    fn test_notify_waits_for_completion() {
        let link = connected_link();
        let mut pending = Box::pin(link.notify(TX_CHAR_UUID, b"abc"));
        assert!(pending.as_mut().now_or_never().is_none());

        let chunk = block_on(link.next_chunk());
        assert_eq!(&chunk[..], b"abc");

        link.complete(Err(LinkError::Notify));
        assert_eq!(block_on(pending), Err(LinkError::Notify));
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let link = connected_link();

        // Writer gives up while its chunk is with the host task
        let mut abandoned = Box::pin(link.notify(TX_CHAR_UUID, b"old"));
        assert!(abandoned.as_mut().now_or_never().is_none());
        assert_eq!(&block_on(link.next_chunk())[..], b"old");
        drop(abandoned);

        let mut current = Box::pin(link.notify(TX_CHAR_UUID, b"new"));
        assert!(current.as_mut().now_or_never().is_none());

        // Late result for the abandoned chunk must not resolve the new one
        link.complete(Ok(()));
        assert!(current.as_mut().now_or_never().is_none());

        assert_eq!(&block_on(link.next_chunk())[..], b"new");
        link.complete(Err(LinkError::Notify));
        assert_eq!(block_on(current), Err(LinkError::Notify));
    }

    #[test]
    fn test_notify_rejected_without_central() {
        let link = NusLink::new();
        assert_eq!(
            block_on(link.notify(TX_CHAR_UUID, b"x")),
            Err(LinkError::Disconnected)
        );
    }

    #[test]
    fn test_notify_checks_characteristic_and_size() {
        let link = connected_link();
        assert_eq!(
            block_on(link.notify(crate::config::nus::RX_CHAR_UUID, b"x")),
            Err(LinkError::UnknownCharacteristic)
        );
        assert_eq!(
            block_on(link.notify(TX_CHAR_UUID, &[0u8; NUS_MAX_PACKET_SIZE + 1])),
            Err(LinkError::ChunkTooLarge)
        );
    }

    #[test]
    fn test_start_advertising_refused_while_connected() {
        let link = connected_link();
        assert_eq!(
            link.start_advertising(b"adv", b"scan"),
            Err(AdvertiseError::Connected)
        );
        assert_eq!(
            NusLink::new().start_advertising(&[0u8; MAX_ADV_DATA + 1], b""),
            Err(AdvertiseError::PayloadTooLong)
        );
    }
}
