//! BLE peripheral collaborator traits
//!
//! The UART stream never talks to a BLE stack directly. It consumes these
//! traits so the trouble-host binding can be swapped with a mock for testing.

use core::fmt;
use core::future::Future;

/// 128-bit GATT UUID
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid(u128);

impl Uuid {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    /// Little-endian byte order, as carried on the air
    pub const fn to_le_bytes(&self) -> [u8; 16] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid({})", self)
    }
}

/// Link state as last reported by the BLE stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl From<bool> for ConnectionState {
    fn from(connected: bool) -> Self {
        if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

/// Abstract BLE peripheral for the UART stream
///
/// Inbound writes are not pulled through this trait: the stack pushes them
/// into the stream's [`InboundChannel`](crate::uart::InboundChannel).
pub trait BlePeripheral {
    /// Transport error reported by `notify`
    type Error;

    /// Current link state. Must be cheap and non-blocking.
    fn connection_state(&self) -> ConnectionState;

    /// Send one notification on `characteristic`.
    ///
    /// `data` never exceeds the configured chunk size.
    fn notify(
        &self,
        characteristic: Uuid,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

impl<T: BlePeripheral + ?Sized> BlePeripheral for &T {
    type Error = T::Error;

    fn connection_state(&self) -> ConnectionState {
        (**self).connection_state()
    }

    fn notify(
        &self,
        characteristic: Uuid,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> {
        (**self).notify(characteristic, data)
    }
}

/// Advertising control, driven by the application
///
/// The stack stops advertising when a central connects. Nothing restarts it
/// on disconnect; the application calls `start_advertising` again.
pub trait Advertiser {
    type Error;

    /// Begin connectable advertising with pre-encoded payloads.
    fn start_advertising(&self, adv_data: &[u8], scan_data: &[u8]) -> Result<(), Self::Error>;

    /// Cancel a pending advertisement. No effect while connected.
    fn stop_advertising(&self);
}

#[cfg(test)]
pub mod mock {
    //! Mock BLE peripheral for testing

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::vec::Vec;

    /// Error returned by the mock's `notify`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockLinkError {
        Rejected,
    }

    /// Advertising payloads captured by the mock
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct MockAdvertisement {
        pub adv_data: Vec<u8>,
        pub scan_data: Vec<u8>,
    }

    /// Mock peripheral, shareable across threads so tests can flip the
    /// link state while a read is pending
    pub struct MockPeripheral {
        connected: AtomicBool,
        /// Every notify call, in order
        notifications: Mutex<Vec<(Uuid, Vec<u8>)>>,
        /// Fail the notify call with this index (0-based, counted per mock)
        fail_at: Mutex<Option<usize>>,
        advertisement: Mutex<Option<MockAdvertisement>>,
    }

    impl MockPeripheral {
        pub fn new() -> Self {
            Self {
                connected: AtomicBool::new(false),
                notifications: Mutex::new(Vec::new()),
                fail_at: Mutex::new(None),
                advertisement: Mutex::new(None),
            }
        }

        pub fn connected() -> Self {
            let mock = Self::new();
            mock.set_connected(true);
            mock
        }

        pub fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
            if connected {
                // Stack behaviour: a connection ends advertising
                *self.advertisement.lock().unwrap() = None;
            }
        }

        /// Make the `index`-th notify call fail
        pub fn fail_notify_at(&self, index: usize) {
            *self.fail_at.lock().unwrap() = Some(index);
        }

        pub fn notifications(&self) -> Vec<(Uuid, Vec<u8>)> {
            self.notifications.lock().unwrap().clone()
        }

        /// Notified payloads concatenated
        pub fn notified_bytes(&self) -> Vec<u8> {
            self.notifications
                .lock()
                .unwrap()
                .iter()
                .flat_map(|(_, data)| data.iter().copied())
                .collect()
        }

        pub fn advertisement(&self) -> Option<MockAdvertisement> {
            self.advertisement.lock().unwrap().clone()
        }
    }

    impl Default for MockPeripheral {
        fn default() -> Self {
            Self::new()
        }
    }

    impl BlePeripheral for MockPeripheral {
        type Error = MockLinkError;

        fn connection_state(&self) -> ConnectionState {
            self.connected.load(Ordering::SeqCst).into()
        }

        async fn notify(&self, characteristic: Uuid, data: &[u8]) -> Result<(), MockLinkError> {
            let mut notifications = self.notifications.lock().unwrap();
            let mut fail_at = self.fail_at.lock().unwrap();
            if *fail_at == Some(notifications.len()) {
                *fail_at = None;
                return Err(MockLinkError::Rejected);
            }
            notifications.push((characteristic, data.to_vec()));
            Ok(())
        }
    }

    impl Advertiser for MockPeripheral {
        type Error = ();

        fn start_advertising(&self, adv_data: &[u8], scan_data: &[u8]) -> Result<(), ()> {
            if self.connected.load(Ordering::SeqCst) {
                return Err(());
            }
            *self.advertisement.lock().unwrap() = Some(MockAdvertisement {
                adv_data: adv_data.to_vec(),
                scan_data: scan_data.to_vec(),
            });
            Ok(())
        }

        fn stop_advertising(&self) {
            *self.advertisement.lock().unwrap() = None;
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::config::nus::TX_CHAR_UUID;

        #[test]
        fn test_mock_notify_records() {
            let mock = MockPeripheral::connected();

            futures::executor::block_on(async {
                mock.notify(TX_CHAR_UUID, &[0x01, 0x02]).await.unwrap();
                mock.notify(TX_CHAR_UUID, &[0x03]).await.unwrap();
            });

            assert_eq!(mock.notifications().len(), 2);
            assert_eq!(mock.notified_bytes(), vec![0x01, 0x02, 0x03]);
        }

        #[test]
        fn test_mock_notify_failure_is_one_shot() {
            let mock = MockPeripheral::connected();
            mock.fail_notify_at(0);

            futures::executor::block_on(async {
                assert_eq!(
                    mock.notify(TX_CHAR_UUID, &[0x01]).await,
                    Err(MockLinkError::Rejected)
                );
                mock.notify(TX_CHAR_UUID, &[0x02]).await.unwrap();
            });

            assert_eq!(mock.notified_bytes(), vec![0x02]);
        }

        #[test]
        fn test_connection_stops_advertising() {
            let mock = MockPeripheral::new();
            mock.start_advertising(&[0x02, 0x01, 0x06], &[]).unwrap();
            assert!(mock.advertisement().is_some());

            mock.set_connected(true);
            assert!(mock.advertisement().is_none());

            // Disconnect does not resume advertising
            mock.set_connected(false);
            assert!(mock.advertisement().is_none());
        }
    }
}
