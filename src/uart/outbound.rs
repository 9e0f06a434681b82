//! Outbound path: payload fragmentation into TX notifications

use core::fmt;

use crate::config::nus::TX_CHAR_UUID;
use crate::peripheral::BlePeripheral;

/// Errors returned by a stream write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError<E> {
    /// No central is connected. Nothing was sent.
    NotConnected,
    /// A notification failed. The first `sent` bytes were already
    /// delivered and are not rolled back.
    Link { error: E, sent: usize },
}

impl<E: fmt::Debug> fmt::Display for UartError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UartError::NotConnected => write!(f, "not connected"),
            UartError::Link { error, sent } => {
                write!(f, "link error after {} bytes: {:?}", sent, error)
            }
        }
    }
}

/// Splits payloads into chunks of at most `chunk_size` bytes and notifies
/// each one on the NUS TX characteristic.
///
/// Chunk boundaries carry no meaning; this is a byte pipe, not a message
/// protocol.
#[derive(Debug, Clone, Copy)]
pub struct OutboundSink {
    chunk_size: usize,
}

impl OutboundSink {
    /// Create a sink. A zero chunk size is treated as one.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Send `payload` as consecutive notifications, in order.
    ///
    /// Fails fast with `NotConnected` before any chunk is sent. A transport
    /// failure stops the write and reports how many bytes went out. No
    /// retries.
    pub async fn send<P: BlePeripheral>(
        &self,
        peripheral: &P,
        payload: &[u8],
    ) -> Result<(), UartError<P::Error>> {
        if !peripheral.connection_state().is_connected() {
            log::debug!("tx dropped, not connected ({} bytes)", payload.len());
            return Err(UartError::NotConnected);
        }

        let mut sent = 0;
        for chunk in payload.chunks(self.chunk_size) {
            if let Err(error) = peripheral.notify(TX_CHAR_UUID, chunk).await {
                log::warn!("tx notify failed after {} of {} bytes", sent, payload.len());
                return Err(UartError::Link { error, sent });
            }
            sent += chunk.len();
        }

        log::trace!("tx {} bytes", sent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::traits::mock::{MockLinkError, MockPeripheral};

    #[test]
    fn test_splits_45_into_20_20_5() {
        let mock = MockPeripheral::connected();
        let sink = OutboundSink::new(20);
        let payload: std::vec::Vec<u8> = (0..45).collect();

        futures::executor::block_on(sink.send(&mock, &payload)).unwrap();

        let sizes: std::vec::Vec<usize> = mock
            .notifications()
            .iter()
            .map(|(_, data)| data.len())
            .collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_eq!(mock.notified_bytes(), payload);
        assert!(mock
            .notifications()
            .iter()
            .all(|(uuid, _)| *uuid == TX_CHAR_UUID));
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let mock = MockPeripheral::connected();
        let sink = OutboundSink::new(4);

        futures::executor::block_on(sink.send(&mock, &[0u8; 8])).unwrap();

        assert_eq!(mock.notifications().len(), 2);
    }

    #[test]
    fn test_empty_payload_sends_nothing() {
        let mock = MockPeripheral::connected();
        let sink = OutboundSink::new(20);

        futures::executor::block_on(sink.send(&mock, &[])).unwrap();

        assert!(mock.notifications().is_empty());
    }

    #[test]
    fn test_not_connected_sends_nothing() {
        let mock = MockPeripheral::new();
        let sink = OutboundSink::new(20);

        let result = futures::executor::block_on(sink.send(&mock, b"hello"));

        assert_eq!(result, Err(UartError::NotConnected));
        assert!(mock.notifications().is_empty());
    }

    #[test]
    fn test_link_error_reports_partial_send() {
        let mock = MockPeripheral::connected();
        mock.fail_notify_at(2);
        let sink = OutboundSink::new(10);

        let result = futures::executor::block_on(sink.send(&mock, &[0xAB; 35]));

        assert_eq!(
            result,
            Err(UartError::Link {
                error: MockLinkError::Rejected,
                sent: 20
            })
        );
        assert_eq!(mock.notified_bytes().len(), 20);
    }

    #[test]
    fn test_zero_chunk_size_clamped() {
        let sink = OutboundSink::new(0);
        assert_eq!(sink.chunk_size(), 1);
    }

    #[test]
    fn test_error_display() {
        let err: UartError<MockLinkError> = UartError::Link {
            error: MockLinkError::Rejected,
            sent: 40,
        };
        assert_eq!(
            std::format!("{}", err),
            "link error after 40 bytes: Rejected"
        );
        assert_eq!(
            std::format!("{}", UartError::<MockLinkError>::NotConnected),
            "not connected"
        );
    }
}
