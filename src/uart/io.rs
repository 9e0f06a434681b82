//! embedded_io_async implementations for [`UartStream`].
//!
//! Lets the stream stand in for a wired UART in code written against the
//! embedded-io traits.

use core::fmt::Debug;

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorType, Read, Write};

use crate::peripheral::BlePeripheral;
use crate::uart::outbound::UartError;
use crate::uart::clock::Clock;
use crate::uart::stream::UartStream;

/// Error type for stream I/O operations.
///
/// `E` is the peripheral's notification error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamIoError<E> {
    /// A read ended with no data
    TimedOut,
    /// No central connected
    NotConnected,
    /// A notification failed after `sent` bytes of the write went out
    Link { error: E, sent: usize },
}

impl<E: Debug> embedded_io::Error for StreamIoError<E> {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            StreamIoError::TimedOut => embedded_io::ErrorKind::TimedOut,
            StreamIoError::NotConnected => embedded_io::ErrorKind::NotConnected,
            StreamIoError::Link { .. } => embedded_io::ErrorKind::Other,
        }
    }
}

impl<E> From<UartError<E>> for StreamIoError<E> {
    fn from(err: UartError<E>) -> Self {
        match err {
            UartError::NotConnected => StreamIoError::NotConnected,
            UartError::Link { error, sent } => StreamIoError::Link { error, sent },
        }
    }
}

impl<P, D> ErrorType for UartStream<P, D>
where
    P: BlePeripheral,
    P::Error: Debug,
    D: DelayNs + Clock,
{
    type Error = StreamIoError<P::Error>;
}

impl<P, D> Read for UartStream<P, D>
where
    P: BlePeripheral,
    P::Error: Debug,
    D: DelayNs + Clock,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        // Ok(0) would mean end of stream, so an empty read is an error here
        match UartStream::read(self, buf).await {
            0 if !self.is_connected() => Err(StreamIoError::NotConnected),
            0 => Err(StreamIoError::TimedOut),
            n => Ok(n),
        }
    }
}

impl<P, D> Write for UartStream<P, D>
where
    P: BlePeripheral,
    P::Error: Debug,
    D: DelayNs + Clock,
{
    /// Writes all of `buf` or fails. A failed notification is never
    /// retried; `StreamIoError::Link::sent` says how much went out first.
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        UartStream::write(self, buf).await?;
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
