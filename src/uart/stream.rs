//! UART-like byte stream over a BLE peripheral
//!
//! Reads drain a bounded receive buffer filled by the stack through an
//! [`InboundChannel`]. A read suspends until enough bytes arrive, the link
//! drops, or no new byte has arrived for `timeout`. Each arrival restarts
//! the timeout, so it bounds the gap between bytes rather than the whole
//! read. Idle time is measured with a [`Clock`], not by adding up poll
//! delays.
//!
//! Writes are fragmented into notifications by an [`OutboundSink`].

use alloc::vec;
use alloc::vec::Vec;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::delay::DelayNs;

use crate::config::uart::LINE_DELIMITER;
use crate::config::UartConfig;
use crate::peripheral::BlePeripheral;
use crate::uart::clock::Clock;
use crate::uart::inbound::{InboundChannel, RxState};
use crate::uart::outbound::{OutboundSink, UartError};
use crate::uart::ring_buffer::RingBuffer;

/// Why a pending read stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    Ready,
    TimedOut,
    Disconnected,
}

/// Byte stream over the Nordic UART Service.
///
/// `P` is the BLE peripheral (often a reference, the stream does not need to
/// own it). `D` paces the read poll loop and times the inter-byte timeout.
pub struct UartStream<P, D> {
    config: UartConfig,
    rx: RxState,
    /// Serialises writers so chunks of different payloads never interleave
    tx: Mutex<CriticalSectionRawMutex, OutboundSink>,
    /// Serialises readers; the ring has a single consumer
    reader: Mutex<CriticalSectionRawMutex, D>,
    peripheral: P,
}

impl<P: BlePeripheral, D: DelayNs + Clock> UartStream<P, D> {
    pub fn new(config: UartConfig, peripheral: P, delay: D) -> Self {
        log::debug!(
            "uart stream: timeout {} ms, buffer {} bytes, chunk {} bytes",
            config.timeout_ms,
            config.buffer_size,
            config.chunk_size
        );
        Self {
            config,
            rx: RxState::new(config.buffer_size),
            tx: Mutex::new(OutboundSink::new(config.chunk_size)),
            reader: Mutex::new(delay),
            peripheral,
        }
    }

    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// Take the producer handle for RX writes.
    ///
    /// Returns `None` while another handle is alive.
    pub fn subscribe(&self) -> Option<InboundChannel<'_>> {
        self.rx.subscribe()
    }

    /// True if a central is connected, as reported by the peripheral now.
    pub fn is_connected(&self) -> bool {
        self.peripheral.connection_state().is_connected()
    }

    /// Bytes ready to read without waiting.
    pub fn in_waiting(&self) -> usize {
        self.rx.with(|ring| ring.available())
    }

    /// Discard everything received but not yet read.
    pub fn reset_input_buffer(&self) {
        self.rx.with(|ring| ring.clear());
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns once `buf` can be filled, the link is down, or the inter-byte
    /// timeout expires; whatever is buffered at that point is returned. Zero
    /// is a normal result. A request larger than the buffer capacity returns
    /// as soon as the buffer is full.
    pub async fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }

        let mut delay = self.reader.lock().await;
        let want = buf.len().min(self.rx.capacity());
        let outcome = self
            .wait_until(&mut *delay, |ring| ring.available() >= want)
            .await;

        let n = self.rx.with(|ring| ring.pop_into(buf));
        log::trace!("rx read {} of {} bytes ({:?})", n, buf.len(), outcome);
        n
    }

    /// Read up to `max_bytes` into a new vector.
    pub async fn read_vec(&self, max_bytes: usize) -> Vec<u8> {
        let mut out = vec![0u8; max_bytes];
        let n = self.read(&mut out).await;
        out.truncate(n);
        out
    }

    /// Read one line, including its trailing `\n`.
    ///
    /// On timeout or disconnect the partial line buffered so far is
    /// returned instead. A full buffer with no delimiter is returned as is,
    /// before further arrivals overwrite it.
    pub async fn read_line(&self) -> Vec<u8> {
        let mut delay = self.reader.lock().await;
        let outcome = self
            .wait_until(&mut *delay, |ring| {
                ring.is_full() || ring.find(LINE_DELIMITER).is_some()
            })
            .await;

        // Sized up front so nothing allocates under the lock
        let mut line = vec![0u8; self.rx.capacity()];
        let n = self.rx.with(|ring| {
            let len = ring
                .find(LINE_DELIMITER)
                .map_or(ring.available(), |pos| pos + 1);
            ring.pop_into(&mut line[..len])
        });
        line.truncate(n);
        log::trace!("rx line of {} bytes ({:?})", n, outcome);
        line
    }

    /// Write `payload` as a sequence of TX notifications.
    ///
    /// See [`OutboundSink::send`] for partial-write behaviour.
    pub async fn write(&self, payload: &[u8]) -> Result<(), UartError<P::Error>> {
        let sink = self.tx.lock().await;
        sink.send(&self.peripheral, payload).await
    }

    /// Poll until `ready` holds, the link drops, or no byte has arrived
    /// for `timeout_ms`.
    async fn wait_until(
        &self,
        delay: &mut D,
        mut ready: impl FnMut(&RingBuffer) -> bool,
    ) -> WaitOutcome {
        let timeout = u64::from(self.config.timeout_ms);
        let poll = u64::from(self.config.poll_interval_ms.max(1));

        let mut last_arrivals = self.rx.with(|ring| ring.arrivals());
        let mut idle_since = delay.now_ms();

        loop {
            let (done, arrivals) = self.rx.with(|ring| (ready(ring), ring.arrivals()));
            if done {
                return WaitOutcome::Ready;
            }
            let now = delay.now_ms();
            if arrivals != last_arrivals {
                last_arrivals = arrivals;
                idle_since = now;
            }
            if !self.is_connected() {
                return WaitOutcome::Disconnected;
            }
            let idle = now.saturating_sub(idle_since);
            if idle >= timeout {
                return WaitOutcome::TimedOut;
            }

            // Bounded by poll, which is a u32
            let step = poll.min(timeout - idle) as u32;
            delay.delay_ms(step).await;
        }
    }
}
