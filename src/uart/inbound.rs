//! Inbound path: RX characteristic writes into the receive buffer
//!
//! The BLE stack delivers writes from its own context, concurrently with any
//! pending read. Both sides go through a critical-section mutex held only for
//! the copy, so the producer never waits on a suspended reader.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::nus::RX_CHAR_UUID;
use crate::peripheral::Uuid;
use crate::uart::ring_buffer::RingBuffer;

struct RxInner {
    ring: RingBuffer,
    subscribed: bool,
}

/// Receive side of a stream, shared between the stack and the reader.
///
/// Overflow racing a read resolves in favour of the producer: the lock
/// serialises them, and a reader always sees the post-eviction contents.
pub(crate) struct RxState {
    inner: Mutex<CriticalSectionRawMutex, RefCell<RxInner>>,
}

impl RxState {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(RxInner {
                ring: RingBuffer::new(capacity),
                subscribed: false,
            })),
        }
    }

    /// Run `f` with exclusive access to the ring.
    pub fn with<R>(&self, f: impl FnOnce(&mut RingBuffer) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut().ring))
    }

    pub fn capacity(&self) -> usize {
        self.with(|ring| ring.capacity())
    }

    /// Hand out the producer handle. Only one can exist at a time.
    pub fn subscribe(&self) -> Option<InboundChannel<'_>> {
        let taken = self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            core::mem::replace(&mut inner.subscribed, true)
        });
        if taken {
            None
        } else {
            Some(InboundChannel { rx: self })
        }
    }

    fn unsubscribe(&self) {
        self.inner.lock(|cell| cell.borrow_mut().subscribed = false);
    }
}

/// Producer handle over a stream's receive buffer.
///
/// Give this to whatever handles GATT write events. Dropping it releases
/// the subscription so a new one can be taken.
pub struct InboundChannel<'a> {
    rx: &'a RxState,
}

impl InboundChannel<'_> {
    /// Handle a GATT write event.
    ///
    /// Writes to anything other than the NUS RX characteristic are ignored.
    /// Returns true if the data was accepted.
    pub fn on_write(&self, characteristic: Uuid, data: &[u8]) -> bool {
        if characteristic != RX_CHAR_UUID {
            log::trace!("ignoring write to {}", characteristic);
            return false;
        }
        self.push(data);
        true
    }

    /// Append raw bytes to the receive buffer. Never blocks beyond the copy.
    pub fn push(&self, data: &[u8]) {
        let lost = self.rx.with(|ring| ring.push(data));
        if lost > 0 {
            log::debug!("rx buffer full, dropped {} oldest bytes", lost);
        }
    }
}

impl Drop for InboundChannel<'_> {
    fn drop(&mut self) {
        self.rx.unsubscribe();
    }
}
