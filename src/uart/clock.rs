//! Monotonic time for the read timeout
//!
//! The read loop sleeps through [`DelayNs`](embedded_hal_async::delay::DelayNs)
//! but measures idle time from a clock, so a late wakeup does not stretch
//! the timeout.

/// Millisecond monotonic clock
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin. Never goes backwards.
    fn now_ms(&self) -> u64;
}

#[cfg(feature = "embedded")]
impl Clock for embassy_time::Delay {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}
