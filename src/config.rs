//! Configuration constants and the runtime UART stream configuration

/// UART stream defaults
pub mod uart {
    /// Time to wait for the first byte and between subsequent bytes
    pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

    /// Receive buffer capacity; older bytes are discarded beyond this
    pub const DEFAULT_BUFFER_SIZE: usize = 64;

    /// How often a pending read re-checks the buffer and connection state
    pub const DEFAULT_POLL_INTERVAL_MS: u32 = 10;

    /// Line delimiter used by `read_line`
    pub const LINE_DELIMITER: u8 = b'\n';
}

/// BLE link constants
pub mod ble {
    /// Legacy ATT MTU (23) minus the 3-byte notification header
    pub const LEGACY_CHUNK_SIZE: usize = 20;

    /// Advertised device name prefix, followed by 6 hex digits of the MAC
    pub const DEVICE_NAME_PREFIX: &str = "BLE-UART-";

    /// Maximum legacy advertising payload
    pub const MAX_ADV_DATA: usize = 31;
}

/// Nordic UART Service UUIDs
pub mod nus {
    use crate::peripheral::Uuid;

    pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

    /// Peer writes here (write, write without response)
    pub const RX_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

    /// Server notifies here
    pub const TX_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);
}

/// Runtime configuration for a [`UartStream`](crate::uart::UartStream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// Inter-byte timeout in milliseconds
    pub timeout_ms: u32,
    /// Receive ring capacity in bytes
    pub buffer_size: usize,
    /// Maximum bytes per TX notification
    pub chunk_size: usize,
    /// Poll interval of a pending read in milliseconds
    pub poll_interval_ms: u32,
}

impl UartConfig {
    /// Create a configuration from a timeout in seconds and a buffer size.
    ///
    /// Negative or NaN timeouts are treated as zero.
    pub fn new(timeout_secs: f32, buffer_size: usize) -> Self {
        Self {
            timeout_ms: secs_to_ms(timeout_secs),
            buffer_size,
            ..Self::default()
        }
    }

    /// Override the notification chunk size (clamped to at least one byte).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Override the read poll interval (clamped to at least 1 ms).
    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u32) -> Self {
        self.poll_interval_ms = poll_interval_ms.max(1);
        self
    }
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            timeout_ms: uart::DEFAULT_TIMEOUT_MS,
            buffer_size: uart::DEFAULT_BUFFER_SIZE,
            chunk_size: ble::LEGACY_CHUNK_SIZE,
            poll_interval_ms: uart::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn secs_to_ms(secs: f32) -> u32 {
    // `as` saturates and maps NaN to 0
    (secs * 1000.0) as u32
}
