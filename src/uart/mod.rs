//! UART-over-BLE stream core
//!
//! Buffers bytes written by the peer to the NUS RX characteristic and
//! fragments outgoing bytes into TX notifications.

pub mod clock;
pub mod inbound;
pub mod io;
pub mod outbound;
pub mod ring_buffer;
pub mod stream;

pub use clock::Clock;
pub use inbound::InboundChannel;
pub use io::StreamIoError;
pub use outbound::{OutboundSink, UartError};
pub use ring_buffer::RingBuffer;
pub use stream::UartStream;
