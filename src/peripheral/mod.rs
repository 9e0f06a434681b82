pub mod traits;

pub use traits::{Advertiser, BlePeripheral, ConnectionState, Uuid};
