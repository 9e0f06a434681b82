//! BLE client for the UART echo firmware via Nordic UART Service.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use uuid::Uuid;

const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
const NUS_RX_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
const NUS_TX_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// Largest write that fits a legacy ATT MTU
pub const LEGACY_CHUNK_SIZE: usize = 20;

/// Connected NUS central.
pub struct BleClient {
    peripheral: Peripheral,
    rx_char: Characteristic,
    tx_char: Characteristic,
    /// TX notifications, one message per notification
    notifications: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    forwarder: JoinHandle<()>,
}

impl BleClient {
    /// Scan for a device advertising `name` and connect to its NUS.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let adapter = first_adapter().await?;
        let peripheral = scan_for(&adapter, name, scan_timeout).await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;
        let (rx_char, tx_char) = nus_characteristics(&peripheral)?;
        peripheral.subscribe(&tx_char).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let mut stream = peripheral.notifications().await?;
        let forwarder = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == NUS_TX_UUID && sender.send(notification.value).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            peripheral,
            rx_char,
            tx_char,
            notifications: Mutex::new(receiver),
            forwarder,
        })
    }

    /// Write bytes to RX in legacy-MTU sized pieces.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(LEGACY_CHUNK_SIZE) {
            self.peripheral
                .write(&self.rx_char, chunk, WriteType::WithResponse)
                .await?;
        }
        Ok(())
    }

    /// Collect notifications until they add up to at least `len` bytes.
    pub async fn receive(&self, len: usize, wait: Duration) -> Result<Vec<Vec<u8>>> {
        let mut notifications = self.notifications.lock().await;
        let mut received = Vec::new();
        let mut total = 0;

        let collect = async {
            while total < len {
                let value = notifications
                    .recv()
                    .await
                    .ok_or_else(|| anyhow!("Notification stream closed"))?;
                total += value.len();
                received.push(value);
            }
            Ok::<_, anyhow::Error>(())
        };

        timeout(wait, collect)
            .await
            .map_err(|_| anyhow!("Timeout waiting for {} echoed bytes", len))??;
        Ok(received)
    }

    /// Drop notifications that arrived before the next test.
    pub async fn clear_buffer(&self) {
        let mut notifications = self.notifications.lock().await;
        while notifications.try_recv().is_ok() {}
    }

    /// Unsubscribe and disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        self.forwarder.abort();
        self.peripheral.unsubscribe(&self.tx_char).await?;
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

async fn first_adapter() -> Result<Adapter> {
    Manager::new()
        .await?
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No Bluetooth adapters found"))
}

async fn has_name(adapter: &Adapter, id: &PeripheralId, name: &str) -> Result<Option<Peripheral>> {
    let peripheral = adapter.peripheral(id).await?;
    let local_name = peripheral.properties().await?.and_then(|p| p.local_name);
    Ok((local_name.as_deref() == Some(name)).then_some(peripheral))
}

/// Scan until an advertisement carries `name`.
async fn scan_for(adapter: &Adapter, name: &str, scan_timeout: Duration) -> Result<Peripheral> {
    let mut events = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;

    let found = timeout(scan_timeout, wait_for_name(adapter, &mut events, name)).await;

    adapter.stop_scan().await?;
    found.map_err(|_| anyhow!("Device '{}' not found within timeout", name))?
}

async fn wait_for_name<S>(adapter: &Adapter, events: &mut S, name: &str) -> Result<Peripheral>
where
    S: futures::Stream<Item = CentralEvent> + Unpin,
{
    // Devices the adapter already knows about may not be reported again
    for peripheral in adapter.peripherals().await? {
        if let Some(found) = has_name(adapter, &peripheral.id(), name).await? {
            return Ok(found);
        }
    }
    while let Some(event) = events.next().await {
        if let CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) = event {
            if let Some(found) = has_name(adapter, &id, name).await? {
                return Ok(found);
            }
        }
    }
    Err(anyhow!("Adapter event stream ended"))
}

/// RX and TX characteristics of the NUS service.
fn nus_characteristics(peripheral: &Peripheral) -> Result<(Characteristic, Characteristic)> {
    let service = peripheral
        .services()
        .into_iter()
        .find(|s| s.uuid == NUS_SERVICE_UUID)
        .context("NUS service not found")?;

    let find = |uuid: Uuid, role: &str| {
        service
            .characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .cloned()
            .ok_or_else(|| anyhow!("NUS {} characteristic not found", role))
    };

    Ok((find(NUS_RX_UUID, "RX")?, find(NUS_TX_UUID, "TX")?))
}
