//! Integration tests for the BLE UART echo firmware.
//!
//! Run after flashing the firmware. Connects over BLE, sends bytes to the
//! NUS RX characteristic and checks they come back on TX.

mod ble_client;

use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use colored::Colorize;

use ble_client::{BleClient, LEGACY_CHUNK_SIZE};

/// The firmware echoes after a 1 s pause in incoming bytes
const ECHO_WAIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Integration tests for the BLE UART echo firmware")]
struct Args {
    /// BLE device name (e.g. "BLE-UART-AABBCC")
    #[arg(long)]
    ble_name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let scan_timeout = Duration::from_secs(args.scan_timeout);

    println!("{}", "BLE UART Integration Tests".bold());
    println!("Device: BLE (scanning for \"{}\")", args.ble_name);
    println!();

    println!("Scanning for \"{}\"...", args.ble_name);
    let mut device = BleClient::connect_by_name(&args.ble_name, scan_timeout).await?;
    println!("{}", "  Connected!".green());
    device.clear_buffer().await;

    println!("\n{}", "Running tests...".bold());
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut report = |name: &str, result: anyhow::Result<()>| {
        print!("  {} ... ", name);
        match result {
            Ok(()) => {
                println!("{}", "PASS".green().bold());
                passed += 1;
            }
            Err(e) => {
                println!("{}", "FAIL".red().bold());
                println!("    {}", e.to_string().red());
                failed += 1;
            }
        }
    };

    report("Test 1: Short echo", test_short_echo(&device).await);
    report("Test 2: Fragmented echo", test_fragmented_echo(&device).await);

    // Reconnect: firmware must advertise again after a disconnect
    let reconnect = async {
        device.disconnect().await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        device = BleClient::connect_by_name(&args.ble_name, scan_timeout).await?;
        test_short_echo(&device).await
    }
    .await;
    report("Test 3: Echo after reconnect", reconnect);

    let _ = device.disconnect().await;

    println!("\n{}", "=".repeat(60));
    println!("{}", "Test Results".bold());
    println!("{}", "=".repeat(60));
    println!(
        "  Total: {} passed, {} failed",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    println!("{}", "=".repeat(60));

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Test: a few bytes come back unchanged.
async fn test_short_echo(device: &BleClient) -> anyhow::Result<()> {
    let payload = b"hello\n";
    device.send(payload).await?;

    let echoed: Vec<u8> = device.receive(payload.len(), ECHO_WAIT).await?.concat();
    if echoed != payload {
        bail!("Echo mismatch: sent {:?}, got {:?}", payload, echoed);
    }
    Ok(())
}

/// Test: 45 bytes come back as notifications of at most 20 bytes.
async fn test_fragmented_echo(device: &BleClient) -> anyhow::Result<()> {
    let payload: Vec<u8> = (0..45u8).map(|i| b'a' + (i % 26)).collect();
    device.send(&payload).await?;

    let notifications = device.receive(payload.len(), ECHO_WAIT).await?;
    if let Some(big) = notifications.iter().find(|n| n.len() > LEGACY_CHUNK_SIZE) {
        bail!("Notification of {} bytes exceeds chunk size", big.len());
    }

    let echoed = notifications.concat();
    if echoed != payload {
        bail!("Echo mismatch: sent {} bytes, got {} bytes", payload.len(), echoed.len());
    }
    Ok(())
}
