#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use embassy_time::Delay;
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;
use static_cell::StaticCell;

use ble_uart::ble::advertising::{nus_advertisement, AdvertisementPayload};
use ble_uart::ble::name::{format_device_name, DEVICE_NAME_LEN};
use ble_uart::ble::NusLink;
use ble_uart::tasks::{nus_task, run_echo};
use ble_uart::{InboundChannel, UartConfig, UartStream};

/// Stream type served by this firmware
type Stream = UartStream<&'static NusLink, Delay>;

/// Type alias for the BLE controller
type BleController = trouble_host::prelude::ExternalController<
    esp_radio::ble::controller::BleConnector<'static>,
    10,
>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

/// Link between the UART stream and the BLE host task
static LINK: NusLink = NusLink::new();

static STREAM: StaticCell<Stream> = StaticCell::new();

static DEVICE_NAME: StaticCell<[u8; DEVICE_NAME_LEN]> = StaticCell::new();

#[esp_hal::main]
fn main() -> ! {
    // Initialise heap allocator (BLE and the receive buffer live here)
    esp_alloc::heap_allocator!(size: 64 * 1024);

    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Unique device ID from eFuse MAC address (last 3 bytes)
    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    let device_id: [u8; 3] = [mac[3], mac[4], mac[5]];

    // Initialise esp-radio for BLE support (must be after esp_rtos::start)
    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialize esp-radio")
    );

    // Create BLE connector (ownership is passed to ExternalController)
    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    ).expect("Failed to initialize BLE connector");

    // Wrap in ExternalController for trouble-host compatibility
    let controller: BleController =
        trouble_host::prelude::ExternalController::new(ble_connector);

    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, controller, device_id));
    })
}

#[embassy_executor::task]
async fn async_main(spawner: Spawner, controller: BleController, device_id: [u8; 3]) {
    let name_buf = DEVICE_NAME.init([0u8; DEVICE_NAME_LEN]);
    let device_name: &'static str = format_device_name(name_buf, &device_id);

    let advertisement = match nus_advertisement(device_name) {
        Ok(a) => a,
        Err(e) => {
            log::error!("advertisement does not fit: {:?}", e);
            return;
        }
    };

    let stream: &'static Stream = STREAM.init(UartStream::new(UartConfig::default(), &LINK, Delay));
    let Some(inbound) = stream.subscribe() else {
        return;
    };

    // Random static address derived from the device ID
    let address = [device_id[0], device_id[1], device_id[2], 0x1E, 0x83, 0xE7];

    spawner.must_spawn(ble_host_task(controller, device_name, address, inbound));
    spawner.must_spawn(echo_task(stream, advertisement));
}

/// Task that runs the BLE host stack
#[embassy_executor::task]
async fn ble_host_task(
    controller: BleController,
    device_name: &'static str,
    address: [u8; 6],
    inbound: InboundChannel<'static>,
) {
    nus_task(controller, device_name, address, &LINK, inbound).await;
}

/// Task that echoes everything received back to the central
#[embassy_executor::task]
async fn echo_task(stream: &'static Stream, advertisement: AdvertisementPayload) {
    run_echo(
        stream,
        &LINK,
        &advertisement.adv_data,
        &advertisement.scan_data,
        Delay,
    )
    .await;
}
