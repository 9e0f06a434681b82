//! BLE host task for the UART stream
//!
//! Owns the TrouBLE stack and the GATT connection. RX writes are pushed into
//! the stream's inbound channel; TX chunks handed over by [`NusLink`] are
//! sent as notifications.

use embassy_futures::select::{select, select3, Either, Either3};
use trouble_host::prelude::*;

use crate::ble::link::{AdvertiseCommand, AdvertiseRequest, LinkError, NusLink};
use crate::ble::service::NusServer;
use crate::config::nus::RX_CHAR_UUID;
use crate::peripheral::ConnectionState;
use crate::uart::InboundChannel;

/// Number of maximum concurrent connections
const CONNECTIONS_MAX: usize = 1;
/// Number of L2CAP channels
const L2CAP_CHANNELS_MAX: usize = 3;

/// Main BLE task that manages the Bluetooth stack and connections
///
/// This task:
/// 1. Waits for the application to request advertising
/// 2. Advertises until a central connects or advertising is stopped
/// 3. Routes RX writes into `inbound`
/// 4. Sends TX chunks from `link` as notifications
/// 5. Marks the link disconnected and waits for the next request
pub async fn nus_task<C: Controller>(
    controller: C,
    device_name: &str,
    address: [u8; 6],
    link: &NusLink,
    inbound: InboundChannel<'_>,
) {
    log::info!("BLE: starting as '{}'", device_name);

    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();

    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(Address::random(address));

    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let gap = GapConfig::Peripheral(PeripheralConfig {
        name: device_name,
        appearance: &appearance::UNKNOWN,
    });
    let server: NusServer = match NusServer::new_with_config(gap) {
        Ok(s) => s,
        Err(_) => {
            log::warn!("BLE: GATT server setup failed");
            return;
        }
    };

    let runner_task = runner.run();

    let peripheral_task = async {
        let mut pending: Option<AdvertiseRequest> = None;

        loop {
            // Idle until the application asks to advertise
            let request = match pending.take() {
                Some(request) => request,
                None => match select(link.advertise_command(), link.reject_chunks()).await {
                    Either::First(AdvertiseCommand::Start(request)) => request,
                    Either::First(AdvertiseCommand::Stop) | Either::Second(()) => continue,
                },
            };

            log::debug!("BLE: advertising");
            let advertiser = match peripheral
                .advertise(
                    &Default::default(),
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &request.adv_data,
                        scan_data: &request.scan_data,
                    },
                )
                .await
            {
                Ok(a) => a,
                Err(_) => {
                    log::warn!("BLE: advertise failed");
                    continue;
                }
            };

            // Dropping the advertiser ends advertising
            let acceptor = match select3(
                advertiser.accept(),
                link.advertise_command(),
                link.reject_chunks(),
            )
            .await
            {
                Either3::First(Ok(a)) => a,
                Either3::First(Err(_)) => continue,
                Either3::Second(AdvertiseCommand::Start(request)) => {
                    pending = Some(request);
                    continue;
                }
                Either3::Second(AdvertiseCommand::Stop) => {
                    log::debug!("BLE: advertising stopped");
                    continue;
                }
                Either3::Third(()) => continue,
            };

            let conn = match acceptor.with_attribute_server(&*server) {
                Ok(c) => c,
                Err(_) => continue,
            };

            link.set_state(ConnectionState::Connected);
            log::info!("BLE: connected");

            loop {
                match select(conn.next(), link.next_chunk()).await {
                    Either::First(GattConnectionEvent::Disconnected { reason: _ }) => break,
                    Either::First(GattConnectionEvent::Gatt { event }) => match event {
                        GattEvent::Write(write_event) => {
                            if write_event.handle() == server.nus.rx.handle {
                                inbound.on_write(RX_CHAR_UUID, write_event.data());
                            }
                            let _ = write_event.accept();
                        }
                        GattEvent::Read(read_event) => {
                            let _ = read_event.accept();
                        }
                        GattEvent::Other(other_event) => {
                            let _ = other_event.accept();
                        }
                    },
                    Either::First(_) => {}
                    Either::Second(chunk) => {
                        let result = server
                            .nus
                            .tx
                            .notify(&conn, &chunk)
                            .await
                            .map_err(|_| LinkError::Notify);
                        link.complete(result);
                    }
                }
            }

            link.set_state(ConnectionState::Disconnected);
            log::info!("BLE: disconnected");
        }
    };

    select(runner_task, peripheral_task).await;
}
