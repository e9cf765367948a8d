use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;

use crate::can_link::{CanBusFrame, CanBusRX, CanBusTX, TransferCanId};

use super::messages::response::{ErrorCode, Response};
use super::session::TransferSession;
use super::{Clock, FlashDriver};

/// How often the session timers are serviced when the bus is quiet.
pub const UPDATE_INTERVAL_MS: u64 = 100;

/// Terminal outcomes of a session, signalled so the activator task can
/// decide whether to hand the staged image to the bootloader.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferEvent {
    Completed {
        line_count: u16,
        min_addr: u32,
        max_addr: u32,
    },
    Aborted {
        code: ErrorCode,
    },
}

/// Drives one transfer session against a CAN link.
///
/// Frames are consumed in delivery order; platforms receiving in ISR
/// context queue into their `CanBusRX` implementation and this daemon
/// drains from thread context. Inbound frames are filtered on the low
/// id byte against `device_id`; responses go out under `response_id`.
pub async fn run_daemon<M, R, T, F, C>(
    session: &mut TransferSession<F, C>,
    rx: &mut R,
    tx: &mut T,
    device_id: u8,
    response_id: TransferCanId,
    events: &Signal<M, TransferEvent>,
) where
    M: RawMutex,
    R: CanBusRX,
    T: CanBusTX,
    F: FlashDriver,
    C: Clock,
{
    loop {
        match select(rx.receive(), Timer::after_millis(UPDATE_INTERVAL_MS)).await {
            Either::First(Ok(frame)) => {
                if TransferCanId::from_raw(frame.id()).device_id == device_id {
                    match frame.data().try_into() {
                        Ok(buf) => session.handle_frame(buf),
                        Err(_) => {
                            log_warn!("dropped frame with {} bytes", frame.data().len());
                        }
                    }
                }
            }
            Either::First(Err(e)) => {
                log_error!("failed to receive CAN frame: {:?}", e);
                yield_now().await;
            }
            Either::Second(()) => {}
        }

        if let Some(response) = session.update() {
            match response {
                Response::TransferComplete => {
                    let (_, line_count) = session.progress();
                    let (min_addr, max_addr) = session.image_bounds().unwrap_or((0, 0));
                    events.signal(TransferEvent::Completed {
                        line_count,
                        min_addr,
                        max_addr,
                    });
                }
                Response::Error { code } => {
                    events.signal(TransferEvent::Aborted { code });
                }
                Response::SendLine { .. } => {}
            }

            if let Err(e) = tx.send(response_id.into(), &response.pack()).await {
                log_error!("failed to send response: {:?}", e);
                yield_now().await;
            }
        }
    }
}
