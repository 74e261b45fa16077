//! Host UART receive task
//!
//! Assembles bytes into lines and queues them for the control task.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;
use portable_atomic::Ordering;

use spectraloop_protocol::{LineAssembler, LineError};

use crate::channels::{DROPPED_LINES, INBOUND};

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

#[embassy_executor::task]
pub async fn serial_rx_task(mut rx: BufferedUartRx) {
    info!("Serial RX task started");

    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) => {
                for &byte in &buf[..n] {
                    match assembler.feed(byte) {
                        Ok(Some(line)) => {
                            if INBOUND.try_send(line).is_err() {
                                warn!("Inbound queue full, dropping line");
                                DROPPED_LINES.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Ok(None) => {}
                        Err(LineError::Overflow) => {
                            warn!("Line too long, discarded");
                            DROPPED_LINES.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(LineError::InvalidByte(b)) => trace!("Ignoring byte {=u8:#x}", b),
                    }
                }
            }
            Err(e) => warn!("UART read error: {:?}", e),
        }
    }
}
