//! Host UART transmit task

use core::fmt::Write as _;

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;
use heapless::String;

use crate::channels::OUTBOUND;

/// Longest rendered response (the status block)
const TX_LINE_SIZE: usize = 1024;

#[embassy_executor::task]
pub async fn serial_tx_task(mut tx: BufferedUartTx) {
    info!("Serial TX task started");

    let mut text: String<TX_LINE_SIZE> = String::new();

    loop {
        let response = OUTBOUND.receive().await;

        text.clear();
        if write!(text, "{}\r\n", response).is_err() {
            warn!("Response does not fit the TX buffer, dropped");
            continue;
        }
        if let Err(e) = tx.write_all(text.as_bytes()).await {
            warn!("UART write error: {:?}", e);
        }
    }
}
