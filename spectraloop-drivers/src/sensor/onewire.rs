//! 1-Wire bus access
//!
//! Slot timing is left to the bus implementation. On the RP2040 a PIO
//! state machine generates the slots, so a transaction only awaits its
//! FIFO and never holds the CPU for the length of a reset (about 1 ms)
//! or a byte (about 0.6 ms).

/// 1-Wire ROM command addressing the only device on the bus
pub const SKIP_ROM: u8 = 0xCC;

/// Byte-level 1-Wire bus master
#[allow(async_fn_in_trait)]
pub trait OneWireBus {
    /// Issue a reset pulse; `true` if a device answered with a presence pulse
    async fn reset(&mut self) -> bool;

    /// Write bytes, least significant bit first
    async fn write_bytes(&mut self, bytes: &[u8]);

    /// Read bytes into `buf`
    async fn read_bytes(&mut self, buf: &mut [u8]);
}

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected)
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}
