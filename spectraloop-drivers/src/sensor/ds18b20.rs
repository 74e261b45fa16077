//! DS18B20 digital temperature probe
//!
//! One probe per bus, addressed with SKIP ROM. The probe runs at 9-bit
//! resolution (0.5 °C steps), which bounds a conversion to 93.75 ms.
//! Starting and collecting a conversion are separate calls; the caller
//! waits out [`CONVERSION_MS`] in between with its own timer.

use spectraloop_core::traits::SensorError;

use super::onewire::{crc8, OneWireBus, SKIP_ROM};

const CONVERT_T: u8 = 0x44;
const WRITE_SCRATCHPAD: u8 = 0x4E;
const READ_SCRATCHPAD: u8 = 0xBE;

/// Configuration register value for 9-bit resolution
const CONFIG_9BIT: u8 = 0x1F;

/// Alarm registers are unused; keep them at their widest
const ALARM_HIGH: u8 = 0x7F;
const ALARM_LOW: u8 = 0x80;

/// Worst-case conversion time at 9-bit resolution
pub const CONVERSION_MS: u32 = 94;

/// DS18B20 on its own 1-Wire bus
pub struct Ds18b20<B> {
    bus: B,
    /// Resolution written since the device last answered
    configured: bool,
    pending: bool,
}

impl<B: OneWireBus> Ds18b20<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            configured: false,
            pending: false,
        }
    }

    /// Whether the device answered its last reset
    pub fn is_present(&self) -> bool {
        self.configured
    }

    /// Detect the device and set 9-bit resolution
    pub async fn configure(&mut self) -> Result<(), SensorError> {
        self.configured = false;
        self.pending = false;
        self.select().await?;
        self.bus
            .write_bytes(&[WRITE_SCRATCHPAD, ALARM_HIGH, ALARM_LOW, CONFIG_9BIT])
            .await;
        self.configured = true;
        Ok(())
    }

    /// Start a conversion, configuring a device that has just appeared
    pub async fn start_conversion(&mut self) -> Result<(), SensorError> {
        if !self.configured {
            self.configure().await?;
        }
        self.select().await?;
        self.bus.write_bytes(&[CONVERT_T]).await;
        self.pending = true;
        Ok(())
    }

    /// Read back the finished conversion
    pub async fn read_temperature(&mut self) -> Result<f32, SensorError> {
        if !self.pending {
            return Err(SensorError::NotRequested);
        }
        self.pending = false;

        self.select().await?;
        self.bus.write_bytes(&[READ_SCRATCHPAD]).await;
        let mut scratchpad = [0u8; 9];
        self.bus.read_bytes(&mut scratchpad).await;
        decode_scratchpad(&scratchpad)
    }

    /// Reset and address the device
    async fn select(&mut self) -> Result<(), SensorError> {
        if !self.bus.reset().await {
            self.configured = false;
            return Err(SensorError::NotPresent);
        }
        self.bus.write_bytes(&[SKIP_ROM]).await;
        Ok(())
    }
}

/// Check and convert a scratchpad read
///
/// The low five bits of the configuration register always read as ones
/// on a real device, which catches a line that reads all zeros.
pub fn decode_scratchpad(scratchpad: &[u8; 9]) -> Result<f32, SensorError> {
    if crc8(&scratchpad[..8]) != scratchpad[8] {
        return Err(SensorError::Crc);
    }
    if scratchpad[4] & 0x1F != 0x1F {
        return Err(SensorError::Disconnected);
    }

    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    // Bits below the configured resolution are undefined
    let bits = 9 + ((scratchpad[4] >> 5) & 0x03);
    let mask = !((1i16 << (12 - bits)) - 1);
    Ok((raw & mask) as f32 / 16.0)
}
