//! Temperature probe and analog input traits

/// Errors that can occur with sensing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// No device answered the presence pulse
    NotPresent,
    /// Device returned its disconnected sentinel
    Disconnected,
    /// Data failed the integrity check
    Crc,
    /// Reading outside the plausible range
    OutOfRange,
    /// Read attempted without a pending conversion
    NotRequested,
    /// Conversion still in progress; try again later
    Busy,
    /// Bus or ADC conversion error
    Bus,
}

/// Trait for digital temperature probes with a split conversion
///
/// A conversion is started with [`request_conversion`](Self::request_conversion)
/// and collected with [`read_celsius`](Self::read_celsius) once the
/// conversion time has elapsed. Neither call may block for the length of
/// the conversion. A probe whose result is not ready yet returns
/// [`SensorError::Busy`] and is asked again on the next poll.
pub trait TemperatureProbe {
    /// Check whether a device answers on this channel
    fn probe(&mut self) -> bool;

    /// Start a temperature conversion
    fn request_conversion(&mut self) -> Result<(), SensorError>;

    /// Read the result of the last conversion in degrees Celsius
    fn read_celsius(&mut self) -> Result<f32, SensorError>;
}

/// Trait for a single analog input channel
pub trait AnalogInput {
    /// Read the raw ADC code
    ///
    /// Takes `&mut self` because ADC reads typically require mutable access.
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}
