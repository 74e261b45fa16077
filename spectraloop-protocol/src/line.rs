//! Line assembly for the serial link
//!
//! Bytes arrive from the UART in arbitrary chunks. The assembler collects
//! printable ASCII until a `\n`, drops `\r`, and hands back the trimmed
//! line. Lines longer than [`MAX_LINE_LEN`] are discarded up to the next
//! newline so a runaway sender cannot wedge the parser.

use heapless::String;

/// Maximum accepted line length (excluding the terminator)
pub const MAX_LINE_LEN: usize = 64;

/// A complete, trimmed, non-empty line
pub type Line = String<MAX_LINE_LEN>;

/// Errors that can occur while assembling lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Line exceeded the maximum length; the rest of it is discarded
    Overflow,
    /// Non-printable byte received (ignored)
    InvalidByte(u8),
}

/// State machine for assembling incoming lines
#[derive(Debug, Clone, Default)]
pub struct LineAssembler {
    buffer: Line,
    /// Set after an overflow until the next newline
    discarding: bool,
}

impl LineAssembler {
    /// Create a new line assembler
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            discarding: false,
        }
    }

    /// Reset the assembler state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    /// Feed a single byte to the assembler
    ///
    /// Returns `Ok(Some(line))` when a complete non-empty line is available,
    /// `Ok(None)` when more bytes are needed, or `Err` on a framing problem.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Line>, LineError> {
        match byte {
            b'\n' => {
                if self.discarding {
                    self.reset();
                    return Ok(None);
                }

                let trimmed = self.buffer.trim();
                let line = if trimmed.is_empty() {
                    None
                } else {
                    // Trimmed text is never longer than the buffer it came from
                    String::try_from(trimmed).ok()
                };
                self.buffer.clear();
                Ok(line)
            }
            b'\r' => Ok(None),
            0x20..=0x7E => {
                if self.discarding {
                    return Ok(None);
                }
                if self.buffer.push(byte as char).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(LineError::Overflow);
                }
                Ok(None)
            }
            other => Err(LineError::InvalidByte(other)),
        }
    }
}
