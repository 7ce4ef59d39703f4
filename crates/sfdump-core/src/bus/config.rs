//! SPI clock configuration

use crate::error::DumpError;

/// Clock polarity (CPOL)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClockPolarity {
    /// Clock idles low (CPOL=0)
    #[default]
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// Clock phase (CPHA)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClockPhase {
    /// Data sampled on the leading clock edge (CPHA=0)
    #[default]
    LeadingEdge,
    /// Data sampled on the trailing clock edge (CPHA=1)
    TrailingEdge,
}

impl TryFrom<u8> for ClockPolarity {
    type Error = DumpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::IdleLow),
            1 => Ok(Self::IdleHigh),
            _ => Err(DumpError::InvalidConfig(format!(
                "SPI polarity must be 0 or 1, got {}",
                value
            ))),
        }
    }
}

impl TryFrom<u8> for ClockPhase {
    type Error = DumpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::LeadingEdge),
            1 => Ok(Self::TrailingEdge),
            _ => Err(DumpError::InvalidConfig(format!(
                "SPI phase must be 0 or 1, got {}",
                value
            ))),
        }
    }
}

/// Default SPI clock frequency in Hz (1 MHz)
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;

/// Timing parameters applied to the SPI master before the first transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub baudrate: u32,
    /// Clock polarity
    pub polarity: ClockPolarity,
    /// Clock phase
    pub phase: ClockPhase,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BAUDRATE)
    }
}

impl SpiConfig {
    /// Mode 0 configuration at the given frequency
    pub fn new(baudrate: u32) -> Self {
        Self {
            baudrate,
            polarity: ClockPolarity::IdleLow,
            phase: ClockPhase::LeadingEdge,
        }
    }

    /// Set the clock polarity
    pub fn with_polarity(mut self, polarity: ClockPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Set the clock phase
    pub fn with_phase(mut self, phase: ClockPhase) -> Self {
        self.phase = phase;
        self
    }

    /// SPI mode number (0-3), `CPOL << 1 | CPHA`
    pub fn mode(&self) -> u8 {
        let cpol = match self.polarity {
            ClockPolarity::IdleLow => 0,
            ClockPolarity::IdleHigh => 1,
        };
        let cpha = match self.phase {
            ClockPhase::LeadingEdge => 0,
            ClockPhase::TrailingEdge => 1,
        };
        (cpol << 1) | cpha
    }
}
