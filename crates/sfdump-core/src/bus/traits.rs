//! Bus trait definitions
//!
//! Backends only need to provide raw byte transfers on the SPI master and a
//! level on the chip-select line. Framing, chip-select sequencing and length
//! checks are done by the dump engine.

use super::SpiConfig;
use crate::error::BusError;

/// SPI master handle
///
/// The chip-select line is not driven by the SPI master: it is a separate
/// [`ChipSelect`] handle so that a transmit and the following receive happen
/// inside one chip-select window.
pub trait SpiBus {
    /// Apply clock frequency, polarity and phase
    fn configure(&mut self, config: &SpiConfig) -> Result<(), BusError>;

    /// Clock `data` out on MOSI, discarding MISO
    fn transmit(&mut self, data: &[u8]) -> Result<(), BusError>;

    /// Clock in up to `len` bytes from MISO
    ///
    /// Returning fewer than `len` bytes (or none at all) is how a bridge
    /// signals a failed or timed-out transfer; callers must check the length.
    fn receive(&mut self, len: usize) -> Result<Vec<u8>, BusError>;
}

/// GPIO line used as (active-low) chip-select
pub trait ChipSelect {
    /// Configure the line as an output
    fn set_direction_output(&mut self) -> Result<(), BusError>;

    /// Drive the line: `true` is high (deasserted), `false` is low (asserted)
    fn set_status(&mut self, high: bool) -> Result<(), BusError>;
}

impl<T: SpiBus + ?Sized> SpiBus for &mut T {
    fn configure(&mut self, config: &SpiConfig) -> Result<(), BusError> {
        (**self).configure(config)
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), BusError> {
        (**self).transmit(data)
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, BusError> {
        (**self).receive(len)
    }
}

// Boxed handles let the CLI pick a backend at runtime
impl<T: SpiBus + ?Sized> SpiBus for Box<T> {
    fn configure(&mut self, config: &SpiConfig) -> Result<(), BusError> {
        (**self).configure(config)
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), BusError> {
        (**self).transmit(data)
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, BusError> {
        (**self).receive(len)
    }
}

impl<T: ChipSelect + ?Sized> ChipSelect for &mut T {
    fn set_direction_output(&mut self) -> Result<(), BusError> {
        (**self).set_direction_output()
    }

    fn set_status(&mut self, high: bool) -> Result<(), BusError> {
        (**self).set_status(high)
    }
}

impl<T: ChipSelect + ?Sized> ChipSelect for Box<T> {
    fn set_direction_output(&mut self) -> Result<(), BusError> {
        (**self).set_direction_output()
    }

    fn set_status(&mut self, high: bool) -> Result<(), BusError> {
        (**self).set_status(high)
    }
}
