//! Bus capability traits and SPI timing configuration
//!
//! This module defines the two driver handles the dump engine talks to: an
//! SPI master and the GPIO line used as chip-select.

mod config;
mod traits;

pub use config::{ClockPhase, ClockPolarity, SpiConfig, DEFAULT_BAUDRATE};
pub use traits::*;
