//! sfdump-linux-spi - Linux spidev support
//!
//! This crate drives an SPI controller through the `/dev/spidevX.Y`
//! character device. The flash chip-select is expected on a separate GPIO
//! line (see `sfdump-linux-gpio`), so by default the controller runs in
//! `SPI_NO_CS` mode.
//!
//! # Example
//!
//! ```no_run
//! use sfdump_core::{SpiBus, SpiConfig};
//! use sfdump_linux_spi::{LinuxSpi, LinuxSpiConfig};
//!
//! let mut spi = LinuxSpi::open(&LinuxSpiConfig::for_bus(0))?;
//! spi.configure(&SpiConfig::new(4_000_000))?;
//! spi.transmit(&[0x03, 0x00, 0x00, 0x00])?;
//! let data = spi.receive(4096)?;
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - A controller driver that honours `SPI_NO_CS`, or `native_cs=yes`

pub mod device;
pub mod error;

pub use device::{parse_options, spidev_mode, LinuxSpi, LinuxSpiConfig, SPI_NO_CS};
pub use error::{LinuxSpiError, Result};

/// Open a Linux SPI device and return a boxed SpiBus
///
/// This is a convenience function for use in the CLI programmer dispatch.
///
/// # Arguments
///
/// * `spi_bus` - Bus number used when no `dev=` option is given
/// * `options` - Slice of (key, value) pairs from programmer string parsing
pub fn open_linux_spi(
    spi_bus: u32,
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn sfdump_core::SpiBus>, Box<dyn std::error::Error>> {
    let config = parse_options(spi_bus, options)?;
    let spi = LinuxSpi::open(&config)?;
    Ok(Box::new(spi))
}
