//! sfdump-linux-gpio - Linux GPIO chip-select
//!
//! Drives the flash chip-select through a line of a GPIO character device
//! (`/dev/gpiochipN`) using gpiocdev. Used together with
//! `sfdump-linux-spi` in `SPI_NO_CS` mode.
//!
//! # Example
//!
//! ```no_run
//! use sfdump_core::ChipSelect;
//! use sfdump_linux_gpio::{LinuxGpioCs, LinuxGpioCsConfig};
//!
//! let mut cs = LinuxGpioCs::new(LinuxGpioCsConfig::new(25));
//! cs.set_direction_output()?;
//! cs.set_status(false)?;
//! cs.set_status(true)?;
//! # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with GPIO character device support (`CONFIG_GPIO_CDEV`)
//! - Read/write access to `/dev/gpiochipN`

pub mod device;
pub mod error;

pub use device::{parse_options, LinuxGpioCs, LinuxGpioCsConfig, DEFAULT_DEVICE};
pub use error::{LinuxGpioError, Result};

/// Create a boxed chip-select handle for line `cs_pin`
///
/// This is a convenience function for use in the CLI programmer dispatch.
pub fn open_linux_gpio_cs(
    cs_pin: u32,
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn sfdump_core::ChipSelect>, Box<dyn std::error::Error>> {
    let config = parse_options(cs_pin, options)?;
    Ok(Box::new(LinuxGpioCs::new(config)))
}
