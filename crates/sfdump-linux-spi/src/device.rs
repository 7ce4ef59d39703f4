//! Linux SPI device implementation
//!
//! This module provides the `LinuxSpi` struct that implements the `SpiBus`
//! trait using Linux's spidev interface.
//!
//! The chip-select line of the flash is normally wired to a plain GPIO and
//! driven by a separate [`ChipSelect`](sfdump_core::ChipSelect) handle, so
//! the controller is put in `SPI_NO_CS` mode. Every `transmit` and `receive`
//! is its own `SPI_IOC_MESSAGE`.

use crate::error::{LinuxSpiError, Result};

use sfdump_core::{BusError, SpiBus, SpiConfig};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Mode flag: the controller leaves its own chip-select alone
pub const SPI_NO_CS: u8 = 0x40;

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// ioctl number for SPI_IOC_MESSAGE(n)
    ///
    /// `_IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)])`
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

/// Configuration for opening a Linux SPI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// Put the controller in `SPI_NO_CS` mode
    pub no_cs: bool,
}

impl LinuxSpiConfig {
    /// Configuration for the first chip-select of SPI bus `bus`
    pub fn for_bus(bus: u32) -> Self {
        Self::new(format!("/dev/spidev{}.0", bus))
    }

    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            no_cs: true,
        }
    }

    /// Let the controller drive its native chip-select
    pub fn with_native_cs(mut self, native: bool) -> Self {
        self.no_cs = !native;
        self
    }
}

/// Linux SPI master using the spidev interface
pub struct LinuxSpi {
    /// File handle for spidev device
    file: File,
    /// Device path, for messages
    device: String,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Current speed in Hz
    speed_hz: u32,
    no_cs: bool,
}

impl LinuxSpi {
    /// Open a Linux SPI device
    ///
    /// Timing is only applied by [`SpiBus::configure`].
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::InvalidParameter(
                "empty spidev device path".into(),
            ));
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            device: config.device.clone(),
            max_kernel_buf_size,
            speed_hz: 0,
            no_cs: config.no_cs,
        })
    }

    /// Apply mode, word size and clock speed
    pub fn apply(&mut self, config: &SpiConfig) -> Result<()> {
        let fd = self.file.as_raw_fd();

        let mode = spidev_mode(config, self.no_cs);
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| LinuxSpiError::SetModeFailed {
                mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        // Set bits per word (always 8)
        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        let speed = config.baudrate;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| {
                LinuxSpiError::SetSpeedFailed {
                    speed,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }
        self.speed_hz = speed;

        log::info!(
            "linux_spi: Configured {} (mode={}, speed={} kHz{})",
            self.device,
            config.mode(),
            speed / 1000,
            if self.no_cs { ", no CS" } else { "" }
        );
        Ok(())
    }

    /// Current speed setting
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// Largest payload of a single message
    pub fn max_transfer_len(&self) -> usize {
        self.max_kernel_buf_size
    }

    /// Run one single-transfer `SPI_IOC_MESSAGE`
    ///
    /// `keep_cs` asks the controller to leave its own chip-select asserted
    /// after the message; it has no effect in `SPI_NO_CS` mode.
    fn message(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>, keep_cs: bool) -> Result<()> {
        let len = tx.map(<[u8]>::len).or(rx.as_ref().map(|b| b.len())).unwrap_or(0);
        let transfer = SpiIocTransfer {
            tx_buf: tx.map_or(0, |b| b.as_ptr() as u64),
            rx_buf: rx.map_or(0, |b| b.as_mut_ptr() as u64),
            len: u32::try_from(len).map_err(|_| LinuxSpiError::TransferTooLarge(len))?,
            speed_hz: self.speed_hz,
            bits_per_word: 8,
            cs_change: u8::from(keep_cs && !self.no_cs),
            ..Default::default()
        };

        let fd = self.file.as_raw_fd();
        let ret = unsafe {
            libc::ioctl(
                fd,
                ioctl::spi_ioc_message(1),
                &transfer as *const SpiIocTransfer,
            )
        };
        if ret < 0 {
            return Err(LinuxSpiError::TransferFailed {
                len,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(self.max_kernel_buf_size) {
            self.message(Some(chunk), None, true)?;
        }
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let chunk_size = self.max_kernel_buf_size;
        let chunks = buf.len().div_ceil(chunk_size);
        for (i, chunk) in buf.chunks_mut(chunk_size).enumerate() {
            self.message(None, Some(chunk), i + 1 < chunks)?;
        }
        Ok(buf)
    }
}

impl SpiBus for LinuxSpi {
    fn configure(&mut self, config: &SpiConfig) -> std::result::Result<(), BusError> {
        Ok(self.apply(config)?)
    }

    fn transmit(&mut self, data: &[u8]) -> std::result::Result<(), BusError> {
        Ok(self.write(data)?)
    }

    fn receive(&mut self, len: usize) -> std::result::Result<Vec<u8>, BusError> {
        Ok(self.read(len)?)
    }
}

/// spidev mode byte for a bus configuration
pub fn spidev_mode(config: &SpiConfig, no_cs: bool) -> u8 {
    if no_cs {
        config.mode() | SPI_NO_CS
    } else {
        config.mode()
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                log::debug!("linux_spi: Using buffer size {} from sysfs", size);
                return size;
            }
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size > 0 {
        page_size as usize
    } else {
        4096
    }
}

fn parse_bool(key: &str, value: &str) -> std::result::Result<bool, String> {
    match value {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(format!("Invalid {} value: {}", key, value)),
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// `spi_bus` picks the default device `/dev/spidev<spi_bus>.0`.
///
/// # Supported Options
///
/// - `dev=/dev/spidevX.Y` - Device path, overrides the bus number
/// - `bus=N` - SPI bus number
/// - `native_cs=yes|no` - Let the controller toggle its own chip-select
pub fn parse_options(
    spi_bus: u32,
    options: &[(&str, &str)],
) -> std::result::Result<LinuxSpiConfig, String> {
    let mut device: Option<String> = None;
    let mut bus = spi_bus;
    let mut native_cs = false;

    for (key, value) in options {
        match *key {
            "dev" => {
                if value.is_empty() {
                    return Err("Empty dev value".to_string());
                }
                device = Some(value.to_string());
            }
            "bus" => {
                bus = value
                    .parse()
                    .map_err(|_| format!("Invalid bus value: {}", value))?;
            }
            "native_cs" => {
                native_cs = parse_bool(key, value)?;
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    let config = match device {
        Some(device) => LinuxSpiConfig::new(device),
        None => LinuxSpiConfig::for_bus(bus),
    };
    Ok(config.with_native_cs(native_cs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfdump_core::{ClockPhase, ClockPolarity};

    #[test]
    fn test_parse_options_defaults() {
        let config = parse_options(1, &[]).unwrap();
        assert_eq!(config.device, "/dev/spidev1.0");
        assert!(config.no_cs);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(0, &[("bus", "2")]).unwrap();
        assert_eq!(config.device, "/dev/spidev2.0");

        let config = parse_options(0, &[("dev", "/dev/spidev3.1"), ("bus", "2")]).unwrap();
        assert_eq!(config.device, "/dev/spidev3.1");

        let config = parse_options(0, &[("native_cs", "yes")]).unwrap();
        assert!(!config.no_cs);

        assert!(parse_options(0, &[("bus", "x")]).is_err());
        assert!(parse_options(0, &[("native_cs", "maybe")]).is_err());
        assert!(parse_options(0, &[("dev", "")]).is_err());
    }

    #[test]
    fn test_spidev_mode() {
        let config = SpiConfig::new(1_000_000)
            .with_polarity(ClockPolarity::IdleHigh)
            .with_phase(ClockPhase::TrailingEdge);
        assert_eq!(spidev_mode(&config, false), 3);
        assert_eq!(spidev_mode(&config, true), 0x43);
        assert_eq!(spidev_mode(&SpiConfig::default(), true), SPI_NO_CS);
    }

    #[test]
    fn test_ioc_message_number() {
        // _IOW('k', 0, char[32])
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6B00);
        assert_eq!(std::mem::size_of::<SpiIocTransfer>(), ioctl::SPI_IOC_TRANSFER_SIZE);
    }

    #[test]
    fn test_open_missing_device() {
        let err = LinuxSpi::open(&LinuxSpiConfig::new("/nonexistent/spidev9.9"))
            .err()
            .unwrap();
        assert!(matches!(err, LinuxSpiError::OpenFailed { .. }));
    }
}
