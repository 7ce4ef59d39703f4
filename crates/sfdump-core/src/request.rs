//! Validated dump configuration
//!
//! A [`DumpRequest`] is built once from the user's options and never changes
//! afterwards. Construction goes through [`DumpRequestBuilder::build`], which
//! rejects every combination the engine cannot execute, so a `DumpRequest`
//! in hand is always runnable.
//!
//! Note that `sectors` is the exclusive end sector index, not a count: a
//! request with `start_sector = 2, sectors = 8` reads sectors 2 to 7.

use std::path::{Path, PathBuf};

use crate::bus::{SpiConfig, DEFAULT_BAUDRATE};
use crate::error::{DumpError, Result};
use crate::spi::ADDRESS_SPACE;

/// Default flash sector size in bytes
pub const DEFAULT_SECTOR_SIZE: u32 = 0x1000;

/// Default number of sectors (1024 * 4 KiB = 4 MiB)
pub const DEFAULT_SECTORS: u32 = 1024;

/// Immutable, validated parameters of one dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRequest {
    spi_bus: u32,
    cs_pin: u32,
    spi: SpiConfig,
    sector_size: u32,
    sectors: u32,
    start_sector: u32,
    output: PathBuf,
}

impl DumpRequest {
    /// Start building a request that writes to `output`
    pub fn builder(output: impl Into<PathBuf>) -> DumpRequestBuilder {
        DumpRequestBuilder::new(output)
    }

    /// SPI bus identifier
    pub fn spi_bus(&self) -> u32 {
        self.spi_bus
    }

    /// GPIO pin used as chip-select
    pub fn cs_pin(&self) -> u32 {
        self.cs_pin
    }

    /// SPI timing parameters
    pub fn spi_config(&self) -> &SpiConfig {
        &self.spi
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Exclusive end sector index
    pub fn sectors(&self) -> u32 {
        self.sectors
    }

    /// First sector to read
    pub fn start_sector(&self) -> u32 {
        self.start_sector
    }

    /// Output file path
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Byte offset of the first sector read
    pub fn start_address(&self) -> u32 {
        // Fits: bounded by end_address() <= 2^24 at build time
        self.start_sector * self.sector_size
    }

    /// Byte offset one past the last byte read
    pub fn end_address(&self) -> u64 {
        self.sectors as u64 * self.sector_size as u64
    }

    /// Number of sectors this request reads
    pub fn sector_count(&self) -> u32 {
        self.sectors - self.start_sector
    }

    /// Number of bytes this request reads
    pub fn dump_size(&self) -> u64 {
        self.end_address() - self.start_address() as u64
    }
}

/// Builder for [`DumpRequest`]
#[derive(Debug, Clone)]
pub struct DumpRequestBuilder {
    spi_bus: u32,
    cs_pin: u32,
    spi: SpiConfig,
    sector_size: u32,
    sectors: u32,
    start_sector: u32,
    output: PathBuf,
}

impl DumpRequestBuilder {
    /// Create a builder with the default options
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            spi_bus: 0,
            cs_pin: 0,
            spi: SpiConfig::new(DEFAULT_BAUDRATE),
            sector_size: DEFAULT_SECTOR_SIZE,
            sectors: DEFAULT_SECTORS,
            start_sector: 0,
            output: output.into(),
        }
    }

    /// Set the SPI bus identifier
    pub fn with_spi_bus(mut self, bus: u32) -> Self {
        self.spi_bus = bus;
        self
    }

    /// Set the chip-select GPIO pin
    pub fn with_cs_pin(mut self, pin: u32) -> Self {
        self.cs_pin = pin;
        self
    }

    /// Set the SPI timing parameters
    pub fn with_spi_config(mut self, spi: SpiConfig) -> Self {
        self.spi = spi;
        self
    }

    /// Set the sector size in bytes
    pub fn with_sector_size(mut self, sector_size: u32) -> Self {
        self.sector_size = sector_size;
        self
    }

    /// Set the exclusive end sector index
    pub fn with_sectors(mut self, sectors: u32) -> Self {
        self.sectors = sectors;
        self
    }

    /// Set the first sector to read
    pub fn with_start_sector(mut self, start_sector: u32) -> Self {
        self.start_sector = start_sector;
        self
    }

    /// Validate and freeze the request
    pub fn build(self) -> Result<DumpRequest> {
        let request = DumpRequest {
            spi_bus: self.spi_bus,
            cs_pin: self.cs_pin,
            spi: self.spi,
            sector_size: self.sector_size,
            sectors: self.sectors,
            start_sector: self.start_sector,
            output: self.output,
        };
        validate(&request)?;
        Ok(request)
    }
}

/// Check every invariant the engine relies on
pub(crate) fn validate(request: &DumpRequest) -> Result<()> {
    if request.sector_size == 0 {
        return Err(DumpError::InvalidConfig(
            "sector size must be greater than zero".into(),
        ));
    }
    if request.sectors == 0 {
        return Err(DumpError::InvalidConfig(
            "at least one sector must be dumped".into(),
        ));
    }
    if request.spi.baudrate == 0 {
        return Err(DumpError::InvalidConfig(
            "SPI baud rate must be greater than zero".into(),
        ));
    }
    if request.start_sector >= request.sectors {
        return Err(DumpError::InvalidRange {
            start_sector: request.start_sector,
            sectors: request.sectors,
        });
    }
    // Every byte read, not only each sector's start, must be addressable
    let end = request.end_address();
    if end > ADDRESS_SPACE {
        return Err(DumpError::AddressOverflow { addr: ADDRESS_SPACE });
    }
    Ok(())
}
