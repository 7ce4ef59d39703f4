//! Options file and option merging
//!
//! Dump options come from three places, in increasing priority: built-in
//! defaults, an optional TOML options file and the command line.
//!
//! ```toml
//! spi_bus = 1
//! cs_pin = 25
//! dumpfile = "flash.bin"
//! sectors = 0x800
//! spi_baudrate = "0x7A1200"
//! spi_polarity = 0
//! spi_phase = 0
//! sector_size = 4096
//! ```

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use sfdump_core::{partial_path, ClockPhase, ClockPolarity, DumpError, DumpRequest, SpiConfig};
use thiserror::Error;

use crate::cli::{parse_hex_u32, DumpArgs};

/// Errors while assembling the dump options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Options file could not be read
    #[error("failed to read options file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Options file is not valid
    #[error("invalid options file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// No output path anywhere
    #[error("no dump file given, use --dumpfile or set dumpfile in the options file")]
    MissingDumpFile,

    /// Dump file cannot be created
    #[error("dump file {} is not writable: {source}", path.display())]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Options rejected while building the request
    #[error(transparent)]
    Dump(#[from] DumpError),
}

/// Contents of an options file
#[derive(Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsFile {
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub spi_bus: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub cs_pin: Option<u32>,
    pub dumpfile: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub sectors: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub start_sector: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub spi_baudrate: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub spi_polarity: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub spi_phase: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub sector_size: Option<u32>,
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(Some(n)),
        HexOrInt::Str(s) => parse_hex_u32(s.trim())
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl OptionsFile {
    /// Parse options from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load an options file from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let options = Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::debug!("Loaded options from {}", path.display());
        Ok(options)
    }
}

fn polarity(value: u32) -> Result<ClockPolarity, DumpError> {
    let bit = u8::try_from(value).map_err(|_| {
        DumpError::InvalidConfig(format!("clock polarity must be 0 or 1, got {}", value))
    })?;
    ClockPolarity::try_from(bit)
}

fn phase(value: u32) -> Result<ClockPhase, DumpError> {
    let bit = u8::try_from(value).map_err(|_| {
        DumpError::InvalidConfig(format!("clock phase must be 0 or 1, got {}", value))
    })?;
    ClockPhase::try_from(bit)
}

/// Merge command line and file options into a validated request
pub fn resolve(args: &DumpArgs, file: &OptionsFile) -> Result<DumpRequest, ConfigError> {
    let output = args
        .dumpfile
        .clone()
        .or_else(|| file.dumpfile.clone())
        .ok_or(ConfigError::MissingDumpFile)?;

    let mut builder = DumpRequest::builder(output);
    let mut spi = SpiConfig::default();

    if let Some(bus) = args.spi_bus.or(file.spi_bus) {
        builder = builder.with_spi_bus(bus);
    }
    if let Some(pin) = args.cs_pin.or(file.cs_pin) {
        builder = builder.with_cs_pin(pin);
    }
    if let Some(sectors) = args.sectors.or(file.sectors) {
        builder = builder.with_sectors(sectors);
    }
    if let Some(start) = args.start_sector.or(file.start_sector) {
        builder = builder.with_start_sector(start);
    }
    if let Some(size) = args.sector_size.or(file.sector_size) {
        builder = builder.with_sector_size(size);
    }
    if let Some(baudrate) = args.spi_baudrate.or(file.spi_baudrate) {
        spi.baudrate = baudrate;
    }
    if let Some(value) = args.spi_polarity.map(u32::from).or(file.spi_polarity) {
        spi = spi.with_polarity(polarity(value)?);
    }
    if let Some(value) = args.spi_phase.map(u32::from).or(file.spi_phase) {
        spi = spi.with_phase(phase(value)?);
    }

    Ok(builder.with_spi_config(spi).build()?)
}

/// Check that the dump file can be created before any flash access
///
/// Creates and removes the same temporary sibling the final write uses, so
/// a missing or read-only directory is caught up front.
pub fn check_output(path: &Path) -> Result<(), ConfigError> {
    let not_writable = |source: io::Error| ConfigError::OutputNotWritable {
        path: path.to_path_buf(),
        source,
    };

    if path.is_dir() {
        return Err(not_writable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path is a directory",
        )));
    }
    let tmp_path = partial_path(path).ok_or_else(|| {
        not_writable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path does not name a file",
        ))
    })?;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(not_writable)?;
    if let Err(e) = fs::remove_file(&tmp_path) {
        log::warn!("Could not remove {}: {}", tmp_path.display(), e);
    }
    Ok(())
}
