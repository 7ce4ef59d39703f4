//! Error types for sfdump-core

use core::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error reported by a bus backend (SPI master or chip-select line)
pub type BusError = Box<dyn std::error::Error + Send + Sync>;

/// Bus operation that was in progress when a backend failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Applying baud rate, polarity and phase to the SPI master
    Configure,
    /// Switching the chip-select line to an idle output
    ChipSelectSetup,
    /// Driving the chip-select line around a sector read
    ChipSelect,
    /// Sending the READ command
    Transmit,
    /// Clocking in the sector payload
    Receive,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure => write!(f, "SPI configure"),
            Self::ChipSelectSetup => write!(f, "chip-select setup"),
            Self::ChipSelect => write!(f, "chip-select"),
            Self::Transmit => write!(f, "SPI transmit"),
            Self::Receive => write!(f, "SPI receive"),
        }
    }
}

/// Errors that abort a flash dump
#[derive(Debug, Error)]
pub enum DumpError {
    /// A request parameter is out of its allowed domain
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The start sector is not below the sector count, nothing would be read
    #[error("start sector {start_sector} must be lower than the sector count {sectors}")]
    InvalidRange {
        /// Requested start sector index
        start_sector: u32,
        /// Requested sector count (exclusive end index)
        sectors: u32,
    },

    /// An address does not fit in the 3-byte address field of READ (0x03)
    #[error("address 0x{addr:X} exceeds the 24-bit address range of the READ command")]
    AddressOverflow {
        /// First byte offset that cannot be addressed
        addr: u64,
    },

    /// The flash returned no data or fewer bytes than requested
    #[error("unexpected error while reading the SPI flash at 0x{addr:06X}: expected {expected} bytes, got {received}")]
    ReadFailure {
        /// Start address of the failing sector
        addr: u32,
        /// Number of bytes requested
        expected: usize,
        /// Number of bytes actually received
        received: usize,
    },

    /// A bus backend reported an error
    #[error("{stage} failed: {source}")]
    Bus {
        /// Operation that failed
        stage: Stage,
        /// Backend error
        #[source]
        source: BusError,
    },

    /// The dump file could not be written
    #[error("failed to write dump file {}: {source}", path.display())]
    IoFailure {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl DumpError {
    /// Wrap a backend error with the operation that produced it
    pub fn bus(stage: Stage, source: BusError) -> Self {
        Self::Bus { stage, source }
    }

    /// Human readable name of the dump phase that failed
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) | Self::InvalidRange { .. } | Self::AddressOverflow { .. } => {
                "validation"
            }
            Self::Bus {
                stage: Stage::Configure | Stage::ChipSelectSetup,
                ..
            } => "bus setup",
            Self::ReadFailure { .. } | Self::Bus { .. } => "flash read",
            Self::IoFailure { .. } => "file write",
        }
    }
}

/// Result type alias using [`DumpError`]
pub type Result<T> = core::result::Result<T, DumpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let err = DumpError::InvalidRange {
            start_sector: 4,
            sectors: 4,
        };
        assert_eq!(err.stage(), "validation");

        let err = DumpError::bus(Stage::Configure, "no such device".into());
        assert_eq!(err.stage(), "bus setup");
        assert_eq!(err.to_string(), "SPI configure failed: no such device");

        let err = DumpError::bus(Stage::ChipSelectSetup, "Permission denied".into());
        assert_eq!(err.stage(), "bus setup");
        assert_eq!(err.to_string(), "chip-select setup failed: Permission denied");

        let err = DumpError::bus(Stage::ChipSelect, "line busy".into());
        assert_eq!(err.stage(), "flash read");

        let err = DumpError::ReadFailure {
            addr: 0x1000,
            expected: 4096,
            received: 0,
        };
        assert_eq!(err.stage(), "flash read");
        assert!(err.to_string().contains("0x001000"));
    }
}
