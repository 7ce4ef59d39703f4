//! Error types for the Linux GPIO chip-select line

use thiserror::Error;

/// Linux GPIO chip-select errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// Failed to request the GPIO line
    #[error("Failed to request line {line} on {device}: {source}")]
    LineRequestFailed {
        device: String,
        line: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to set GPIO line value
    #[error("Failed to set GPIO line {line}: {source}")]
    SetValueFailed {
        line: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// Line driven before being configured as an output
    #[error("GPIO line {0} is not configured as an output")]
    NotOutput(u32),
}

/// Result type for Linux GPIO operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;
