//! Chip-select line on a Linux GPIO character device
//!
//! The line is only requested from the kernel when the engine switches it to
//! an output, and it is released when the handle is dropped.

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use sfdump_core::{BusError, ChipSelect};

/// Default GPIO chip
pub const DEFAULT_DEVICE: &str = "/dev/gpiochip0";

/// Configuration of the chip-select line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxGpioCsConfig {
    /// GPIO chip path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Line offset on that chip
    pub line: Offset,
}

impl LinuxGpioCsConfig {
    /// Line `line` on the default GPIO chip
    pub fn new(line: Offset) -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            line,
        }
    }

    /// Use another GPIO chip
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

/// Chip-select driven through gpiocdev
pub struct LinuxGpioCs {
    config: LinuxGpioCsConfig,
    request: Option<Request>,
}

impl LinuxGpioCs {
    /// Create a handle; the line is not requested yet
    pub fn new(config: LinuxGpioCsConfig) -> Self {
        Self {
            config,
            request: None,
        }
    }

    /// Line offset
    pub fn line(&self) -> Offset {
        self.config.line
    }

    /// Whether the line has been requested as an output
    pub fn is_output(&self) -> bool {
        self.request.is_some()
    }

    /// Request the line as an output, initially high
    pub fn request_output(&mut self) -> Result<()> {
        if self.request.is_some() {
            return Ok(());
        }

        let mut req_config = Config::default();
        req_config
            .with_line(self.config.line)
            .as_output(Value::Active);

        let request = Request::from_config(req_config)
            .on_chip(&self.config.device)
            .with_consumer("sfdump")
            .request()
            .map_err(|e| LinuxGpioError::LineRequestFailed {
                device: self.config.device.clone(),
                line: self.config.line,
                source: e,
            })?;

        log::info!(
            "linux_gpio: Using {} line {} as chip-select",
            self.config.device,
            self.config.line
        );
        self.request = Some(request);
        Ok(())
    }

    /// Drive the line, `true` for high
    pub fn set_level(&mut self, high: bool) -> Result<()> {
        let line = self.config.line;
        let request = self
            .request
            .as_ref()
            .ok_or(LinuxGpioError::NotOutput(line))?;
        let value = if high { Value::Active } else { Value::Inactive };
        request
            .set_value(line, value)
            .map_err(|e| LinuxGpioError::SetValueFailed { line, source: e })?;
        Ok(())
    }
}

impl ChipSelect for LinuxGpioCs {
    fn set_direction_output(&mut self) -> std::result::Result<(), BusError> {
        Ok(self.request_output()?)
    }

    fn set_status(&mut self, high: bool) -> std::result::Result<(), BusError> {
        Ok(self.set_level(high)?)
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// `cs_pin` is the line offset.
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip path
/// - `gpiochip=N` - GPIO chip number, shorthand for `dev=/dev/gpiochipN`
pub fn parse_options(
    cs_pin: u32,
    options: &[(&str, &str)],
) -> std::result::Result<LinuxGpioCsConfig, String> {
    let mut device: Option<String> = None;
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "dev" => {
                device = Some(value.to_string());
            }
            "gpiochip" => {
                gpiochip = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid gpiochip value: {}", value))?,
                );
            }
            _ => {}
        }
    }

    let config = LinuxGpioCsConfig::new(cs_pin);
    match (device, gpiochip) {
        (Some(_), Some(_)) => Err("Only one of 'dev' or 'gpiochip' can be specified".to_string()),
        (Some(dev), None) => Ok(config.with_device(dev)),
        (None, Some(n)) => Ok(config.with_device(format!("/dev/gpiochip{}", n))),
        (None, None) => Ok(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let config = parse_options(17, &[]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip0");
        assert_eq!(config.line, 17);

        let config = parse_options(4, &[("gpiochip", "2")]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip2");

        let config = parse_options(4, &[("dev", "/dev/gpiochip5"), ("bus", "1")]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip5");

        assert!(parse_options(4, &[("dev", "/dev/gpiochip5"), ("gpiochip", "1")]).is_err());
        assert!(parse_options(4, &[("gpiochip", "a")]).is_err());
    }

    #[test]
    fn test_status_before_output() {
        let mut cs = LinuxGpioCs::new(LinuxGpioCsConfig::new(3));
        assert!(!cs.is_output());
        assert!(matches!(
            cs.set_level(false),
            Err(LinuxGpioError::NotOutput(3))
        ));
    }

    #[test]
    fn test_request_missing_chip() {
        let mut cs =
            LinuxGpioCs::new(LinuxGpioCsConfig::new(0).with_device("/nonexistent/gpiochip9"));
        assert!(matches!(
            cs.request_output(),
            Err(LinuxGpioError::LineRequestFailed { line: 0, .. })
        ));
        assert!(!cs.is_output());
    }
}
