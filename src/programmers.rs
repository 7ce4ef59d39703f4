//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all programmers, with support
//! for feature-gated inclusion and dynamic help text generation.

use sfdump_core::{ChipSelect, DumpRequest, SpiBus};

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// SPI master and chip-select line of an opened programmer
pub struct Buses {
    pub spi: Box<dyn SpiBus>,
    pub cs: Box<dyn ChipSelect>,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory flash emulator for testing (image=<file>,size=<bytes>)",
    });

    #[cfg(feature = "linux")]
    programmers.push(ProgrammerInfo {
        name: "linux",
        aliases: &["linux_spi", "spidev"],
        description: "Linux spidev + GPIO chip-select \
            (spidev=<path>,native_cs=<yes|no>,gpiodev=<path>,gpiochip=<n>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:8} - {}\n", p.name, p.description));
        if !p.aliases.is_empty() {
            help.push_str(&format!("  {:8}   aliases: {}\n", "", p.aliases.join(", ")));
        }
    }
    help
}

/// Resolve a name or alias to the primary programmer name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the buses of the programmer named in `programmer`
///
/// The bus number and chip-select pin of `request` select the spidev device
/// and GPIO line for hardware programmers.
#[allow(unused_variables)]
pub fn open_buses(
    programmer: &str,
    request: &DumpRequest,
) -> Result<Buses, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer);

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            log::info!("Opening dummy programmer...");
            let (spi, cs) = sfdump_dummy::open_dummy(&options)
                .map_err(|e| format!("Invalid dummy parameters: {}", e))?;
            Ok(Buses { spi, cs })
        }

        #[cfg(feature = "linux")]
        "linux" => {
            let (spi_options, gpio_options) = split_linux_options(&options);

            log::info!("Opening Linux SPI programmer...");
            let spi = sfdump_linux_spi::open_linux_spi(request.spi_bus(), &spi_options)
                .map_err(|e| {
                    format!(
                        "Failed to open Linux SPI device: {}\n\
                         Make sure the device exists and you have read/write permissions.\n\
                         You may need to: sudo usermod -aG spi $USER",
                        e
                    )
                })?;
            let cs = sfdump_linux_gpio::open_linux_gpio_cs(request.cs_pin(), &gpio_options)
                .map_err(|e| format!("Invalid GPIO parameters: {}", e))?;
            Ok(Buses { spi, cs })
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

/// Route `linux` programmer options to the spidev and GPIO backends
#[cfg(feature = "linux")]
fn split_linux_options<'a>(
    options: &[(&'a str, &'a str)],
) -> (Vec<(&'a str, &'a str)>, Vec<(&'a str, &'a str)>) {
    let mut spi = Vec::new();
    let mut gpio = Vec::new();

    for &(key, value) in options {
        match key {
            "spidev" => spi.push(("dev", value)),
            "bus" | "native_cs" => spi.push((key, value)),
            "gpiodev" => gpio.push(("dev", value)),
            "gpiochip" => gpio.push((key, value)),
            _ => log::warn!("linux: Unknown option: {}={}", key, value),
        }
    }
    (spi, gpio)
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'sfdump list-programmers' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_string() {
        let (name, options) = parse_programmer_string("dummy");
        assert_eq!(name, "dummy");
        assert!(options.is_empty());

        let (name, options) = parse_programmer_string("linux:spidev=/dev/spidev1.0,gpiochip=2");
        assert_eq!(name, "linux");
        assert_eq!(options, vec![("spidev", "/dev/spidev1.0"), ("gpiochip", "2")]);
    }

    #[test]
    fn test_unknown_programmer() {
        let request = DumpRequest::builder("out.bin").build().unwrap();
        let err = open_buses("ch341a", &request).err().unwrap();
        assert!(err.to_string().starts_with("Unknown programmer: ch341a"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        let request = DumpRequest::builder("out.bin").build().unwrap();
        assert!(open_buses("dummy:size=4096", &request).is_ok());
        assert!(open_buses("dummy:size=lots", &request).is_err());
    }

    #[cfg(feature = "linux")]
    #[test]
    fn test_linux_aliases_and_options() {
        assert_eq!(find_programmer("spidev"), Some("linux"));
        assert_eq!(find_programmer("linux_spi"), Some("linux"));

        let (spi, gpio) = split_linux_options(&[
            ("spidev", "/dev/spidev2.1"),
            ("native_cs", "no"),
            ("gpiodev", "/dev/gpiochip3"),
            ("speed", "1"),
        ]);
        assert_eq!(spi, vec![("dev", "/dev/spidev2.1"), ("native_cs", "no")]);
        assert_eq!(gpio, vec![("dev", "/dev/gpiochip3")]);
    }
}
