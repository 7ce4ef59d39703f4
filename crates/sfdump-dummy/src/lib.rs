//! sfdump-dummy - In-memory SPI NOR flash emulator
//!
//! This crate emulates a flash chip sitting behind an SPI master and a GPIO
//! chip-select line. It's useful for testing and for dry runs of the CLI
//! without real hardware.
//!
//! The chip understands the READ (0x03) command: while chip-select is low the
//! first four bytes clocked in form the command, and every receive afterwards
//! streams data from the addressed offset onwards. Reading past the end of
//! the array returns a short payload, just like a bridge timing out.
//!
//! # Example
//!
//! ```
//! use sfdump_core::{dump, DumpRequest, NoProgress};
//! use sfdump_dummy::DummyFlash;
//!
//! let flash = DummyFlash::with_data(vec![0xA5; 2 * 4096]);
//! let (mut spi, mut cs) = flash.split();
//!
//! let output = std::env::temp_dir().join("sfdump-dummy-doctest.bin");
//! let request = DumpRequest::builder(&output).with_sectors(2).build()?;
//! let report = dump(&request, &mut spi, &mut cs, &mut NoProgress)?;
//! assert_eq!(report.bytes_written, 8192);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::cell::{Ref, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sfdump_core::spi::{opcodes, ReadCommand, ADDRESS_SPACE};
use sfdump_core::{BusError, ChipSelect, SpiBus, SpiConfig};
use thiserror::Error;

/// Default emulated chip size (16 MiB, erased)
pub const DEFAULT_SIZE: usize = 16 * 1024 * 1024;

/// Errors raised by the emulator
#[derive(Debug, Error)]
pub enum DummyError {
    /// Failed to load the flash image
    #[error("Failed to read flash image {}: {source}", path.display())]
    ImageReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Chip-select driven before being configured as an output
    #[error("Chip-select line is not configured as an output")]
    NotOutput,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Bus activity recorded by the emulator, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// SPI master configured
    Configure(SpiConfig),
    /// Chip-select line switched to output
    DirectionOutput,
    /// Chip-select driven low
    CsLow,
    /// Chip-select driven high
    CsHigh,
    /// Bytes sent on MOSI
    Transmit(Vec<u8>),
    /// Receive requested
    Receive { requested: usize, returned: usize },
}

#[derive(Debug)]
struct Chip {
    data: Vec<u8>,
    cs_output: bool,
    cs_high: bool,
    command: Vec<u8>,
    read_addr: Option<usize>,
    receives: usize,
    fail_receive_at: Option<usize>,
    log: Vec<Transaction>,
}

impl Chip {
    fn select(&mut self) {
        self.cs_high = false;
        self.command.clear();
        self.read_addr = None;
    }

    fn deselect(&mut self) {
        self.cs_high = true;
        self.command.clear();
        self.read_addr = None;
    }

    fn shift_in(&mut self, bytes: &[u8]) {
        if self.cs_high {
            log::debug!("dummy: {} bytes sent with chip-select high, ignored", bytes.len());
            return;
        }
        if self.command.len() >= ReadCommand::LEN {
            return;
        }

        let take = (ReadCommand::LEN - self.command.len()).min(bytes.len());
        self.command.extend_from_slice(&bytes[..take]);
        if self.command.len() < ReadCommand::LEN {
            return;
        }

        match self.command[0] {
            opcodes::READ => {
                let addr = ((self.command[1] as usize) << 16)
                    | ((self.command[2] as usize) << 8)
                    | self.command[3] as usize;
                self.read_addr = Some(addr);
            }
            opcode => {
                log::debug!("dummy: unsupported opcode 0x{:02X}", opcode);
            }
        }
    }

    fn shift_out(&mut self, len: usize) -> Vec<u8> {
        self.receives += 1;
        if self.fail_receive_at == Some(self.receives) {
            return Vec::new();
        }
        if self.cs_high {
            return Vec::new();
        }
        let Some(addr) = self.read_addr else {
            return Vec::new();
        };

        let start = addr.min(self.data.len());
        let end = addr.saturating_add(len).min(self.data.len());
        self.read_addr = Some(end);
        self.data[start..end].to_vec()
    }
}

/// Emulated SPI NOR flash
///
/// Cloning a `DummyFlash` yields another handle to the same chip.
#[derive(Debug, Clone)]
pub struct DummyFlash {
    chip: Rc<RefCell<Chip>>,
}

impl DummyFlash {
    /// Create an erased (0xFF) chip of `size` bytes
    pub fn new(size: usize) -> Self {
        Self::with_data(vec![0xFF; size])
    }

    /// Create a chip holding `data`
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            chip: Rc::new(RefCell::new(Chip {
                data,
                cs_output: false,
                cs_high: true,
                command: Vec::new(),
                read_addr: None,
                receives: 0,
                fail_receive_at: None,
                log: Vec::new(),
            })),
        }
    }

    /// Create a chip holding the contents of an image file
    pub fn from_image(path: impl AsRef<Path>) -> Result<Self, DummyError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| DummyError::ImageReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::info!("dummy: Loaded {} bytes from {}", data.len(), path.display());
        Ok(Self::with_data(data))
    }

    /// Make the `nth` receive (1-based) return no data
    pub fn fail_receive_at(&self, nth: usize) {
        self.chip.borrow_mut().fail_receive_at = Some(nth);
    }

    /// SPI master and chip-select handles wired to this chip
    pub fn split(&self) -> (DummySpi, DummyCs) {
        (
            DummySpi {
                chip: Rc::clone(&self.chip),
            },
            DummyCs {
                chip: Rc::clone(&self.chip),
            },
        )
    }

    /// Size of the emulated array in bytes
    pub fn size(&self) -> usize {
        self.chip.borrow().data.len()
    }

    /// Flash contents
    pub fn data(&self) -> Ref<'_, [u8]> {
        Ref::map(self.chip.borrow(), |chip| chip.data.as_slice())
    }

    /// Bus activity so far
    pub fn transactions(&self) -> Vec<Transaction> {
        self.chip.borrow().log.clone()
    }

    /// Current chip-select level
    pub fn cs_is_high(&self) -> bool {
        self.chip.borrow().cs_high
    }
}

/// SPI master side of a [`DummyFlash`]
#[derive(Debug)]
pub struct DummySpi {
    chip: Rc<RefCell<Chip>>,
}

impl SpiBus for DummySpi {
    fn configure(&mut self, config: &SpiConfig) -> Result<(), BusError> {
        log::debug!(
            "dummy: SPI configured ({} Hz, mode {})",
            config.baudrate,
            config.mode()
        );
        self.chip.borrow_mut().log.push(Transaction::Configure(*config));
        Ok(())
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), BusError> {
        let mut chip = self.chip.borrow_mut();
        chip.log.push(Transaction::Transmit(data.to_vec()));
        chip.shift_in(data);
        Ok(())
    }

    fn receive(&mut self, len: usize) -> Result<Vec<u8>, BusError> {
        let mut chip = self.chip.borrow_mut();
        let data = chip.shift_out(len);
        chip.log.push(Transaction::Receive {
            requested: len,
            returned: data.len(),
        });
        Ok(data)
    }
}

/// Chip-select side of a [`DummyFlash`]
#[derive(Debug)]
pub struct DummyCs {
    chip: Rc<RefCell<Chip>>,
}

impl ChipSelect for DummyCs {
    fn set_direction_output(&mut self) -> Result<(), BusError> {
        let mut chip = self.chip.borrow_mut();
        chip.cs_output = true;
        chip.log.push(Transaction::DirectionOutput);
        Ok(())
    }

    fn set_status(&mut self, high: bool) -> Result<(), BusError> {
        let mut chip = self.chip.borrow_mut();
        if !chip.cs_output {
            return Err(DummyError::NotOutput.into());
        }
        if high {
            chip.deselect();
            chip.log.push(Transaction::CsHigh);
        } else {
            chip.select();
            chip.log.push(Transaction::CsLow);
        }
        Ok(())
    }
}

/// Parse a size like "4096", "0x1000", "64 KiB" or "16MiB"
fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<usize>() {
        return Ok(n);
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return usize::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid size: {}", e));
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: usize = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("invalid size: {}", s))
}

/// Build an emulated chip from programmer options
///
/// # Supported Options
///
/// - `image=<path>` - Load the flash contents from a file
/// - `size=<bytes>` - Size of an erased chip (default and maximum 16 MiB),
///   ignored with `image`
pub fn parse_options(options: &[(&str, &str)]) -> Result<DummyFlash, DummyError> {
    let mut image: Option<&str> = None;
    let mut size = DEFAULT_SIZE;

    for (key, value) in options {
        match *key {
            "image" => image = Some(value),
            "size" => {
                size = parse_size(value).map_err(DummyError::InvalidParameter)?;
                if size as u64 > ADDRESS_SPACE {
                    return Err(DummyError::InvalidParameter(format!(
                        "size {} exceeds the 24-bit address space",
                        value
                    )));
                }
            }
            _ => {
                log::warn!("dummy: Unknown option: {}={}", key, value);
            }
        }
    }

    match image {
        Some(path) => DummyFlash::from_image(path),
        None => {
            log::info!("dummy: Emulating an erased {} byte flash", size);
            Ok(DummyFlash::new(size))
        }
    }
}

/// Open an emulated chip and return boxed bus handles
///
/// This is a convenience function for use in the CLI programmer dispatch.
pub fn open_dummy(
    options: &[(&str, &str)],
) -> Result<(Box<dyn SpiBus>, Box<dyn ChipSelect>), Box<dyn std::error::Error>> {
    let flash = parse_options(options)?;
    let (spi, cs) = flash.split();
    Ok((Box::new(spi), Box::new(cs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfdump_core::{dump, DumpError, DumpRequest, NoProgress};
    use std::fs;

    fn temp_output(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sfdump-dummy-{}-{}", std::process::id(), name));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dump.bin");
        let _ = fs::remove_file(&path);
        path
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + i / 256) as u8).collect()
    }

    #[test]
    fn test_read_command() {
        let flash = DummyFlash::with_data(pattern(0x2000));
        let (mut spi, mut cs) = flash.split();

        cs.set_direction_output().unwrap();
        cs.set_status(false).unwrap();
        spi.transmit(&[0x03, 0x00, 0x10, 0x00]).unwrap();
        let first = spi.receive(16).unwrap();
        let second = spi.receive(16).unwrap();
        cs.set_status(true).unwrap();

        let data = flash.data();
        assert_eq!(first, &data[0x1000..0x1010]);
        // Continuous read keeps advancing
        assert_eq!(second, &data[0x1010..0x1020]);
    }

    #[test]
    fn test_receive_without_chip_select() {
        let flash = DummyFlash::with_data(pattern(256));
        let (mut spi, mut cs) = flash.split();

        cs.set_direction_output().unwrap();
        cs.set_status(true).unwrap();
        spi.transmit(&[0x03, 0x00, 0x00, 0x00]).unwrap();
        assert!(spi.receive(16).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_opcode() {
        let flash = DummyFlash::with_data(pattern(256));
        let (mut spi, mut cs) = flash.split();

        cs.set_direction_output().unwrap();
        cs.set_status(false).unwrap();
        spi.transmit(&[0x9F, 0x00, 0x00, 0x00]).unwrap();
        assert!(spi.receive(3).unwrap().is_empty());
    }

    #[test]
    fn test_chip_select_requires_output() {
        let flash = DummyFlash::new(256);
        let (_, mut cs) = flash.split();
        assert!(cs.set_status(false).is_err());
    }

    #[test]
    fn test_dump_two_sectors() {
        let mut content = vec![0x00u8; 4096];
        content.extend(vec![0xFFu8; 4096]);
        let flash = DummyFlash::with_data(content);
        let (mut spi, mut cs) = flash.split();
        let output = temp_output("two-sectors");

        let request = DumpRequest::builder(&output)
            .with_sectors(2)
            .build()
            .unwrap();
        let report = dump(&request, &mut spi, &mut cs, &mut NoProgress).unwrap();

        let data = fs::read(&output).unwrap();
        assert_eq!(report.bytes_written, 8192);
        assert_eq!(data.len(), 8192);
        assert!(data[..4096].iter().all(|&b| b == 0x00));
        assert!(data[4096..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_dump_bus_sequence() {
        let flash = DummyFlash::with_data(pattern(3 * 256));
        let (mut spi, mut cs) = flash.split();
        let output = temp_output("sequence");

        let request = DumpRequest::builder(&output)
            .with_sector_size(256)
            .with_sectors(3)
            .with_start_sector(1)
            .build()
            .unwrap();
        dump(&request, &mut spi, &mut cs, &mut NoProgress).unwrap();

        let expected = vec![
            Transaction::DirectionOutput,
            Transaction::CsHigh,
            Transaction::Configure(*request.spi_config()),
            Transaction::CsLow,
            Transaction::Transmit(vec![0x03, 0x00, 0x01, 0x00]),
            Transaction::Receive {
                requested: 256,
                returned: 256,
            },
            Transaction::CsHigh,
            Transaction::CsLow,
            Transaction::Transmit(vec![0x03, 0x00, 0x02, 0x00]),
            Transaction::Receive {
                requested: 256,
                returned: 256,
            },
            Transaction::CsHigh,
            Transaction::CsHigh,
        ];
        assert_eq!(flash.transactions(), expected);
        assert!(flash.cs_is_high());
        assert_eq!(fs::read(&output).unwrap(), &flash.data()[256..]);
    }

    #[test]
    fn test_dump_offset_content() {
        let flash = DummyFlash::with_data(pattern(16 * 4096));
        let (mut spi, mut cs) = flash.split();
        let output = temp_output("offset");

        let request = DumpRequest::builder(&output)
            .with_sectors(16)
            .with_start_sector(5)
            .build()
            .unwrap();
        dump(&request, &mut spi, &mut cs, &mut NoProgress).unwrap();

        let data = fs::read(&output).unwrap();
        let flash_data = flash.data();
        assert_eq!(data.len(), 11 * 4096);
        for (k, byte) in data.iter().enumerate() {
            assert_eq!(*byte, flash_data[5 * 4096 + k]);
        }
    }

    #[test]
    fn test_failed_receive_leaves_file_untouched() {
        let flash = DummyFlash::with_data(pattern(4 * 4096));
        flash.fail_receive_at(3);
        let (mut spi, mut cs) = flash.split();
        let output = temp_output("failed-receive");
        fs::write(&output, b"keep me").unwrap();

        let request = DumpRequest::builder(&output)
            .with_sectors(4)
            .build()
            .unwrap();
        let err = dump(&request, &mut spi, &mut cs, &mut NoProgress).unwrap_err();

        assert!(matches!(
            err,
            DumpError::ReadFailure {
                addr: 0x2000,
                received: 0,
                ..
            }
        ));
        assert!(flash.cs_is_high());
        assert_eq!(fs::read(&output).unwrap(), b"keep me");

        let lows = flash
            .transactions()
            .iter()
            .filter(|t| **t == Transaction::CsLow)
            .count();
        assert_eq!(lows, 3);
    }

    #[test]
    fn test_dump_past_end_of_chip() {
        // Request covers more than the emulated array
        let flash = DummyFlash::with_data(pattern(2 * 4096));
        let (mut spi, mut cs) = flash.split();
        let output = temp_output("past-end");

        let request = DumpRequest::builder(&output)
            .with_sectors(3)
            .build()
            .unwrap();
        let err = dump(&request, &mut spi, &mut cs, &mut NoProgress).unwrap_err();

        assert!(matches!(err, DumpError::ReadFailure { addr: 0x2000, .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_dump_twice_identical() {
        let flash = DummyFlash::with_data(pattern(8 * 1024));
        let first = temp_output("twice-a");
        let second = temp_output("twice-b");

        for output in [&first, &second] {
            let (mut spi, mut cs) = flash.split();
            let request = DumpRequest::builder(output)
                .with_sector_size(1024)
                .with_sectors(8)
                .build()
                .unwrap();
            dump(&request, &mut spi, &mut cs, &mut NoProgress).unwrap();
        }

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("64 KiB").unwrap(), 64 * 1024);
        assert_eq!(parse_size("16MiB").unwrap(), 16 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("17592186044416MiB").is_err());
        assert!(parse_size("18446744073709551615KiB").is_err());
    }

    #[test]
    fn test_parse_options() {
        let flash = parse_options(&[("size", "8KiB")]).unwrap();
        assert_eq!(flash.size(), 8192);
        assert!(flash.data().iter().all(|&b| b == 0xFF));

        let flash = parse_options(&[]).unwrap();
        assert_eq!(flash.size(), DEFAULT_SIZE);

        let image = temp_output("image");
        fs::write(&image, pattern(512)).unwrap();
        let path = image.to_string_lossy().into_owned();
        let flash = parse_options(&[("image", path.as_str())]).unwrap();
        assert_eq!(&flash.data()[..], &pattern(512)[..]);

        assert!(matches!(
            parse_options(&[("size", "huge")]),
            Err(DummyError::InvalidParameter(_))
        ));
        assert!(matches!(
            parse_options(&[("size", "32MiB")]),
            Err(DummyError::InvalidParameter(_))
        ));
        assert_eq!(parse_options(&[("size", "16MiB")]).unwrap().size(), DEFAULT_SIZE);
    }
}
