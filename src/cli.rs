//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a clock polarity or phase bit
fn parse_bit(s: &str) -> Result<u8, String> {
    match parse_hex_u32(s)? {
        0 => Ok(0),
        1 => Ok(1),
        n => Err(format!("Expected 0 or 1, got {}", n)),
    }
}

#[derive(Parser)]
#[command(name = "sfdump")]
#[command(author, version, about = "SPI NOR flash dumper", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Dump options
///
/// Every option left unset falls back to the options file, then to the
/// built-in default.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DumpArgs {
    /// Programmer to use, with options (e.g. "linux:gpiochip=1")
    #[arg(short, long, help = "Programmer to use [available: dummy, linux]")]
    pub programmer: String,

    /// Options file (TOML), same keys as the long options
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// SPI bus number [default: 0]
    #[arg(long, value_parser = parse_hex_u32)]
    pub spi_bus: Option<u32>,

    /// GPIO line used as chip-select [default: 0]
    #[arg(long, value_parser = parse_hex_u32)]
    pub cs_pin: Option<u32>,

    /// Output file path
    #[arg(short = 'o', long = "dumpfile", visible_alias = "output")]
    pub dumpfile: Option<PathBuf>,

    /// Sector index to stop before [default: 1024]
    #[arg(long, value_parser = parse_hex_u32)]
    pub sectors: Option<u32>,

    /// First sector to read [default: 0]
    #[arg(long, value_parser = parse_hex_u32)]
    pub start_sector: Option<u32>,

    /// SPI clock frequency in Hz [default: 1000000]
    #[arg(long, value_parser = parse_hex_u32)]
    pub spi_baudrate: Option<u32>,

    /// SPI clock polarity, 0 or 1 [default: 0]
    #[arg(long, value_parser = parse_bit)]
    pub spi_polarity: Option<u8>,

    /// SPI clock phase, 0 or 1 [default: 0]
    #[arg(long, value_parser = parse_bit)]
    pub spi_phase: Option<u8>,

    /// Sector size in bytes [default: 4096]
    #[arg(long, value_parser = parse_hex_u32)]
    pub sector_size: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dump flash contents to a file
    Dump(DumpArgs),

    /// List available programmers
    ListProgrammers,
}
