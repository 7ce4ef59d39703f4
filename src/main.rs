//! sfdump - SPI NOR flash dumper
//!
//! Reads a range of sectors from a generic SPI NOR flash with the READ (0x03)
//! command and saves them to a file. The flash is reached through an SPI
//! master plus a GPIO line used as chip-select, provided by one of the
//! programmer backends.

mod cli;
mod commands;
mod config;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};

/// Log level selected by the number of `-v` flags
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Logger for a verbosity level, before `RUST_LOG` is applied
fn logger_builder(verbose: u8) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level(verbose));
    builder
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG still overrides the -v level
    logger_builder(cli.verbose).parse_default_env().init();

    let result = match &cli.command {
        Commands::Dump(args) => commands::run_dump(args),
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
