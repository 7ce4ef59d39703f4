//! sfdump-core - Core library for dumping SPI NOR flash chips
//!
//! This crate contains the sector-read loop that pulls the contents of a
//! generic SPI NOR flash through an SPI master and a GPIO chip-select line,
//! plus everything that loop needs: the READ command framing, a validated
//! dump request, the bus capability traits implemented by the backends and a
//! progress observer.
//!
//! # Example
//!
//! ```ignore
//! use sfdump_core::{dump, ChipSelect, DumpRequest, NoProgress, SpiBus};
//!
//! fn dump_chip<S: SpiBus, C: ChipSelect>(spi: &mut S, cs: &mut C) -> sfdump_core::Result<()> {
//!     let request = DumpRequest::builder("flash.bin")
//!         .with_sectors(1024)
//!         .build()?;
//!     let report = dump(&request, spi, cs, &mut NoProgress)?;
//!     println!("{} bytes written", report.bytes_written);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bus;
pub mod dump;
pub mod error;
pub mod progress;
pub mod request;
pub mod size;
pub mod spi;

pub use bus::{ChipSelect, ClockPhase, ClockPolarity, SpiBus, SpiConfig};
pub use dump::{dump, partial_path, DumpReport, SectorReader};
pub use error::{BusError, DumpError, Result, Stage};
pub use progress::{DumpPlan, DumpProgress, NoProgress, ProgressEvent};
pub use request::{DumpRequest, DumpRequestBuilder};
pub use size::format_size;
