//! Sector-by-sector flash dump
//!
//! # Algorithm
//!
//! 1. Put chip-select in its idle state (output, high) and configure the SPI
//!    master with the requested clock settings.
//! 2. For every sector from `start_sector` up to `sectors`:
//!    assert chip-select, send `READ || be24(addr)`, receive one sector,
//!    deassert chip-select. An empty or short payload aborts the dump.
//! 3. Deassert chip-select once more, whatever happened.
//! 4. Write the buffered image to the output file in one go.
//!
//! The dump is all-or-nothing: nothing touches the output path unless every
//! sector was read, and the file is replaced through a rename so that an
//! existing dump survives a failed write.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::bus::{ChipSelect, SpiBus};
use crate::error::{DumpError, Result, Stage};
use crate::progress::{DumpPlan, DumpProgress, ProgressEvent};
use crate::request::{validate, DumpRequest};
use crate::spi::ReadCommand;

/// Outcome of a successful dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpReport {
    /// File the image was written to
    pub output: PathBuf,
    /// Flash offset of the first byte in the file
    pub start_address: u32,
    /// Size of the written image
    pub bytes_written: usize,
    /// Number of sectors read
    pub sectors_read: u32,
    /// Time spent reading the flash
    pub elapsed: Duration,
}

/// Lazy sector-read loop
///
/// Yields one [`ProgressEvent`] per sector read. The sequence is finite,
/// cannot be restarted and ends after the first error. Stopping iteration
/// early is the only supported way to cancel a dump, and it always happens on
/// a sector boundary.
///
/// Chip-select is driven high again when the reader is finished or dropped.
pub struct SectorReader<'a, S: SpiBus + ?Sized, C: ChipSelect + ?Sized> {
    request: &'a DumpRequest,
    spi: &'a mut S,
    cs: &'a mut C,
    address: u64,
    buffer: Vec<u8>,
    sectors_read: u32,
    started: Instant,
    done: bool,
    released: bool,
}

impl<'a, S: SpiBus + ?Sized, C: ChipSelect + ?Sized> SectorReader<'a, S, C> {
    /// Prepare the buses and position the reader on the first sector
    pub fn new(request: &'a DumpRequest, spi: &'a mut S, cs: &'a mut C) -> Result<Self> {
        validate(request)?;

        cs.set_direction_output()
            .map_err(|e| DumpError::bus(Stage::ChipSelectSetup, e))?;
        cs.set_status(true)
            .map_err(|e| DumpError::bus(Stage::ChipSelectSetup, e))?;
        spi.configure(request.spi_config())
            .map_err(|e| DumpError::bus(Stage::Configure, e))?;

        log::debug!(
            "SPI configured: {} Hz, mode {}",
            request.spi_config().baudrate,
            request.spi_config().mode()
        );

        Ok(Self {
            request,
            spi,
            cs,
            address: request.start_address() as u64,
            buffer: Vec::with_capacity(request.dump_size() as usize),
            sectors_read: 0,
            started: Instant::now(),
            done: false,
            released: false,
        })
    }

    /// What the reader will read in total
    pub fn plan(&self) -> DumpPlan {
        DumpPlan {
            start_address: self.request.start_address(),
            sector_size: self.request.sector_size(),
            sectors: self.request.sector_count(),
            total_bytes: self.request.dump_size(),
        }
    }

    /// Data read so far
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of sectors read so far
    pub fn sectors_read(&self) -> u32 {
        self.sectors_read
    }

    /// Time since bus setup finished
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Release chip-select and take the buffered data
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.release()?;
        Ok(std::mem::take(&mut self.buffer))
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        self.cs
            .set_status(true)
            .map_err(|e| DumpError::bus(Stage::ChipSelect, e))
    }

    fn read_sector(&mut self) -> Result<ProgressEvent> {
        let sector_size = self.request.sector_size() as usize;
        let address = u32::try_from(self.address).map_err(|_| DumpError::AddressOverflow {
            addr: self.address,
        })?;
        let cmd = ReadCommand::new(address)?;

        self.cs
            .set_status(false)
            .map_err(|e| DumpError::bus(Stage::ChipSelect, e))?;
        let exchanged = exchange(&mut *self.spi, &cmd, sector_size);
        let deasserted = self.cs.set_status(true);
        let payload = exchanged?;
        deasserted.map_err(|e| DumpError::bus(Stage::ChipSelect, e))?;

        if payload.len() < sector_size {
            return Err(DumpError::ReadFailure {
                addr: address,
                expected: sector_size,
                received: payload.len(),
            });
        }
        if payload.len() > sector_size {
            log::warn!(
                "Bus returned {} bytes for a {} byte read at 0x{:06X}, extra data dropped",
                payload.len(),
                sector_size,
                address
            );
        }

        self.buffer.extend_from_slice(&payload[..sector_size]);
        self.address += sector_size as u64;
        self.sectors_read += 1;

        log::trace!("Read sector at 0x{:06X}", address);

        Ok(ProgressEvent {
            sector: self.request.start_sector() + self.sectors_read - 1,
            address,
            bytes_read: self.buffer.len() as u64,
            sectors_read: self.sectors_read,
            sectors_total: self.request.sector_count(),
            elapsed: self.started.elapsed(),
        })
    }
}

/// One command/response exchange inside an asserted chip-select window
fn exchange<S: SpiBus + ?Sized>(spi: &mut S, cmd: &ReadCommand, len: usize) -> Result<Vec<u8>> {
    spi.transmit(&cmd.encode())
        .map_err(|e| DumpError::bus(Stage::Transmit, e))?;
    spi.receive(len)
        .map_err(|e| DumpError::bus(Stage::Receive, e))
}

impl<S: SpiBus + ?Sized, C: ChipSelect + ?Sized> Iterator for SectorReader<'_, S, C> {
    type Item = Result<ProgressEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.address >= self.request.end_address() {
            self.done = true;
            return None;
        }

        let result = self.read_sector();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

impl<S: SpiBus + ?Sized, C: ChipSelect + ?Sized> FusedIterator for SectorReader<'_, S, C> {}

impl<S: SpiBus + ?Sized, C: ChipSelect + ?Sized> Drop for SectorReader<'_, S, C> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.release() {
                log::error!("Failed to release chip-select: {}", e);
            }
        }
    }
}

/// Dump the flash range described by `request` into its output file
///
/// Returns the report of the written image. On error nothing is written and
/// chip-select has already been released when this function returns.
pub fn dump<S, C, P>(
    request: &DumpRequest,
    spi: &mut S,
    cs: &mut C,
    progress: &mut P,
) -> Result<DumpReport>
where
    S: SpiBus + ?Sized,
    C: ChipSelect + ?Sized,
    P: DumpProgress + ?Sized,
{
    let mut reader = SectorReader::new(request, spi, cs)?;
    let plan = reader.plan();

    log::debug!(
        "Reading {} sectors of {} bytes from 0x{:06X}",
        plan.sectors,
        plan.sector_size,
        plan.start_address
    );
    progress.started(&plan);

    for event in reader.by_ref() {
        let event = event?;
        progress.sector_read(&event);
    }

    let sectors_read = reader.sectors_read();
    let elapsed = reader.elapsed();
    let data = reader.finish()?;

    write_dump_file(request.output(), &data)?;

    let report = DumpReport {
        output: request.output().to_path_buf(),
        start_address: plan.start_address,
        bytes_written: data.len(),
        sectors_read,
        elapsed,
    };
    progress.finished(&report);

    Ok(report)
}

/// Temporary sibling `.<name>.part` used while writing `path`
///
/// `None` when `path` does not end in a file name.
pub fn partial_path(path: &Path) -> Option<PathBuf> {
    let file_name = path.file_name()?;
    let mut tmp_name = OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".part");
    Some(path.with_file_name(tmp_name))
}

/// Write `data` to `path` through a temporary sibling file
///
/// The destination is only replaced once the complete image is on disk.
pub fn write_dump_file(path: &Path, data: &[u8]) -> Result<()> {
    let io_failure = |source: io::Error| DumpError::IoFailure {
        path: path.to_path_buf(),
        source,
    };

    let tmp_path = partial_path(path).ok_or_else(|| {
        io_failure(io::Error::new(
            io::ErrorKind::InvalidInput,
            "dump path does not name a file",
        ))
    })?;

    if let Err(e) = fs::write(&tmp_path, data) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_failure(e));
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_failure(e));
    }

    log::debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
