//! Progress reporting for dumps
//!
//! The engine never writes to the terminal itself. Instead it calls a
//! [`DumpProgress`] observer synchronously: once before the first sector,
//! once after every sector and once after the file has been written. The
//! observer runs on the dump thread, so a slow implementation stalls the
//! dump.

use std::time::Duration;

use crate::dump::DumpReport;

/// What a dump is about to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpPlan {
    /// Byte offset of the first sector
    pub start_address: u32,
    /// Sector size in bytes
    pub sector_size: u32,
    /// Number of sectors that will be read
    pub sectors: u32,
    /// Number of bytes that will be read
    pub total_bytes: u64,
}

/// Emitted after each sector has been read and buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Index of the sector just read
    pub sector: u32,
    /// Start address of the sector just read
    pub address: u32,
    /// Bytes read so far, this sector included
    pub bytes_read: u64,
    /// Sectors read so far, this sector included
    pub sectors_read: u32,
    /// Sectors in the whole run
    pub sectors_total: u32,
    /// Time since bus setup finished, just before the first read
    pub elapsed: Duration,
}

impl ProgressEvent {
    /// True for the last sector of the run
    pub fn is_last(&self) -> bool {
        self.sectors_read == self.sectors_total
    }
}

/// Observer for dump progress
pub trait DumpProgress {
    /// Called once, before the first sector is read
    fn started(&mut self, _plan: &DumpPlan) {}

    /// Called after each sector
    fn sector_read(&mut self, _event: &ProgressEvent) {}

    /// Called after the dump file has been written
    fn finished(&mut self, _report: &DumpReport) {}
}

/// A no-op progress reporter
pub struct NoProgress;

impl DumpProgress for NoProgress {}

impl<P: DumpProgress + ?Sized> DumpProgress for &mut P {
    fn started(&mut self, plan: &DumpPlan) {
        (**self).started(plan)
    }

    fn sector_read(&mut self, event: &ProgressEvent) {
        (**self).sector_read(event)
    }

    fn finished(&mut self, report: &DumpReport) {
        (**self).finished(report)
    }
}
