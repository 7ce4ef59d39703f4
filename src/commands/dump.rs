//! Dump command implementation

use indicatif::{ProgressBar, ProgressStyle};
use sfdump_core::{dump, format_size, DumpError, DumpPlan, DumpProgress, DumpReport, ProgressEvent};
use thiserror::Error;

use crate::cli::DumpArgs;
use crate::config::{self, ConfigError, OptionsFile};
use crate::programmers;

/// Dump error tagged with the phase that failed
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct DumpFailed {
    stage: &'static str,
    #[source]
    source: DumpError,
}

impl From<DumpError> for DumpFailed {
    fn from(source: DumpError) -> Self {
        Self {
            stage: source.stage(),
            source,
        }
    }
}

/// Create the sector progress bar style
fn create_progress_bar_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_bar()
        .template(
            "{msg} : {percent:>3}%[{bar:40.cyan/blue}] {pos}/{len} sectors \
             [elapsed: {elapsed} left: {eta}]",
        )?
        .progress_chars("#>-"))
}

/// Progress reporter using an indicatif progress bar
pub struct IndicatifProgress {
    bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self { bar: None }
    }

    /// Leave the bar where it stopped
    fn abandon(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.abandon();
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl DumpProgress for IndicatifProgress {
    fn started(&mut self, plan: &DumpPlan) {
        log::info!("Starting dump: {}.", format_size(plan.total_bytes));

        let pb = ProgressBar::new(plan.sectors as u64);
        pb.set_style(create_progress_bar_style().unwrap_or_else(|_| ProgressStyle::default_bar()));
        pb.set_message("Reading");
        self.bar = Some(pb);
    }

    fn sector_read(&mut self, event: &ProgressEvent) {
        if let Some(pb) = &self.bar {
            pb.set_position(event.sectors_read as u64);
        }
    }

    fn finished(&mut self, report: &DumpReport) {
        if let Some(pb) = self.bar.take() {
            pb.finish();
        }
        log::debug!(
            "Read {} sectors in {:.2?}",
            report.sectors_read,
            report.elapsed
        );
    }
}

/// Run the dump command
pub fn run_dump(args: &DumpArgs) -> Result<(), Box<dyn std::error::Error>> {
    let file = match &args.config {
        Some(path) => OptionsFile::load(path)?,
        None => OptionsFile::default(),
    };
    let request = match config::resolve(args, &file) {
        Ok(request) => request,
        Err(ConfigError::Dump(e)) => return Err(DumpFailed::from(e).into()),
        Err(e) => return Err(e.into()),
    };

    log::debug!(
        "Dump request: bus {}, CS pin {}, sectors {}..{} of {} bytes, {} Hz mode {}",
        request.spi_bus(),
        request.cs_pin(),
        request.start_sector(),
        request.sectors(),
        request.sector_size(),
        request.spi_config().baudrate,
        request.spi_config().mode()
    );

    config::check_output(request.output())?;

    let mut buses = programmers::open_buses(&args.programmer, &request)?;
    let mut progress = IndicatifProgress::new();

    let report = match dump(&request, &mut buses.spi, &mut buses.cs, &mut progress) {
        Ok(report) => report,
        Err(e) => {
            progress.abandon();
            return Err(DumpFailed::from(e).into());
        }
    };

    println!(
        "Successfully dumped {} from flash memory.",
        format_size(report.bytes_written as u64)
    );
    println!("Dump saved into {}", report.output.display());
    Ok(())
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sfdump-cli-{}-{}", std::process::id(), name));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_run_dump_with_image() {
        let dir = temp_dir("image");
        let image = dir.join("flash.img");
        let content: Vec<u8> = (0..4 * 4096).map(|i| (i % 251) as u8).collect();
        fs::write(&image, &content).unwrap();

        let output = dir.join("dump.bin");
        let args = DumpArgs {
            programmer: format!("dummy:image={}", image.display()),
            dumpfile: Some(output.clone()),
            sectors: Some(4),
            start_sector: Some(1),
            ..Default::default()
        };
        run_dump(&args).unwrap();

        assert_eq!(fs::read(&output).unwrap(), &content[4096..]);
    }

    #[test]
    fn test_run_dump_with_options_file() {
        let dir = temp_dir("options");
        let output = dir.join("dump.bin");
        let options = dir.join("options.toml");
        fs::write(
            &options,
            format!(
                "dumpfile = {:?}\nsectors = 2\nsector_size = \"0x400\"\n",
                output.display().to_string()
            ),
        )
        .unwrap();

        let args = DumpArgs {
            programmer: "dummy:size=64KiB".to_string(),
            config: Some(options),
            ..Default::default()
        };
        run_dump(&args).unwrap();

        let data = fs::read(&output).unwrap();
        assert_eq!(data.len(), 2048);
        assert!(data.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_run_dump_reports_stage() {
        let dir = temp_dir("stage");
        let args = DumpArgs {
            programmer: "dummy".to_string(),
            dumpfile: Some(dir.join("dump.bin")),
            sectors: Some(4),
            start_sector: Some(4),
            ..Default::default()
        };
        let err = run_dump(&args).unwrap_err();
        assert!(err.to_string().starts_with("validation failed: "));
        assert!(!dir.join("dump.bin").exists());
    }

    #[test]
    fn test_run_dump_rejects_unwritable_output() {
        let dir = temp_dir("unwritable");
        let args = DumpArgs {
            programmer: "dummy".to_string(),
            dumpfile: Some(dir.join("missing").join("dump.bin")),
            sectors: Some(1),
            ..Default::default()
        };
        let err = run_dump(&args).unwrap_err();
        assert!(err.to_string().contains("is not writable"));
        assert!(!err.to_string().starts_with("file write"));

        let args = DumpArgs {
            dumpfile: Some(dir.clone()),
            ..args
        };
        let err = run_dump(&args).unwrap_err();
        assert!(err.to_string().contains("path is a directory"));
    }
}
