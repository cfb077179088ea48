//! Intel Power Gadget invocation and log parsing (Windows and macOS).
//!
//! The vendor tool is run for a bounded duration and writes a CSV time
//! series; the backend then folds that log into one aggregate per column.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::warn;

use crate::error::{PowerError, Result};
use crate::power::{PowerSampler, PowerTable};

const WINDOWS_EXEC: &str = "PowerLog3.0.exe";
const WINDOWS_EXEC_FALLBACK: &str = r"C:\Program Files\Intel\Power Gadget 3.5\PowerLog3.0.exe";
const MACOS_EXEC: &str = "PowerLog";
const MACOS_EXEC_FALLBACK: &str = "/Applications/Intel Power Gadget/PowerLog";

const DEFAULT_LOG_FILE: &str = "intel_power_gadget_log.csv";
const DEFAULT_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_RESOLUTION_MS: u32 = 100;

/// Clock and reference columns, never part of the result.
const EXCLUDED_COLUMNS: [&str; 3] = ["System Time", "Elapsed Time (sec)", "RDTSC"];

/// Columns whose name carries this marker are monotonic totals and
/// aggregate to their last value; every other column aggregates to its mean.
const CUMULATIVE_MARKER: &str = "Cumulative";

/// Logged-tool sampling backend around the Intel Power Gadget CLI.
///
/// Two instances configured with the same output directory race on the same
/// log file; callers must not sample such instances concurrently.
pub struct PowerGadget {
    cli: PathBuf,
    duration: Duration,
    resolution_ms: u32,
    log_path: PathBuf,
}

impl PowerGadget {
    /// Create a backend with explicit logging parameters.
    ///
    /// Resolves the vendor executable from the search path first, then the
    /// platform's default install location. Fails with
    /// [`PowerError::ExecutableNotFound`] when neither resolves, and
    /// [`PowerError::UnsupportedPlatform`] outside Windows and macOS.
    pub fn with_options(
        output_dir: impl AsRef<Path>,
        duration: Duration,
        resolution_ms: u32,
    ) -> Result<Self> {
        Ok(Self {
            cli: resolve_executable()?,
            duration,
            resolution_ms,
            log_path: output_dir.as_ref().join(DEFAULT_LOG_FILE),
        })
    }

    /// Path the vendor tool is directed to log to.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Run the vendor tool for the configured duration.
    ///
    /// Invocation failure is a warning, not fatal: a previous or partial
    /// log may still be parseable.
    fn log_values(&self) {
        let status = Command::new(&self.cli)
            .arg("-duration")
            .arg(self.duration.as_secs().to_string())
            .arg("-resolution")
            .arg(self.resolution_ms.to_string())
            .arg("-file")
            .arg(&self.log_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                warn!(%status, "Intel Power Gadget exited with a failure status");
            }
            Err(e) => {
                warn!(error = %e, "Failed to invoke Intel Power Gadget");
            }
        }
    }
}

impl PowerSampler for PowerGadget {
    fn new() -> Result<Self> {
        Self::with_options(".", DEFAULT_DURATION, DEFAULT_RESOLUTION_MS)
    }

    /// Invoke the tool, then fold its log into per-column aggregates.
    ///
    /// Any parse failure (missing file, malformed content) yields an empty
    /// table with a warning; sampling never fails.
    fn sample(&mut self) -> PowerTable {
        self.log_values();
        match parse_log(&self.log_path) {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    log = %self.log_path.display(),
                    error = %e,
                    "Unable to read the Intel Power Gadget log"
                );
                PowerTable::new()
            }
        }
    }

    fn is_supported() -> bool {
        resolve_executable().is_ok()
    }
}

fn resolve_executable() -> Result<PathBuf> {
    let (name, fallback) = if cfg!(target_os = "windows") {
        (WINDOWS_EXEC, WINDOWS_EXEC_FALLBACK)
    } else if cfg!(target_os = "macos") {
        (MACOS_EXEC, MACOS_EXEC_FALLBACK)
    } else {
        return Err(PowerError::UnsupportedPlatform {
            backend: "Intel Power Gadget",
            os: env::consts::OS,
        });
    };

    if let Some(path) = find_in_path(name) {
        return Ok(path);
    }
    let fallback = PathBuf::from(fallback);
    if fallback.is_file() {
        return Ok(fallback);
    }

    Err(PowerError::ExecutableNotFound {
        name,
        os: env::consts::OS,
    })
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Parse the tool's CSV log into one aggregate per column.
///
/// Rows with missing values are dropped whole. Clock and reference columns
/// are excluded; `Cumulative` columns aggregate to the last row's value,
/// the rest to the arithmetic mean. The tool appends free-form summary
/// lines after the table, so records with a mismatched field count are
/// skipped.
fn parse_log(path: &Path) -> Result<PowerTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let included: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !EXCLUDED_COLUMNS.contains(&header.as_str()))
        .map(|(idx, _)| idx)
        .collect();

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        if record.len() != headers.len() {
            continue;
        }
        if record.iter().any(str::is_empty) {
            continue;
        }

        let mut values = Vec::with_capacity(included.len());
        for &idx in &included {
            match record.get(idx).and_then(|cell| cell.parse::<f64>().ok()) {
                Some(value) => values.push((idx, value)),
                None => {
                    values.clear();
                    break;
                }
            }
        }
        if values.is_empty() {
            continue;
        }
        for (idx, value) in values {
            columns[idx].push(value);
        }
    }

    let mut table = PowerTable::new();
    for &idx in &included {
        let series = &columns[idx];
        let Some(&last) = series.last() else {
            continue;
        };
        let header = &headers[idx];
        let aggregate = if header.contains(CUMULATIVE_MARKER) {
            last
        } else {
            series.iter().sum::<f64>() / series.len() as f64
        };
        table.insert(header.clone(), aggregate);
    }

    Ok(table)
}
