//! RAPL energy counter sampling (Linux powercap).
//!
//! Each energy-accounting domain under the powercap tree is a directory
//! with a `name` file and an `energy_uj` file holding the cumulative
//! consumed energy in microjoules. Power is derived by snapshotting every
//! domain counter twice across a fixed short delay.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{PowerError, Result};
use crate::power::{PowerSampler, PowerTable};

/// Default location of the powercap RAPL tree.
pub const DEFAULT_RAPL_ROOT: &str = "/sys/class/powercap/intel-rapl";

/// Delay between the start and stop snapshots of a sampling cycle. Long
/// enough for the counters to accumulate a measurable delta, short enough
/// not to perturb the measured load.
const SAMPLING_DELAY: Duration = Duration::from_millis(10);

/// Domains whose declared name contains this are whole-package counters and
/// get a canonical, index-suffixed label so multiple sockets stay apart.
const PACKAGE_MARKER: &str = "package";

const MICROJOULES_PER_JOULE: f64 = 1_000_000.0;

/// One hardware energy-accounting domain (e.g. one CPU package).
///
/// The counter value only ever increases until it wraps at the domain's
/// maximum range, so a decrease between the start and stop snapshots is
/// corrected with `max_energy_range_uj` when the domain exposes it, and
/// reported as absent when it does not.
#[derive(Debug)]
pub struct EnergyCounter {
    name: String,
    energy_path: PathBuf,
    max_energy_range_uj: Option<f64>,
    start_uj: Option<f64>,
    end_uj: Option<f64>,
    power_watts: Option<f64>,
}

impl EnergyCounter {
    /// Create a counter for the domain directory, reading the counter range
    /// once up front.
    pub fn new(name: impl Into<String>, domain_dir: &Path) -> Self {
        let max_energy_range_uj = fs::read_to_string(domain_dir.join("max_energy_range_uj"))
            .ok()
            .and_then(|raw| raw.trim().parse::<f64>().ok());

        Self {
            name: name.into(),
            energy_path: domain_dir.join("energy_uj"),
            max_energy_range_uj,
            start_uj: None,
            end_uj: None,
            power_watts: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record the current counter value as the start of a sampling window.
    ///
    /// Clears any previous measurement first, so a failed read leaves the
    /// counter unset rather than paired with a stale start value.
    pub fn start(&mut self) -> Result<()> {
        self.start_uj = None;
        self.end_uj = None;
        self.power_watts = None;
        self.start_uj = Some(self.read_energy()?);
        Ok(())
    }

    /// Record the end of the sampling window and derive power in watts.
    ///
    /// A counter decrease is treated as a wrap: the delta becomes
    /// `(max_range - start) + end`. Without a known range the measurement
    /// is invalid and stays absent; it is never reported negative.
    pub fn stop(&mut self, delay: Duration) -> Result<()> {
        let end = self.read_energy()?;
        self.end_uj = Some(end);

        let Some(start) = self.start_uj else {
            debug!(counter = %self.name, "stop without a start snapshot, measurement discarded");
            return Ok(());
        };

        let delta_uj = if end >= start {
            Some(end - start)
        } else if let Some(max_range) = self.max_energy_range_uj {
            Some((max_range - start) + end)
        } else {
            debug!(
                counter = %self.name,
                "counter decreased and max range is unknown, measurement discarded"
            );
            None
        };

        let elapsed = delay.as_secs_f64();
        self.power_watts = match delta_uj {
            Some(delta) if elapsed > 0.0 => Some(delta / elapsed / MICROJOULES_PER_JOULE),
            _ => None,
        };
        Ok(())
    }

    /// Power over the last completed sampling window, in watts. `None`
    /// until both snapshots have been recorded, or when the measurement was
    /// invalid.
    pub fn power_watts(&self) -> Option<f64> {
        self.power_watts
    }

    /// Raw start/end snapshots of the last sampling window, in microjoules.
    pub fn energy_window_uj(&self) -> (Option<f64>, Option<f64>) {
        (self.start_uj, self.end_uj)
    }

    fn read_energy(&self) -> Result<f64> {
        let raw = fs::read_to_string(&self.energy_path)?;
        raw.trim().parse::<f64>().map_err(|e| {
            PowerError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{}: {e}", self.energy_path.display()),
            ))
        })
    }
}

/// Counter-based sampling backend over a set of RAPL domains.
///
/// Every domain is sampled over the same start-all/sleep/stop-all window so
/// the per-domain figures are comparable.
pub struct RaplPower {
    counters: Vec<EnergyCounter>,
    delay: Duration,
}

impl RaplPower {
    /// Discover domains under a custom powercap root.
    ///
    /// Fails with [`PowerError::UnsupportedPlatform`] off Linux and
    /// [`PowerError::SourceNotFound`] when the root does not exist.
    pub fn with_root(root: impl Into<PathBuf>) -> Result<Self> {
        if !cfg!(target_os = "linux") {
            return Err(PowerError::UnsupportedPlatform {
                backend: "RAPL",
                os: std::env::consts::OS,
            });
        }

        let root = root.into();
        if !root.exists() {
            return Err(PowerError::SourceNotFound(root));
        }

        Ok(Self {
            counters: discover_counters(&root)?,
            delay: SAMPLING_DELAY,
        })
    }

    /// Number of discovered energy-accounting domains.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }
}

impl PowerSampler for RaplPower {
    fn new() -> Result<Self> {
        Self::with_root(DEFAULT_RAPL_ROOT)
    }

    /// One start-all/sleep/stop-all cycle across every domain.
    ///
    /// A failing counter is logged and omitted; the cycle itself never
    /// fails. Counters whose measurement came out invalid are omitted too.
    fn sample(&mut self) -> PowerTable {
        let mut table = PowerTable::new();

        for counter in &mut self.counters {
            if let Err(e) = counter.start() {
                warn!(counter = counter.name(), error = %e, "Failed to start energy counter");
            }
        }

        thread::sleep(self.delay);

        for counter in &mut self.counters {
            if let Err(e) = counter.stop(self.delay) {
                warn!(counter = counter.name(), error = %e, "Failed to read energy counter");
                continue;
            }
            if let Some(watts) = counter.power_watts() {
                table.insert(counter.name().to_string(), watts);
            }
        }

        table
    }

    fn is_supported() -> bool {
        cfg!(target_os = "linux") && Path::new(DEFAULT_RAPL_ROOT).exists()
    }
}

/// Enumerate the indexed sub-domain directories under the powercap root.
///
/// Only entries whose file name carries the `:` delimiter are counters
/// (`intel-rapl:0`, `intel-rapl:0:0`, ...); undelimited entries are
/// aggregate or control nodes. Entries are sorted by file name so package
/// numbering is stable across runs, and package-level domains are renamed
/// to `Processor Power_{i}(Watt)`.
fn discover_counters(root: &Path) -> Result<Vec<EnergyCounter>> {
    let mut domain_dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(':'))
        })
        .collect();
    domain_dirs.sort();

    let mut counters = Vec::new();
    let mut packages = 0usize;
    for dir in domain_dirs {
        let declared = fs::read_to_string(dir.join("name"))?.trim().to_string();
        let label = if declared.contains(PACKAGE_MARKER) {
            let label = format!("Processor Power_{packages}(Watt)");
            packages += 1;
            label
        } else {
            declared
        };
        counters.push(EnergyCounter::new(label, &dir));
    }

    Ok(counters)
}
