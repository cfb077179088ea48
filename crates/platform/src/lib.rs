//! CPU power measurement backends for surge.
//!
//! This crate estimates the host CPU's instantaneous electrical power draw
//! with one of three strategies, probed in order:
//!
//! - [`RaplPower`] — hardware energy counters (Linux powercap/RAPL)
//! - [`PowerGadget`] — the Intel Power Gadget logging tool (Windows, macOS)
//! - [`Tdp`] — a constant-power lookup of the detected CPU model against a
//!   reference dataset, when no live measurement path is available
//!
//! # Example
//!
//! ```no_run
//! use surge_platform::{MatchMode, PowerSampler, RaplPower, Tdp, TdpRegistry};
//!
//! # fn main() -> Result<(), surge_platform::PowerError> {
//! if surge_platform::is_rapl_available() {
//!     let mut backend = RaplPower::new()?;
//!     for (domain, watts) in backend.sample() {
//!         println!("{domain}: {watts:.1} W");
//!     }
//! } else {
//!     let registry = TdpRegistry::bundled();
//!     let tdp = Tdp::detect(&registry, MatchMode::Strict);
//!     println!("{}: {:?} W", tdp.model(), tdp.tdp_watts());
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod fuzzy;
mod gadget;
mod power;
mod rapl;
mod tdp;

pub use error::{PowerError, Result};
pub use gadget::PowerGadget;
pub use power::{PowerSampler, PowerTable};
pub use rapl::{EnergyCounter, RaplPower, DEFAULT_RAPL_ROOT};
pub use tdp::{
    detect_cpu_model, match_cpu, MatchMode, Tdp, TdpEntry, TdpRegistry, DEFAULT_CPU_POWER_WATTS,
    UNKNOWN_MODEL,
};

/// Probe whether the RAPL counter backend can be constructed on this host.
///
/// Failures are logged at debug level and reported as `false`.
pub fn is_rapl_available() -> bool {
    match RaplPower::new() {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "RAPL backend unavailable");
            false
        }
    }
}

/// Probe whether the Intel Power Gadget backend can be constructed on this
/// host.
///
/// Failures are logged at debug level and reported as `false`.
pub fn is_power_gadget_available() -> bool {
    match PowerGadget::new() {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Intel Power Gadget backend unavailable");
            false
        }
    }
}
