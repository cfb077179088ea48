//! Sampling trait and result table shared by the measurement backends.

use std::collections::HashMap;

use crate::error::Result;

/// A named table of aggregated measurements.
///
/// Counter backends report instantaneous power in watts, keyed by
/// energy-accounting domain. The logged-tool backend reports one aggregate
/// per log column, so a few keys may carry other units (the column name
/// spells out the unit, e.g. `Cumulative Processor Energy_0(Joules)`).
pub type PowerTable = HashMap<String, f64>;

/// Trait for point-in-time CPU power sampling backends.
///
/// Construction fails when the strategy is unusable on this host (wrong
/// platform, missing counter tree, missing vendor tool); callers probe the
/// backends in order and keep the first that constructs. A constructed
/// backend's `sample()` is best-effort telemetry: it blocks for a short,
/// bounded time and never fails, returning a partial or empty table instead.
pub trait PowerSampler {
    /// Create a backend with its platform defaults.
    fn new() -> Result<Self>
    where
        Self: Sized;

    /// Take one measurement and return the aggregated table.
    fn sample(&mut self) -> PowerTable;

    /// Cheap pre-check for whether this backend can work on this system.
    fn is_supported() -> bool
    where
        Self: Sized,
    {
        true
    }
}
