//! Constant-power fallback via CPU model lookup.
//!
//! When no live measurement path is available, the detected CPU model
//! string is resolved against a reference dataset of vendor TDP figures.
//! Matching is deliberately conservative: both stages require an
//! effectively perfect score, because silently borrowing a dissimilar
//! CPU's TDP corrupts downstream energy accounting more than refusing to
//! guess.

use std::fs::File;
use std::io;
use std::path::Path;

use serde::Deserialize;
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tracing::{debug, warn};

use crate::error::Result;
use crate::fuzzy;

/// Documented fallback when no TDP could be resolved at all. Published for
/// callers; the resolver itself never substitutes it.
pub const DEFAULT_CPU_POWER_WATTS: f64 = 85.0;

/// Model reported when the platform cannot identify its CPU.
pub const UNKNOWN_MODEL: &str = "Unknown";

// Minimum similarity scores for each matching stage. Both require an
// effectively perfect match.
const THRESHOLD_DIRECT: u32 = 100;
const THRESHOLD_TOKEN_SET: u32 = 100;

const BUNDLED_DATASET: &str = include_str!("../data/cpu_power.csv");

/// One row of the reference dataset: a CPU model and its vendor-specified
/// thermal design power in watts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TdpEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "TDP")]
    pub tdp_watts: f64,
}

/// Reference CPU power dataset, loaded once and immutable thereafter.
#[derive(Debug, Clone)]
pub struct TdpRegistry {
    entries: Vec<TdpEntry>,
}

impl TdpRegistry {
    /// The dataset shipped with the crate.
    pub fn bundled() -> Self {
        Self::from_reader(BUNDLED_DATASET.as_bytes()).expect("bundled dataset must be well-formed")
    }

    /// Load entries from CSV content with `Name` and `TDP` columns.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();
        for record in csv_reader.deserialize() {
            entries.push(record?);
        }
        Ok(Self { entries })
    }

    /// Load a dataset from a CSV file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn entries(&self) -> &[TdpEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tie-break policy when several reference models match equally well.
///
/// `Greedy` accepts the first of the equally-plausible models, in dataset
/// order. That can pick a model with a different TDP than the installed
/// part, but any consistent choice still supports comparing a machine's
/// consumption against itself over time. `Strict` refuses to choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Strict,
    Greedy,
}

/// Resolved constant-power estimate for the local CPU.
///
/// Computed once at construction and immutable; re-detection requires a
/// new instance.
#[derive(Debug, Clone)]
pub struct Tdp {
    model: String,
    tdp_watts: Option<f64>,
}

impl Tdp {
    /// Detect the local CPU model and resolve it against the registry.
    ///
    /// Detection failure yields `(UNKNOWN_MODEL, None)`; a detected but
    /// unmatched model yields `(model, None)`. Both are logged, never
    /// raised — callers fall back to [`DEFAULT_CPU_POWER_WATTS`].
    pub fn detect(registry: &TdpRegistry, mode: MatchMode) -> Self {
        let Some(model) = detect_cpu_model() else {
            warn!(
                "Unable to detect the CPU model; assume a default constant power of {} W",
                DEFAULT_CPU_POWER_WATTS
            );
            return Self {
                model: UNKNOWN_MODEL.to_string(),
                tdp_watts: None,
            };
        };

        match match_cpu(&model, registry, mode) {
            Some(entry) => {
                debug!(model = %model, tdp = entry.tdp_watts, "Resolved CPU constant power");
                Self {
                    model,
                    tdp_watts: Some(entry.tdp_watts),
                }
            }
            None => {
                warn!(
                    model = %model,
                    "CPU model is not in the reference dataset; please report it"
                );
                Self {
                    model,
                    tdp_watts: None,
                }
            }
        }
    }

    /// The detected model string, or [`UNKNOWN_MODEL`].
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Vendor TDP in watts, absent when resolution found no match.
    pub fn tdp_watts(&self) -> Option<f64> {
        self.tdp_watts
    }
}

/// Free-text CPU brand string from the platform's CPU identification
/// facility, or `None` when it reports nothing usable.
pub fn detect_cpu_model() -> Option<String> {
    let mut system =
        System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::everything()));
    system.refresh_cpu_all();
    system
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .filter(|brand| !brand.is_empty())
}

/// Two-stage match of a detected model string against the registry.
///
/// The direct stage compares whole strings case-insensitively and wins
/// outright on a perfect score, first entry in dataset order on ties. The
/// token-set stage then accepts a perfect score only when it is unique,
/// unless `Greedy` mode takes the first of the tied entries. Results are
/// deterministic for a given input and dataset.
pub fn match_cpu<'a>(
    model: &str,
    registry: &'a TdpRegistry,
    mode: MatchMode,
) -> Option<&'a TdpEntry> {
    let entries = registry.entries();
    if entries.is_empty() {
        return None;
    }

    let model_lower = model.to_lowercase();
    let direct: Vec<u32> = entries
        .iter()
        .map(|entry| fuzzy::ratio(&model_lower, &entry.name.to_lowercase()))
        .collect();
    let max_direct = direct.iter().copied().max().unwrap_or(0);
    if max_direct >= THRESHOLD_DIRECT {
        let idx = direct.iter().position(|&score| score == max_direct)?;
        return entries.get(idx);
    }

    let token_set: Vec<u32> = entries
        .iter()
        .map(|entry| fuzzy::token_set_ratio(model, &entry.name))
        .collect();
    let max_token_set = token_set.iter().copied().max().unwrap_or(0);
    if max_token_set < THRESHOLD_TOKEN_SET {
        return None;
    }

    let tied: Vec<usize> = token_set
        .iter()
        .enumerate()
        .filter(|(_, &score)| score == max_token_set)
        .map(|(idx, _)| idx)
        .collect();
    match (tied.as_slice(), mode) {
        ([only], _) => entries.get(*only),
        ([first, ..], MatchMode::Greedy) => entries.get(*first),
        _ => {
            debug!(
                model,
                candidates = tied.len(),
                "Ambiguous token-set match, refusing to choose"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn registry(csv: &str) -> TdpRegistry {
        TdpRegistry::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn bundled_dataset_loads() {
        let registry = TdpRegistry::bundled();
        assert!(!registry.is_empty());
        assert!(registry.len() >= 50);
        assert!(registry.entries().iter().all(|entry| entry.tdp_watts > 0.0));
    }

    #[test]
    fn exact_match_resolves_case_insensitively() {
        let registry = registry(
            "Name,TDP\n\
             Intel Core i7-9750H,45\n\
             Intel Core i7-9700K,95\n",
        );

        let matched = match_cpu("intel core I7-9750H", &registry, MatchMode::Strict).unwrap();
        assert_eq!(matched.name, "Intel Core i7-9750H");
        assert_eq!(matched.tdp_watts, 45.0);
    }

    #[test]
    fn direct_match_beats_token_set_overlap() {
        // "Xeon" appears in both names, but only one is an exact match.
        let registry = registry(
            "Name,TDP\n\
             Intel Xeon E5-2690,135\n\
             Intel Xeon E5-2690 v2 E5-2690,130\n",
        );

        let matched = match_cpu("Intel Xeon E5-2690", &registry, MatchMode::Strict).unwrap();
        assert_eq!(matched.tdp_watts, 135.0);
    }

    #[test]
    fn direct_tie_takes_first_in_dataset_order() {
        let registry = registry(
            "Name,TDP\n\
             AMD Ryzen 5 3600,65\n\
             AMD Ryzen 5 3600,95\n",
        );

        let matched = match_cpu("AMD Ryzen 5 3600", &registry, MatchMode::Strict).unwrap();
        assert_eq!(matched.tdp_watts, 65.0);
    }

    #[test]
    fn token_set_stage_matches_reordered_model() {
        let registry = registry(
            "Name,TDP\n\
             Intel Core i7-8700K,95\n\
             Intel Core i5-8400,65\n",
        );

        let matched = match_cpu("i7-8700K Intel Core", &registry, MatchMode::Strict).unwrap();
        assert_eq!(matched.name, "Intel Core i7-8700K");
    }

    #[test]
    fn ambiguous_token_set_match_is_rejected_in_strict_mode() {
        let registry = registry(
            "Name,TDP\n\
             Intel Core i7-8700K,95\n\
             Intel Core i7-8700K,35\n",
        );

        // Reordered input skips the direct stage and ties in the token-set
        // stage.
        assert!(match_cpu("i7-8700K Intel Core", &registry, MatchMode::Strict).is_none());
    }

    #[test]
    fn ambiguous_token_set_match_takes_first_in_greedy_mode() {
        let registry = registry(
            "Name,TDP\n\
             Intel Core i7-8700K,95\n\
             Intel Core i7-8700K,35\n",
        );

        let matched = match_cpu("i7-8700K Intel Core", &registry, MatchMode::Greedy).unwrap();
        assert_eq!(matched.tdp_watts, 95.0);
    }

    #[test]
    fn dissimilar_model_yields_no_match() {
        let registry = registry(
            "Name,TDP\n\
             Intel Core i7-9750H,45\n",
        );

        assert!(match_cpu("AMD EPYC 7763", &registry, MatchMode::Strict).is_none());
        assert!(match_cpu("AMD EPYC 7763", &registry, MatchMode::Greedy).is_none());
    }

    #[test]
    fn empty_registry_yields_no_match() {
        let registry = registry("Name,TDP\n");
        assert!(match_cpu("Intel Core i7-9750H", &registry, MatchMode::Strict).is_none());
    }

    #[test]
    fn matching_is_deterministic() {
        let registry = registry(
            "Name,TDP\n\
             Intel Core i7-9750H,45\n\
             Intel Core i9-9880H,45\n\
             AMD Ryzen 7 3700X,65\n",
        );

        let first = match_cpu("Intel Core i7-9750H", &registry, MatchMode::Strict).cloned();
        for _ in 0..10 {
            let again = match_cpu("Intel Core i7-9750H", &registry, MatchMode::Strict).cloned();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn full_brand_string_resolves_against_exact_entry() {
        let registry = registry(
            "Name,TDP\n\
             Intel Core i7-9750H,45\n\
             Intel(R) Core(TM) i7-9750H CPU @ 2.60GHz,45\n",
        );

        let matched = match_cpu(
            "Intel(R) Core(TM) i7-9750H CPU @ 2.60GHz",
            &registry,
            MatchMode::Strict,
        )
        .unwrap();
        assert_eq!(matched.name, "Intel(R) Core(TM) i7-9750H CPU @ 2.60GHz");
        assert_eq!(matched.tdp_watts, 45.0);
    }
}
