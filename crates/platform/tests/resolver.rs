//! End-to-end CPU model resolution scenarios against small datasets.

use pretty_assertions::assert_eq;
use surge_platform::{fuzzy, match_cpu, MatchMode, TdpRegistry};

fn registry(csv: &str) -> TdpRegistry {
    TdpRegistry::from_reader(csv.as_bytes()).unwrap()
}

#[test]
fn detected_brand_string_resolves_to_exact_entry() {
    let registry = registry(
        "Name,TDP\n\
         Intel Core i7-9750H,45\n\
         Intel(R) Core(TM) i7-9750H CPU @ 2.60GHz,45\n\
         Intel Core i9-9880H,45\n",
    );

    let matched = match_cpu(
        "Intel(R) Core(TM) i7-9750H CPU @ 2.60GHz",
        &registry,
        MatchMode::Strict,
    )
    .expect("exact brand string must resolve");

    assert_eq!(matched.name, "Intel(R) Core(TM) i7-9750H CPU @ 2.60GHz");
    assert_eq!(matched.tdp_watts, 45.0);
}

#[test]
fn resolution_is_stable_across_runs() {
    let registry = registry(
        "Name,TDP\n\
         AMD Ryzen 7 3700X,65\n\
         AMD Ryzen 7 3800X,105\n\
         AMD Ryzen 9 3900X,105\n",
    );

    let baseline = match_cpu("AMD Ryzen 7 3700X", &registry, MatchMode::Strict)
        .cloned()
        .expect("exact model must resolve");
    for _ in 0..25 {
        let resolved = match_cpu("AMD Ryzen 7 3700X", &registry, MatchMode::Strict).cloned();
        assert_eq!(resolved.as_ref(), Some(&baseline));
    }
}

#[test]
fn direct_match_wins_over_higher_token_overlap() {
    // The second entry shares every token of the probe and then some, but
    // an exact whole-string match on the first entry settles it.
    let registry = registry(
        "Name,TDP\n\
         Intel Xeon Gold 6130,125\n\
         Intel Xeon Gold 6130 Xeon Gold,999\n",
    );

    let matched = match_cpu("Intel Xeon Gold 6130", &registry, MatchMode::Strict).unwrap();
    assert_eq!(matched.tdp_watts, 125.0);
}

#[test]
fn equally_plausible_models_depend_on_mode() {
    let registry = registry(
        "Name,TDP\n\
         Intel Core i5-8400,65\n\
         Intel Core i5-8400,35\n",
    );

    // Token reordering forces the token-set stage, where both entries tie.
    let probe = "i5-8400 Core Intel";
    assert!(match_cpu(probe, &registry, MatchMode::Strict).is_none());

    let greedy = match_cpu(probe, &registry, MatchMode::Greedy).unwrap();
    assert_eq!(greedy.tdp_watts, 65.0);
}

#[test]
fn bundled_dataset_resolves_a_known_mobile_part() {
    let registry = TdpRegistry::bundled();
    let matched = match_cpu("Intel Core i7-9750H", &registry, MatchMode::Strict)
        .expect("bundled dataset must know the i7-9750H");
    assert_eq!(matched.tdp_watts, 45.0);
}

#[test]
fn similarity_scores_are_clamped_to_percent_scale() {
    let registry = TdpRegistry::bundled();
    for entry in registry.entries() {
        let direct = fuzzy::ratio("Intel Core i7-9750H", &entry.name);
        let token_set = fuzzy::token_set_ratio("Intel Core i7-9750H", &entry.name);
        assert!(direct <= 100);
        assert!(token_set <= 100);
    }
}
