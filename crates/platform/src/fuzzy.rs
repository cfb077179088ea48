//! Approximate string matching for CPU model resolution.
//!
//! Two measures, both scaled to 0-100:
//!
//! - [`ratio`] compares whole strings, order-sensitive.
//! - [`token_set_ratio`] compares the sets of words, ignoring order and
//!   duplication, so `"i7-8700K Intel Core"` scores 100 against
//!   `"Intel Core i7-8700K"`.

use std::collections::BTreeSet;

/// Whole-string similarity ratio between 0 and 100.
///
/// Indel similarity: `200 * LCS(a, b) / (|a| + |b|)`, rounded. Returns 100
/// iff the strings are equal. Comparison is case-sensitive; callers that
/// want case-insensitive matching lowercase both sides first.
pub fn ratio(a: &str, b: &str) -> u32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }
    let lcs = lcs_length(&a, &b);
    ((200 * lcs) as f64 / total as f64).round() as u32
}

/// Token-set similarity ratio between 0 and 100.
///
/// Both strings are normalized (lowercased, non-alphanumeric runs treated
/// as separators) and split into word sets. The sorted intersection is then
/// compared against each side's intersection-plus-remainder rendering, and
/// the best whole-string ratio of the three pairings wins. Scores 100 iff
/// one token set contains the other.
pub fn token_set_ratio(a: &str, b: &str) -> u32 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    // BTreeSet iteration keeps every rendering sorted.
    let common = join(tokens_a.intersection(&tokens_b));
    let only_a = join(tokens_a.difference(&tokens_b));
    let only_b = join(tokens_b.difference(&tokens_a));

    let combined_a = concat(&common, &only_a);
    let combined_b = concat(&common, &only_b);

    ratio(&common, &combined_a)
        .max(ratio(&common, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

fn tokenize(s: &str) -> BTreeSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn join<'a>(tokens: impl Iterator<Item = &'a String>) -> String {
    tokens.map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn concat(base: &str, rest: &str) -> String {
    if base.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        base.to_string()
    } else {
        format!("{base} {rest}")
    }
}

fn lcs_length(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_100_only_for_equal_strings() {
        assert_eq!(ratio("Intel Core i7-9750H", "Intel Core i7-9750H"), 100);
        assert!(ratio("Intel Core i7-9750H", "Intel Core i7-9700H") < 100);
        assert!(ratio("Intel Core i7", "AMD Ryzen 7") < 100);
    }

    #[test]
    fn ratio_handles_empty_inputs() {
        assert_eq!(ratio("", ""), 100);
        assert_eq!(ratio("", "abc"), 0);
        assert_eq!(ratio("abc", ""), 0);
    }

    #[test]
    fn ratio_is_symmetric() {
        assert_eq!(ratio("abcd", "abef"), ratio("abef", "abcd"));
    }

    #[test]
    fn token_set_ignores_order_and_duplicates() {
        assert_eq!(
            token_set_ratio("i7-8700K Intel Core", "Intel Core i7-8700K"),
            100
        );
        assert_eq!(
            token_set_ratio("Intel Intel Core i5", "Core i5 Intel"),
            100
        );
    }

    #[test]
    fn token_set_is_100_for_subset() {
        assert_eq!(
            token_set_ratio("Intel Core i7-9750H", "Intel(R) Core(TM) i7-9750H CPU"),
            100
        );
    }

    #[test]
    fn token_set_below_100_for_diverging_models() {
        assert!(token_set_ratio("Intel Core i7-9750H", "Intel Core i7-9700K") < 100);
    }

    #[test]
    fn token_set_rejects_empty_sides() {
        assert_eq!(token_set_ratio("", "Intel Core"), 0);
        assert_eq!(token_set_ratio("  ()  ", "Intel Core"), 0);
        assert_eq!(token_set_ratio("", ""), 0);
    }

    #[test]
    fn token_set_normalizes_punctuation() {
        assert_eq!(
            token_set_ratio("intel core i7 9750h", "Intel-Core/i7(9750H)"),
            100
        );
    }
}
