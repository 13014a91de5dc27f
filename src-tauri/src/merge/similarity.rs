// Name-similarity signals for the merge engine: Jaro-Winkler string
// similarity and token-set overlap. Hand-rolled per spec.md 4.H — the
// crate has no string-similarity dependency, and this is a small enough
// textbook algorithm to keep in-house rather than pull a crate for.

use std::collections::HashSet;

use crate::constants::GENERIC_LOCATION_NAMES;

/// Jaro similarity, then the Winkler boost for a shared prefix (up to 4
/// characters, scaling factor 0.1 — the standard Winkler parameters).
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    let jaro = jaro_similarity(a, b);
    if jaro == 0.0 {
        return 0.0;
    }

    let prefix_len = a
        .chars()
        .zip(b.chars())
        .take(4)
        .take_while(|(x, y)| x == y)
        .count() as f64;

    jaro + prefix_len * 0.1 * (1.0 - jaro)
}

fn jaro_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let match_distance = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut a_matches = vec![false; a.len()];
    let mut b_matches = vec![false; b.len()];
    let mut matches = 0usize;

    for (i, ac) in a.iter().enumerate() {
        let start = i.saturating_sub(match_distance);
        let end = (i + match_distance + 1).min(b.len());
        for (j, bc) in b.iter().enumerate().take(end).skip(start) {
            if b_matches[j] || ac != bc {
                continue;
            }
            a_matches[i] = true;
            b_matches[j] = true;
            matches += 1;
            break;
        }
    }

    if matches == 0 {
        return 0.0;
    }

    let mut transpositions = 0usize;
    let mut k = 0;
    for (i, &matched) in a_matches.iter().enumerate() {
        if !matched {
            continue;
        }
        while !b_matches[k] {
            k += 1;
        }
        if a[i] != b[k] {
            transpositions += 1;
        }
        k += 1;
    }
    let transpositions = transpositions / 2;

    let m = matches as f64;
    (m / a.len() as f64 + m / b.len() as f64 + (m - transpositions as f64) / m) / 3.0
}

fn normalize_tokens(name: &str) -> HashSet<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Fraction of the smaller token set contained in the larger, the
/// "2/3 of tokens overlap" signal from spec.md 4.H.
pub fn token_set_overlap(a: &str, b: &str) -> f64 {
    let tokens_a = normalize_tokens(a);
    let tokens_b = normalize_tokens(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count() as f64;
    let smaller = tokens_a.len().min(tokens_b.len()) as f64;
    intersection / smaller
}

const FILLER_WORDS: [&str; 5] = ["old", "the", "abandoned", "former", "a"];

/// A name is "generic" if, once common filler words are stripped, every
/// remaining token is a facility word (e.g. "Hospital", "The Old Mill")
/// rather than a distinguishing proper noun — a name-only match against
/// such a name needs corroboration from a second signal.
pub fn is_generic_name(name: &str) -> bool {
    let tokens: HashSet<String> = normalize_tokens(name)
        .into_iter()
        .filter(|t| !FILLER_WORDS.contains(&t.as_str()))
        .collect();
    if tokens.is_empty() {
        return false;
    }
    tokens
        .iter()
        .all(|t| GENERIC_LOCATION_NAMES.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaro_winkler_identical_strings_is_one() {
        assert!((jaro_winkler("abandoned mill", "abandoned mill") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn jaro_winkler_rewards_shared_prefix() {
        let close = jaro_winkler("martha's vineyard", "marthas vineyard");
        assert!(close > 0.9);
    }

    #[test]
    fn token_set_overlap_full_containment() {
        let overlap = token_set_overlap("Old State Hospital", "State Hospital");
        assert!((overlap - 1.0).abs() < 1e-9);
    }

    #[test]
    fn is_generic_name_flags_bare_facility_words() {
        assert!(is_generic_name("Hospital"));
        assert!(is_generic_name("The Old Mill"));
        assert!(!is_generic_name("Danvers State Hospital"));
    }
}
