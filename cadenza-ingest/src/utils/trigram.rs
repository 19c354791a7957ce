//! Trigram string similarity
//!
//! Same definition as PostgreSQL `pg_trgm`: lowercase, split into words on
//! non-alphanumeric characters, pad each word with two leading spaces and one
//! trailing space, then score shared trigrams over the union.

use std::collections::BTreeSet;

/// Trigram set of a string
pub fn trigrams(input: &str) -> BTreeSet<[char; 3]> {
    let mut set = BTreeSet::new();

    for word in input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();

        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }

    set
}

/// Similarity in `[0, 1]`; 0 when either side has no trigrams
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = trigrams(a);
    let right = trigrams(b);

    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(&right).count();
    let union = left.len() + right.len() - shared;

    shared as f64 / union as f64
}
